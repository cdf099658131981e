//! Signal processing primitives used by the frame processor.
//!
//! The `Transform` trait is the backend seam: the processor only ever asks for
//! an in-place forward transform, so the hand-written `Radix2` engine and the
//! planner-backed `PlannedFft` are interchangeable.

pub mod bands;
pub mod fft;
pub mod window;

pub use fft::{PlannedFft, Radix2};
pub use rustfft::num_complex::Complex32;

use serde::{Deserialize, Serialize};

/// In-place forward frequency transform.
pub trait Transform: Send + 'static {
    /// Transform `buffer` in place.
    ///
    /// `buffer.len()` must be a power of two. Callers guarantee this by
    /// construction; implementations only `debug_assert!` it.
    fn process(&mut self, buffer: &mut [Complex32]);

    /// Short backend name for logs and benchmarks.
    fn name(&self) -> &'static str;
}

/// Selects a `Transform` backend from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    /// Iterative decimation-in-time radix-2 engine.
    #[default]
    Radix2,
    /// `rustfft` planner.
    Planned,
}

impl TransformKind {
    pub fn build(self) -> Box<dyn Transform> {
        match self {
            TransformKind::Radix2 => Box::new(Radix2::new()),
            TransformKind::Planned => Box::new(PlannedFft::new()),
        }
    }
}
