//! # bandscope-core
//!
//! Real-time audio spectrum engine: raw PCM in, smoothed band magnitudes out.
//!
//! ## Architecture
//!
//! ```text
//! Device → CaptureStream (ring buffer, resample, i16 LE)
//!              │  every 50 ms: bytes_available / read
//!              ▼
//!        capture worker ──► FrameProcessor (Hann → FFT → bands → dB → EMA)
//!                                  │
//!                            SpectrumCell (Arc snapshot swap)
//!                                  │
//!                   broadcast::Sender<AnalyzerEvent> ──► renderers
//! ```
//!
//! The audio callback is lock-free. All heap work happens on the worker thread.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod ipc;

// Convenience re-exports for downstream crates
pub use audio::{CaptureSource, CaptureStream, CpalSource, MemoryFeed, MemorySource, StreamFormat};
pub use dsp::{Transform, TransformKind};
pub use engine::{
    processor::FrameProcessor,
    state::{BandSnapshot, SpectrumCell},
    AnalyzerConfig, SpectrumAnalyzer,
};
pub use error::BandscopeError;
pub use ipc::events::{AnalyzerEvent, CaptureStatus, SpectrumEvent};
