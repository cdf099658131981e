//! Capture collaborator interface.
//!
//! The analyzer never talks to an audio API directly. It asks a
//! `CaptureSource` for a `CaptureStream` at a fixed `StreamFormat` and then
//! pulls bytes from that stream on its own tick.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS). `CaptureStream` is therefore not required to be `Send`: the capture
//! worker calls `open_stream` on its own thread and drops the stream there.
//! Only the `CaptureSource` crosses threads.

pub mod device;
pub mod memory;
pub mod resample;

pub use device::CpalSource;
pub use memory::{MemoryFeed, MemorySource};

use crate::error::Result;

/// PCM format requested from a capture source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl StreamFormat {
    /// 44.1 kHz, mono, signed 16-bit.
    pub const CD_MONO_I16: StreamFormat = StreamFormat {
        sample_rate: 44_100,
        channels: 1,
        bits_per_sample: 16,
    };

    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits_per_sample / 8) * usize::from(self.channels)
    }
}

impl Default for StreamFormat {
    fn default() -> Self {
        Self::CD_MONO_I16
    }
}

/// An open capture stream delivering little-endian PCM bytes.
pub trait CaptureStream {
    /// Bytes that can be read right now without blocking.
    fn bytes_available(&mut self) -> usize;

    /// Read up to `buf.len()` bytes, returning how many were written.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Input gain in [0, 1].
    fn set_volume(&mut self, level: f32);

    /// Release the underlying device. Called once before drop; must be idempotent.
    fn close(&mut self);
}

/// Something that can open capture streams (a device, a file, a test feed).
pub trait CaptureSource: Send + Sync + 'static {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Open a stream at `format`.
    ///
    /// # Errors
    /// `BandscopeError::DeviceUnavailable` when the device is gone,
    /// `BandscopeError::StreamOpen` / `AudioDevice` when the backend refuses.
    fn open_stream(&self, format: StreamFormat) -> Result<Box<dyn CaptureStream>>;
}
