//! `cpal` capture backend.
//!
//! # Design constraints
//!
//! The cpal input callback runs on an OS audio thread at elevated priority.
//! It **must not** allocate on the steady-state path, block on a mutex, or
//! perform I/O. The callback only downmixes to mono f32 and writes into an
//! SPSC ring buffer producer whose `push_slice` is lock-free.
//!
//! Everything else (resampling to 44.1 kHz, gain, i16 encoding) happens in
//! `CpalStream::pump`, which the capture worker calls on its tick.

#[cfg(feature = "audio-cpal")]
use std::collections::VecDeque;
#[cfg(feature = "audio-cpal")]
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig,
};
#[cfg(feature = "audio-cpal")]
use tracing::{error, info, warn};

use super::{CaptureSource, CaptureStream, StreamFormat};
#[cfg(feature = "audio-cpal")]
use super::resample::RateConverter;
#[cfg(feature = "audio-cpal")]
use crate::buffering::{drain_blocks, sample_ring, Producer, SampleConsumer, SampleProducer};
#[cfg(feature = "audio-cpal")]
use crate::buffering::pcm::f32_to_i16;
use crate::error::{BandscopeError, Result};

/// Input frames handed to rubato per call.
#[cfg(feature = "audio-cpal")]
const RESAMPLE_CHUNK: usize = 1024;

/// Pending output cap: ~3 s of 44.1 kHz i16. Oldest bytes are dropped past this.
#[cfg(feature = "audio-cpal")]
const MAX_PENDING_BYTES: usize = 1 << 18;

/// Opens a named input device, or the system default when no name is given.
#[derive(Debug, Clone)]
pub struct CpalSource {
    device_name: Option<String>,
    label: String,
}

impl CpalSource {
    pub fn new(device_name: Option<String>) -> Self {
        let label = device_name
            .clone()
            .unwrap_or_else(|| "default input".to_string());
        Self { device_name, label }
    }

    pub fn default_input() -> Self {
        Self::new(None)
    }
}

impl CaptureSource for CpalSource {
    fn name(&self) -> &str {
        &self.label
    }

    #[cfg(feature = "audio-cpal")]
    fn open_stream(&self, format: StreamFormat) -> Result<Box<dyn CaptureStream>> {
        if format.bits_per_sample != 16 || format.channels != 1 {
            return Err(BandscopeError::StreamOpen(format!(
                "unsupported format: {format:?}"
            )));
        }

        let host = cpal::default_host();
        let device = match self.device_name.as_deref() {
            Some(wanted) => host
                .input_devices()
                .map_err(|e| BandscopeError::AudioDevice(e.to_string()))?
                .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
                .ok_or(BandscopeError::DeviceUnavailable)?,
            None => host
                .default_input_device()
                .ok_or(BandscopeError::DeviceUnavailable)?,
        };

        info!(
            device = device.name().unwrap_or_default().as_str(),
            "opening input device"
        );

        let supported = device
            .default_input_config()
            .map_err(|e| BandscopeError::AudioDevice(e.to_string()))?;
        let capture_rate = supported.sample_rate().0;
        let channels = supported.channels();
        info!(capture_rate, channels, "audio config selected");

        let config: StreamConfig = supported.config();
        let (producer, consumer) = sample_ring();
        let running = Arc::new(AtomicBool::new(true));

        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, producer, &running),
            SampleFormat::I16 => build_stream::<i16>(&device, &config, producer, &running),
            SampleFormat::U16 => build_stream::<u16>(&device, &config, producer, &running),
            SampleFormat::U8 => build_stream::<u8>(&device, &config, producer, &running),
            fmt => {
                return Err(BandscopeError::StreamOpen(format!(
                    "unsupported sample format: {fmt:?}"
                )))
            }
        }?;

        stream
            .play()
            .map_err(|e| BandscopeError::StreamOpen(e.to_string()))?;

        let resampler = RateConverter::new(capture_rate, format.sample_rate, RESAMPLE_CHUNK)?;

        Ok(Box::new(CpalStream {
            stream: Some(stream),
            consumer,
            running,
            resampler,
            drain_buf: vec![0.0; RESAMPLE_CHUNK],
            resampled: Vec::with_capacity(RESAMPLE_CHUNK * 2),
            pending: VecDeque::with_capacity(MAX_PENDING_BYTES),
            gain: 1.0,
        }))
    }

    #[cfg(not(feature = "audio-cpal"))]
    fn open_stream(&self, _format: StreamFormat) -> Result<Box<dyn CaptureStream>> {
        Err(BandscopeError::StreamOpen(
            "compiled without audio-cpal feature".into(),
        ))
    }
}

#[cfg(feature = "audio-cpal")]
fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut producer: SampleProducer,
    running: &Arc<AtomicBool>,
) -> Result<Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let ch = usize::from(config.channels.max(1));
    let running = Arc::clone(running);
    let mut mix_buf: Vec<f32> = Vec::new();

    device
        .build_input_stream(
            config,
            move |data: &[T], _info: &cpal::InputCallbackInfo| {
                if !running.load(Ordering::Relaxed) {
                    return;
                }
                let frames = data.len() / ch;
                mix_buf.resize(frames, 0.0);
                for (frame, slot) in data.chunks_exact(ch).zip(mix_buf.iter_mut()) {
                    let sum: f32 = frame.iter().map(|&s| s.to_sample::<f32>()).sum();
                    *slot = sum / ch as f32;
                }
                let written = producer.push_slice(&mix_buf);
                if written < mix_buf.len() {
                    warn!("ring buffer full: dropped {} frames", mix_buf.len() - written);
                }
            },
            |err| error!("audio stream error: {err}"),
            None,
        )
        .map_err(|e| BandscopeError::StreamOpen(e.to_string()))
}

/// Live cpal stream.
///
/// **Not `Send`**: holds a `cpal::Stream`. Created and dropped on the
/// capture worker thread.
#[cfg(feature = "audio-cpal")]
struct CpalStream {
    stream: Option<Stream>,
    consumer: SampleConsumer,
    /// Set to `false` to make the callback no-op.
    running: Arc<AtomicBool>,
    resampler: RateConverter,
    drain_buf: Vec<f32>,
    resampled: Vec<f32>,
    /// Encoded i16 LE bytes waiting to be read.
    pending: VecDeque<u8>,
    gain: f32,
}

#[cfg(feature = "audio-cpal")]
impl CpalStream {
    /// Move everything the callback produced into `pending`.
    fn pump(&mut self) {
        let Self {
            consumer,
            resampler,
            drain_buf,
            resampled,
            pending,
            gain,
            ..
        } = self;
        drain_blocks(consumer, drain_buf, |block| {
            resampled.clear();
            resampler.process_into(block, resampled);
            encode_with_gain(resampled, *gain, pending);
        });
        trim_pending(pending);
    }
}

#[cfg(feature = "audio-cpal")]
impl CaptureStream for CpalStream {
    fn bytes_available(&mut self) -> usize {
        self.pump();
        self.pending.len()
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        self.pump();
        let n = buf.len().min(self.pending.len());
        for (dst, src) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *dst = src;
        }
        n
    }

    fn set_volume(&mut self, level: f32) {
        self.gain = level.clamp(0.0, 1.0);
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!("failed to pause input stream: {e}");
            }
            // Stream drops here, releasing the device on this thread.
        }
        self.pending.clear();
    }
}

#[cfg(feature = "audio-cpal")]
impl Drop for CpalStream {
    fn drop(&mut self) {
        self.close();
    }
}

/// Scale by `gain` and append as i16 LE bytes.
#[cfg(feature = "audio-cpal")]
fn encode_with_gain(samples: &[f32], gain: f32, out: &mut VecDeque<u8>) {
    for &s in samples {
        out.extend(f32_to_i16(s * gain).to_le_bytes());
    }
}

/// Drop the oldest whole samples once `pending` exceeds its cap.
#[cfg(feature = "audio-cpal")]
fn trim_pending(pending: &mut VecDeque<u8>) {
    if pending.len() <= MAX_PENDING_BYTES {
        return;
    }
    let excess = pending.len() - MAX_PENDING_BYTES;
    let excess = excess + (excess % 2);
    pending.drain(..excess);
    tracing::debug!(dropped = excess, "capture backlog trimmed");
}
