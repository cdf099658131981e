//! WAV replay: decode a file once, then trickle it into a `MemoryFeed` at
//! real-time pace so the analyzer sees the same cadence as a live device.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use bandscope_core::{
    audio::resample::RateConverter,
    buffering::pcm::f32_to_i16,
    MemoryFeed,
};
use tracing::{debug, info, warn};

const RESAMPLE_CHUNK: usize = 1_024;

/// Decode `path` to mono f32 in [-1, 1] at the file's own rate.
pub fn read_wav_mono_f32(path: &Path) -> anyhow::Result<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            if spec.bits_per_sample <= 16 {
                reader
                    .samples::<i16>()
                    .map(|s| s.map(|v| f32::from(v) / f32::from(i16::MAX)))
                    .collect::<Result<Vec<_>, _>>()?
            } else {
                let max = ((1_i64 << (spec.bits_per_sample - 1)) - 1) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max))
                    .collect::<Result<Vec<_>, _>>()?
            }
        }
    };

    if channels == 1 {
        return Ok((interleaved, spec.sample_rate));
    }

    let mono = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();
    Ok((mono, spec.sample_rate))
}

/// Load `path` as 16-bit mono PCM at `target_rate`.
pub fn load_pcm(path: &Path, target_rate: u32) -> anyhow::Result<Vec<i16>> {
    let (samples, rate) = read_wav_mono_f32(path)?;
    let samples = if rate == target_rate {
        samples
    } else {
        warn!(file_rate = rate, target_rate, "resampling replay file");
        let mut converter = RateConverter::new(rate, target_rate, RESAMPLE_CHUNK)?;
        let mut out = Vec::with_capacity(samples.len() * target_rate as usize / rate.max(1) as usize);
        converter.process_into(&samples, &mut out);
        converter.flush(&mut out);
        out
    };

    info!(
        path = %path.display(),
        samples = samples.len(),
        secs = samples.len() as f64 / f64::from(target_rate),
        "replay file loaded"
    );
    Ok(samples.into_iter().map(f32_to_i16).collect())
}

/// Samples pushed per `interval` at `sample_rate`.
pub fn chunk_len(sample_rate: u32, interval: Duration) -> usize {
    ((f64::from(sample_rate) * interval.as_secs_f64()).round() as usize).max(1)
}

/// Push `samples` into `feed` one interval's worth at a time.
///
/// Returns once the whole file has been queued.
pub async fn play(feed: MemoryFeed, samples: Vec<i16>, sample_rate: u32, interval: Duration) {
    let chunk = chunk_len(sample_rate, interval);
    let mut ticker = tokio::time::interval(interval);
    for (i, block) in samples.chunks(chunk).enumerate() {
        ticker.tick().await;
        feed.push_samples(block);
        debug!(block = i, pending = feed.pending_bytes(), "replay block queued");
    }
    info!("replay finished");
}
