//! Frame processor: raw PCM bytes → smoothed band vector.
//!
//! ## Stages (per cycle)
//!
//! ```text
//! 1. Decode i16 LE samples; fewer than min_fft_len → skip, keep bands
//! 2. Pick transform length: largest power of two in [min, max] ≤ samples
//! 3. Hann-window the first `len` samples into a fresh complex buffer
//! 4. Forward transform in place
//! 5. Sum |X[k]|² per band over bins [1, len/2)
//! 6. 20·log10 → clamp [floor_db, 0] → [0, 1]
//! 7. EMA smoothing into the persistent band vector
//! ```
//!
//! The processor is a pure synchronous computation; it never blocks.

use tracing::trace;

use super::AnalyzerConfig;
use crate::buffering::pcm::PcmFrame;
use crate::dsp::{
    bands::{band_powers, normalized_level, smooth_into},
    window::windowed_frame,
    Transform,
};

/// Largest power of two in `[min_len, max_len]` that does not exceed
/// `sample_count`, or `None` when fewer than `min_len` samples are available
/// or `min_len` is zero.
///
/// 600 samples with bounds 256..=1024 → 512.
pub fn transform_len(sample_count: usize, min_len: usize, max_len: usize) -> Option<usize> {
    debug_assert!(
        min_len == 0 || min_len.is_power_of_two(),
        "min_len {min_len} is not a power of two"
    );
    if min_len == 0 || sample_count < min_len {
        return None;
    }
    let mut len = min_len;
    while len * 2 <= sample_count && len < max_len {
        len *= 2;
    }
    Some(len)
}

/// Owns the persistent band vector and the transform backend.
pub struct FrameProcessor {
    transform: Box<dyn Transform>,
    bands: Vec<f32>,
    sample_rate: u32,
    min_fft_len: usize,
    max_fft_len: usize,
    smoothing: f32,
    floor_db: f32,
}

impl FrameProcessor {
    /// `config` is expected to have passed `AnalyzerConfig::validate`;
    /// `SpectrumAnalyzer::new` enforces that.
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self::with_transform(config, config.transform.build())
    }

    /// Use an explicit transform backend instead of `config.transform`.
    pub fn with_transform(config: &AnalyzerConfig, transform: Box<dyn Transform>) -> Self {
        Self {
            transform,
            bands: vec![0.0; config.band_count],
            sample_rate: config.format.sample_rate,
            min_fft_len: config.min_fft_len,
            max_fft_len: config.max_fft_len,
            smoothing: config.smoothing,
            floor_db: config.floor_db,
        }
    }

    /// Process a little-endian byte buffer.
    ///
    /// Returns the updated bands, or `None` when the buffer was too short and
    /// the previous bands were kept.
    pub fn process_bytes(&mut self, bytes: &[u8]) -> Option<&[f32]> {
        let frame = PcmFrame::from_le_bytes(bytes, self.sample_rate);
        self.process_samples(&frame.samples)
    }

    /// Process decoded samples. See `process_bytes`.
    pub fn process_samples(&mut self, samples: &[i16]) -> Option<&[f32]> {
        let Some(len) = transform_len(samples.len(), self.min_fft_len, self.max_fft_len) else {
            trace!(samples = samples.len(), "too few samples for a transform, skipping");
            return None;
        };

        let mut buffer = windowed_frame(samples, len);
        self.transform.process(&mut buffer);

        let fresh: Vec<f32> = band_powers(&buffer, self.bands.len())
            .into_iter()
            .map(|power| normalized_level(power, self.floor_db))
            .collect();
        smooth_into(&mut self.bands, &fresh, self.smoothing);

        trace!(len, backend = self.transform.name(), "frame processed");
        Some(&self.bands)
    }

    /// Current band vector.
    pub fn bands(&self) -> &[f32] {
        &self.bands
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Zero the band vector.
    pub fn reset(&mut self) {
        self.bands.iter_mut().for_each(|b| *b = 0.0);
    }

    pub fn transform_name(&self) -> &'static str {
        self.transform.name()
    }
}

impl std::fmt::Debug for FrameProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameProcessor")
            .field("transform", &self.transform.name())
            .field("bands", &self.bands)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffering::pcm::encode_le;
    use crate::dsp::TransformKind;
    use approx::assert_abs_diff_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn sine(freq_hz: f32, amplitude: f32, len: usize) -> Vec<i16> {
        (0..len)
            .map(|i| {
                let t = i as f32 / 44_100.0;
                (amplitude * 32767.0 * (2.0 * std::f32::consts::PI * freq_hz * t).sin()) as i16
            })
            .collect()
    }

    fn processor() -> FrameProcessor {
        FrameProcessor::new(&AnalyzerConfig::default())
    }

    #[test]
    fn transform_len_regimes() {
        assert_eq!(transform_len(0, 256, 1024), None);
        assert_eq!(transform_len(255, 256, 1024), None);
        assert_eq!(transform_len(256, 256, 1024), Some(256));
        assert_eq!(transform_len(511, 256, 1024), Some(256));
        assert_eq!(transform_len(512, 256, 1024), Some(512));
        assert_eq!(transform_len(600, 256, 1024), Some(512));
        assert_eq!(transform_len(1024, 256, 1024), Some(1024));
        assert_eq!(transform_len(8192, 256, 1024), Some(1024));
    }

    #[test]
    fn zero_minimum_length_never_selects_a_transform() {
        assert_eq!(transform_len(4096, 0, 1024), None);

        let unchecked = AnalyzerConfig {
            min_fft_len: 0,
            ..AnalyzerConfig::default()
        };
        let mut p = FrameProcessor::new(&unchecked);
        assert!(p.process_samples(&sine(1_000.0, 0.8, 1024)).is_none());
        assert_eq!(p.bands(), &[0.0; 8]);
    }

    #[test]
    fn short_input_keeps_previous_bands() {
        let mut p = processor();
        p.process_samples(&sine(1_000.0, 0.8, 1024)).expect("processed");
        let before = p.bands().to_vec();

        assert!(p.process_samples(&sine(1_000.0, 0.8, 255)).is_none());
        assert!(p.process_bytes(&[0u8; 511]).is_none());
        assert_eq!(p.bands(), before.as_slice());
    }

    #[test]
    fn one_khz_tone_dominates_lowest_band() {
        let mut p = processor();
        let bands = p
            .process_samples(&sine(1_000.0, 0.8, 1024))
            .expect("processed")
            .to_vec();
        // 1 kHz ≈ bin 23 of 1024; band 0 covers bins 1..64
        for far in 3..8 {
            assert!(bands[0] > bands[far], "bands={bands:?}");
        }
        assert!(bands[0] > 0.0);
    }

    #[test]
    fn high_tone_lands_in_upper_band() {
        let mut p = processor();
        // 20 kHz ≈ bin 464 → band 7
        let bands = p
            .process_samples(&sine(20_000.0, 0.8, 1024))
            .expect("processed")
            .to_vec();
        assert!(bands[7] > bands[0], "bands={bands:?}");
        assert!(bands[7] > bands[3], "bands={bands:?}");
    }

    #[test]
    fn silence_never_raises_bands() {
        let mut p = processor();
        let zeros = vec![0i16; 2048];
        for _ in 0..20 {
            let bands = p.process_samples(&zeros).expect("processed").to_vec();
            assert!(bands.iter().all(|&b| b == 0.0), "bands={bands:?}");
        }
    }

    #[test]
    fn silence_decays_previous_signal_monotonically() {
        let mut p = processor();
        p.process_samples(&sine(1_000.0, 0.9, 1024));
        let zeros = vec![0i16; 1024];
        let mut prev = p.bands().to_vec();
        for _ in 0..60 {
            let next = p.process_samples(&zeros).expect("processed").to_vec();
            for (n, o) in next.iter().zip(prev.iter()) {
                assert!(n <= o, "band rose from {o} to {n}");
            }
            prev = next;
        }
        assert!(prev.iter().all(|&b| b < 1e-6), "bands={prev:?}");
    }

    #[test]
    fn smoothing_law_holds_every_cycle() {
        let config = AnalyzerConfig::default();
        let mut smoothed = processor();
        // smoothing 0 exposes the fresh per-cycle value
        let mut raw = FrameProcessor::new(&AnalyzerConfig {
            smoothing: 0.0,
            ..config.clone()
        });

        let inputs = [
            sine(500.0, 0.5, 1024),
            sine(5_000.0, 0.9, 1024),
            vec![0i16; 1024],
            sine(12_000.0, 0.3, 1024),
        ];
        for input in &inputs {
            let prev = smoothed.bands().to_vec();
            let fresh = raw.process_samples(input).expect("processed").to_vec();
            let next = smoothed.process_samples(input).expect("processed");
            for ((n, p), f) in next.iter().zip(prev.iter()).zip(fresh.iter()) {
                assert_abs_diff_eq!(*n, 0.6 * p + 0.4 * f, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn bands_stay_in_unit_range_for_full_scale_and_noise() {
        let mut p = processor();
        for freq in [40.0, 440.0, 1_000.0, 5_512.5, 11_025.0, 21_000.0] {
            for _ in 0..5 {
                let bands = p.process_samples(&sine(freq, 1.0, 1024)).expect("processed");
                assert!(bands.iter().all(|b| (0.0..=1.0).contains(b)), "bands={bands:?}");
            }
        }

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10 {
            let noise: Vec<i16> = (0..4096).map(|_| rng.gen::<i16>()).collect();
            let bands = p.process_samples(&noise).expect("processed");
            assert!(bands.iter().all(|b| (0.0..=1.0).contains(b)), "bands={bands:?}");
        }

        let clipped = vec![i16::MIN; 1024];
        let bands = p.process_samples(&clipped).expect("processed");
        assert!(bands.iter().all(|b| (0.0..=1.0).contains(b)));
    }

    #[test]
    fn bytes_and_samples_paths_agree() {
        let samples = sine(2_000.0, 0.7, 600);
        let mut a = processor();
        let mut b = processor();
        let from_samples = a.process_samples(&samples).expect("processed").to_vec();
        let from_bytes = b.process_bytes(&encode_le(&samples)).expect("processed").to_vec();
        assert_eq!(from_samples, from_bytes);
    }

    #[test]
    fn backends_produce_matching_bands() {
        let config = AnalyzerConfig::default();
        let mut radix = FrameProcessor::with_transform(&config, TransformKind::Radix2.build());
        let mut planned = FrameProcessor::with_transform(&config, TransformKind::Planned.build());
        let input = sine(3_000.0, 0.6, 1024);
        let a = radix.process_samples(&input).expect("processed").to_vec();
        let b = planned.process_samples(&input).expect("processed").to_vec();
        for (x, y) in a.iter().zip(b.iter()) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-3);
        }
    }

    #[test]
    fn reset_zeroes_bands() {
        let mut p = processor();
        p.process_samples(&sine(1_000.0, 0.8, 1024));
        assert!(p.bands().iter().any(|&b| b > 0.0));
        p.reset();
        assert_eq!(p.bands(), &[0.0; 8]);
        assert_eq!(p.band_count(), 8);
    }
}
