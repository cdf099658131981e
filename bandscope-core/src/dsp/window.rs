//! Hann window and PCM → complex frame conversion.

use std::f32::consts::PI;

use super::Complex32;

/// Full-scale divisor for signed 16-bit PCM.
pub const I16_FULL_SCALE: f32 = 32768.0;

/// Hann coefficient `0.5 × (1 − cos(2πi / (len − 1)))`.
///
/// Symmetric form: both endpoints are zero. A length of 1 yields 1.0.
pub fn hann(i: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }
    0.5 * (1.0 - (2.0 * PI * i as f32 / (len - 1) as f32).cos())
}

/// Window the first `len` samples into a fresh complex buffer.
///
/// Each sample is scaled to [-1, 1) and multiplied by its Hann coefficient;
/// the imaginary part is zero.
pub fn windowed_frame(samples: &[i16], len: usize) -> Vec<Complex32> {
    samples
        .iter()
        .take(len)
        .enumerate()
        .map(|(i, &s)| Complex32::new(s as f32 * hann(i, len) / I16_FULL_SCALE, 0.0))
        .collect()
}
