//! Forward FFT backends.
//!
//! ## Radix-2 algorithm
//!
//! ```text
//! 1. Permute the input into bit-reversed index order.
//! 2. For stage length L = 2, 4, … N:
//!      for each block of L, butterfly (k, k + L/2) with twiddle exp(-2πik/L)
//! ```
//!
//! This is the decimation-in-time recursion (even/odd split, combine with
//! `exp(-2πik/N)`) unrolled bottom-up, so output ordering and values match the
//! recursive form.

use std::f32::consts::PI;

use rustfft::FftPlanner;

use super::{Complex32, Transform};

/// Iterative in-place radix-2 FFT.
///
/// Twiddles for the most recent length are cached; a stage of length `L`
/// reads every `N / L`-th entry of the length-`N` table.
#[derive(Debug, Default)]
pub struct Radix2 {
    twiddles: Vec<Complex32>,
    twiddle_len: usize,
}

impl Radix2 {
    pub fn new() -> Self {
        Self::default()
    }

    fn prepare_twiddles(&mut self, n: usize) {
        if self.twiddle_len == n {
            return;
        }
        self.twiddles.clear();
        self.twiddles.extend((0..n / 2).map(|k| {
            let angle = -2.0 * PI * k as f32 / n as f32;
            Complex32::from_polar(1.0, angle)
        }));
        self.twiddle_len = n;
    }
}

impl Transform for Radix2 {
    fn process(&mut self, buffer: &mut [Complex32]) {
        let n = buffer.len();
        if n <= 1 {
            return;
        }
        debug_assert!(n.is_power_of_two(), "transform length {n} is not a power of two");

        bit_reverse_permute(buffer);
        self.prepare_twiddles(n);

        let mut len = 2;
        while len <= n {
            let half = len / 2;
            let stride = n / len;
            for block in buffer.chunks_exact_mut(len) {
                let (lo, hi) = block.split_at_mut(half);
                for (k, (even, odd)) in lo.iter_mut().zip(hi.iter_mut()).enumerate() {
                    let t = self.twiddles[k * stride] * *odd;
                    *odd = *even - t;
                    *even += t;
                }
            }
            len <<= 1;
        }
    }

    fn name(&self) -> &'static str {
        "radix2"
    }
}

fn bit_reverse_permute(data: &mut [Complex32]) {
    let n = data.len();
    let mut j = 0;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j ^= bit;
        if i < j {
            data.swap(i, j);
        }
    }
}

/// `rustfft`-backed transform. The planner caches plans per length.
pub struct PlannedFft {
    planner: FftPlanner<f32>,
}

impl PlannedFft {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
        }
    }
}

impl Default for PlannedFft {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PlannedFft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlannedFft").finish_non_exhaustive()
    }
}

impl Transform for PlannedFft {
    fn process(&mut self, buffer: &mut [Complex32]) {
        if buffer.len() <= 1 {
            return;
        }
        debug_assert!(buffer.len().is_power_of_two());
        self.planner.plan_fft_forward(buffer.len()).process(buffer);
    }

    fn name(&self) -> &'static str {
        "rustfft"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn naive_dft(input: &[Complex32]) -> Vec<Complex32> {
        let n = input.len();
        (0..n)
            .map(|k| {
                input
                    .iter()
                    .enumerate()
                    .fold(Complex32::new(0.0, 0.0), |acc, (t, x)| {
                        let angle = -2.0 * std::f64::consts::PI * (k * t) as f64 / n as f64;
                        acc + x * Complex32::from_polar(1.0, angle as f32)
                    })
            })
            .collect()
    }

    fn ramp(n: usize) -> Vec<Complex32> {
        (0..n)
            .map(|i| Complex32::new(((i * 7) % 13) as f32 / 13.0 - 0.5, 0.0))
            .collect()
    }

    #[test]
    fn trivial_lengths_are_unchanged() {
        let mut fft = Radix2::new();
        let mut empty: Vec<Complex32> = vec![];
        fft.process(&mut empty);
        assert!(empty.is_empty());

        let mut one = vec![Complex32::new(3.5, -1.0)];
        fft.process(&mut one);
        assert_eq!(one, vec![Complex32::new(3.5, -1.0)]);
    }

    #[test]
    fn impulse_has_flat_spectrum() {
        let mut data = vec![Complex32::new(0.0, 0.0); 16];
        data[0] = Complex32::new(1.0, 0.0);
        Radix2::new().process(&mut data);
        for bin in data {
            assert_abs_diff_eq!(bin.re, 1.0, epsilon = 1e-6);
            assert_abs_diff_eq!(bin.im, 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn dc_bin_equals_sum_for_all_power_of_two_lengths() {
        let mut fft = Radix2::new();
        for shift in 0..=11 {
            let n = 1usize << shift;
            let mut data = ramp(n);
            let sum: f32 = data.iter().map(|c| c.re).sum();
            fft.process(&mut data);
            assert_eq!(data.len(), n);
            assert_abs_diff_eq!(data[0].re, sum, epsilon = 1e-3);
            assert_abs_diff_eq!(data[0].im, 0.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn matches_naive_dft() {
        let input = ramp(64);
        let expected = naive_dft(&input);
        let mut data = input.clone();
        Radix2::new().process(&mut data);
        for (got, want) in data.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(got.re, want.re, epsilon = 1e-3);
            assert_abs_diff_eq!(got.im, want.im, epsilon = 1e-3);
        }
    }

    #[test]
    fn agrees_with_planned_backend_across_lengths() {
        let mut radix = Radix2::new();
        let mut planned = PlannedFft::new();
        for n in [2, 8, 256, 512, 1024] {
            let input: Vec<Complex32> = (0..n)
                .map(|i| {
                    let t = i as f32 / n as f32;
                    Complex32::new((2.0 * PI * 5.0 * t).sin() + 0.25 * (2.0 * PI * 31.0 * t).cos(), 0.0)
                })
                .collect();
            let mut a = input.clone();
            let mut b = input;
            radix.process(&mut a);
            planned.process(&mut b);
            for (x, y) in a.iter().zip(b.iter()) {
                assert_abs_diff_eq!(x.re, y.re, epsilon = 1e-2);
                assert_abs_diff_eq!(x.im, y.im, epsilon = 1e-2);
            }
        }
    }

    #[test]
    fn twiddle_cache_follows_length_changes() {
        let mut fft = Radix2::new();
        let mut big = ramp(1024);
        fft.process(&mut big);
        let mut small = ramp(8);
        let expected = naive_dft(&small);
        fft.process(&mut small);
        for (got, want) in small.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(got.re, want.re, epsilon = 1e-4);
            assert_abs_diff_eq!(got.im, want.im, epsilon = 1e-4);
        }
    }
}
