//! Band aggregation, logarithmic scaling and temporal smoothing.
//!
//! ## Band layout
//!
//! ```text
//! bin:   0 | 1 … binSize-1 | binSize … 2·binSize-1 | … | len/2 … len-1
//!        DC|    band 0     |        band 1         | … |  mirror half
//! ```
//!
//! `binSize = (len / 2) / band_count`. DC and the mirror half never
//! contribute to any band.

use super::Complex32;

/// Sum of squared bin magnitudes for each band.
pub fn band_powers(spectrum: &[Complex32], band_count: usize) -> Vec<f32> {
    let half = spectrum.len() / 2;
    let bin_size = if band_count == 0 { 0 } else { half / band_count };

    (0..band_count)
        .map(|band| {
            let start = (band * bin_size).max(1);
            let end = ((band + 1) * bin_size).min(half);
            spectrum
                .get(start..end)
                .unwrap_or(&[])
                .iter()
                .map(|bin| {
                    let mag = bin.norm();
                    mag * mag
                })
                .sum()
        })
        .collect()
}

/// Map a band power to [0, 1]: `20·log10(power)` clamped to `[floor_db, 0]`,
/// then rescaled. Zero (or negative) power maps to 0.
pub fn normalized_level(power: f32, floor_db: f32) -> f32 {
    if power.is_nan() || power <= 0.0 {
        return 0.0;
    }
    let db = (20.0 * power.log10()).clamp(floor_db, 0.0);
    ((db - floor_db) / -floor_db).clamp(0.0, 1.0)
}

/// Exponential moving average: `prev = factor·prev + (1 − factor)·fresh`.
///
/// Results are clamped to [0, 1].
pub fn smooth_into(prev: &mut [f32], fresh: &[f32], factor: f32) {
    for (p, &f) in prev.iter_mut().zip(fresh) {
        *p = (*p * factor + f * (1.0 - factor)).clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn dc_and_mirror_half_are_excluded() {
        let mut spectrum = vec![Complex32::new(0.0, 0.0); 256];
        spectrum[0] = Complex32::new(100.0, 0.0);
        for bin in spectrum.iter_mut().skip(128) {
            *bin = Complex32::new(50.0, 50.0);
        }
        let powers = band_powers(&spectrum, 8);
        assert_eq!(powers.len(), 8);
        assert!(powers.iter().all(|&p| p == 0.0), "powers={powers:?}");
    }

    #[test]
    fn bins_land_in_expected_band() {
        // len 256 → half 128 → 16 bins per band
        let mut spectrum = vec![Complex32::new(0.0, 0.0); 256];
        spectrum[15] = Complex32::new(3.0, 4.0);
        spectrum[16] = Complex32::new(1.0, 0.0);
        spectrum[127] = Complex32::new(0.0, 2.0);
        let powers = band_powers(&spectrum, 8);
        assert_abs_diff_eq!(powers[0], 25.0, epsilon = 1e-4);
        assert_abs_diff_eq!(powers[1], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(powers[7], 4.0, epsilon = 1e-6);
    }

    #[test]
    fn level_scale_endpoints() {
        assert_eq!(normalized_level(0.0, -60.0), 0.0);
        assert_abs_diff_eq!(normalized_level(1.0, -60.0), 1.0);
        assert_abs_diff_eq!(normalized_level(1e6, -60.0), 1.0);
        // 20·log10(1e-3) = -60 dB → floor
        assert_abs_diff_eq!(normalized_level(1e-3, -60.0), 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(normalized_level(1e-9, -60.0), 0.0);
        // -30 dB sits halfway
        let mid = 10f32.powf(-1.5);
        assert_abs_diff_eq!(normalized_level(mid, -60.0), 0.5, epsilon = 1e-4);
    }

    #[test]
    fn level_rejects_nan() {
        assert_eq!(normalized_level(f32::NAN, -60.0), 0.0);
    }

    #[test]
    fn smoothing_follows_ema_law() {
        let mut prev = vec![0.0, 0.5, 1.0, 0.25];
        let fresh = [1.0, 0.5, 0.0, 0.75];
        let expected: Vec<f32> = prev
            .iter()
            .zip(fresh.iter())
            .map(|(p, f)| 0.6 * p + 0.4 * f)
            .collect();
        smooth_into(&mut prev, &fresh, 0.6);
        for (got, want) in prev.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*got, *want, epsilon = 1e-6);
        }
    }

    #[test]
    fn smoothing_never_leaves_unit_range() {
        let mut prev = vec![1.0; 8];
        for _ in 0..100 {
            smooth_into(&mut prev, &[1.0; 8], 0.6);
        }
        assert!(prev.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }
}
