//! RMS-to-meter loudness mapping.
//!
//! A block's RMS amplitude is converted to dBFS and the window
//! `[floor_db, 0 dB]` is mapped linearly onto `[0.0, 1.0]` for direct use as
//! a bar-fill fraction. Not a standard loudness unit.

use serde::{Deserialize, Serialize};

pub const DEFAULT_FLOOR_DB: f32 = -60.0;
pub const DEFAULT_EPSILON: f32 = 1e-4;

/// dB window used to normalize RMS levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoudnessScale {
    /// Level that maps to 0.0 (default: -60 dB).
    pub floor_db: f32,
    /// Added to the RMS before the logarithm so silence stays finite.
    pub epsilon: f32,
}

impl LoudnessScale {
    /// Loudness of one channel's samples, clamped to `[0.0, 1.0]`.
    ///
    /// Empty input yields exactly 0.0.
    pub fn level(&self, samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let db = 20.0 * (rms(samples) + self.epsilon).log10();
        self.db_to_unit(db)
    }

    /// Map a dB value onto the unit interval. NaN maps to 0.0.
    pub fn db_to_unit(&self, db: f32) -> f32 {
        let normalized = (db - self.floor_db) / -self.floor_db;
        if normalized.is_nan() {
            return 0.0;
        }
        normalized.clamp(0.0, 1.0)
    }
}

impl Default for LoudnessScale {
    fn default() -> Self {
        Self {
            floor_db: DEFAULT_FLOOR_DB,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

/// Loudness with the default -60 dB window.
pub fn loudness(samples: &[f32]) -> f32 {
    LoudnessScale::default().level(samples)
}

/// Root-mean-square amplitude. Empty input yields 0.0.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn empty_is_zero() {
        assert_eq!(loudness(&[]), 0.0);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn silence_is_zero() {
        assert_eq!(loudness(&[0.0; 480]), 0.0);
        assert_eq!(loudness(&[0.0]), 0.0);
    }

    #[test]
    fn full_scale_clamps_to_one() {
        assert_eq!(loudness(&[1.0]), 1.0);
        assert_eq!(loudness(&[1.0; 64]), 1.0);
        assert_eq!(loudness(&[-1.0, 1.0, -1.0, 1.0]), 1.0);
    }

    #[test]
    fn extreme_amplitudes_stay_in_range() {
        assert_eq!(loudness(&[1000.0; 16]), 1.0);
        assert_eq!(loudness(&[-1000.0, 1000.0]), 1.0);
        assert_eq!(loudness(&[f32::MAX, f32::MAX]), 1.0);
        assert_eq!(loudness(&[1e-9; 8]), 0.0);
    }

    #[test]
    fn non_finite_input_does_not_escape_range() {
        assert_eq!(loudness(&[f32::NAN, 0.5]), 0.0);
        assert_eq!(loudness(&[f32::INFINITY]), 1.0);
    }

    #[test]
    fn minus_twenty_db_maps_to_two_thirds() {
        // RMS of a constant 0.1 is 0.1, i.e. about -20 dB.
        let level = loudness(&[0.1; 100]);
        assert_relative_eq!(level, (-20.0 + 60.0) / 60.0, epsilon = 1e-3);
    }

    #[test]
    fn rms_of_square_wave() {
        assert_relative_eq!(rms(&[0.5, -0.5, 0.5, -0.5]), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn monotonic_in_amplitude() {
        let base: Vec<f32> = (0..256).map(|i| ((i as f32) * 0.37).sin() * 0.8).collect();

        let mut previous = 0.0;
        for step in 0..=20 {
            let gain = step as f32 / 20.0;
            let scaled: Vec<f32> = base.iter().map(|s| s * gain).collect();
            let level = loudness(&scaled);
            assert!(level >= previous, "gain {gain}: {level} < {previous}");
            assert!((0.0..=1.0).contains(&level));
            previous = level;
        }
    }

    #[test]
    fn monotonic_per_sample_dominance() {
        let a = [0.01, -0.2, 0.05, 0.0, -0.3];
        let b = [0.02, -0.2, 0.5, -0.1, 0.3];
        assert!(loudness(&a) <= loudness(&b));
    }

    #[test]
    fn custom_floor_widens_window() {
        let wide = LoudnessScale {
            floor_db: -90.0,
            ..Default::default()
        };
        // RMS + epsilon of 0.001 is -60 dB: the bottom of the default window,
        // a third of the way up a 90 dB one.
        let samples = [0.0009; 32];
        assert!(loudness(&samples) < 0.01);
        assert_relative_eq!(wide.level(&samples), 30.0 / 90.0, epsilon = 0.01);
    }

    #[test]
    fn db_to_unit_clamps() {
        let scale = LoudnessScale::default();
        assert_eq!(scale.db_to_unit(-120.0), 0.0);
        assert_eq!(scale.db_to_unit(6.0), 1.0);
        assert_relative_eq!(scale.db_to_unit(-30.0), 0.5);
        assert_eq!(scale.db_to_unit(f32::NAN), 0.0);
    }
}
