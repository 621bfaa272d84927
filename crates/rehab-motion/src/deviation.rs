//! Form-consistency scoring over per-rep mean angles.

use rehab_core::{clamp_degrees, percentile, round2, OptimalRange};
use serde::{Deserialize, Serialize};

/// Scores how far and how inconsistently rep means sit relative to a band.
///
/// The score lies in `[0, cap]`; 0 means every rep sat at the same angle
/// inside the band. The scorer is total: any input yields a bounded number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviationScorer {
    pub cap: f64,
}

impl Default for DeviationScorer {
    fn default() -> Self {
        Self { cap: 200.0 }
    }
}

impl DeviationScorer {
    pub fn new(cap: f64) -> Self {
        Self { cap: cap.max(0.0) }
    }

    /// Score unrounded rep means against `optimal` (absent means the full 0-180 band)
    pub fn score(&self, rep_means: &[f64], optimal: Option<OptimalRange>) -> f64 {
        if rep_means.is_empty() {
            return 0.0;
        }

        let reps: Vec<f64> = rep_means.iter().map(|&r| clamp_degrees(r)).collect();
        let n = reps.len();
        let rep_min = reps.iter().copied().fold(f64::INFINITY, f64::min);
        let rep_max = reps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let rep_range = rep_max - rep_min;

        let band = optimal.unwrap_or(OptimalRange::FULL).band();

        let inliers = reps
            .iter()
            .filter(|&&r| band.min <= r && r <= band.max)
            .count();
        let inlier_frac = inliers as f64 / n as f64;

        // Entirely on one side of the band: pure wrong-range score
        let distance = if rep_max < band.min {
            band.min - rep_max
        } else if rep_min > band.max {
            rep_min - band.max
        } else {
            0.0
        };
        if distance > 0.0 {
            return self.bounded(distance / band.width * 100.0);
        }

        let spread = Self::spread(&reps, rep_range);
        let mut deviation = spread / band.width * 100.0 * (1.0 + (1.0 - inlier_frac));

        if rep_range > band.width {
            let extra = (rep_range - band.width) / band.width * 100.0;
            deviation = deviation.max(extra);
        }

        self.bounded(deviation)
    }

    fn spread(reps: &[f64], rep_range: f64) -> f64 {
        let mut sorted = reps.to_vec();
        sorted.sort_by(f64::total_cmp);

        match sorted.len() {
            1 => 0.0,
            2 => rep_range,
            n @ 3 => {
                let central = sorted[n - 2] - sorted[1];
                if central > 0.0 {
                    central
                } else {
                    rep_range
                }
            }
            _ => {
                let iqr = percentile(&sorted, 75.0) - percentile(&sorted, 25.0);
                if iqr > 0.0 {
                    iqr
                } else {
                    0.01_f64.min(rep_range)
                }
            }
        }
    }

    fn bounded(&self, deviation: f64) -> f64 {
        if !deviation.is_finite() {
            return round2(self.cap);
        }
        round2(deviation.clamp(0.0, self.cap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn band(min: f64, max: f64) -> Option<OptimalRange> {
        Some(OptimalRange::new(min, max))
    }

    #[test]
    fn test_perfect_in_band() {
        let scorer = DeviationScorer::default();
        assert_eq!(scorer.score(&[90.0; 6], band(60.0, 120.0)), 0.0);
        assert_eq!(scorer.score(&[90.0], band(60.0, 120.0)), 0.0);
    }

    #[test]
    fn test_entirely_below_band() {
        let scorer = DeviationScorer::default();
        assert_eq!(scorer.score(&[10.0, 10.0, 10.0], band(60.0, 120.0)), 83.33);
    }

    #[test]
    fn test_entirely_above_band_is_capped() {
        let scorer = DeviationScorer::default();
        // (170 - 20) / 10 * 100 = 1500
        assert_eq!(scorer.score(&[170.0, 175.0], band(10.0, 20.0)), 200.0);
        assert_eq!(DeviationScorer::new(50.0).score(&[170.0], band(10.0, 20.0)), 50.0);
    }

    #[test]
    fn test_single_outlier_uses_range_term() {
        let scorer = DeviationScorer::default();
        // IQR term is 2/60 * 100 * 1.2 = 4.0, the range term (80 - 60)/60 dominates
        let score = scorer.score(&[90.0, 91.0, 90.0, 92.0, 170.0], band(60.0, 120.0));
        assert_eq!(score, 33.33);
    }

    #[test]
    fn test_two_reps_use_range() {
        let scorer = DeviationScorer::default();
        assert_eq!(scorer.score(&[80.0, 100.0], band(60.0, 120.0)), 33.33);
    }

    #[test]
    fn test_three_reps_fall_back_to_range() {
        let scorer = DeviationScorer::default();
        // Central gap of three values is zero, so the full range (30) is used
        assert_eq!(scorer.score(&[70.0, 85.0, 100.0], band(60.0, 120.0)), 50.0);
    }

    #[test]
    fn test_flat_iqr_floor() {
        let scorer = DeviationScorer::default();
        let score = scorer.score(&[90.0, 90.0, 90.0, 90.0, 95.0], band(60.0, 120.0));
        // min(0.01, 5) / 60 * 100
        assert_eq!(score, 0.02);
    }

    #[test]
    fn test_absent_band_is_full_range() {
        let scorer = DeviationScorer::default();
        assert_eq!(
            scorer.score(&[80.0, 100.0], None),
            scorer.score(&[80.0, 100.0], band(0.0, 180.0))
        );
    }

    #[test]
    fn test_degenerate_band_stays_bounded() {
        let scorer = DeviationScorer::default();
        let score = scorer.score(&[90.0, 95.0, 100.0, 105.0], band(120.0, 60.0));
        assert!((0.0..=200.0).contains(&score));
        assert!(scorer.score(&[f64::NAN, 90.0], band(60.0, 120.0)).is_finite());
    }

    #[test]
    fn test_empty_reps() {
        assert_eq!(DeviationScorer::default().score(&[], band(60.0, 120.0)), 0.0);
    }

    proptest! {
        #[test]
        fn prop_score_within_cap(
            reps in proptest::collection::vec(-400.0f64..400.0, 0..12),
            lo in 0.0f64..180.0,
            hi in 0.0f64..180.0,
        ) {
            let scorer = DeviationScorer::default();
            let score = scorer.score(&reps, band(lo, hi));
            prop_assert!((0.0..=scorer.cap).contains(&score));
        }
    }
}
