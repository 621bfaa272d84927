//! Per-session accumulation of frame angles and rep samples.

use chrono::{DateTime, Utc};
use rehab_core::{mean, normalize_angle, round2, OptimalRange, RepSample, SessionResult};

use crate::deviation::DeviationScorer;

/// Share of sorted frame samples averaged for the low and high envelope
pub const ENVELOPE_FRACTION: f64 = 0.3;

/// Buffers every frame angle and rep sample of one session.
///
/// A session is bounded in duration, so the full frame history is kept and
/// summarized once at finalization.
#[derive(Debug, Clone, Default)]
pub struct SessionAggregator {
    frames: Vec<f64>,
    reps: Vec<RepSample>,
}

impl SessionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one frame angle, normalized into [0, 180)
    pub fn push_frame(&mut self, angle: f64) {
        self.frames.push(normalize_angle(angle));
    }

    pub fn push_rep(&mut self, sample: RepSample) {
        self.reps.push(sample);
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn reps(&self) -> &[RepSample] {
        &self.reps
    }

    /// Unrounded rep means in completion order
    pub fn rep_means(&self) -> Vec<f64> {
        self.reps.iter().map(|r| r.mean).collect()
    }

    /// Build the final record.
    ///
    /// `reps` is the state machine's closing-transition count, which may be
    /// one less than the number of rep samples when a trailing partial rep
    /// was folded in.
    pub fn finalize(
        &self,
        reps: u32,
        opt_range: Option<OptimalRange>,
        scorer: &DeviationScorer,
        timestamp: DateTime<Utc>,
    ) -> SessionResult {
        if self.frames.is_empty() && self.reps.is_empty() {
            return SessionResult {
                reps,
                ..SessionResult::empty(opt_range, timestamp)
            };
        }

        let (overall_avg, angle_min, angle_max) = match mean(&self.frames) {
            Some(avg) => (
                avg,
                self.frames.iter().copied().fold(f64::INFINITY, f64::min),
                self.frames.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            ),
            None => (0.0, 0.0, 0.0),
        };
        let (range_avg_low, range_avg_high) = range_average_low_high(&self.frames);

        let means = self.rep_means();
        let (rep_min, rep_max, rep_range) = if means.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            let lo = round2(means.iter().copied().fold(f64::INFINITY, f64::min));
            let hi = round2(means.iter().copied().fold(f64::NEG_INFINITY, f64::max));
            (lo, hi, round2(hi - lo))
        };

        SessionResult {
            reps,
            rep_averages: means.iter().map(|&m| round2(m)).collect(),
            overall_avg: round2(overall_avg),
            angle_min: round2(angle_min),
            angle_max: round2(angle_max),
            range_avg_low: round2(range_avg_low),
            range_avg_high: round2(range_avg_high),
            rep_min,
            rep_max,
            rep_range,
            opt_range,
            deviation_percent: scorer.score(&means, opt_range),
            timestamp,
        }
    }
}

/// Mean of the lowest and highest `max(1, ceil(0.3·n))` samples
pub fn range_average_low_high(samples: &[f64]) -> (f64, f64) {
    if samples.is_empty() {
        return (0.0, 0.0);
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let k = ((n as f64 * ENVELOPE_FRACTION).ceil() as usize).clamp(1, n);

    let low = mean(&sorted[..k]).unwrap_or(sorted[0]);
    let high = mean(&sorted[n - k..]).unwrap_or(sorted[n - 1]);
    (low, high)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rehab_core::Timestamp;

    fn rep(mean: f64) -> RepSample {
        RepSample {
            mean,
            frames: 1,
            closed_at: Some(Timestamp::from_nanos(0)),
        }
    }

    #[test]
    fn test_empty_session_is_all_zero() {
        let result = SessionAggregator::new().finalize(
            0,
            Some(OptimalRange::new(60.0, 180.0)),
            &DeviationScorer::default(),
            Utc::now(),
        );
        assert!(result.is_empty());
        assert_eq!(result.overall_avg, 0.0);
        assert_eq!(result.range_avg_high, 0.0);
        assert_eq!(result.deviation_percent, 0.0);
        assert_eq!(result.opt_range, Some(OptimalRange::new(60.0, 180.0)));
    }

    #[test]
    fn test_frame_statistics() {
        let mut agg = SessionAggregator::new();
        for angle in [10.0, 20.0, 30.0, 40.0, 50.0] {
            agg.push_frame(angle);
        }
        let result = agg.finalize(0, None, &DeviationScorer::default(), Utc::now());

        assert_eq!(result.overall_avg, 30.0);
        assert_eq!(result.angle_min, 10.0);
        assert_eq!(result.angle_max, 50.0);
        // k = ceil(1.5) = 2
        assert_eq!(result.range_avg_low, 15.0);
        assert_eq!(result.range_avg_high, 45.0);
        assert!(result.rep_averages.is_empty());
    }

    #[test]
    fn test_frames_are_normalized() {
        let mut agg = SessionAggregator::new();
        agg.push_frame(180.0);
        agg.push_frame(190.0);
        let result = agg.finalize(0, None, &DeviationScorer::default(), Utc::now());
        assert_eq!(result.angle_min, 0.0);
        assert_eq!(result.angle_max, 10.0);
    }

    #[test]
    fn test_rep_statistics_and_rounding() {
        let mut agg = SessionAggregator::new();
        agg.push_frame(90.0);
        agg.push_rep(rep(90.123));
        agg.push_rep(rep(100.456));
        let result = agg.finalize(
            2,
            Some(OptimalRange::new(60.0, 120.0)),
            &DeviationScorer::default(),
            Utc::now(),
        );

        assert_eq!(result.reps, 2);
        assert_eq!(result.rep_averages, vec![90.12, 100.46]);
        assert_eq!(result.rep_min, 90.12);
        assert_eq!(result.rep_max, 100.46);
        assert_eq!(result.rep_range, 10.34);
        // Scored from unrounded means: 10.333 / 60 * 100
        assert_eq!(result.deviation_percent, 17.22);
    }

    #[test]
    fn test_range_average_single_sample() {
        assert_eq!(range_average_low_high(&[42.0]), (42.0, 42.0));
        assert_eq!(range_average_low_high(&[]), (0.0, 0.0));
    }
}
