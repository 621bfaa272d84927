//! Synchronous per-frame driver for one exercise session.
//!
//! Combines angle extraction, the repetition state machine, aggregation and
//! live form feedback. The async session loop feeds it frames; it never
//! blocks and never fails on a bad frame.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rehab_core::{
    normalize_angle, AngleUnavailable, ExerciseKind, Joint, OptimalRange, PoseFrame, RepSample,
    SessionResult, Timestamp,
};
use serde::{Deserialize, Serialize};

use crate::aggregator::SessionAggregator;
use crate::deviation::DeviationScorer;
use crate::feedback::FormFeedback;
use crate::repetition::{Phase, RepStateMachine};

/// Tracker tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Seconds after the first frame during which frames are not scored
    pub countdown_secs: f64,
    /// Minimum seconds between two counted reps
    pub cooldown_secs: f64,
    /// Landmarks less visible than this count as missing
    pub min_visibility: f64,
    pub deviation_cap: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 3.0,
            cooldown_secs: 0.4,
            min_visibility: 0.0,
            deviation_cap: 200.0,
        }
    }
}

/// What a frame contributed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameSample {
    /// Still counting down; the frame was observed but not scored
    Countdown { remaining_secs: f64 },
    /// Tracked-joint angle, normalized
    Angle(f64),
    /// No angle could be computed for this frame
    Skipped(AngleUnavailable),
}

/// Per-frame progress report
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUpdate {
    pub timestamp: Timestamp,
    /// Seconds since the first frame of the session
    pub elapsed_secs: f64,
    pub sample: FrameSample,
    pub phase: Phase,
    pub reps: u32,
    pub closed_rep: Option<RepSample>,
    pub feedback: Option<FormFeedback>,
}

/// Running totals for one tracker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerStats {
    pub frames_seen: usize,
    pub frames_scored: usize,
    pub frames_skipped: usize,
}

pub struct ExerciseTracker {
    kind: ExerciseKind,
    optimal_range: Option<OptimalRange>,
    config: TrackerConfig,
    machine: RepStateMachine,
    aggregator: SessionAggregator,
    scorer: DeviationScorer,
    started_at: Option<Timestamp>,
    stats: TrackerStats,
}

impl ExerciseTracker {
    pub fn new(
        kind: ExerciseKind,
        optimal_range: Option<OptimalRange>,
        config: TrackerConfig,
    ) -> Self {
        let cooldown =
            Duration::try_from_secs_f64(config.cooldown_secs.max(0.0)).unwrap_or(Duration::MAX);
        Self {
            machine: RepStateMachine::new(&kind).with_cooldown(cooldown),
            aggregator: SessionAggregator::new(),
            scorer: DeviationScorer::new(config.deviation_cap),
            kind,
            optimal_range,
            config,
            started_at: None,
            stats: TrackerStats::default(),
        }
    }

    pub fn kind(&self) -> &ExerciseKind {
        &self.kind
    }

    pub fn tracked_joint(&self) -> Joint {
        self.kind.tracked_joint()
    }

    pub fn optimal_range(&self) -> Option<OptimalRange> {
        self.optimal_range
    }

    pub fn reps(&self) -> u32 {
        self.machine.reps()
    }

    pub fn phase(&self) -> Phase {
        self.machine.phase()
    }

    pub fn stats(&self) -> TrackerStats {
        self.stats
    }

    /// Feed one frame
    pub fn process(&mut self, frame: &PoseFrame) -> FrameUpdate {
        let started_at = *self.started_at.get_or_insert(frame.timestamp);
        let elapsed_secs = frame.timestamp.seconds_since(started_at);
        self.stats.frames_seen += 1;

        let mut closed_rep = None;
        let mut feedback = None;

        let sample = if elapsed_secs < self.config.countdown_secs {
            FrameSample::Countdown {
                remaining_secs: self.config.countdown_secs - elapsed_secs,
            }
        } else {
            match self
                .tracked_joint()
                .triple()
                .angle_in(frame, self.config.min_visibility)
            {
                Ok(angle) => {
                    let update = self.machine.update(angle, frame.timestamp);
                    if let Some(rep) = update.sample {
                        self.aggregator.push_rep(rep);
                        closed_rep = Some(rep);
                    }
                    self.aggregator.push_frame(angle);
                    self.stats.frames_scored += 1;

                    let normalized = normalize_angle(angle);
                    feedback = self
                        .feedback_band()
                        .and_then(|band| FormFeedback::assess(normalized, band));
                    FrameSample::Angle(normalized)
                }
                Err(cause) => {
                    self.stats.frames_skipped += 1;
                    tracing::trace!(joint = %self.tracked_joint(), %cause, "frame skipped");
                    FrameSample::Skipped(cause)
                }
            }
        };

        FrameUpdate {
            timestamp: frame.timestamp,
            elapsed_secs,
            sample,
            phase: self.machine.phase(),
            reps: self.machine.reps(),
            closed_rep,
            feedback,
        }
    }

    /// Band used for live cues: the optimal range, else the custom primary limit
    fn feedback_band(&self) -> Option<OptimalRange> {
        self.optimal_range
            .filter(OptimalRange::is_valid)
            .or_else(|| {
                self.kind
                    .primary_limit()
                    .map(|limit| limit.as_band())
                    .filter(OptimalRange::is_valid)
            })
    }

    /// Close the session now
    pub fn finish(self) -> SessionResult {
        self.finish_at(Utc::now())
    }

    /// Fold the trailing partial rep and build the final record
    pub fn finish_at(mut self, timestamp: DateTime<Utc>) -> SessionResult {
        if let Some(trailing) = self.machine.finish() {
            self.aggregator.push_rep(trailing);
        }
        self.aggregator.finalize(
            self.machine.reps(),
            self.optimal_range,
            &self.scorer,
            timestamp,
        )
    }
}
