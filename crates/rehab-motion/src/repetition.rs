//! Hysteresis state machine turning a joint-angle signal into repetitions.
//!
//! ## Modes
//!
//! - **Limit-driven** (custom exercises): thresholds sit 5° inside the
//!   calibrated joint limit. UP above `max - 5`, DOWN below `min + 5`; the
//!   UP → DOWN transition closes a rep.
//! - **Fixed** (built-in exercises): a static per-exercise threshold table
//!   (see [`Hysteresis`]).
//!
//! In both modes a closing transition only counts once the cooldown has
//! elapsed since the previous close, rejecting double counts from a
//! momentary dip or spike.

use std::time::Duration;

use rehab_core::{
    mean, normalize_angle, ExerciseKind, Hysteresis, JointLimit, RepSample, Timestamp,
};
use serde::{Deserialize, Serialize};

/// Distance inside a joint limit at which the phase flips (degrees)
pub const LIMIT_MARGIN_DEGREES: f64 = 5.0;

/// Minimum time between two counted reps
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// No angle observed yet
    Unset,
    Down,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    LimitDriven(JointLimit),
    Fixed(Hysteresis),
}

/// Outcome of feeding one angle to the state machine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepUpdate {
    pub phase: Phase,
    /// A closing transition was counted on this frame
    pub rep_counted: bool,
    /// Mean of the closed rep, absent when the rep had no buffered samples
    pub sample: Option<RepSample>,
}

/// Per-session repetition state machine
#[derive(Debug, Clone)]
pub struct RepStateMachine {
    mode: Mode,
    cooldown_secs: f64,
    phase: Phase,
    last_close: Option<Timestamp>,
    buffer: Vec<f64>,
    reps: u32,
}

impl RepStateMachine {
    pub fn new(kind: &ExerciseKind) -> Self {
        match kind {
            ExerciseKind::BuiltIn { hysteresis, .. } => Self::fixed(*hysteresis),
            ExerciseKind::Custom { .. } => match kind.primary_limit() {
                Some(limit) => Self::limit_driven(limit),
                // Custom kinds are built with a primary limit; fall back to the full range
                None => Self::limit_driven(JointLimit::new(0.0, 180.0)),
            },
        }
    }

    pub fn limit_driven(limit: JointLimit) -> Self {
        Self::with_mode(Mode::LimitDriven(limit))
    }

    pub fn fixed(hysteresis: Hysteresis) -> Self {
        Self::with_mode(Mode::Fixed(hysteresis))
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            cooldown_secs: DEFAULT_COOLDOWN.as_secs_f64(),
            phase: Phase::Unset,
            last_close: None,
            buffer: Vec::new(),
            reps: 0,
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown_secs = cooldown.as_secs_f64();
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Reps counted by closing transitions
    pub fn reps(&self) -> u32 {
        self.reps
    }

    /// Samples buffered toward the rep in progress
    pub fn pending_samples(&self) -> usize {
        self.buffer.len()
    }

    /// Feed the angle observed at `at`.
    ///
    /// Transitions are evaluated before the sample is buffered, so the
    /// closing frame's sample opens the next rep.
    pub fn update(&mut self, angle: f64, at: Timestamp) -> RepUpdate {
        let since = *self.last_close.get_or_insert(at);
        let cooled = at.seconds_since(since) > self.cooldown_secs;

        let closing = match self.mode {
            Mode::LimitDriven(limit) => self.step_limit_driven(limit, angle, cooled),
            Mode::Fixed(hysteresis) => self.step_fixed(hysteresis, angle, cooled),
        };

        let sample = if closing { self.close(at) } else { None };
        self.buffer.push(normalize_angle(angle));

        RepUpdate {
            phase: self.phase,
            rep_counted: closing,
            sample,
        }
    }

    /// Fold any buffered samples into a final rep ended by the stream.
    ///
    /// The rep counter is not incremented.
    pub fn finish(&mut self) -> Option<RepSample> {
        let frames = self.buffer.len();
        let sample = mean(&self.buffer).map(|mean| RepSample {
            mean,
            frames,
            closed_at: None,
        });
        self.buffer.clear();
        sample
    }

    fn step_limit_driven(&mut self, limit: JointLimit, angle: f64, cooled: bool) -> bool {
        let mut closing = false;

        if angle > limit.max() - LIMIT_MARGIN_DEGREES && self.phase == Phase::Down {
            self.phase = Phase::Up;
        }

        if angle < limit.min() + LIMIT_MARGIN_DEGREES && self.phase == Phase::Up {
            // Suppressed closes still complete the descent
            closing = cooled;
            self.phase = Phase::Down;
        }

        if self.phase == Phase::Unset {
            self.phase = if angle > limit.midpoint() {
                Phase::Up
            } else {
                Phase::Down
            };
        }

        closing
    }

    fn step_fixed(&mut self, hysteresis: Hysteresis, angle: f64, cooled: bool) -> bool {
        match hysteresis {
            Hysteresis::ThreePhase {
                arm_above,
                descend_below,
                close_above,
            } => {
                // Arming runs first: a jump from DOWN past `arm_above` re-arms without closing
                if angle > arm_above {
                    self.phase = Phase::Up;
                }
                if angle < descend_below && self.phase == Phase::Up {
                    self.phase = Phase::Down;
                }
                if self.phase == Phase::Down && angle > close_above && cooled {
                    self.phase = Phase::Up;
                    return true;
                }
                false
            }
            Hysteresis::TwoPhase { reset, close } => {
                if reset.crossed(angle) {
                    self.phase = Phase::Down;
                }
                if self.phase == Phase::Down && close.crossed(angle) && cooled {
                    self.phase = Phase::Up;
                    return true;
                }
                false
            }
        }
    }

    fn close(&mut self, at: Timestamp) -> Option<RepSample> {
        self.reps += 1;
        self.last_close = Some(at);

        let frames = self.buffer.len();
        let sample = mean(&self.buffer).map(|mean| RepSample {
            mean,
            frames,
            closed_at: Some(at),
        });
        self.buffer.clear();

        tracing::debug!(reps = self.reps, frames, mean = ?sample.map(|s| s.mean), "rep closed");
        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rehab_core::BuiltInExercise;

    fn feed(machine: &mut RepStateMachine, samples: &[(f64, f64)]) -> Vec<RepUpdate> {
        samples
            .iter()
            .map(|&(secs, angle)| machine.update(angle, Timestamp::from_secs_f64(secs)))
            .collect()
    }

    fn squat() -> RepStateMachine {
        RepStateMachine::new(&ExerciseKind::built_in(BuiltInExercise::Squat))
    }

    #[test]
    fn test_squat_single_rep() {
        let mut machine = squat();
        let updates = feed(
            &mut machine,
            &[(0.0, 165.0), (0.5, 120.0), (1.0, 90.0), (1.5, 145.0)],
        );

        assert_eq!(machine.reps(), 1);
        let closed: Vec<_> = updates.iter().filter(|u| u.rep_counted).collect();
        assert_eq!(closed.len(), 1);

        let sample = closed[0].sample.unwrap();
        assert!((sample.mean - (165.0 + 120.0 + 90.0) / 3.0).abs() < 1e-9);
        assert_eq!(sample.frames, 3);
        assert_eq!(sample.closed_at, Some(Timestamp::from_secs_f64(1.5)));
        assert_eq!(machine.phase(), Phase::Up);
        // The closing frame's sample belongs to the next rep
        assert_eq!(machine.pending_samples(), 1);
    }

    #[test]
    fn test_squat_phases() {
        let mut machine = squat();
        let phases: Vec<Phase> = feed(
            &mut machine,
            &[(0.0, 120.0), (0.5, 165.0), (1.0, 90.0), (1.5, 145.0)],
        )
        .iter()
        .map(|u| u.phase)
        .collect();
        assert_eq!(phases, vec![Phase::Unset, Phase::Up, Phase::Down, Phase::Up]);
    }

    #[test]
    fn test_cooldown_suppresses_double_count() {
        let mut machine = squat();
        feed(
            &mut machine,
            &[
                (0.0, 165.0),
                (0.5, 90.0),
                (1.0, 145.0), // counted
                (1.1, 90.0),
                (1.2, 145.0), // within 0.4s of the previous close
                (1.3, 165.0),
            ],
        );
        assert_eq!(machine.reps(), 1);
    }

    #[test]
    fn test_first_rep_respects_cooldown_from_start() {
        let mut machine = squat();
        feed(&mut machine, &[(0.0, 165.0), (0.1, 90.0), (0.2, 145.0)]);
        assert_eq!(machine.reps(), 0);
    }

    #[test]
    fn test_custom_cooldown() {
        let mut machine = squat().with_cooldown(Duration::from_millis(50));
        feed(&mut machine, &[(0.0, 165.0), (0.1, 90.0), (0.2, 145.0)]);
        assert_eq!(machine.reps(), 1);
    }

    #[test]
    fn test_jump_past_arm_threshold_rearms_without_counting() {
        let mut pushup = RepStateMachine::new(&ExerciseKind::built_in(BuiltInExercise::Pushup));
        let updates = feed(&mut pushup, &[(0.0, 160.0), (0.5, 80.0), (1.0, 155.0)]);
        assert_eq!(pushup.reps(), 0);
        assert!(!updates[2].rep_counted);
        assert_eq!(pushup.phase(), Phase::Up);

        let mut machine = squat();
        feed(&mut machine, &[(0.0, 165.0), (0.5, 90.0), (1.0, 170.0)]);
        assert_eq!(machine.reps(), 0);
        assert_eq!(machine.phase(), Phase::Up);
    }

    #[test]
    fn test_pushup_counts_between_close_and_arm_thresholds() {
        let mut pushup = RepStateMachine::new(&ExerciseKind::built_in(BuiltInExercise::Pushup));
        let updates = feed(
            &mut pushup,
            &[(0.0, 155.0), (0.5, 85.0), (1.0, 145.0), (1.5, 85.0), (2.0, 148.0)],
        );
        assert_eq!(pushup.reps(), 2);
        assert!(updates[2].rep_counted && updates[4].rep_counted);
    }

    #[test]
    fn test_curl_two_phase() {
        let mut machine = RepStateMachine::new(&ExerciseKind::built_in(BuiltInExercise::Curl));
        feed(
            &mut machine,
            &[(0.0, 160.0), (0.5, 100.0), (1.0, 50.0), (1.5, 155.0), (2.0, 45.0)],
        );
        assert_eq!(machine.reps(), 2);
        assert_eq!(machine.phase(), Phase::Up);
    }

    #[test]
    fn test_raise_two_phase() {
        let mut machine = RepStateMachine::new(&ExerciseKind::built_in(BuiltInExercise::Raise));
        let updates = feed(&mut machine, &[(0.0, 20.0), (0.5, 50.0), (1.0, 80.0)]);
        assert!(updates[2].rep_counted);
        let sample = updates[2].sample.unwrap();
        assert!((sample.mean - 35.0).abs() < 1e-9);
    }

    #[test]
    fn test_limit_driven_initial_phase_avoids_spurious_rep() {
        let limit = JointLimit::new(40.0, 160.0);

        let mut low_start = RepStateMachine::limit_driven(limit);
        let update = low_start.update(42.0, Timestamp::from_secs_f64(0.0));
        assert_eq!(update.phase, Phase::Down);
        assert!(!update.rep_counted);

        let mut high_start = RepStateMachine::limit_driven(limit);
        let update = high_start.update(150.0, Timestamp::from_secs_f64(0.0));
        assert_eq!(update.phase, Phase::Up);
        assert_eq!(high_start.reps(), 0);
    }

    #[test]
    fn test_limit_driven_counts_descents() {
        let mut machine = RepStateMachine::limit_driven(JointLimit::new(40.0, 160.0));
        feed(
            &mut machine,
            &[
                (0.0, 100.0), // below midpoint: DOWN
                (0.5, 158.0), // UP
                (1.0, 42.0),  // close 1
                (1.5, 157.0),
                (2.0, 43.0), // close 2
                (2.5, 120.0),
            ],
        );
        assert_eq!(machine.reps(), 2);
        assert_eq!(machine.phase(), Phase::Down);
    }

    #[test]
    fn test_limit_driven_suppressed_close_still_descends() {
        let mut machine = RepStateMachine::limit_driven(JointLimit::new(40.0, 160.0));
        let updates = feed(&mut machine, &[(0.0, 158.0), (0.2, 42.0)]);
        assert!(!updates[1].rep_counted);
        assert_eq!(updates[1].phase, Phase::Down);
        assert_eq!(machine.reps(), 0);
    }

    #[test]
    fn test_finish_folds_trailing_partial_rep() {
        let mut machine = squat();
        feed(
            &mut machine,
            &[(0.0, 165.0), (0.5, 90.0), (1.0, 145.0), (1.5, 100.0)],
        );
        assert_eq!(machine.reps(), 1);

        let trailing = machine.finish().unwrap();
        assert!((trailing.mean - 122.5).abs() < 1e-9);
        assert_eq!(trailing.closed_at, None);
        assert_eq!(machine.reps(), 1);
        assert!(machine.finish().is_none());
    }

    #[test]
    fn test_samples_are_normalized_before_buffering() {
        let mut machine = RepStateMachine::limit_driven(JointLimit::new(10.0, 170.0));
        machine.update(180.0, Timestamp::from_secs_f64(0.0));
        let trailing = machine.finish().unwrap();
        assert_eq!(trailing.mean, 0.0);
    }
}
