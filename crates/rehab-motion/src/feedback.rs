//! Live form cues and post-session guidance.

use rehab_core::{OptimalRange, SessionResult};
use serde::{Deserialize, Serialize};

/// Deviation below which motion is reported as consistent
pub const CONSISTENT_BELOW: f64 = 15.0;
/// Deviation below which motion is reported as somewhat inconsistent
pub const SOMEWHAT_INCONSISTENT_BELOW: f64 = 50.0;

/// Per-frame cue relative to the target band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormFeedback {
    GoHigher,
    GoLower,
    GoodForm,
}

impl FormFeedback {
    /// Cue for `angle` against `band`; `None` when the band is unusable
    pub fn assess(angle: f64, band: OptimalRange) -> Option<Self> {
        if !band.is_valid() {
            return None;
        }
        Some(if angle < band.min {
            Self::GoHigher
        } else if angle > band.max {
            Self::GoLower
        } else {
            Self::GoodForm
        })
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::GoHigher => "Go higher",
            Self::GoLower => "Go lower",
            Self::GoodForm => "Good form",
        }
    }
}

/// Advice shown once a session is over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Guidance {
    NoOptimalRange,
    RaiseHigher,
    LowerRange,
    Consistent,
    SomewhatInconsistent,
    HighlyInconsistent,
}

impl Guidance {
    pub fn from_result(result: &SessionResult) -> Self {
        let opt = match result.opt_range {
            Some(opt) if opt.is_valid() => opt,
            _ => return Self::NoOptimalRange,
        };

        if result.rep_max < opt.min {
            Self::RaiseHigher
        } else if result.rep_min > opt.max {
            Self::LowerRange
        } else if result.deviation_percent < CONSISTENT_BELOW {
            Self::Consistent
        } else if result.deviation_percent < SOMEWHAT_INCONSISTENT_BELOW {
            Self::SomewhatInconsistent
        } else {
            Self::HighlyInconsistent
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::NoOptimalRange => "No optimal range is set for this exercise.",
            Self::RaiseHigher => "Reps stayed below the target range; aim higher next time.",
            Self::LowerRange => "Reps stayed above the target range; go lower next time.",
            Self::Consistent => "Consistent motion within the target range.",
            Self::SomewhatInconsistent => "Some inconsistency between reps; control the range more.",
            Self::HighlyInconsistent => "Reps varied a lot; slow down and control each rep.",
        }
    }
}
