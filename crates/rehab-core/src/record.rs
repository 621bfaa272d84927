//! Immutable records produced by sessions and calibrations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Joint;
use crate::exercise::{JointLimit, OptimalRange};
use crate::types::Timestamp;

/// Mean angle over one repetition's frames
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RepSample {
    pub mean: f64,
    /// Number of frame samples averaged
    pub frames: usize,
    /// Frame time of the closing transition; `None` for a rep ended by the stream
    pub closed_at: Option<Timestamp>,
}

/// Final result of one exercise session.
///
/// Field names are the contract shared with the persistence and UI layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub reps: u32,
    pub rep_averages: Vec<f64>,
    pub overall_avg: f64,
    pub angle_min: f64,
    pub angle_max: f64,
    pub range_avg_low: f64,
    pub range_avg_high: f64,
    pub rep_min: f64,
    pub rep_max: f64,
    pub rep_range: f64,
    pub opt_range: Option<OptimalRange>,
    pub deviation_percent: f64,
    pub timestamp: DateTime<Utc>,
}

impl SessionResult {
    /// Zeroed result, used when no frames were processed or the source never opened
    pub fn empty(opt_range: Option<OptimalRange>, timestamp: DateTime<Utc>) -> Self {
        Self {
            reps: 0,
            rep_averages: Vec::new(),
            overall_avg: 0.0,
            angle_min: 0.0,
            angle_max: 0.0,
            range_avg_low: 0.0,
            range_avg_high: 0.0,
            rep_min: 0.0,
            rep_max: 0.0,
            rep_range: 0.0,
            opt_range,
            deviation_percent: 0.0,
            timestamp,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.reps == 0 && self.rep_averages.is_empty()
    }
}

/// Joint limits derived from a recorded demonstration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub joints: BTreeMap<Joint, JointLimit>,
    pub primary_joint: Joint,
}
