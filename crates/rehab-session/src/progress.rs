//! Patient assignments and completed-session history.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use rehab_core::{Error, ExerciseDefinition, OptimalRange, Result, SessionResult};

/// Target reps for a custom exercise without an assignment
pub const DEFAULT_CUSTOM_TARGET_REPS: u32 = 10;

/// One completed session with the set counts at the time it was saved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub result: SessionResult,
    pub assigned_sets_snapshot: Option<u32>,
    pub exercise_default_sets_snapshot: Option<u32>,
    pub sets_completed_snapshot: u32,
}

/// Everything persisted about one patient, keyed by exercise name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    /// Reps per set assigned by the therapist
    #[serde(default)]
    pub assigned: BTreeMap<String, u32>,
    #[serde(default)]
    pub assigned_sets: BTreeMap<String, u32>,
    /// Patient-specific optimal ranges
    #[serde(default)]
    pub custom_optimal: BTreeMap<String, OptimalRange>,
    /// Cumulative reps
    #[serde(default)]
    pub completed: BTreeMap<String, u32>,
    /// Sets done, custom exercises only
    #[serde(default)]
    pub sets_completed: BTreeMap<String, u32>,
    #[serde(default)]
    pub angle_stats: BTreeMap<String, Vec<HistoryEntry>>,
}

impl PatientRecord {
    pub fn assign(&mut self, exercise: &str, reps: u32, sets: Option<u32>) {
        self.assigned.insert(exercise.to_string(), reps);
        match sets {
            Some(sets) => self.assigned_sets.insert(exercise.to_string(), sets),
            None => self.assigned_sets.remove(exercise),
        };
    }

    pub fn set_optimal_range(&mut self, exercise: &str, range: OptimalRange) {
        self.custom_optimal.insert(exercise.to_string(), range);
    }

    pub fn optimal_range(&self, exercise: &str) -> Option<OptimalRange> {
        self.custom_optimal.get(exercise).copied()
    }

    /// Reps per set for `exercise`.
    ///
    /// Built-in exercises must be assigned; custom ones default to
    /// [`DEFAULT_CUSTOM_TARGET_REPS`].
    pub fn target_reps(&self, exercise: &str, is_custom: bool) -> Result<u32> {
        match self.assigned.get(exercise).copied().filter(|&reps| reps > 0) {
            Some(reps) => Ok(reps),
            None if is_custom => Ok(DEFAULT_CUSTOM_TARGET_REPS),
            None => Err(Error::NotAssigned(exercise.to_string())),
        }
    }

    /// Sets left, from the patient's assignment or else the exercise default
    pub fn sets_remaining(&self, exercise: &str, definition: Option<&ExerciseDefinition>) -> Option<u32> {
        let planned = self
            .assigned_sets
            .get(exercise)
            .copied()
            .or_else(|| definition.and_then(|d| d.default_sets))?;
        let done = self.sets_completed.get(exercise).copied().unwrap_or(0);
        Some(planned.saturating_sub(done))
    }

    /// Fold a finished session into the record
    pub fn record_session(
        &mut self,
        exercise: &str,
        result: SessionResult,
        definition: Option<&ExerciseDefinition>,
    ) -> &HistoryEntry {
        *self.completed.entry(exercise.to_string()).or_insert(0) += result.reps;

        if definition.is_some_and(|d| !d.joints.is_empty()) {
            *self.sets_completed.entry(exercise.to_string()).or_insert(0) += 1;
        }

        let entry = HistoryEntry {
            result,
            assigned_sets_snapshot: self.assigned_sets.get(exercise).copied(),
            exercise_default_sets_snapshot: definition.and_then(|d| d.default_sets),
            sets_completed_snapshot: self.sets_completed.get(exercise).copied().unwrap_or(0),
        };

        let history = self.angle_stats.entry(exercise.to_string()).or_default();
        history.push(entry);
        &history[history.len() - 1]
    }

    pub fn last_session(&self, exercise: &str) -> Option<&HistoryEntry> {
        self.angle_stats.get(exercise)?.last()
    }
}
