//! Joint-limit derivation from a recorded demonstration.

use std::collections::BTreeMap;

use rehab_core::{
    normalize_angle, primary_joint, round2, CalibrationResult, Error, Joint, JointCatalog,
    JointLimit, PoseFrame, Result,
};

/// Running min/max of one joint's samples
#[derive(Debug, Clone, Copy)]
struct Extent {
    min: f64,
    max: f64,
    samples: usize,
}

impl Extent {
    fn new(angle: f64) -> Self {
        Self {
            min: angle,
            max: angle,
            samples: 1,
        }
    }

    fn include(&mut self, angle: f64) {
        self.min = self.min.min(angle);
        self.max = self.max.max(angle);
        self.samples += 1;
    }
}

/// Collects per-joint angle samples and turns them into joint limits
#[derive(Debug, Clone, Default)]
pub struct CalibrationEngine {
    extents: BTreeMap<Joint, Extent>,
}

impl CalibrationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sample for `joint`; the angle is normalized first
    pub fn record(&mut self, joint: Joint, angle: f64) {
        let angle = normalize_angle(angle);
        self.extents
            .entry(joint)
            .and_modify(|e| e.include(angle))
            .or_insert_with(|| Extent::new(angle));
    }

    /// Record every catalog joint whose angle is available in `frame`.
    ///
    /// Returns the number of joints sampled.
    pub fn observe_frame(&mut self, frame: &PoseFrame, min_visibility: f64) -> usize {
        let mut sampled = 0;
        for (joint, angle) in JointCatalog::angles_in(frame, min_visibility) {
            match angle {
                Ok(angle) => {
                    self.record(joint, angle);
                    sampled += 1;
                }
                Err(cause) => tracing::trace!(%joint, %cause, "calibration sample skipped"),
            }
        }
        sampled
    }

    pub fn samples(&self, joint: Joint) -> usize {
        self.extents.get(&joint).map_or(0, |e| e.samples)
    }

    pub fn is_empty(&self) -> bool {
        self.extents.is_empty()
    }

    /// Derive limits for every sampled joint and pick the primary joint.
    ///
    /// Fails with [`Error::CalibrationEmpty`] when no joint was sampled.
    pub fn finish(&self) -> Result<CalibrationResult> {
        let joints: BTreeMap<Joint, JointLimit> = self
            .extents
            .iter()
            .map(|(joint, e)| (*joint, JointLimit::new(round2(e.min), round2(e.max))))
            .collect();

        let primary_joint = primary_joint(&joints).ok_or(Error::CalibrationEmpty)?;

        tracing::info!(
            joints = joints.len(),
            primary = %primary_joint,
            "calibration complete"
        );

        Ok(CalibrationResult {
            joints,
            primary_joint,
        })
    }
}
