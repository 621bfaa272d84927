//! Exercise definitions: joint limits, optimal bands and the built-in threshold table.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Joint;
use crate::error::{Error, Result};
use crate::geometry::{clamp_degrees, MAX_ANGLE};
use crate::record::CalibrationResult;

/// (min, max) degrees a joint moves through.
///
/// Bounds are clamped into [0, 180]. A degenerate limit (min == max) is
/// widened by one degree on each side at creation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct JointLimit {
    min: f64,
    max: f64,
}

impl JointLimit {
    pub const DEGENERATE_WIDENING: f64 = 1.0;

    pub fn new(min: f64, max: f64) -> Self {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        let mut lo = clamp_degrees(lo);
        let mut hi = clamp_degrees(hi);
        if lo == hi {
            lo = clamp_degrees(lo - Self::DEGENERATE_WIDENING);
            hi = clamp_degrees(hi + Self::DEGENERATE_WIDENING);
        }
        Self { min: lo, max: hi }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn as_band(&self) -> OptimalRange {
        OptimalRange::new(self.min, self.max)
    }
}

impl From<[f64; 2]> for JointLimit {
    fn from([min, max]: [f64; 2]) -> Self {
        Self::new(min, max)
    }
}

impl From<JointLimit> for [f64; 2] {
    fn from(limit: JointLimit) -> Self {
        [limit.min, limit.max]
    }
}

/// Clinically desired angle band for the tracked joint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct OptimalRange {
    pub min: f64,
    pub max: f64,
}

/// An optimal range normalized for scoring: bounds in [0, 180], width > 0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub min: f64,
    pub max: f64,
    pub width: f64,
}

impl OptimalRange {
    /// Band spanning every possible angle, used when no range is set
    pub const FULL: OptimalRange = OptimalRange {
        min: 0.0,
        max: MAX_ANGLE,
    };

    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min: clamp_degrees(min),
            max: clamp_degrees(max),
        }
    }

    /// Whether the range describes a usable band (min strictly below max)
    pub fn is_valid(&self) -> bool {
        self.min < self.max
    }

    pub fn contains(&self, angle: f64) -> bool {
        self.min <= angle && angle <= self.max
    }

    /// Normalized scoring band; a non-positive width is forced to 1
    pub fn band(&self) -> Band {
        let min = clamp_degrees(self.min);
        let max = clamp_degrees(self.max);
        let width = max - min;
        Band {
            min,
            max,
            width: if width <= 0.0 { 1.0 } else { width },
        }
    }

    /// Pick the range a session scores against.
    ///
    /// Precedence: explicit session override, patient-specific override,
    /// the stored exercise definition, then the built-in default.
    pub fn resolve(
        exercise: &str,
        session_override: Option<OptimalRange>,
        patient_override: Option<OptimalRange>,
        definition: Option<&ExerciseDefinition>,
    ) -> Option<OptimalRange> {
        session_override
            .or(patient_override)
            .or_else(|| definition.and_then(|d| d.optimal_range.map(|o| o.range())))
            .or_else(|| {
                exercise
                    .parse::<BuiltInExercise>()
                    .ok()
                    .map(|b| b.default_optimal_range())
            })
    }
}

impl From<[f64; 2]> for OptimalRange {
    fn from([min, max]: [f64; 2]) -> Self {
        Self::new(min, max)
    }
}

impl From<OptimalRange> for [f64; 2] {
    fn from(range: OptimalRange) -> Self {
        [range.min, range.max]
    }
}

/// One side of a threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Crossing {
    Above(f64),
    Below(f64),
}

impl Crossing {
    pub fn crossed(&self, angle: f64) -> bool {
        match *self {
            Crossing::Above(threshold) => angle > threshold,
            Crossing::Below(threshold) => angle < threshold,
        }
    }
}

/// Fixed hysteresis used by a built-in exercise
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Hysteresis {
    /// Arm at the top, descend past the bottom, close on the way back up
    ThreePhase {
        arm_above: f64,
        descend_below: f64,
        close_above: f64,
    },
    /// Reset past one threshold, close past the other
    TwoPhase { reset: Crossing, close: Crossing },
}

/// The four built-in exercises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuiltInExercise {
    Squat,
    Pushup,
    Curl,
    Raise,
}

impl BuiltInExercise {
    pub const ALL: [BuiltInExercise; 4] = [Self::Squat, Self::Pushup, Self::Curl, Self::Raise];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Squat => "squat",
            Self::Pushup => "pushup",
            Self::Curl => "curl",
            Self::Raise => "raise",
        }
    }

    /// Joint whose angle drives rep counting
    pub fn joint(&self) -> Joint {
        match self {
            Self::Squat => Joint::LeftKnee,
            Self::Pushup | Self::Curl => Joint::LeftElbow,
            Self::Raise => Joint::LeftShoulder,
        }
    }

    pub fn hysteresis(&self) -> Hysteresis {
        match self {
            Self::Squat => Hysteresis::ThreePhase {
                arm_above: 160.0,
                descend_below: 95.0,
                close_above: 140.0,
            },
            Self::Pushup => Hysteresis::ThreePhase {
                arm_above: 150.0,
                descend_below: 90.0,
                close_above: 140.0,
            },
            Self::Curl => Hysteresis::TwoPhase {
                reset: Crossing::Above(150.0),
                close: Crossing::Below(60.0),
            },
            Self::Raise => Hysteresis::TwoPhase {
                reset: Crossing::Below(30.0),
                close: Crossing::Above(75.0),
            },
        }
    }

    pub fn default_optimal_range(&self) -> OptimalRange {
        match self {
            Self::Squat => OptimalRange::new(60.0, 180.0),
            Self::Pushup => OptimalRange::new(80.0, 160.0),
            Self::Curl => OptimalRange::new(20.0, 170.0),
            Self::Raise => OptimalRange::new(15.0, 95.0),
        }
    }
}

impl fmt::Display for BuiltInExercise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BuiltInExercise {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "squat" => Ok(Self::Squat),
            "pushup" => Ok(Self::Pushup),
            "curl" => Ok(Self::Curl),
            "raise" | "lateral raise" => Ok(Self::Raise),
            _ => Err(Error::UnknownExercise(s.to_string())),
        }
    }
}

/// How a session counts reps
#[derive(Debug, Clone, PartialEq)]
pub enum ExerciseKind {
    BuiltIn {
        id: BuiltInExercise,
        hysteresis: Hysteresis,
        joint: Joint,
    },
    Custom {
        joint_limits: BTreeMap<Joint, JointLimit>,
        primary_joint: Joint,
        optimal_range: Option<OptimalRange>,
    },
}

impl ExerciseKind {
    pub fn built_in(id: BuiltInExercise) -> Self {
        Self::BuiltIn {
            id,
            hysteresis: id.hysteresis(),
            joint: id.joint(),
        }
    }

    /// Custom exercise tracked on the joint with the widest limit
    pub fn custom(
        joint_limits: BTreeMap<Joint, JointLimit>,
        optimal_range: Option<OptimalRange>,
    ) -> Result<Self> {
        let primary_joint = primary_joint(&joint_limits).ok_or_else(|| {
            Error::InvalidInput("custom exercise needs at least one joint limit".into())
        })?;
        Ok(Self::Custom {
            joint_limits,
            primary_joint,
            optimal_range,
        })
    }

    /// Resolve an exercise identifier.
    ///
    /// An explicit joint-limit map or a stored definition with joints makes
    /// the exercise custom; otherwise the name must be a built-in.
    pub fn resolve(
        name: &str,
        joint_limits: Option<&BTreeMap<Joint, JointLimit>>,
        definition: Option<&ExerciseDefinition>,
    ) -> Result<Self> {
        let stored = definition.filter(|d| !d.joints.is_empty());

        if let Some(limits) = joint_limits.filter(|l| !l.is_empty()) {
            let optimal = stored.and_then(|d| d.optimal_range.map(|o| o.range()));
            return Self::custom(limits.clone(), optimal);
        }

        if let Some(def) = stored {
            return Self::custom(def.joints.clone(), def.optimal_range.map(|o| o.range()));
        }

        name.parse::<BuiltInExercise>().map(Self::built_in)
    }

    pub fn tracked_joint(&self) -> Joint {
        match self {
            Self::BuiltIn { joint, .. } => *joint,
            Self::Custom { primary_joint, .. } => *primary_joint,
        }
    }

    /// Limit of the tracked joint, custom exercises only
    pub fn primary_limit(&self) -> Option<JointLimit> {
        match self {
            Self::BuiltIn { .. } => None,
            Self::Custom {
                joint_limits,
                primary_joint,
                ..
            } => joint_limits.get(primary_joint).copied(),
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom { .. })
    }
}

/// Joint with the largest range; ties go to the earlier catalog joint
pub fn primary_joint(limits: &BTreeMap<Joint, JointLimit>) -> Option<Joint> {
    let mut best: Option<(Joint, f64)> = None;
    for (joint, limit) in limits {
        match best {
            Some((_, width)) if limit.width() <= width => {}
            _ => best = Some((*joint, limit.width())),
        }
    }
    best.map(|(joint, _)| joint)
}

/// Optimal-range override stored with an exercise definition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimalRangeOverride {
    pub joint: Joint,
    pub min: f64,
    pub max: f64,
}

impl OptimalRangeOverride {
    pub fn range(&self) -> OptimalRange {
        OptimalRange::new(self.min, self.max)
    }
}

/// Reusable custom exercise, as stored by the persistence layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseDefinition {
    pub name: String,
    pub joints: BTreeMap<Joint, JointLimit>,
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_sets: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimal_range: Option<OptimalRangeOverride>,
}

impl ExerciseDefinition {
    pub fn from_calibration(name: impl Into<String>, calibration: &CalibrationResult) -> Self {
        Self {
            name: name.into(),
            joints: calibration.joints.clone(),
            created: Utc::now(),
            default_sets: None,
            optimal_range: None,
        }
    }

    pub fn with_default_sets(mut self, sets: u32) -> Self {
        self.default_sets = Some(sets);
        self
    }

    /// Attach an optimal range to the primary joint.
    ///
    /// Rejects ranges whose min is not below max.
    pub fn with_optimal_range(mut self, min: f64, max: f64) -> Result<Self> {
        if min >= max {
            return Err(Error::InvalidInput(format!(
                "optimal range min ({min}) must be below max ({max})"
            )));
        }
        let joint = self.primary_joint().ok_or_else(|| {
            Error::InvalidInput(format!("exercise '{}' has no joints", self.name))
        })?;
        self.optimal_range = Some(OptimalRangeOverride { joint, min, max });
        Ok(self)
    }

    pub fn primary_joint(&self) -> Option<Joint> {
        primary_joint(&self.joints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_limit_is_widened() {
        let limit = JointLimit::new(90.0, 90.0);
        assert_eq!((limit.min(), limit.max()), (89.0, 91.0));

        let at_floor = JointLimit::new(0.0, 0.0);
        assert_eq!((at_floor.min(), at_floor.max()), (0.0, 1.0));

        let at_ceiling = JointLimit::new(180.0, 180.0);
        assert_eq!((at_ceiling.min(), at_ceiling.max()), (179.0, 180.0));
    }

    #[test]
    fn test_limit_bounds_clamped_and_ordered() {
        let limit = JointLimit::new(200.0, -10.0);
        assert_eq!((limit.min(), limit.max()), (0.0, 180.0));
    }

    #[test]
    fn test_limit_serializes_as_pair() {
        let limit = JointLimit::new(20.5, 150.25);
        assert_eq!(serde_json::to_string(&limit).unwrap(), "[20.5,150.25]");

        let parsed: JointLimit = serde_json::from_str("[45.0, 45.0]").unwrap();
        assert_eq!((parsed.min(), parsed.max()), (44.0, 46.0));
    }

    #[test]
    fn test_band_guards_degenerate_width() {
        let band = OptimalRange::new(120.0, 60.0).band();
        assert_eq!(band.width, 1.0);
        assert!(!OptimalRange::new(120.0, 60.0).is_valid());

        let band = OptimalRange::new(-20.0, 200.0).band();
        assert_eq!((band.min, band.max, band.width), (0.0, 180.0, 180.0));
    }

    #[test]
    fn test_builtin_parsing() {
        assert_eq!("Squat".parse::<BuiltInExercise>().unwrap(), BuiltInExercise::Squat);
        assert_eq!(
            "lateral raise".parse::<BuiltInExercise>().unwrap(),
            BuiltInExercise::Raise
        );
        assert!("plank".parse::<BuiltInExercise>().is_err());
    }

    #[test]
    fn test_crossing() {
        assert!(Crossing::Above(75.0).crossed(76.0));
        assert!(!Crossing::Above(75.0).crossed(75.0));
        assert!(Crossing::Below(30.0).crossed(29.9));
    }

    #[test]
    fn test_primary_joint_ties_go_to_catalog_order() {
        let mut limits = BTreeMap::new();
        limits.insert(Joint::RightKnee, JointLimit::new(40.0, 140.0));
        limits.insert(Joint::LeftElbow, JointLimit::new(30.0, 130.0));
        limits.insert(Joint::LeftHip, JointLimit::new(80.0, 120.0));
        assert_eq!(primary_joint(&limits), Some(Joint::LeftElbow));

        limits.insert(Joint::LeftHip, JointLimit::new(10.0, 170.0));
        assert_eq!(primary_joint(&limits), Some(Joint::LeftHip));

        assert_eq!(primary_joint(&BTreeMap::new()), None);
    }

    fn definition() -> ExerciseDefinition {
        let mut joints = BTreeMap::new();
        joints.insert(Joint::LeftShoulder, JointLimit::new(20.0, 160.0));
        joints.insert(Joint::LeftElbow, JointLimit::new(150.0, 175.0));
        ExerciseDefinition {
            name: "arm circle".into(),
            joints,
            created: Utc::now(),
            default_sets: Some(3),
            optimal_range: None,
        }
    }

    #[test]
    fn test_resolve_custom_from_definition() {
        let def = definition().with_optimal_range(30.0, 150.0).unwrap();
        let kind = ExerciseKind::resolve("arm circle", None, Some(&def)).unwrap();
        assert!(kind.is_custom());
        assert_eq!(kind.tracked_joint(), Joint::LeftShoulder);
        assert_eq!(kind.primary_limit(), Some(JointLimit::new(20.0, 160.0)));
        match kind {
            ExerciseKind::Custom { optimal_range, .. } => {
                assert_eq!(optimal_range, Some(OptimalRange::new(30.0, 150.0)))
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_resolve_builtin_and_unknown() {
        let kind = ExerciseKind::resolve("SQUAT", None, None).unwrap();
        assert_eq!(kind, ExerciseKind::built_in(BuiltInExercise::Squat));
        assert_eq!(kind.tracked_joint(), Joint::LeftKnee);
        assert!(kind.primary_limit().is_none());

        assert!(matches!(
            ExerciseKind::resolve("plank", None, None),
            Err(Error::UnknownExercise(_))
        ));
    }

    #[test]
    fn test_optimal_range_precedence() {
        let def = definition().with_optimal_range(30.0, 150.0).unwrap();
        let session = Some(OptimalRange::new(10.0, 20.0));
        let patient = Some(OptimalRange::new(40.0, 50.0));

        assert_eq!(OptimalRange::resolve("squat", session, patient, Some(&def)), session);
        assert_eq!(OptimalRange::resolve("squat", None, patient, Some(&def)), patient);
        assert_eq!(
            OptimalRange::resolve("squat", None, None, Some(&def)),
            Some(OptimalRange::new(30.0, 150.0))
        );
        assert_eq!(
            OptimalRange::resolve("squat", None, None, None),
            Some(OptimalRange::new(60.0, 180.0))
        );
        assert_eq!(OptimalRange::resolve("arm circle", None, None, None), None);
    }

    #[test]
    fn test_optimal_override_requires_ordered_bounds() {
        assert!(definition().with_optimal_range(90.0, 90.0).is_err());
        let def = definition().with_optimal_range(25.0, 155.0).unwrap();
        assert_eq!(def.optimal_range.unwrap().joint, Joint::LeftShoulder);
    }
}
