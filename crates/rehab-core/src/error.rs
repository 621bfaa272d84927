//! Error types for the rehabilitation motion engine.

use thiserror::Error;

use crate::types::Landmark;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Pose source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Pose source read failed: {0}")]
    SourceRead(String),

    #[error("Angle unavailable: {0}")]
    AngleUnavailable(#[from] AngleUnavailable),

    #[error("Calibration collected no usable joint samples")]
    CalibrationEmpty,

    #[error("Unknown exercise: {0}")]
    UnknownExercise(String),

    #[error("Unknown joint: {0}")]
    UnknownJoint(String),

    #[error("Exercise '{0}' is not assigned to this patient")]
    NotAssigned(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

/// Why a joint angle could not be produced for a frame.
///
/// A frame that yields one of these contributes no sample to any
/// aggregation; it is never treated as an angle of zero.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum AngleUnavailable {
    #[error("no pose detected in frame")]
    NoDetection,

    #[error("landmark {0} missing from frame")]
    MissingLandmark(Landmark),

    #[error("landmark {landmark} visibility {visibility:.2} below {min_visibility:.2}")]
    LowVisibility {
        landmark: Landmark,
        visibility: f64,
        min_visibility: f64,
    },

    #[error("degenerate joint geometry (zero-length limb segment)")]
    DegenerateGeometry,

    #[error("angle computation produced a non-finite value")]
    NonFinite,
}
