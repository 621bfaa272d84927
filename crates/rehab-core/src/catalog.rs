//! Joint catalog: the tracked joints and the landmark triples defining their angles.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AngleUnavailable, Error};
use crate::geometry::joint_angle;
use crate::types::{Landmark, PoseFrame};

/// Joints whose angle the engine can track, in catalog order.
///
/// Catalog order is significant: it breaks ties when the primary joint of a
/// calibration is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Joint {
    LeftElbow,
    RightElbow,
    LeftShoulder,
    RightShoulder,
    LeftKnee,
    RightKnee,
    LeftHip,
    RightHip,
}

impl Joint {
    pub const COUNT: usize = 8;

    pub const ALL: [Joint; Joint::COUNT] = [
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftHip,
        Self::RightHip,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::LeftElbow => "LEFT_ELBOW",
            Self::RightElbow => "RIGHT_ELBOW",
            Self::LeftShoulder => "LEFT_SHOULDER",
            Self::RightShoulder => "RIGHT_SHOULDER",
            Self::LeftKnee => "LEFT_KNEE",
            Self::RightKnee => "RIGHT_KNEE",
            Self::LeftHip => "LEFT_HIP",
            Self::RightHip => "RIGHT_HIP",
        }
    }

    /// The (reference, vertex, reference) landmarks whose angle this joint is
    pub fn triple(&self) -> JointTriple {
        use Landmark::*;
        match self {
            Self::LeftElbow => JointTriple::new(LeftShoulder, LeftElbow, LeftWrist),
            Self::RightElbow => JointTriple::new(RightShoulder, RightElbow, RightWrist),
            Self::LeftShoulder => JointTriple::new(LeftHip, LeftShoulder, LeftElbow),
            Self::RightShoulder => JointTriple::new(RightHip, RightShoulder, RightElbow),
            Self::LeftKnee => JointTriple::new(LeftHip, LeftKnee, LeftAnkle),
            Self::RightKnee => JointTriple::new(RightHip, RightKnee, RightAnkle),
            Self::LeftHip => JointTriple::new(LeftShoulder, LeftHip, LeftKnee),
            Self::RightHip => JointTriple::new(RightShoulder, RightHip, RightKnee),
        }
    }
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Joint {
    type Err = Error;

    /// Accepts `LEFT_ELBOW`, `left_elbow` and `left elbow`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let canonical = s.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        Self::ALL
            .iter()
            .copied()
            .find(|joint| joint.name() == canonical)
            .ok_or_else(|| Error::UnknownJoint(s.to_string()))
    }
}

/// Ordered landmark triple defining an angle at `vertex`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JointTriple {
    pub first: Landmark,
    pub vertex: Landmark,
    pub last: Landmark,
}

impl JointTriple {
    pub const fn new(first: Landmark, vertex: Landmark, last: Landmark) -> Self {
        Self {
            first,
            vertex,
            last,
        }
    }

    pub fn landmarks(&self) -> [Landmark; 3] {
        [self.first, self.vertex, self.last]
    }

    /// Angle of this triple in `frame`, with landmarks scaled to pixel space.
    ///
    /// Landmarks whose visibility is below `min_visibility` count as missing.
    pub fn angle_in(&self, frame: &PoseFrame, min_visibility: f64) -> Result<f64, AngleUnavailable> {
        if !frame.is_detected() {
            return Err(AngleUnavailable::NoDetection);
        }

        let mut points = [nalgebra::Point2::origin(); 3];
        for (slot, landmark) in points.iter_mut().zip(self.landmarks()) {
            let position = frame
                .landmark(landmark)
                .ok_or(AngleUnavailable::MissingLandmark(landmark))?;
            if position.visibility < min_visibility {
                return Err(AngleUnavailable::LowVisibility {
                    landmark,
                    visibility: position.visibility,
                    min_visibility,
                });
            }
            *slot = position.to_pixel(frame.width, frame.height);
        }

        joint_angle(&points[0], &points[1], &points[2])
    }
}

/// Lookup over the static joint catalog
pub struct JointCatalog;

impl JointCatalog {
    pub fn joints() -> &'static [Joint] {
        &Joint::ALL
    }

    pub fn triple(joint: Joint) -> JointTriple {
        joint.triple()
    }

    /// Angle of every catalog joint in `frame`
    pub fn angles_in(
        frame: &PoseFrame,
        min_visibility: f64,
    ) -> BTreeMap<Joint, Result<f64, AngleUnavailable>> {
        Joint::ALL
            .iter()
            .map(|joint| (*joint, joint.triple().angle_in(frame, min_visibility)))
            .collect()
    }
}
