//! Joint-angle geometry and the degree-domain numeric helpers shared by the engine.

use nalgebra::Point2;

use crate::error::AngleUnavailable;

/// Upper bound of every joint angle, limit and band (degrees)
pub const MAX_ANGLE: f64 = 180.0;

/// Limb segments shorter than this (pixels) make the angle meaningless
const MIN_SEGMENT_LENGTH: f64 = 1e-9;

/// Angle ABC in degrees, in [0, 180].
///
/// Computed from the difference of the two segment headings, reflected into
/// the inner angle when it exceeds a half turn.
pub fn joint_angle(
    a: &Point2<f64>,
    b: &Point2<f64>,
    c: &Point2<f64>,
) -> Result<f64, AngleUnavailable> {
    let ba = a - b;
    let bc = c - b;

    if ba.norm() < MIN_SEGMENT_LENGTH || bc.norm() < MIN_SEGMENT_LENGTH {
        return Err(AngleUnavailable::DegenerateGeometry);
    }

    let radians = bc.y.atan2(bc.x) - ba.y.atan2(ba.x);
    let mut angle = radians.to_degrees().abs();
    if angle > MAX_ANGLE {
        angle = 360.0 - angle;
    }

    if !angle.is_finite() {
        return Err(AngleUnavailable::NonFinite);
    }

    Ok(clamp_degrees(angle))
}

/// Clamp a degree value into [0, 180]
pub fn clamp_degrees(value: f64) -> f64 {
    value.clamp(0.0, MAX_ANGLE)
}

/// Fold an angle into [0, 180) modulo a half turn.
///
/// This is the normalization applied to every sample before aggregation.
/// A full half turn folds to 0.
pub fn normalize_angle(angle: f64) -> f64 {
    let folded = angle.rem_euclid(MAX_ANGLE);
    if folded >= MAX_ANGLE {
        // rem_euclid of tiny negatives rounds up to the modulus
        0.0
    } else {
        clamp_degrees(folded)
    }
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Percentile of already-sorted values with linear interpolation between ranks
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (pct / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let weight = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * weight
        }
    }
}
