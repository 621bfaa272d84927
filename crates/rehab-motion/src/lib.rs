//! # Rehab-Motion
//!
//! Repetition counting and motion-quality scoring over a joint-angle signal.
//!
//! ## Pipeline
//!
//! 1. **Angle** - the tracked joint's angle is computed per frame
//! 2. **Repetition** - a hysteresis state machine closes reps and emits their mean angle
//! 3. **Aggregation** - frame angles and rep means are summarized at session end
//! 4. **Deviation** - rep means are scored against the optimal band
//!
//! ## Rep counting modes
//!
//! - **Limit-driven**: custom exercises, thresholds 5° inside a calibrated joint limit
//! - **Fixed**: built-in exercises (squat, pushup, curl, raise), static thresholds
//!
//! Calibration derives the joint limits from a recorded demonstration.

pub mod aggregator;
pub mod calibration;
pub mod deviation;
pub mod feedback;
pub mod repetition;
pub mod tracker;

pub use aggregator::*;
pub use calibration::*;
pub use deviation::*;
pub use feedback::*;
pub use repetition::*;
pub use tracker::*;
