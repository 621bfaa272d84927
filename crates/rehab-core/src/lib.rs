//! # Rehab-Core
//!
//! Core types and utilities for the rehabilitation motion engine, which
//! turns a stream of pose landmarks into repetition counts and motion
//! quality metrics.
//!
//! - [`types`]: landmarks, joint positions and pose frames
//! - [`geometry`]: joint-angle computation and degree helpers
//! - [`catalog`]: tracked joints and their landmark triples
//! - [`exercise`]: joint limits, optimal bands, built-in thresholds
//! - [`record`]: session and calibration results

pub mod catalog;
pub mod error;
pub mod exercise;
pub mod geometry;
pub mod record;
pub mod types;

pub use catalog::*;
pub use error::{AngleUnavailable, Error, Result};
pub use exercise::*;
pub use geometry::*;
pub use record::*;
pub use types::*;
