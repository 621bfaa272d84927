//! # Rehab-Session
//!
//! Async driver around the motion engine: pulls frames from a pose source,
//! runs one exercise session or calibration per loop, and persists custom
//! exercises and patient progress.
//!
//! ## Components
//!
//! 1. **Source**: pose frame producers (recorded JSON Lines, channels, replays)
//! 2. **Session**: the frame loop with stop handle, target reps and time ceiling
//! 3. **Recorder**: calibration countdown and demonstration window
//! 4. **Store**: exercise and patient repositories (in-memory, JSON file)
//! 5. **Progress**: assignments, set counts and session history

pub mod config;
pub mod progress;
pub mod recorder;
pub mod session;
pub mod source;
pub mod store;

pub use crate::config::*;
pub use progress::*;
pub use recorder::*;
pub use session::*;
pub use source::*;
pub use store::*;
