//! Engine and per-session configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use rehab_core::{Error, Joint, JointLimit, OptimalRange, Result};
use rehab_motion::TrackerConfig;

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Exercise session defaults
    pub session: SessionSettings,

    /// Calibration recording
    pub calibration: CalibrationSettings,

    /// Persistence
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Seconds of countdown before frames are scored
    pub countdown_secs: f64,

    /// Minimum seconds between two counted reps
    pub cooldown_secs: f64,

    /// Landmark visibility floor (0 accepts every landmark)
    pub min_visibility: f64,

    /// Upper bound of the deviation score
    pub deviation_cap: f64,

    /// Wall-clock ceiling for one session (seconds)
    pub max_duration_secs: Option<f64>,

    /// Capacity of the live frame-update channel
    pub update_queue_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSettings {
    /// Seconds of countdown before samples are recorded
    pub countdown_secs: f64,

    /// Length of the recording window (seconds)
    pub window_secs: f64,

    /// Landmark visibility floor
    pub min_visibility: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// JSON document holding exercises and patients
    pub path: PathBuf,
}

impl Default for SessionSettings {
    fn default() -> Self {
        let tracker = TrackerConfig::default();
        Self {
            countdown_secs: tracker.countdown_secs,
            cooldown_secs: tracker.cooldown_secs,
            min_visibility: tracker.min_visibility,
            deviation_cap: tracker.deviation_cap,
            max_duration_secs: None,
            update_queue_size: 64,
        }
    }
}

impl SessionSettings {
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            countdown_secs: self.countdown_secs,
            cooldown_secs: self.cooldown_secs,
            min_visibility: self.min_visibility,
            deviation_cap: self.deviation_cap,
        }
    }
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            countdown_secs: 3.0,
            window_secs: 30.0,
            min_visibility: 0.0,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("rehab_db.json"),
        }
    }
}

impl EngineConfig {
    /// Load configuration from file, with `REHAB__`-prefixed environment overrides
    pub fn from_file(path: &str) -> std::result::Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(config::File::with_name(path))
            .add_source(Self::environment())
            .build()?;

        settings.try_deserialize()
    }

    /// Load from environment variables
    pub fn from_env() -> std::result::Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(Self::environment())
            .build()?;

        settings.try_deserialize()
    }

    /// File when given, environment otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let loaded = match path {
            Some(path) => Self::from_file(&path.to_string_lossy()),
            None => Self::from_env(),
        };
        loaded.map_err(|e| Error::Config(e.to_string()))
    }

    fn environment() -> config::Environment {
        // REHAB__SESSION__COOLDOWN_SECS=0.5
        config::Environment::with_prefix("REHAB")
            .prefix_separator("__")
            .separator("__")
    }
}

/// Parameters of one exercise session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Built-in name or stored custom exercise name
    pub exercise: String,

    /// End the session once this many reps are counted
    pub target_reps: Option<u32>,

    /// Explicit optimal range, overriding every stored one
    pub optimal_range: Option<OptimalRange>,

    /// Explicit joint limits, making the exercise custom
    pub joint_limits: Option<BTreeMap<Joint, JointLimit>>,

    /// Which camera or stream the host should open
    pub source_index: u32,

    pub tracker: TrackerConfig,

    /// Wall-clock ceiling (seconds)
    pub max_duration_secs: Option<f64>,
}

impl SessionConfig {
    pub fn new(exercise: impl Into<String>) -> Self {
        Self::from_settings(exercise, &SessionSettings::default())
    }

    pub fn from_settings(exercise: impl Into<String>, settings: &SessionSettings) -> Self {
        Self {
            exercise: exercise.into(),
            target_reps: None,
            optimal_range: None,
            joint_limits: None,
            source_index: 0,
            tracker: settings.tracker_config(),
            max_duration_secs: settings.max_duration_secs,
        }
    }

    /// A target of zero means no target
    pub fn with_target_reps(mut self, reps: u32) -> Self {
        self.target_reps = (reps > 0).then_some(reps);
        self
    }

    pub fn with_optimal_range(mut self, range: OptimalRange) -> Self {
        self.optimal_range = Some(range);
        self
    }

    pub fn with_joint_limits(mut self, limits: BTreeMap<Joint, JointLimit>) -> Self {
        self.joint_limits = Some(limits);
        self
    }

    pub fn with_source_index(mut self, index: u32) -> Self {
        self.source_index = index;
        self
    }

    pub fn with_tracker(mut self, tracker: TrackerConfig) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_max_duration(mut self, duration: Duration) -> Self {
        self.max_duration_secs = Some(duration.as_secs_f64());
        self
    }

    /// Wall-clock ceiling; negative, non-finite or unrepresentable values mean none
    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}
