//! Installation configuration
//!
//! Loaded from JSON. Durations are human strings ("10s", "250ms").

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use duet_core::{DuetError, DuetResult};
use duet_model::{Hyperparams, MIN_TRAINING_SAMPLES};
use duet_skeleton::RenderSettings;

use crate::DEFAULT_GESTURE_THRESHOLD;

/// How long the countdown display lingers at zero before clearing
pub const COUNTDOWN_LINGER: Duration = Duration::from_secs(1);

mod human_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

/// Capture and gesture timing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Length of every recording phase
    #[serde(with = "human_duration")]
    pub recording_duration: Duration,
    /// Countdown before a button-started recording
    #[serde(with = "human_duration")]
    pub pre_roll: Duration,
    /// Consecutive raised-hand frames needed to fire
    pub gesture_threshold: u32,
    /// Each buffer needs more samples than this to train
    pub min_samples: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            recording_duration: Duration::from_secs(10),
            pre_roll: Duration::from_secs(3),
            gesture_threshold: DEFAULT_GESTURE_THRESHOLD,
            min_samples: MIN_TRAINING_SAMPLES,
        }
    }
}

/// Full installation configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallationConfig {
    pub session: SessionConfig,
    pub render: RenderSettings,
    pub training: Hyperparams,
    /// Render tick interval
    #[serde(with = "human_duration")]
    pub tick_interval: Duration,
}

impl Default for InstallationConfig {
    fn default() -> Self {
        InstallationConfig {
            session: SessionConfig::default(),
            render: RenderSettings::default(),
            training: Hyperparams::default(),
            tick_interval: Duration::from_millis(16),
        }
    }
}

impl InstallationConfig {
    /// Short recordings and a small network for the headless demo
    pub fn quick_demo() -> Self {
        InstallationConfig {
            session: SessionConfig {
                recording_duration: Duration::from_secs(2),
                pre_roll: Duration::from_secs(1),
                gesture_threshold: 30,
                min_samples: MIN_TRAINING_SAMPLES,
            },
            render: RenderSettings::default(),
            training: Hyperparams::quick(),
            tick_interval: Duration::from_millis(33),
        }
    }

    /// Parse from a JSON document; missing fields take their defaults
    pub fn from_json(text: &str) -> DuetResult<Self> {
        let config: InstallationConfig =
            serde_json::from_str(text).map_err(|e| DuetError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> DuetResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> DuetResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| DuetError::InvalidConfig(e.to_string()))
    }

    pub fn validate(&self) -> DuetResult<()> {
        if self.session.recording_duration.is_zero() {
            return Err(DuetError::InvalidConfig(
                "recording duration must be positive".into(),
            ));
        }
        if self.session.gesture_threshold == 0 {
            return Err(DuetError::InvalidConfig(
                "gesture threshold must be at least 1".into(),
            ));
        }
        if self.tick_interval.is_zero() {
            return Err(DuetError::InvalidConfig(
                "tick interval must be positive".into(),
            ));
        }
        self.training.validate()
    }
}
