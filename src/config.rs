//! Configuration for the kick counter.

use crate::core::tracker::TrackerSettings;
use crate::store::ApiConfig;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the care API
    pub api_base_url: String,

    /// Upper bound for every backend request
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,

    /// IANA time zone used to decide what "today" means
    pub timezone: String,

    /// Kicks that trigger the goal notice
    pub goal_kicks: u32,

    /// Fewer kicks than this over a long session trigger the low-kick advisory
    pub low_kick_threshold: u32,

    /// Session length after which the low-kick advisory applies
    #[serde(with = "duration_serde")]
    pub low_kick_window: Duration,

    /// Path for storing the access token and activity stats
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kick-counter");

        Self {
            api_base_url: "http://localhost:5000/api".to_string(),
            request_timeout: Duration::from_secs(10),
            timezone: "UTC".to_string(),
            goal_kicks: 10,
            low_kick_threshold: 6,
            low_kick_window: Duration::from_secs(2 * 60 * 60),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kick-counter")
            .join("config.json")
    }

    /// Where the access token lives.
    pub fn token_path(&self) -> PathBuf {
        self.data_path.join("token")
    }

    /// Where cumulative activity stats are persisted.
    pub fn activity_path(&self) -> PathBuf {
        self.data_path.join("activity.json")
    }

    /// Reject values the tracker cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api_base_url must not be empty".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid("request_timeout must be positive".into()));
        }
        if self.goal_kicks == 0 {
            return Err(ConfigError::Invalid("goal_kicks must be at least 1".into()));
        }
        self.tz()?;
        Ok(())
    }

    /// Parsed time zone.
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::Invalid(format!("unknown time zone '{}'", self.timezone)))
    }

    /// Endpoint settings for the HTTP store.
    pub fn api_config(&self) -> ApiConfig {
        ApiConfig::new(self.api_base_url.clone(), self.request_timeout)
    }

    /// Thresholds and bounds for the session tracker.
    pub fn tracker_settings(&self) -> Result<TrackerSettings, ConfigError> {
        self.validate()?;
        Ok(TrackerSettings {
            goal_kicks: self.goal_kicks,
            low_kick_threshold: self.low_kick_threshold,
            low_kick_window: self.low_kick_window,
            request_timeout: self.request_timeout,
            timezone: self.tz()?,
        })
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
