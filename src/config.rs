//! Configuration for signalvoid.

use crate::core::policy::{Policy, Preset};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Policy for single-cell classification on each fresh location sample
    pub realtime: Policy,

    /// Policy for the periodic all-cells pass
    pub batch: Policy,

    /// Path for storing the heartbeat log and transparency stats
    pub data_path: PathBuf,

    /// IANA timezone used when rendering report times
    pub display_timezone: String,

    /// Port for the HTTP server
    pub server_port: u16,

    /// Interval between batch passes (in seconds)
    pub batch_interval_secs: u64,

    /// Deadline for a single store call made by the HTTP server
    #[serde(with = "duration_millis_serde")]
    pub store_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("signalvoid");

        Self {
            realtime: Policy::realtime(),
            batch: Policy::batch(),
            data_path: data_dir,
            display_timezone: "UTC".to_string(),
            server_port: 8787,
            batch_interval_secs: 60,
            store_timeout: Duration::from_millis(5_000),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `config_path`, falling back to defaults when absent.
    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
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

    /// Validate and write configuration to `config_path`.
    pub fn save_to(&self, config_path: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("signalvoid")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Heartbeat log used by the CLI.
    pub fn store_path(&self) -> PathBuf {
        self.data_path.join("heartbeats.jsonl")
    }

    /// Persisted transparency counters.
    pub fn transparency_path(&self) -> PathBuf {
        self.data_path.join("transparency.json")
    }

    /// Policy stored under a preset's name.
    pub fn policy(&self, preset: Preset) -> Policy {
        match preset {
            Preset::Realtime => self.realtime,
            Preset::Batch => self.batch,
        }
    }

    /// Delay between batch passes, or `None` for a single pass.
    ///
    /// An explicit interval wins; `repeat` alone falls back to
    /// `batch_interval_secs`.
    pub fn batch_interval(&self, explicit_secs: Option<u64>, repeat: bool) -> Option<Duration> {
        explicit_secs
            .or(repeat.then_some(self.batch_interval_secs))
            .map(Duration::from_secs)
    }

    /// Parsed display timezone.
    pub fn timezone(&self) -> Result<chrono_tz::Tz, ConfigError> {
        self.display_timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|e| ConfigError::ParseError(format!("display_timezone: {e}")))
    }

    /// Check policies and timezone.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for preset in Preset::ALL {
            self.policy(preset)
                .validate()
                .map_err(|e| ConfigError::Invalid(format!("{} policy: {e}", preset.name())))?;
        }
        if self.batch_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "batch_interval_secs must be at least 1".to_string(),
            ));
        }
        self.timezone()?;
        Ok(())
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

/// Serde support for Duration as whole seconds.
pub(crate) mod duration_serde {
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

/// Serde support for Duration as milliseconds.
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.realtime, Policy::realtime());
        assert_eq!(config.batch, Policy::batch());
        assert_eq!(config.store_timeout, Duration::from_secs(5));
        assert!(config.store_path().ends_with("heartbeats.jsonl"));
        config.validate().unwrap();
    }

    #[test]
    fn test_config_round_trip() {
        let mut config = Config::default();
        config.display_timezone = "Europe/Berlin".to_string();
        config.realtime.recent_window = Duration::from_secs(180);

        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(back.realtime.recent_window, Duration::from_secs(180));
        assert_eq!(back.timezone().unwrap(), chrono_tz::Europe::Berlin);
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let mut config = Config::default();
        config.batch.recent_window = Duration::from_secs(3600);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.display_timezone = "Mars/Olympus".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_batch_interval_resolution() {
        let mut config = Config::default();
        config.batch_interval_secs = 90;

        assert_eq!(config.batch_interval(None, false), None);
        assert_eq!(config.batch_interval(None, true), Some(Duration::from_secs(90)));
        assert_eq!(config.batch_interval(Some(15), false), Some(Duration::from_secs(15)));
        assert_eq!(config.batch_interval(Some(15), true), Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_zero_batch_interval_rejected() {
        let mut config = Config::default();
        config.batch_interval_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_save_and_load_from_path() {
        let path = std::env::temp_dir()
            .join(format!("signalvoid-config-{}", uuid::Uuid::new_v4()))
            .join("config.json");
        assert_eq!(Config::load_from(&path).unwrap().server_port, 8787);

        let mut config = Config::default();
        config.display_timezone = "Asia/Tokyo".to_string();
        config.batch_interval_secs = 300;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.display_timezone, "Asia/Tokyo");
        assert_eq!(loaded.batch_interval_secs, 300);

        config.display_timezone = "Nowhere/Special".to_string();
        assert!(config.save_to(&path).is_err());
        assert_eq!(Config::load_from(&path).unwrap().display_timezone, "Asia/Tokyo");

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
