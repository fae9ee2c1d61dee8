//! Configuration for NeuroDrive.

use crate::core::{DEFAULT_DRIVER_NAME, DEFAULT_SEQUENCE_LENGTH};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Main configuration for the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of samples per classification window
    pub sequence_length: usize,

    /// Address the server binds to
    pub host: String,

    /// Port the server binds to (0 for random)
    pub port: u16,

    /// Path for the driving log and statistics
    pub data_path: PathBuf,

    /// Path of the trained model file
    pub model_path: PathBuf,

    /// Driver name used when a report request names nobody
    pub default_driver_name: String,

    /// IANA timezone for report timestamps
    pub timezone: String,

    /// Command line of the external sample producer started on request
    pub simulator_command: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("neurodrive");

        Self {
            sequence_length: DEFAULT_SEQUENCE_LENGTH,
            host: "127.0.0.1".to_string(),
            port: 5000,
            model_path: data_dir.join("models").join("driving_model.json"),
            data_path: data_dir,
            default_driver_name: DEFAULT_DRIVER_NAME.to_string(),
            timezone: "UTC".to_string(),
            simulator_command: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::Parse(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(&config_path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("neurodrive")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)?;
        Ok(())
    }

    /// Location of the driving log.
    pub fn log_path(&self) -> PathBuf {
        self.data_path.join("driving_log.jsonl")
    }

    /// Location of the persisted pipeline statistics.
    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("stats.json")
    }

    /// Parsed report timezone.
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimezone(self.timezone.clone()))
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialize error: {0}")]
    Serialize(String),
    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sequence_length, 5);
        assert_eq!(config.port, 5000);
        assert_eq!(config.default_driver_name, "Osmi");
        assert!(config.simulator_command.is_empty());
        assert!(config.log_path().ends_with("driving_log.jsonl"));
        assert_eq!(config.timezone().unwrap(), Tz::UTC);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"port": 8080, "timezone": "Europe/Berlin"}"#).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.sequence_length, 5);
        assert_eq!(config.timezone().unwrap(), chrono_tz::Europe::Berlin);
    }

    #[test]
    fn test_invalid_timezone() {
        let config = Config {
            timezone: "Mars/Olympus_Mons".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            config.timezone(),
            Err(ConfigError::InvalidTimezone(_))
        ));
    }
}
