//! Configuration file
//!
//! Stored as JSON, e.g. `airiq.json`:
//!
//! ```json
//! {
//!   "pm":  { "port": "/dev/ttyS0", "baud_rate": 9600, "timeout_ms": 2000 },
//!   "co2": { "port": "/dev/ttyUSB0", "timeout_ms": 1000 },
//!   "polling": { "pm_interval_ms": 2000, "co2_interval_ms": 5000 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::protocol::SensorLinkConfig;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid configuration JSON
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A command needs a sensor section that is absent
    #[error("No {0} sensor configured")]
    MissingSensor(&'static str),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AirIqConfig {
    /// PMS5003 link
    #[serde(default)]
    pub pm: Option<SensorLinkConfig>,

    /// MH-Z19C link
    #[serde(default)]
    pub co2: Option<SensorLinkConfig>,

    /// Polling cadence
    #[serde(default)]
    pub polling: PollingSettings,
}

/// How often and how long to poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingSettings {
    /// Interval between PMS5003 reads
    #[serde(default = "default_pm_interval_ms")]
    pub pm_interval_ms: u64,

    /// Interval between MH-Z19C reads
    #[serde(default = "default_co2_interval_ms")]
    pub co2_interval_ms: u64,

    /// Stop after this many seconds (unbounded if absent)
    #[serde(default)]
    pub duration_secs: Option<u64>,
}

fn default_pm_interval_ms() -> u64 {
    2000
}

fn default_co2_interval_ms() -> u64 {
    5000
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            pm_interval_ms: default_pm_interval_ms(),
            co2_interval_ms: default_co2_interval_ms(),
            duration_secs: None,
        }
    }
}

impl PollingSettings {
    /// PMS5003 polling interval
    pub fn pm_interval(&self) -> Duration {
        Duration::from_millis(self.pm_interval_ms)
    }

    /// MH-Z19C polling interval
    pub fn co2_interval(&self) -> Duration {
        Duration::from_millis(self.co2_interval_ms)
    }

    /// Session limit, if any
    pub fn duration(&self) -> Option<Duration> {
        self.duration_secs.map(Duration::from_secs)
    }
}

impl AirIqConfig {
    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// The PMS5003 link, or an error naming what is missing
    pub fn pm_link(&self) -> Result<&SensorLinkConfig, ConfigError> {
        self.pm.as_ref().ok_or(ConfigError::MissingSensor("PM"))
    }

    /// The MH-Z19C link, or an error naming what is missing
    pub fn co2_link(&self) -> Result<&SensorLinkConfig, ConfigError> {
        self.co2.as_ref().ok_or(ConfigError::MissingSensor("CO2"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AirIqConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AirIqConfig::default());
        assert_eq!(config.polling.co2_interval(), Duration::from_secs(5));
        assert!(matches!(
            config.pm_link(),
            Err(ConfigError::MissingSensor("PM"))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("airiq.json");

        let config = AirIqConfig {
            pm: Some(SensorLinkConfig::new("/dev/ttyS0")),
            co2: Some(SensorLinkConfig::new("/dev/ttyUSB0").with_timeout(Duration::from_secs(1))),
            polling: PollingSettings {
                duration_secs: Some(60),
                ..PollingSettings::default()
            },
        };
        config.save(&path).unwrap();

        let loaded = AirIqConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.co2_link().unwrap().timeout_ms, 1000);
        assert_eq!(loaded.polling.duration(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(AirIqConfig::load(&path), Err(ConfigError::Parse(_))));
    }
}
