use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{PlayerError, Result};

/// Poll cadence of the sync loop, 50 Hz.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 20;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sync: SyncConfig,
    pub log: LogConfig,
    pub cues: CueConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing fields keep their defaults.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|err| PlayerError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sync.poll_interval_ms == 0 {
            return Err(PlayerError::Config(
                "sync.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings of the sync loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub poll_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is not set.
    pub default_filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CueConfig {
    /// Ring the terminal bell for cues.
    pub audible: bool,
}

impl Default for CueConfig {
    fn default() -> Self {
        Self { audible: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_poll_at_fifty_hertz() {
        let config = AppConfig::default();
        assert_eq!(config.sync.poll_interval(), Duration::from_millis(20));
        assert_eq!(config.log.default_filter, "info");
        assert!(config.cues.audible);
    }

    #[test]
    fn partial_files_keep_defaults() {
        let config = AppConfig::from_json_str(r#"{ "cues": { "audible": false } }"#).unwrap();
        assert!(!config.cues.audible);
        assert_eq!(config.sync.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
    }

    #[test]
    fn rejects_zero_interval_and_bad_json() {
        let err = AppConfig::from_json_str(r#"{ "sync": { "poll_interval_ms": 0 } }"#).unwrap_err();
        assert!(matches!(err, PlayerError::Config(_)));
        assert!(matches!(
            AppConfig::from_json_str("sync = 20"),
            Err(PlayerError::Config(_))
        ));
    }

    #[test]
    fn reads_config_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("player.json");
        std::fs::write(&path, r#"{ "sync": { "poll_interval_ms": 10 } }"#).unwrap();

        let config = AppConfig::from_path(&path).unwrap();
        assert_eq!(config.sync.poll_interval_ms, 10);
        assert!(matches!(
            AppConfig::from_path(dir.path().join("absent.json")),
            Err(PlayerError::Io(_))
        ));
    }
}
