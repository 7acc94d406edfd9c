//! Settings management
//!
//! Settings are stored as JSON. Every field has a default, so a partial file
//! (or no file at all) is valid.

use latch_lifecycle::LifecycleSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming the settings file to load.
pub const SETTINGS_ENV: &str = "LATCH_SETTINGS";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Host settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub lifecycle: LifecycleSettings,
    pub logging: LoggingSettings,
    pub simulation: SimulationSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directive, used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Number of ticks the host runs before shutting down.
    pub ticks: u64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self { ticks: 5 }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json(&json)?;
        tracing::info!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Load from `path` if given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, SettingsError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                tracing::debug!("no settings file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from the file named by [`SETTINGS_ENV`], if set.
    pub fn from_env() -> Result<Self, SettingsError> {
        let path = std::env::var_os(SETTINGS_ENV).map(PathBuf::from);
        Self::load_or_default(path.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latch_lifecycle::ecs::DefectPolicy;

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let settings = Settings::from_json(
            r#"{ "lifecycle": { "defect_policy": "fail_forward" }, "simulation": { "ticks": 12 } }"#,
        )
        .unwrap();

        assert_eq!(settings.lifecycle.defect_policy, DefectPolicy::FailForward);
        assert!(!settings.lifecycle.freeze_registry);
        assert_eq!(settings.simulation.ticks, 12);
        assert_eq!(settings.logging, LoggingSettings::default());
    }

    #[test]
    fn json_round_trip() {
        let mut settings = Settings::default();
        settings.lifecycle.freeze_registry = true;
        settings.logging.filter = "latch_lifecycle=trace".to_string();

        let json = settings.to_json().unwrap();
        assert_eq!(Settings::from_json(&json).unwrap(), settings);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = Settings::from_json("{ not json").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Settings::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
    }

    #[test]
    fn no_path_means_defaults() {
        assert_eq!(Settings::load_or_default(None).unwrap(), Settings::default());
    }
}
