use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;

/// How adapter nodes for type-mismatched links are inserted.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AdapterMode {
    /// Adapters exist only for the duration of one run.
    #[default]
    Virtual,
    /// Adapters are added to the user graph as real nodes and links.
    Materialize,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutionConfig {
    pub adapter_mode: AdapterMode,
    /// Count and time every function call and build a timing report.
    pub instrument_timing: bool,
    /// Log the timing report at info level after each run.
    pub log_timing_report: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            adapter_mode: AdapterMode::Virtual,
            instrument_timing: true,
            log_timing_report: false,
        }
    }
}

impl ExecutionConfig {
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ExecutionError> {
        Ok(toml::from_str(toml_str)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ExecutionError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Loads a config file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ExecutionError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let config = Self::from_toml_str(&fs::read_to_string(path)?)?;
        info!("Loaded execution config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = ExecutionConfig::from_toml_str("adapter_mode = \"materialize\"").unwrap();
        assert_eq!(config.adapter_mode, AdapterMode::Materialize);
        assert!(config.instrument_timing);
        assert!(!config.log_timing_report);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = ExecutionConfig {
            adapter_mode: AdapterMode::Materialize,
            instrument_timing: false,
            log_timing_report: true,
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(ExecutionConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        assert!(matches!(
            ExecutionConfig::from_toml_str("adapter_mode = \"eager\""),
            Err(ExecutionError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = ExecutionConfig::load("/nonexistent/rxgraph.toml").unwrap();
        assert_eq!(config, ExecutionConfig::default());
    }
}
