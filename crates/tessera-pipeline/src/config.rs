// crates/tessera-pipeline/src/config.rs
//
// Runtime configuration for the epoch pipeline.
// Loaded from a TOML file; every missing key falls back to its default.

use std::fs;

use serde::{Deserialize, Serialize};
use tessera_core::{ProtocolParams, TesseraError};

/// Pipeline configuration: log level plus the static protocol parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub params: ProtocolParams,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            params: ProtocolParams::default(),
        }
    }
}

impl PipelineConfig {
    /// Load and validate configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns `TesseraError::Config` if the file cannot be read or parsed,
    /// and `TesseraError::InvalidParams` if the parameters fail validation.
    pub fn load(path: &str) -> Result<Self, TesseraError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| TesseraError::Config(format!("Failed to read {}: {}", path, e)))?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Same as [`PipelineConfig::load`], minus file access.
    pub fn from_toml_str(contents: &str) -> Result<Self, TesseraError> {
        let config: PipelineConfig = toml::from_str(contents)
            .map_err(|e| TesseraError::Config(format!("Failed to parse config: {}", e)))?;
        config.params.validate()?;
        Ok(config)
    }
}
