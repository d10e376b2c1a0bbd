// Configuration Management
//
// This crate handles all configuration loading for the inference gateway.
// It provides:
// - Environment-driven configuration sections
// - The optional YAML gateway file (API keys, organization defaults, model pins)
//
// This keeps configuration concerns separate from routing logic.

use std::path::Path;
use thiserror::Error;

pub mod types;

// Re-export all configuration types
pub use types::*;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to read configuration file: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {source}")]
    ParseError {
        #[from]
        source: serde_yaml::Error,
    },

    #[error("Invalid environment configuration: {0}")]
    Environment(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl GatewayFile {
    /// Load the gateway file from YAML
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let file: GatewayFile = serde_yaml::from_str(&content)?;
        file.validate()?;
        Ok(file)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for key in &self.api_keys {
            if key.key_hash.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "api key for caller '{}' has an empty key_hash",
                    key.caller_id
                )));
            }
        }
        for pin in &self.model_pins {
            if pin.model.is_empty() || pin.upstream_id.is_empty() {
                return Err(ConfigError::Invalid(
                    "model pins need both model and upstream_id".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Main configuration loading interface
impl GatewayConfig {
    /// Load configuration from the environment, then merge the gateway file
    /// named by `GATEWAY_CONFIG_FILE` if one is set
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_env().map_err(ConfigError::Environment)?;

        if let Ok(path) = std::env::var("GATEWAY_CONFIG_FILE") {
            config.gateway = GatewayFile::load_from_file(path)?;
        }

        Ok(config)
    }
}
