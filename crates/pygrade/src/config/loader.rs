//! Configuration file loading
//!
//! Handles loading and parsing configuration files using the config crate.

use std::path::Path;

use config::{Config as ConfigBuilder, File, FileFormat};

use crate::config::{Config, ConfigError};

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = ConfigBuilder::builder()
            .add_source(File::from(path))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        if self.artifact_url.is_empty() {
            return Err(ConfigError::Invalid("artifact_url is empty".to_string()));
        }
        if !self.artifact_url.starts_with("http://") && !self.artifact_url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "artifact_url '{}' is not an http(s) URL",
                self.artifact_url
            )));
        }
        if !self.phase_timeout.is_finite() || self.phase_timeout <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "phase_timeout must be a positive number of seconds, got {}",
                self.phase_timeout
            )));
        }
        Ok(())
    }
}
