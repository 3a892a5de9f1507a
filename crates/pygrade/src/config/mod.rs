use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

mod loader;

/// Example configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../pygrade.example.toml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Config for the grading harness
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// URL the runtime artifact is fetched from on first use.
    pub artifact_url: String,

    /// Directory for the cached artifact (platform cache dir if unset).
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Wall-clock bound per execution phase, in seconds.
    ///
    /// A phase exceeding it is treated as a fault; the run still resolves
    /// to a result.
    #[serde(default = "default_phase_timeout")]
    pub phase_timeout: f64,
}

impl Config {
    /// Create a config from the embedded example.
    pub fn new() -> Self {
        Self::default()
    }

    /// The per-phase timeout as a [`Duration`].
    pub fn phase_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.phase_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

fn default_phase_timeout() -> f64 {
    30.0
}
