//! Application configuration.
//!
//! Aggregates configuration for the stream consumer into a single Config
//! struct that can be loaded from YAML files or environment variables.
//! The library core never reads the environment; only binaries call
//! [`Config::load`] and pass the pieces down.

mod storage;
mod stream;

pub use storage::{AttributeNames, AwsConfig};
pub use stream::{StreamConfig, DEFAULT_POLL_INTERVAL_SECS};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "marker-sync.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "MARKER_SYNC_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "MARKER_SYNC";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "MARKER_SYNC_LOG";

use serde::Deserialize;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Change feed polling and replay settings.
    pub stream: StreamConfig,
    /// Table attribute names.
    pub attributes: AttributeNames,
    /// AWS client settings.
    pub aws: AwsConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `marker-sync.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the consumer cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream.table_name.is_empty() {
            return Err(ConfigError::Invalid("stream.table_name is empty".to_string()));
        }
        if !(self.stream.poll_interval_secs.is_finite() && self.stream.poll_interval_secs > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "stream.poll_interval_secs must be positive, got {}",
                self.stream.poll_interval_secs
            )));
        }
        if self.stream.page_size == Some(0) {
            return Err(ConfigError::Invalid("stream.page_size must be at least 1".to_string()));
        }
        Ok(())
    }
}
