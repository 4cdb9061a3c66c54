//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `screenstate.toml` in the working directory unless another path
//! is given. Every field has a sensible default so the file is optional.
//! Environment variables take precedence over file values.

use serde::Deserialize;

use screenstate_app::config::StoreConfig;
use screenstate_domain::variable::ConflictStrategy;

/// Default configuration file name.
pub const DEFAULT_PATH: &str = "screenstate.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Variable store settings, shared by the global and screen stores.
    pub store: StoreConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `path` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("SCREENSTATE_SYNC_ENABLED")
            && let Ok(enabled) = val.parse()
        {
            self.store.sync_enabled = enabled;
        }
        if let Some(val) = var("SCREENSTATE_SYNC_INTERVAL_SECS")
            && let Ok(secs) = val.parse()
        {
            self.store.sync_interval_secs = secs;
        }
        if let Some(val) = var("SCREENSTATE_CONFLICT_STRATEGY")
            && let Some(strategy) = parse_strategy(&val)
        {
            self.store.conflict_strategy = strategy;
        }
        if let Some(val) = var("SCREENSTATE_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.store.sync_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "store.sync_interval_secs must be non-zero".to_string(),
            ));
        }
        if self.store.max_value_size == 0 {
            return Err(ConfigError::Validation(
                "store.max_value_size must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_strategy(value: &str) -> Option<ConflictStrategy> {
    match value {
        "db_as_source_of_truth" => Some(ConflictStrategy::DbAsSourceOfTruth),
        "last_write_wins" => Some(ConflictStrategy::LastWriteWins),
        _ => None,
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "screenstate_host=info,screenstate_app=info,screenstate_adapter_store_actions=info"
                .to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
