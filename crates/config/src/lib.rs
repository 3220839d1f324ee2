//! StoryStream Configuration System
//!
//! Settings for the playback engine live in TOML sections, each a type
//! implementing [`ConfigSection`]. Invalid files fall back to defaults with a
//! warning, and writes are atomic.
//!
//! # Example
//!
//! ```rust,no_run
//! use storystream_config::{Config, ConfigManager};
//!
//! let manager = ConfigManager::new().expect("Failed to initialize config");
//! let config = manager.load().unwrap_or_else(|e| {
//!     eprintln!("Config error: {}, using defaults", e);
//!     Config::default()
//! });
//!
//! let settings = config.engine.to_settings();
//! println!("Seek timeout: {:?}", settings.command_timeout);
//! ```

mod error;
mod manager;
mod persistence;
mod validation;

// Config sections
pub mod app_config;
pub mod engine_config;
pub mod retry_config;

pub use error::{ConfigError, ConfigResult, ValidationError};
pub use manager::{apply_env_overrides, ConfigManager};
pub use validation::{ConfigSection, Validator};

pub use app_config::{AppConfig, LogLevel};
pub use engine_config::EngineConfig;
pub use retry_config::RetryConfig;

use serde::{Deserialize, Serialize};

/// Current config file format version
pub const CONFIG_VERSION: u32 = 1;

/// Root configuration structure
///
/// Missing sections and fields take their default values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Config file format version
    pub version: u32,

    /// Application-level settings
    pub app: AppConfig,

    /// Playback engine timing and thresholds
    pub engine: EngineConfig,

    /// Backoff for network-facing collaborators
    pub retry: RetryConfig,
}

impl Config {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the entire configuration
    ///
    /// Returns all validation errors found across all sections.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        for result in [self.app.validate(), self.engine.validate(), self.retry.validate()] {
            if let Err(mut e) = result {
                errors.append(&mut e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Merges this config with another, preferring values from `other`
    ///
    /// Override chain: defaults < file < env vars < CLI args
    pub fn merge(&mut self, other: Config) {
        self.app.merge(other.app);
        self.engine.merge(other.engine);
        self.retry.merge(other.retry);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            app: AppConfig::default(),
            engine: EngineConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_version_is_set() {
        let config = Config::default();
        assert_eq!(config.version, CONFIG_VERSION);
    }

    #[test]
    fn test_config_merge() {
        let mut base = Config::default();
        let mut override_config = Config::default();
        override_config.engine.command_timeout_ms = 8_000;
        override_config.retry.max_attempts = 6;

        base.merge(override_config);
        assert_eq!(base.engine.command_timeout_ms, 8_000);
        assert_eq!(base.retry.max_attempts, 6);
    }

    #[test]
    fn test_errors_collected_across_sections() {
        let mut config = Config::default();
        config.engine.command_timeout_ms = 0;
        config.retry.max_attempts = 0;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("[engine]\ncommand_timeout_ms = 7000\n").unwrap();
        assert_eq!(config.engine.command_timeout_ms, 7_000);
        assert_eq!(config.engine.persist_debounce_ms, 3_000);
        assert_eq!(config.retry, RetryConfig::default());
    }
}
