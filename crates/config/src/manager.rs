//! Configuration manager - main API for config operations

use crate::persistence::ConfigPersistence;
use crate::{Config, ConfigError, ConfigResult};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Main configuration manager
///
/// This is the primary interface for loading, saving, and managing configuration.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    persistence: ConfigPersistence,
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Creates a new config manager using the platform config directory
    ///
    /// - Linux: `~/.config/storystream/`
    /// - macOS: `~/Library/Application Support/storystream/`
    /// - Windows: `%APPDATA%\storystream\`
    pub fn new() -> ConfigResult<Self> {
        let config_dir = ProjectDirs::from("", "", "storystream")
            .map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
            .ok_or_else(|| ConfigError::PathResolutionError {
                reason: "Could not determine user config directory".to_string(),
            })?;
        Ok(Self::with_directory(config_dir))
    }

    /// Creates a config manager with a custom config directory
    pub fn with_directory(config_dir: PathBuf) -> Self {
        let persistence = ConfigPersistence::new(config_dir.join("config.toml"));
        Self {
            persistence,
            config_dir,
        }
    }

    /// Creates a config manager for an explicit config file
    pub fn with_file(config_path: PathBuf) -> Self {
        let config_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            persistence: ConfigPersistence::new(config_path),
            config_dir,
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> &Path {
        self.persistence.path()
    }

    /// Loads the configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file is corrupted, returns an error.
    pub fn load(&self) -> ConfigResult<Config> {
        self.persistence.load()
    }

    /// Loads the configuration, falling back to defaults on any error
    pub fn load_or_default(&self) -> Config {
        match self.load() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load config: {}, using defaults", e);
                Config::default()
            }
        }
    }

    /// Validates and saves the configuration atomically
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        self.persistence.save(config)
    }

    /// Loads, modifies and saves the configuration
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use storystream_config::ConfigManager;
    /// # let manager = ConfigManager::new().unwrap();
    /// manager.update(|config| {
    ///     config.engine.command_timeout_ms = 8_000;
    /// }).expect("Failed to update config");
    /// ```
    pub fn update<F>(&self, update_fn: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config),
    {
        let mut config = self.load()?;
        update_fn(&mut config);
        self.save(&config)
    }

    /// Writes the default config if no file exists
    ///
    /// Returns Ok(true) if a new file was created.
    pub fn initialize(&self) -> ConfigResult<bool> {
        if self.config_path().exists() {
            log::info!(
                "Config file already exists at {}",
                self.config_path().display()
            );
            return Ok(false);
        }

        self.save(&Config::default())?;
        Ok(true)
    }

    /// Overwrites the config file with default values
    pub fn reset(&self) -> ConfigResult<()> {
        self.save(&Config::default())
    }

    /// Returns every validation problem in the current config file
    pub fn validate(&self) -> ConfigResult<Vec<String>> {
        let config = self.load()?;

        match config.validate() {
            Ok(()) => Ok(Vec::new()),
            Err(errors) => Ok(errors.iter().map(|e| e.to_string()).collect()),
        }
    }

    /// Loads the config and applies `STORYSTREAM_*` environment overrides
    pub fn load_with_env_overrides(&self) -> ConfigResult<Config> {
        let mut config = self.load()?;
        apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

        if let Err(errors) = config.validate() {
            log::warn!(
                "Config validation warnings after env overrides: {}",
                ConfigError::Invalid(errors)
            );
        }

        Ok(config)
    }
}

/// Applies `STORYSTREAM_SECTION_FIELD` overrides read through `lookup`
///
/// Unset variables are skipped. A set variable that does not parse is an
/// error rather than being silently ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    fn parse<T: FromStr>(name: &str, value: String) -> ConfigResult<T> {
        value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidOverride {
                name: name.to_string(),
                value,
            })
    }

    macro_rules! override_field {
        ($name:literal, $field:expr) => {
            if let Some(value) = lookup($name) {
                $field = parse($name, value)?;
                log::info!("Config override from {}", $name);
            }
        };
    }

    override_field!("STORYSTREAM_APP_LOG_LEVEL", config.app.log_level);
    override_field!("STORYSTREAM_APP_DEBUG_MODE", config.app.debug_mode);

    override_field!(
        "STORYSTREAM_ENGINE_PERSIST_DEBOUNCE_MS",
        config.engine.persist_debounce_ms
    );
    override_field!(
        "STORYSTREAM_ENGINE_GATE_TIMEOUT_MS",
        config.engine.gate_timeout_ms
    );
    override_field!(
        "STORYSTREAM_ENGINE_COMMAND_TIMEOUT_MS",
        config.engine.command_timeout_ms
    );
    override_field!(
        "STORYSTREAM_ENGINE_STALE_REJECTION_ENABLED",
        config.engine.stale_rejection_enabled
    );
    override_field!(
        "STORYSTREAM_ENGINE_DEFAULT_SPEED",
        config.engine.default_speed
    );

    override_field!("STORYSTREAM_RETRY_MAX_ATTEMPTS", config.retry.max_attempts);
    override_field!(
        "STORYSTREAM_RETRY_INITIAL_DELAY_MS",
        config.retry.initial_delay_ms
    );
    override_field!("STORYSTREAM_RETRY_MAX_DELAY_MS", config.retry.max_delay_ms);
    override_field!(
        "STORYSTREAM_RETRY_ATTEMPT_TIMEOUT_MS",
        config.retry.attempt_timeout_ms
    );

    Ok(())
}
