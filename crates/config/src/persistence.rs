//! File system persistence for configuration
//!
//! Writes go through a temporary file in the same directory followed by a
//! rename, so a crash never leaves a half-written config. The previous file
//! is kept as `config.toml.backup`.

use crate::{Config, ConfigError, ConfigResult, CONFIG_VERSION};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Handles configuration file persistence
#[derive(Debug, Clone)]
pub(crate) struct ConfigPersistence {
    config_path: PathBuf,
}

impl ConfigPersistence {
    pub(crate) fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.config_path
    }

    pub(crate) fn backup_path(&self) -> PathBuf {
        self.config_path.with_extension("toml.backup")
    }

    /// Loads configuration from file
    ///
    /// A missing file yields the defaults. An empty or unparsable file is an
    /// error. Out-of-range values only produce a warning so the user can fix
    /// the file by hand.
    pub(crate) fn load(&self) -> ConfigResult<Config> {
        if !self.config_path.exists() {
            log::info!(
                "Config file not found at {}, using defaults",
                self.config_path.display()
            );
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(&self.config_path).map_err(|source| {
            ConfigError::ReadError {
                path: self.config_path.clone(),
                source,
            }
        })?;

        // An empty file is a truncated write, not a request for defaults
        if contents.trim().is_empty() {
            return Err(ConfigError::ReadError {
                path: self.config_path.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "Config file is empty or contains only whitespace",
                ),
            });
        }

        let mut config: Config =
            toml::from_str(&contents).map_err(|source| ConfigError::ParseError {
                path: self.config_path.clone(),
                source,
            })?;

        if config.version > CONFIG_VERSION {
            log::warn!(
                "Config version {} is newer than supported version {}, unknown fields are ignored",
                config.version,
                CONFIG_VERSION
            );
        }
        config.version = CONFIG_VERSION;

        if let Err(errors) = config.validate() {
            log::warn!(
                "Config validation warnings: {}",
                ConfigError::Invalid(errors)
            );
        }

        Ok(config)
    }

    /// Validates and saves configuration atomically
    pub(crate) fn save(&self, config: &Config) -> ConfigResult<()> {
        config.validate().map_err(ConfigError::Invalid)?;

        let dir = self
            .config_path
            .parent()
            .ok_or_else(|| ConfigError::PathResolutionError {
                reason: "Config path has no parent directory".to_string(),
            })?;
        ensure_directory_exists(dir)?;

        if self.config_path.exists() {
            let backup_path = self.backup_path();
            fs::copy(&self.config_path, &backup_path)
                .map_err(|source| ConfigError::BackupError { source })?;
            log::debug!("Backed up config to {}", backup_path.display());
        }

        let contents = toml::to_string_pretty(config)?;
        self.write_atomic(dir, &contents)?;

        log::info!("Config saved to {}", self.config_path.display());
        Ok(())
    }

    fn write_atomic(&self, dir: &Path, contents: &str) -> ConfigResult<()> {
        let write_error = |source| ConfigError::WriteError {
            path: self.config_path.clone(),
            source,
        };

        let mut temp_file = NamedTempFile::new_in(dir).map_err(write_error)?;
        temp_file
            .write_all(contents.as_bytes())
            .map_err(write_error)?;
        temp_file.flush().map_err(write_error)?;
        temp_file
            .persist(&self.config_path)
            .map_err(|e| write_error(e.error))?;
        Ok(())
    }
}

fn ensure_directory_exists(path: &Path) -> ConfigResult<()> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|source| ConfigError::DirectoryCreationError {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Created config directory: {}", path.display());
    }
    Ok(())
}
