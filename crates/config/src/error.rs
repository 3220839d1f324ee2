//! Error types for the configuration system

use std::path::PathBuf;
use storystream_core::AppError;
use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write config file
    #[error("Failed to write config file at {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse config file
    #[error("Failed to parse config file at {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Failed to serialize config
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Config contains invalid values
    #[error("Config validation failed: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),

    /// Failed to create config directory
    #[error("Failed to create config directory at {path}: {source}")]
    DirectoryCreationError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Config directory path could not be determined
    #[error("Could not determine config directory path: {reason}")]
    PathResolutionError { reason: String },

    /// Failed to keep a copy of the previous config file
    #[error("Failed to backup config file: {source}")]
    BackupError { source: std::io::Error },

    /// An environment override could not be parsed
    #[error("Environment variable {name} has invalid value '{value}'")]
    InvalidOverride { name: String, value: String },
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ParseError { path, .. } => AppError::ConfigurationCorrupted { path },
            ConfigError::Invalid(mut errors) if !errors.is_empty() => errors.remove(0).into(),
            ConfigError::InvalidOverride { name, value } => AppError::InvalidConfiguration {
                setting: name,
                value,
                reason: "could not be parsed".to_string(),
            },
            other => AppError::InternalError {
                message: other.to_string(),
            },
        }
    }
}

/// Validation error for a specific config field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Path to the field (e.g., "engine.command_timeout_ms")
    pub field: String,

    /// Human-readable error message
    pub message: String,

    /// The invalid value, if available
    pub value: Option<String>,
}

impl ValidationError {
    /// Creates a new validation error
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: None,
        }
    }

    /// Creates a validation error with the invalid value
    pub fn with_value(
        field: impl Into<String>,
        message: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: Some(value.to_string()),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Field '{}': {}", self.field, self.message)?;
        if let Some(ref value) = self.value {
            write!(f, " (got: {})", value)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::InvalidConfiguration {
            setting: err.field,
            value: err.value.unwrap_or_default(),
            reason: err.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storystream_core::RecoveryAction;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new("engine.command_timeout_ms", "must be positive");
        assert_eq!(
            err.to_string(),
            "Field 'engine.command_timeout_ms': must be positive"
        );
    }

    #[test]
    fn test_validation_error_with_value() {
        let err = ValidationError::with_value("retry.max_attempts", "must be between 1 and 10", 0);
        assert_eq!(
            err.to_string(),
            "Field 'retry.max_attempts': must be between 1 and 10 (got: 0)"
        );
    }

    #[test]
    fn test_invalid_lists_every_field() {
        let err = ConfigError::Invalid(vec![
            ValidationError::new("a", "bad"),
            ValidationError::new("b", "worse"),
        ]);
        let text = err.to_string();
        assert!(text.contains("'a'"));
        assert!(text.contains("'b'"));
    }

    #[test]
    fn test_validation_error_restores_defaults() {
        let app: AppError =
            ValidationError::with_value("engine.default_speed", "out of range", 9.0).into();
        assert_eq!(app.recovery_action(), RecoveryAction::RestoreDefaults);
        assert!(app.user_message().contains("engine.default_speed"));
    }

    #[test]
    fn test_parse_error_is_corruption() {
        let source = toml::from_str::<toml::Table>("= nope").unwrap_err();
        let err = ConfigError::ParseError {
            path: PathBuf::from("/tmp/config.toml"),
            source,
        };
        let app: AppError = err.into();
        assert!(matches!(app, AppError::ConfigurationCorrupted { .. }));
    }
}
