//! Error types and recovery strategies for StoryStream
//!
//! This module provides the error taxonomy shared by every layer that
//! surfaces failures to the user, with three severity tiers:
//! - **Recoverable**: Can be automatically retried (network timeouts, etc.)
//! - **Degraded**: The command failed but playback state is intact
//! - **Fatal**: Requires app restart or user intervention
//!
//! Each error includes a recovery action and a user-facing message so the
//! command layer never has to fail silently.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Recovery actions that can be taken when an error occurs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Retry the operation immediately (e.g., transient network glitch)
    RetryImmediate,
    /// Retry with exponential backoff (e.g., server temporarily unavailable)
    RetryWithBackoff,
    /// Stop playback and tell the user
    StopPlayback,
    /// Drop the offending input and keep the current state
    KeepCurrentState,
    /// Fall back to default settings
    RestoreDefaults,
    /// No automatic recovery - user intervention required
    UserIntervention,
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetryImmediate => write!(f, "Retrying immediately"),
            Self::RetryWithBackoff => write!(f, "Retrying with backoff"),
            Self::StopPlayback => write!(f, "Stopping playback"),
            Self::KeepCurrentState => write!(f, "Keeping current state"),
            Self::RestoreDefaults => write!(f, "Restoring defaults"),
            Self::UserIntervention => write!(f, "User intervention required"),
        }
    }
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Error can be automatically recovered from
    Recoverable,
    /// Command failed but the app can continue
    Degraded,
    /// Critical error requiring restart or user action
    Fatal,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recoverable => write!(f, "Recoverable"),
            Self::Degraded => write!(f, "Degraded"),
            Self::Fatal => write!(f, "Fatal"),
        }
    }
}

/// Main error type for StoryStream
#[derive(Error, Debug)]
pub enum AppError {
    // ===== Network Errors =====
    /// Network request failed
    #[error("Network error: {message}")]
    NetworkError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Network wait exceeded its bound
    #[error("Network timeout after {millis}ms: {operation}")]
    NetworkTimeout { operation: String, millis: u64 },

    /// Every retry attempt of a network call failed
    #[error("Network unavailable after {attempts} attempts: {reason}")]
    NetworkUnavailable { attempts: u32, reason: String },

    // ===== Playback Errors =====
    /// A command needs a loaded book but none is loaded
    #[error("No media loaded: cannot {operation}")]
    NoMediaLoaded { operation: String },

    /// A playback command was not acknowledged in time
    #[error("Command '{command}' timed out after {millis}ms")]
    CommandTimeout { command: String, millis: u64 },

    /// The media engine refused a command
    #[error("Media engine error: {message}")]
    MediaEngineError { message: String },

    /// A position update looked like a stale read and was dropped
    #[error(
        "Stale position rejected: track {track_index} at {position_ms}ms (was {previous_ms}ms)"
    )]
    StalePositionRejected {
        track_index: usize,
        position_ms: u64,
        previous_ms: u64,
    },

    // ===== Configuration/Settings Errors =====
    /// Invalid configuration
    #[error("Invalid configuration: {setting} = '{value}' ({reason})")]
    InvalidConfiguration {
        setting: String,
        value: String,
        reason: String,
    },

    /// Configuration file corrupted
    #[error("Configuration corrupted: {path}")]
    ConfigurationCorrupted { path: PathBuf },

    // ===== Generic Errors =====
    /// Generic internal error
    #[error("Internal error: {message}")]
    InternalError { message: String },

    /// Operation cancelled, usually because the loaded book changed
    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },
}

impl AppError {
    /// Returns the severity level of this error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NetworkError { .. } | Self::NetworkTimeout { .. } => ErrorSeverity::Recoverable,

            Self::NetworkUnavailable { .. }
            | Self::NoMediaLoaded { .. }
            | Self::CommandTimeout { .. }
            | Self::MediaEngineError { .. }
            | Self::StalePositionRejected { .. }
            | Self::InvalidConfiguration { .. }
            | Self::Cancelled { .. } => ErrorSeverity::Degraded,

            Self::ConfigurationCorrupted { .. } | Self::InternalError { .. } => {
                ErrorSeverity::Fatal
            }
        }
    }

    /// Returns the recommended recovery action for this error
    pub fn recovery_action(&self) -> RecoveryAction {
        match self {
            Self::NetworkTimeout { .. } => RecoveryAction::RetryImmediate,
            Self::NetworkError { .. } => RecoveryAction::RetryWithBackoff,
            Self::NetworkUnavailable { .. } => RecoveryAction::StopPlayback,
            Self::StalePositionRejected { .. } | Self::Cancelled { .. } => {
                RecoveryAction::KeepCurrentState
            }
            Self::InvalidConfiguration { .. } | Self::ConfigurationCorrupted { .. } => {
                RecoveryAction::RestoreDefaults
            }
            // User intervention required
            Self::NoMediaLoaded { .. }
            | Self::CommandTimeout { .. }
            | Self::MediaEngineError { .. }
            | Self::InternalError { .. } => RecoveryAction::UserIntervention,
        }
    }

    /// Returns a user-friendly error message suitable for display in the UI
    pub fn user_message(&self) -> String {
        match self {
            Self::NetworkError { .. } | Self::NetworkTimeout { .. } => {
                "Cannot reach the server. Please check your connection.".to_string()
            }
            Self::NetworkUnavailable { .. } => {
                "The server could not be reached. Playback has been stopped.".to_string()
            }
            Self::NoMediaLoaded { .. } => "Nothing is playing right now.".to_string(),
            Self::CommandTimeout { command, .. } => {
                format!("The player did not respond to '{}'. Please try again.", command)
            }
            Self::MediaEngineError { .. } => {
                "The player could not complete that action.".to_string()
            }
            Self::StalePositionRejected { .. } => {
                "Ignored an out-of-date playback position.".to_string()
            }
            Self::InvalidConfiguration { setting, .. } => {
                format!("The setting '{}' is invalid and was reset.", setting)
            }
            Self::ConfigurationCorrupted { .. } => {
                "Settings file is damaged. Defaults will be used.".to_string()
            }
            Self::InternalError { .. } => {
                "An unexpected error occurred. Please try again.".to_string()
            }
            Self::Cancelled { .. } => "Operation was cancelled.".to_string(),
        }
    }

    /// Returns true if this error should be logged at ERROR level
    pub fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Fatal
    }

    /// Returns true if this error can be automatically retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.recovery_action(),
            RecoveryAction::RetryImmediate | RecoveryAction::RetryWithBackoff
        )
    }

    /// Helper to create a network error from any error type
    pub fn network<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Helper to create a "no media loaded" error for a command
    pub fn no_media(operation: impl Into<String>) -> Self {
        Self::NoMediaLoaded {
            operation: operation.into(),
        }
    }
}

/// Convenience type alias for Results using AppError
pub type Result<T> = std::result::Result<T, AppError>;
