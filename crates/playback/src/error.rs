//! Error types for playback commands

use storystream_core::AppError;
use thiserror::Error;

/// Result type for playback operations
pub type PlaybackResult<T> = Result<T, PlaybackError>;

/// Failures the controller and command layers can produce
///
/// Pure position arithmetic never fails; these only arise where a command
/// waits on the state gate or on the media engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    /// The command needs a loaded book
    #[error("No media loaded: cannot {operation}")]
    NoMediaLoaded { operation: &'static str },

    /// The state gate could not be acquired in time
    #[error("State gate not acquired within {millis}ms")]
    GateTimeout { millis: u64 },

    /// The media engine did not acknowledge a command in time
    #[error("Command '{command}' not acknowledged within {millis}ms")]
    Timeout { command: &'static str, millis: u64 },

    /// A newer command replaced this one before it completed
    #[error("Command '{command}' superseded by a newer request")]
    Superseded { command: &'static str },

    /// The loaded book changed while the command was in flight
    #[error("Media context changed while '{command}' was in flight")]
    ContextChanged { command: &'static str },

    /// The media engine rejected the command
    #[error("Media engine error: {0}")]
    Engine(String),
}

impl PlaybackError {
    /// Returns true for gate and acknowledgement timeouts
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::GateTimeout { .. } | Self::Timeout { .. })
    }

    /// Returns true when the command was dropped in favour of newer state
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Superseded { .. } | Self::ContextChanged { .. })
    }
}

impl From<PlaybackError> for AppError {
    fn from(err: PlaybackError) -> Self {
        match err {
            PlaybackError::NoMediaLoaded { operation } => AppError::no_media(operation),
            PlaybackError::GateTimeout { millis } => AppError::CommandTimeout {
                command: "state update".to_string(),
                millis,
            },
            PlaybackError::Timeout { command, millis } => AppError::CommandTimeout {
                command: command.to_string(),
                millis,
            },
            PlaybackError::Superseded { command } | PlaybackError::ContextChanged { command } => {
                AppError::Cancelled {
                    operation: command.to_string(),
                }
            }
            PlaybackError::Engine(message) => AppError::MediaEngineError { message },
        }
    }
}
