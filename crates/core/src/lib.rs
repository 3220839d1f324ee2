//! Core domain types and error taxonomy shared by every StoryStream crate

pub mod error;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, ErrorSeverity, RecoveryAction, Result};
pub use types::{
    normalize_chapters, track_start_ms, Audiobook, BookId, Chapter, ChapterFrame, ChapterId,
    Duration, PlaybackSpeed, PlaybackState, Timestamp, Track, TrackId,
};
