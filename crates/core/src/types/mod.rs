//! Domain types for StoryStream
//!
//! This module contains the domain models the playback engine works with:
//! - `book`: Audiobook, Track and Chapter types plus chapter-frame normalization
//! - `playback`: The immutable playback snapshot and playback speed
//! - `common`: Timestamps, durations and validation

mod book;
mod common;
mod playback;

// Re-export all public types
pub use book::{
    normalize_chapters, track_start_ms, Audiobook, BookId, Chapter, ChapterFrame, ChapterId,
    Track, TrackId,
};
pub use common::{Duration, Timestamp, Validator};
pub use playback::{PlaybackSpeed, PlaybackState};
