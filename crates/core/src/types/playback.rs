//! Playback snapshot and playback speed

use crate::types::{track_start_ms, Audiobook, BookId, Chapter, Timestamp, Track};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Playback speed, always within `[MIN, MAX]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSpeed(f32);

impl PlaybackSpeed {
    pub const MIN: f32 = 0.5;
    pub const MAX: f32 = 3.0;

    /// Creates a new playback speed (0.5x - 3.0x)
    pub fn new(speed: f32) -> Result<Self, String> {
        if !(Self::MIN..=Self::MAX).contains(&speed) {
            Err(format!("Speed must be between {} and {}", Self::MIN, Self::MAX))
        } else {
            Ok(Self(speed))
        }
    }

    /// Creates a playback speed, clamping out-of-range values
    ///
    /// NaN falls back to normal speed.
    pub fn clamped(speed: f32) -> Self {
        if speed.is_nan() {
            return Self::default();
        }
        Self(speed.clamp(Self::MIN, Self::MAX))
    }

    /// Returns the speed value
    pub fn value(&self) -> f32 {
        self.0
    }
}

impl Default for PlaybackSpeed {
    fn default() -> Self {
        Self(1.0)
    }
}

/// Immutable snapshot of what is playing and where
///
/// Snapshots are never mutated after construction; every change produces a
/// new value through one of the `with_*` methods, which clamp their inputs so
/// that the following always hold:
///
/// - if `tracks` is non-empty, `current_track_index < tracks.len()`
/// - `current_track_position_ms <= current_track.duration_ms`
/// - `chapters` is sorted by `start_offset_ms`
/// - `last_updated_at` never moves backwards
///
/// Track and chapter lists are shared between snapshots of the same book.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    audiobook: Option<Arc<Audiobook>>,
    tracks: Arc<[Track]>,
    chapters: Arc<[Chapter]>,
    current_track_index: usize,
    current_track_position_ms: u64,
    is_playing: bool,
    playback_speed: PlaybackSpeed,
    last_updated_at: Timestamp,
}

impl PlaybackState {
    /// The "nothing loaded" state
    pub fn empty() -> Self {
        Self {
            audiobook: None,
            tracks: Arc::from(Vec::<Track>::new()),
            chapters: Arc::from(Vec::<Chapter>::new()),
            current_track_index: 0,
            current_track_position_ms: 0,
            is_playing: false,
            playback_speed: PlaybackSpeed::default(),
            last_updated_at: Timestamp::EPOCH,
        }
    }

    /// Builds the initial snapshot for a freshly loaded book
    ///
    /// Tracks are ordered by their index and chapters by start offset.
    /// Chapter offsets must already be book-absolute.
    pub fn loaded(
        audiobook: Audiobook,
        mut tracks: Vec<Track>,
        mut chapters: Vec<Chapter>,
        start_track_index: i64,
        start_position_ms: i64,
        now: Timestamp,
    ) -> Self {
        tracks.sort_by_key(|t| t.index);
        chapters.sort_by_key(|c| c.start_offset_ms);
        for (index, chapter) in chapters.iter_mut().enumerate() {
            chapter.index = index;
        }

        let base = Self {
            audiobook: Some(Arc::new(audiobook)),
            tracks: Arc::from(tracks),
            chapters: Arc::from(chapters),
            current_track_index: 0,
            current_track_position_ms: 0,
            is_playing: false,
            playback_speed: PlaybackSpeed::default(),
            last_updated_at: now,
        };
        base.with_position(start_track_index, start_position_ms, now)
    }

    /// Returns a copy positioned at the clamped `(track_index, position_ms)`
    pub fn with_position(&self, track_index: i64, position_ms: i64, now: Timestamp) -> Self {
        let index = self.clamp_track_index(track_index);
        let limit = self.tracks.get(index).map(|t| t.duration_ms).unwrap_or(0);
        let position = (position_ms.max(0) as u64).min(limit);

        Self {
            current_track_index: index,
            current_track_position_ms: position,
            last_updated_at: self.last_updated_at.max(now),
            ..self.clone()
        }
    }

    /// Returns a copy with the playing flag set
    pub fn with_playing(&self, is_playing: bool, now: Timestamp) -> Self {
        Self {
            is_playing,
            last_updated_at: self.last_updated_at.max(now),
            ..self.clone()
        }
    }

    /// Returns a copy with the clamped playback speed
    pub fn with_speed(&self, speed: f32, now: Timestamp) -> Self {
        Self {
            playback_speed: PlaybackSpeed::clamped(speed),
            last_updated_at: self.last_updated_at.max(now),
            ..self.clone()
        }
    }

    /// Clamps a raw track index into `[0, len - 1]` (0 when there are no tracks)
    pub fn clamp_track_index(&self, track_index: i64) -> usize {
        if self.tracks.is_empty() || track_index <= 0 {
            return 0;
        }
        (track_index as u64).min(self.tracks.len() as u64 - 1) as usize
    }

    pub fn audiobook(&self) -> Option<&Audiobook> {
        self.audiobook.as_deref()
    }

    pub fn book_id(&self) -> Option<BookId> {
        self.audiobook.as_ref().map(|b| b.id)
    }

    /// True when a book is loaded
    pub fn has_media(&self) -> bool {
        self.audiobook.is_some()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn current_track_index(&self) -> usize {
        self.current_track_index
    }

    pub fn current_track_position_ms(&self) -> u64 {
        self.current_track_position_ms
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.tracks.get(self.current_track_index)
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn playback_speed(&self) -> PlaybackSpeed {
        self.playback_speed
    }

    pub fn last_updated_at(&self) -> Timestamp {
        self.last_updated_at
    }

    /// Book-absolute position: earlier track durations plus the in-track offset
    pub fn book_position_ms(&self) -> u64 {
        track_start_ms(&self.tracks, self.current_track_index) + self.current_track_position_ms
    }

    /// Sum of all track durations
    pub fn book_duration_ms(&self) -> u64 {
        self.tracks.iter().map(|t| t.duration_ms).sum()
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracks(count: usize, duration_ms: u64) -> Vec<Track> {
        (0..count).map(|i| Track::new(i, duration_ms)).collect()
    }

    fn loaded(track_index: i64, position_ms: i64) -> PlaybackState {
        PlaybackState::loaded(
            Audiobook::new("Test"),
            tracks(3, 60_000),
            Vec::new(),
            track_index,
            position_ms,
            Timestamp::from_millis(1_000),
        )
    }

    #[test]
    fn test_empty_state() {
        let state = PlaybackState::empty();
        assert!(!state.has_media());
        assert!(state.tracks().is_empty());
        assert!(state.chapters().is_empty());
        assert_eq!(state.current_track_index(), 0);
        assert_eq!(state.current_track_position_ms(), 0);
        assert!(!state.is_playing());
        assert_eq!(state.playback_speed().value(), 1.0);
        assert_eq!(state, PlaybackState::default());
    }

    #[test]
    fn test_load_clamps_track_index() {
        assert_eq!(loaded(99, 0).current_track_index(), 2);
        assert_eq!(loaded(-3, 0).current_track_index(), 0);
    }

    #[test]
    fn test_load_clamps_position() {
        assert_eq!(loaded(0, -100).current_track_position_ms(), 0);
        assert_eq!(loaded(1, 90_000).current_track_position_ms(), 60_000);
    }

    #[test]
    fn test_book_position() {
        let state = loaded(2, 30_000);
        assert_eq!(state.book_position_ms(), 150_000);
        assert_eq!(state.book_duration_ms(), 180_000);
    }

    #[test]
    fn test_with_position_keeps_other_fields() {
        let state = loaded(0, 0).with_playing(true, Timestamp::from_millis(2_000));
        let moved = state.with_position(1, 5_000, Timestamp::from_millis(3_000));

        assert_eq!(moved.current_track_index(), 1);
        assert!(moved.is_playing());
        assert_eq!(moved.book_id(), state.book_id());
        assert!(state.current_track_index() == 0, "original snapshot untouched");
    }

    #[test]
    fn test_timestamp_never_moves_backwards() {
        let state = loaded(0, 0);
        let older = state.with_position(0, 10, Timestamp::from_millis(10));
        assert_eq!(older.last_updated_at(), Timestamp::from_millis(1_000));
    }

    #[test]
    fn test_position_without_tracks() {
        let state = PlaybackState::loaded(
            Audiobook::new("No tracks"),
            Vec::new(),
            Vec::new(),
            4,
            5_000,
            Timestamp::now(),
        );
        assert_eq!(state.current_track_index(), 0);
        assert_eq!(state.current_track_position_ms(), 0);
        assert!(state.current_track().is_none());
    }

    #[test]
    fn test_chapters_sorted_on_load() {
        let state = PlaybackState::loaded(
            Audiobook::new("Unsorted"),
            tracks(1, 100),
            vec![Chapter::new(1, "B", 50, 100), Chapter::new(0, "A", 0, 50)],
            0,
            0,
            Timestamp::now(),
        );
        assert_eq!(state.chapters()[0].title, "A");
    }

    #[test]
    fn test_chapter_indexes_follow_sorted_order() {
        let state = PlaybackState::loaded(
            Audiobook::new("Reindexed"),
            tracks(1, 150),
            vec![
                Chapter::new(7, "C", 100, 150),
                Chapter::new(7, "A", 0, 50),
                Chapter::new(3, "B", 50, 100),
            ],
            0,
            0,
            Timestamp::now(),
        );

        let order: Vec<(usize, &str)> = state
            .chapters()
            .iter()
            .map(|c| (c.index, c.title.as_str()))
            .collect();
        assert_eq!(order, vec![(0, "A"), (1, "B"), (2, "C")]);
    }

    #[test]
    fn test_speed_clamping() {
        assert_eq!(PlaybackSpeed::clamped(5.0).value(), 3.0);
        assert_eq!(PlaybackSpeed::clamped(0.1).value(), 0.5);
        assert_eq!(PlaybackSpeed::clamped(1.25).value(), 1.25);
        assert_eq!(PlaybackSpeed::clamped(f32::NAN).value(), 1.0);
        assert!(PlaybackSpeed::new(3.5).is_err());
        assert!(PlaybackSpeed::new(2.0).is_ok());
    }

    #[test]
    fn test_with_speed() {
        let state = loaded(0, 0).with_speed(9.0, Timestamp::now());
        assert_eq!(state.playback_speed().value(), 3.0);
    }
}
