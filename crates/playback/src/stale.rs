//! Stale position rejection
//!
//! The position feed can deliver a read taken before a track change or seek
//! settled, which shows up as a sudden jump to (almost) zero within the same
//! track. [`StalePositionPolicy`] names that heuristic so callers can tune or
//! disable it. Explicit user seeks are never subject to it, which keeps a
//! deliberate jump to the start of a track possible.

use storystream_core::PlaybackState;

/// Where a position update came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSource {
    /// The periodic media engine feed
    Feed,
    /// An explicit user or voice command
    UserSeek,
}

/// Rejects feed updates that drop a well-advanced position to near zero
/// while the book and track stay the same
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalePositionPolicy {
    enabled: bool,
    /// Positions at or below this count as "near zero"
    near_zero_ms: u64,
    /// Only positions at or beyond this are protected
    min_drop_ms: u64,
}

impl StalePositionPolicy {
    pub fn new(near_zero_ms: u64, min_drop_ms: u64) -> Self {
        Self {
            enabled: true,
            near_zero_ms,
            min_drop_ms,
        }
    }

    /// A policy that accepts every update
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn near_zero_ms(&self) -> u64 {
        self.near_zero_ms
    }

    pub fn min_drop_ms(&self) -> u64 {
        self.min_drop_ms
    }

    /// Decides whether moving from `current` to `candidate` looks like a stale read
    pub fn is_stale(
        &self,
        current: &PlaybackState,
        candidate: &PlaybackState,
        source: PositionSource,
    ) -> bool {
        if !self.enabled || source == PositionSource::UserSeek {
            return false;
        }
        if !current.has_media() || current.book_id() != candidate.book_id() {
            return false;
        }
        if current.current_track_index() != candidate.current_track_index() {
            return false;
        }

        current.current_track_position_ms() >= self.min_drop_ms
            && candidate.current_track_position_ms() <= self.near_zero_ms
    }
}

impl Default for StalePositionPolicy {
    fn default() -> Self {
        Self::new(1_000, 5_000)
    }
}
