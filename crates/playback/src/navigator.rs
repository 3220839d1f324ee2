//! Track-level position arithmetic
//!
//! Converts between book-absolute positions and `(track, offset)` pairs, and
//! applies relative moves to the controller's state atomically.

use crate::controller::StateController;
use crate::error::{PlaybackError, PlaybackResult};
use std::sync::Arc;
use storystream_core::{PlaybackState, Timestamp, Track};

/// A position expressed as a track and an offset within it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackPosition {
    pub track_index: usize,
    pub position_ms: u64,
}

/// Book-absolute position of a snapshot
pub fn book_position(state: &PlaybackState) -> u64 {
    state.book_position_ms()
}

/// Sum of all track durations
pub fn book_duration(tracks: &[Track]) -> u64 {
    tracks.iter().map(|t| t.duration_ms).sum()
}

/// Splits a book-absolute position into `(track, offset)`
///
/// The position is clamped to `[0, book_duration]`. A position exactly at a
/// track's end belongs to the start of the next track; the end of the last
/// track stays in the last track.
pub fn resolve_book_position(tracks: &[Track], book_position_ms: i64) -> TrackPosition {
    let Some(last_index) = tracks.len().checked_sub(1) else {
        return TrackPosition {
            track_index: 0,
            position_ms: 0,
        };
    };

    let mut remaining = (book_position_ms.max(0) as u64).min(book_duration(tracks));
    for (index, track) in tracks.iter().enumerate() {
        if remaining < track.duration_ms || index == last_index {
            return TrackPosition {
                track_index: index,
                position_ms: remaining.min(track.duration_ms),
            };
        }
        remaining -= track.duration_ms;
    }

    TrackPosition {
        track_index: last_index,
        position_ms: tracks[last_index].duration_ms,
    }
}

/// The track to resume from: the one viewed most recently
///
/// Ties on `last_viewed` go to the lowest index. Tracks never viewed are
/// ignored; `None` when no track has been viewed.
pub fn select_active_track(tracks: &[Track]) -> Option<&Track> {
    tracks
        .iter()
        .filter(|t| t.last_viewed.is_some())
        .fold(None, |best: Option<&Track>, track| match best {
            Some(current) if current.last_viewed >= track.last_viewed => {
                if current.last_viewed == track.last_viewed && track.index < current.index {
                    Some(track)
                } else {
                    Some(current)
                }
            }
            _ => Some(track),
        })
}

/// Relative navigation over a shared [`StateController`]
///
/// Holds no state of its own; every update goes through the controller's gate.
#[derive(Debug, Clone)]
pub struct TrackNavigator {
    controller: Arc<StateController>,
}

impl TrackNavigator {
    pub fn new(controller: Arc<StateController>) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &Arc<StateController> {
        &self.controller
    }

    /// Moves by `delta_ms` across track boundaries, clamped to the book
    pub async fn seek_by_relative(&self, delta_ms: i64) -> PlaybackResult<Arc<PlaybackState>> {
        self.controller
            .try_update_state(|state| {
                if !state.has_media() {
                    return Err(PlaybackError::NoMediaLoaded {
                        operation: "seek",
                    });
                }
                let target = (state.book_position_ms() as i64).saturating_add(delta_ms);
                Ok(move_to(state, resolve_book_position(state.tracks(), target)))
            })
            .await
    }

    /// Resumes at the recorded progress of the most recently viewed track
    ///
    /// Leaves the state unchanged when no track has been viewed.
    pub async fn seek_to_active_track(&self, tracks: &[Track]) -> PlaybackResult<Arc<PlaybackState>> {
        let Some(active) = select_active_track(tracks) else {
            return Ok(self.controller.snapshot());
        };
        let (track_id, fallback_index, progress_ms) = (active.id, active.index, active.progress_ms);

        self.controller
            .try_update_state(move |state| {
                if !state.has_media() {
                    return Err(PlaybackError::NoMediaLoaded {
                        operation: "resume",
                    });
                }
                let index = state
                    .tracks()
                    .iter()
                    .position(|t| t.id == track_id)
                    .unwrap_or(fallback_index);
                log::debug!("Resuming track {} at {}ms", index, progress_ms);
                Ok(state.with_position(index as i64, progress_ms as i64, Timestamp::now()))
            })
            .await
    }

    /// Reads from one snapshot under the gate
    pub async fn with_state<R, F>(&self, read: F) -> PlaybackResult<R>
    where
        F: FnOnce(&PlaybackState) -> R,
    {
        self.controller.read_consistent(read).await
    }

    /// Replaces the snapshot atomically
    pub async fn update_state<F>(&self, update: F) -> PlaybackResult<Arc<PlaybackState>>
    where
        F: FnOnce(&PlaybackState) -> PlaybackState,
    {
        self.controller.update_state(update).await
    }
}

/// Returns `state` positioned at `target`
pub(crate) fn move_to(state: &PlaybackState, target: TrackPosition) -> PlaybackState {
    state.with_position(
        target.track_index as i64,
        target.position_ms as i64,
        Timestamp::now(),
    )
}
