//! Interfaces to the components the engine drives or reports to
//!
//! The engine only produces and consumes plain positions and flags; audio
//! output, storage and UI live behind these traits.

use async_trait::async_trait;
use std::sync::Mutex;
use storystream_core::{AppError, BookId, Timestamp};

/// Sink for play/pause/seek commands
///
/// Each call resolves once the engine has acknowledged the command.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Moves playback to `position_ms` within track `track_index`
    async fn seek(&self, track_index: usize, position_ms: u64) -> Result<(), String>;

    async fn play(&self) -> Result<(), String>;

    async fn pause(&self) -> Result<(), String>;
}

/// One tick of the media engine's position feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionEvent {
    pub track_index: usize,
    pub position_ms: u64,
    pub is_playing: bool,
}

impl PositionEvent {
    pub fn new(track_index: usize, position_ms: u64, is_playing: bool) -> Self {
        Self {
            track_index,
            position_ms,
            is_playing,
        }
    }
}

/// A progress checkpoint handed to the [`ProgressStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressRecord {
    pub book_id: BookId,
    pub track_index: usize,
    pub position_ms: u64,
    pub timestamp: Timestamp,
}

/// Fire-and-forget progress persistence
///
/// Implementations must not block; failures are theirs to log.
pub trait ProgressStore: Send + Sync {
    fn save(&self, record: ProgressRecord);
}

/// Receives every command failure together with a message for the user
pub trait ErrorSink: Send + Sync {
    fn report(&self, error: &AppError, user_message: &str);
}

/// Error sink that writes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn report(&self, error: &AppError, user_message: &str) {
        if error.is_critical() {
            log::error!("{} ({}; {})", user_message, error, error.recovery_action());
        } else {
            log::warn!("{} ({}; {})", user_message, error, error.recovery_action());
        }
    }
}

/// In-memory progress store, newest record last
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    records: Mutex<Vec<ProgressRecord>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records saved so far, oldest first
    pub fn records(&self) -> Vec<ProgressRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<ProgressRecord> {
        self.records.lock().ok().and_then(|r| r.last().copied())
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProgressStore for MemoryProgressStore {
    fn save(&self, record: ProgressRecord) {
        match self.records.lock() {
            Ok(mut records) => records.push(record),
            Err(_) => log::error!("Progress store lock poisoned, dropping record"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_keeps_order() {
        let store = MemoryProgressStore::new();
        assert!(store.is_empty());

        let book_id = BookId::new();
        for position_ms in [1_000, 2_000] {
            store.save(ProgressRecord {
                book_id,
                track_index: 0,
                position_ms,
                timestamp: Timestamp::now(),
            });
        }

        assert_eq!(store.len(), 2);
        assert_eq!(store.last().map(|r| r.position_ms), Some(2_000));
        assert_eq!(store.records()[0].position_ms, 1_000);
    }

    #[test]
    fn test_log_sink_accepts_any_error() {
        let sink = LogErrorSink;
        let err = AppError::no_media("seek");
        sink.report(&err, &err.user_message());
    }
}
