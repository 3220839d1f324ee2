//! The single owner of the current playback snapshot
//!
//! Every mutation goes through one async mutex (the gate), acquired with a
//! bounded wait. Inside the gate a new immutable [`PlaybackState`] is built,
//! published for lock-free readers and pushed to subscribers. Readers that
//! only need "the latest snapshot" never touch the gate.

use crate::collaborators::{PositionEvent, ProgressRecord, ProgressStore};
use crate::error::{PlaybackError, PlaybackResult};
use crate::persistence::ProgressDebouncer;
use crate::settings::EngineSettings;
use crate::stale::PositionSource;
use crate::view::PlaybackView;
use arc_swap::ArcSwap;
use std::sync::Arc;
use storystream_core::{AppError, Audiobook, Chapter, PlaybackState, Timestamp, Track};
use storystream_resilience::with_timeout;
use tokio::sync::{watch, Mutex, MutexGuard};

/// Result of applying one position feed update
#[derive(Debug, Clone, PartialEq)]
pub enum FeedUpdate {
    /// The update was published
    Applied(Arc<PlaybackState>),
    /// The update looked like a stale read and was dropped
    RejectedStale {
        track_index: usize,
        position_ms: u64,
        previous_ms: u64,
    },
}

impl FeedUpdate {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// The dropped update as an [`AppError`]; `None` when it was applied
    pub fn rejection(&self) -> Option<AppError> {
        match *self {
            Self::Applied(_) => None,
            Self::RejectedStale {
                track_index,
                position_ms,
                previous_ms,
            } => Some(AppError::StalePositionRejected {
                track_index,
                position_ms,
                previous_ms,
            }),
        }
    }
}

/// True when two snapshots differ enough to refresh a UI or notification
///
/// Book identity or track index changes always count; otherwise the
/// book-absolute positions must differ by at least `threshold_ms`.
pub fn has_significant_position_change(
    a: &PlaybackState,
    b: &PlaybackState,
    threshold_ms: u64,
) -> bool {
    a.book_id() != b.book_id()
        || a.current_track_index() != b.current_track_index()
        || a.book_position_ms().abs_diff(b.book_position_ms()) >= threshold_ms
}

/// Owns and serializes the playback snapshot
///
/// Construct one per player and share it behind an `Arc`; there is no
/// global instance.
pub struct StateController {
    gate: Mutex<Arc<PlaybackState>>,
    published: ArcSwap<PlaybackState>,
    updates: watch::Sender<Arc<PlaybackState>>,
    generation: watch::Sender<u64>,
    persistence: ProgressDebouncer,
    settings: EngineSettings,
}

impl StateController {
    /// Creates a controller in the empty state
    pub fn new(settings: EngineSettings, store: Arc<dyn ProgressStore>) -> Self {
        let empty = Arc::new(PlaybackState::empty());
        let (updates, _) = watch::channel(Arc::clone(&empty));
        let (generation, _) = watch::channel(0);

        Self {
            gate: Mutex::new(Arc::clone(&empty)),
            published: ArcSwap::new(empty),
            updates,
            generation,
            persistence: ProgressDebouncer::new(store, settings.persist_debounce),
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // ===== Reads =====

    /// The last published snapshot, without taking the gate
    pub fn snapshot(&self) -> Arc<PlaybackState> {
        self.published.load_full()
    }

    /// Derived values of the last published snapshot
    pub fn view(&self) -> PlaybackView {
        PlaybackView::of(&self.published.load())
    }

    /// [`has_significant_position_change`] with the configured threshold
    pub fn has_significant_change(&self, a: &PlaybackState, b: &PlaybackState) -> bool {
        has_significant_position_change(a, b, self.settings.significant_change_ms)
    }

    /// Reads several values from exactly one snapshot under the gate
    pub async fn read_consistent<R, F>(&self, read: F) -> PlaybackResult<R>
    where
        F: FnOnce(&PlaybackState) -> R,
    {
        let guard = self.lock().await?;
        Ok(read(&guard))
    }

    /// Receiver notified with every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<PlaybackState>> {
        self.updates.subscribe()
    }

    /// Counter bumped whenever the loaded book changes or is cleared
    pub fn context_generation(&self) -> u64 {
        *self.generation.borrow()
    }

    /// Receiver notified on every context generation change
    pub fn context_changes(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    /// Snapshot and context generation read together under the gate
    pub(crate) async fn snapshot_in_context(&self) -> PlaybackResult<(Arc<PlaybackState>, u64)> {
        let guard = self.lock().await?;
        Ok((Arc::clone(&guard), self.context_generation()))
    }

    // ===== Mutations =====

    /// Replaces the current book
    ///
    /// The start track index and position are clamped; any pending progress
    /// write of the previous book is discarded.
    pub async fn load_audiobook(
        &self,
        audiobook: Audiobook,
        tracks: Vec<Track>,
        chapters: Vec<Chapter>,
        start_track_index: i64,
        start_position_ms: i64,
    ) -> PlaybackResult<Arc<PlaybackState>> {
        let mut guard = self.lock().await?;
        self.persistence.cancel();

        let title = audiobook.title.clone();
        let now = Timestamp::now();
        let state = PlaybackState::loaded(
            audiobook,
            tracks,
            chapters,
            start_track_index,
            start_position_ms,
            now,
        )
        .with_speed(self.settings.default_speed, now);

        self.bump_generation();
        log::info!(
            "Loaded '{}': {} tracks, {} chapters, starting at track {} {}ms",
            title,
            state.tracks().len(),
            state.chapters().len(),
            state.current_track_index(),
            state.current_track_position_ms()
        );
        Ok(self.publish(&mut guard, state))
    }

    /// Moves to a clamped `(track_index, position_ms)` and reschedules the
    /// debounced progress write
    pub async fn update_position(
        &self,
        track_index: i64,
        position_ms: i64,
    ) -> PlaybackResult<Arc<PlaybackState>> {
        let mut guard = self.lock().await?;
        let next = guard.with_position(track_index, position_ms, Timestamp::now());
        Ok(self.commit(&mut guard, next, true))
    }

    /// Applies a feed tick, subject to the stale position policy
    pub async fn update_position_from_feed(
        &self,
        event: PositionEvent,
    ) -> PlaybackResult<FeedUpdate> {
        let mut guard = self.lock().await?;
        let now = Timestamp::now();
        let moved = guard.with_position(event.track_index as i64, event.position_ms as i64, now);

        if self
            .settings
            .stale_policy
            .is_stale(&guard, &moved, PositionSource::Feed)
        {
            log::warn!(
                "Rejected stale position: track {} at {}ms (was {}ms)",
                moved.current_track_index(),
                moved.current_track_position_ms(),
                guard.current_track_position_ms()
            );
            return Ok(FeedUpdate::RejectedStale {
                track_index: moved.current_track_index(),
                position_ms: moved.current_track_position_ms(),
                previous_ms: guard.current_track_position_ms(),
            });
        }

        let next = if moved.is_playing() != event.is_playing {
            moved.with_playing(event.is_playing, now)
        } else {
            moved
        };
        Ok(FeedUpdate::Applied(self.commit(&mut guard, next, true)))
    }

    /// Sets the playing flag; pausing flushes any pending progress write
    pub async fn update_playing_state(&self, is_playing: bool) -> PlaybackResult<Arc<PlaybackState>> {
        let mut guard = self.lock().await?;
        let next = guard.with_playing(is_playing, Timestamp::now());
        Ok(self.commit(&mut guard, next, false))
    }

    /// Sets the playback speed, clamped to the supported range
    pub async fn with_playback_speed(&self, speed: f32) -> PlaybackResult<Arc<PlaybackState>> {
        let mut guard = self.lock().await?;
        let next = guard.with_speed(speed, Timestamp::now());
        Ok(self.commit(&mut guard, next, false))
    }

    /// Returns to the empty state and discards any pending progress write
    pub async fn clear(&self) -> PlaybackResult<Arc<PlaybackState>> {
        let mut guard = self.lock().await?;
        self.persistence.cancel();
        self.bump_generation();
        log::info!("Playback state cleared");
        Ok(self.publish(&mut guard, PlaybackState::empty()))
    }

    /// Derives and publishes a new snapshot from the current one atomically
    pub async fn update_state<F>(&self, update: F) -> PlaybackResult<Arc<PlaybackState>>
    where
        F: FnOnce(&PlaybackState) -> PlaybackState,
    {
        self.try_update_state(|state| Ok(update(state))).await
    }

    /// Like [`update_state`](Self::update_state), but the closure may refuse
    pub async fn try_update_state<F>(&self, update: F) -> PlaybackResult<Arc<PlaybackState>>
    where
        F: FnOnce(&PlaybackState) -> PlaybackResult<PlaybackState>,
    {
        let mut guard = self.lock().await?;
        let next = update(&guard)?;
        Ok(self.commit(&mut guard, next, false))
    }

    /// Applies `update` only if the media context is still `generation`
    pub(crate) async fn update_state_in_context<F>(
        &self,
        generation: u64,
        command: &'static str,
        update: F,
    ) -> PlaybackResult<Arc<PlaybackState>>
    where
        F: FnOnce(&PlaybackState) -> PlaybackResult<PlaybackState>,
    {
        let mut guard = self.lock().await?;
        if self.context_generation() != generation {
            return Err(PlaybackError::ContextChanged { command });
        }
        let next = update(&guard)?;
        Ok(self.commit(&mut guard, next, false))
    }

    /// Writes any pending progress immediately
    pub fn flush(&self) -> bool {
        self.persistence.flush()
    }

    // ===== Internals =====

    async fn lock(&self) -> PlaybackResult<MutexGuard<'_, Arc<PlaybackState>>> {
        with_timeout(self.settings.gate_timeout, self.gate.lock())
            .await
            .map_err(|_| {
                log::warn!("State gate not acquired within {:?}", self.settings.gate_timeout);
                PlaybackError::GateTimeout {
                    millis: self.settings.gate_timeout_ms(),
                }
            })
    }

    /// Publishes `next` and performs the persistence side effects of the change
    fn commit(
        &self,
        current: &mut Arc<PlaybackState>,
        next: PlaybackState,
        position_update: bool,
    ) -> Arc<PlaybackState> {
        let previous = Arc::clone(current);

        if previous.book_id() != next.book_id() {
            self.persistence.cancel();
            self.bump_generation();
        }

        let moved = previous.current_track_index() != next.current_track_index()
            || previous.current_track_position_ms() != next.current_track_position_ms();
        if next.has_media() && (position_update || moved) {
            if let Some(record) = progress_record(&next) {
                self.persistence.schedule(record);
            }
        }

        if previous.is_playing() && !next.is_playing() {
            self.persistence.flush();
        }

        self.publish(current, next)
    }

    fn publish(&self, current: &mut Arc<PlaybackState>, next: PlaybackState) -> Arc<PlaybackState> {
        let next = Arc::new(next);
        *current = Arc::clone(&next);
        self.published.store(Arc::clone(&next));
        self.updates.send_replace(Arc::clone(&next));
        next
    }

    fn bump_generation(&self) {
        self.generation.send_modify(|generation| *generation += 1);
    }
}

impl std::fmt::Debug for StateController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateController")
            .field("snapshot", &self.snapshot())
            .field("generation", &self.context_generation())
            .field("persistence", &self.persistence)
            .finish()
    }
}

fn progress_record(state: &PlaybackState) -> Option<ProgressRecord> {
    state.book_id().map(|book_id| ProgressRecord {
        book_id,
        track_index: state.current_track_index(),
        position_ms: state.current_track_position_ms(),
        timestamp: state.last_updated_at(),
    })
}
