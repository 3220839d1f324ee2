//! Position feed pump
//!
//! Drains the media engine's ~1 Hz position events into the controller and
//! reports chapter transitions. Feed positions jitter around chapter starts,
//! so a flip back into the previous chapter within the boundary tolerance of
//! the current chapter's start is ignored.

use crate::chapters::ChapterLocator;
use crate::collaborators::{ErrorSink, PositionEvent};
use crate::controller::{FeedUpdate, StateController};
use std::sync::Arc;
use storystream_core::{BookId, PlaybackState};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A chapter transition observed on the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChapterChange {
    pub previous: Option<usize>,
    pub current: Option<usize>,
    pub book_position_ms: u64,
}

/// Counters reported when the feed closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollerStats {
    pub applied: u64,
    pub rejected_stale: u64,
    pub failed: u64,
    pub chapter_changes: u64,
}

#[derive(Debug)]
struct ChapterTracker {
    book_id: Option<BookId>,
    current: Option<usize>,
    tolerance_ms: u64,
}

impl ChapterTracker {
    fn new(tolerance_ms: u64) -> Self {
        Self {
            book_id: None,
            current: None,
            tolerance_ms,
        }
    }

    fn observe(&mut self, state: &PlaybackState) -> Option<ChapterChange> {
        if state.book_id() != self.book_id {
            self.book_id = state.book_id();
            self.current = None;
        }

        let position = state.book_position_ms();
        let locator = ChapterLocator::new(state.chapters());
        let found = locator.locate(position).index();
        if found == self.current {
            return None;
        }

        if let (Some(current), Some(next)) = (self.current, found) {
            if next + 1 == current
                && locator.nearest_boundary(position, self.tolerance_ms) == Some(current)
            {
                log::debug!(
                    "Ignoring flip back to chapter {} at {}ms",
                    next,
                    position
                );
                return None;
            }
        }

        let change = ChapterChange {
            previous: self.current,
            current: found,
            book_position_ms: position,
        };
        self.current = found;
        Some(change)
    }
}

type ChapterListener = Arc<dyn Fn(&ChapterChange) + Send + Sync>;

/// Feeds [`PositionEvent`]s into a [`StateController`]
pub struct PositionPoller {
    controller: Arc<StateController>,
    tracker: ChapterTracker,
    listener: Option<ChapterListener>,
    errors: Option<Arc<dyn ErrorSink>>,
}

impl PositionPoller {
    pub fn new(controller: Arc<StateController>) -> Self {
        let tolerance_ms = controller.settings().boundary_tolerance_ms;
        Self {
            controller,
            tracker: ChapterTracker::new(tolerance_ms),
            listener: None,
            errors: None,
        }
    }

    /// Reports dropped stale positions to `sink`
    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.errors = Some(sink);
        self
    }

    /// Registers a callback for chapter transitions
    pub fn with_chapter_listener<L>(mut self, listener: L) -> Self
    where
        L: Fn(&ChapterChange) + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }

    /// Applies one event, returning the chapter change it caused
    pub async fn handle(&mut self, event: PositionEvent, stats: &mut PollerStats) -> Option<ChapterChange> {
        match self.controller.update_position_from_feed(event).await {
            Ok(FeedUpdate::Applied(state)) => {
                stats.applied += 1;
                let change = self.tracker.observe(&state)?;
                stats.chapter_changes += 1;
                log::info!(
                    "Chapter {:?} -> {:?} at {}ms",
                    change.previous,
                    change.current,
                    change.book_position_ms
                );
                if let Some(listener) = &self.listener {
                    listener(&change);
                }
                Some(change)
            }
            Ok(rejected @ FeedUpdate::RejectedStale { .. }) => {
                stats.rejected_stale += 1;
                if let (Some(sink), Some(error)) = (&self.errors, rejected.rejection()) {
                    sink.report(&error, &error.user_message());
                }
                None
            }
            Err(e) => {
                stats.failed += 1;
                log::warn!("Dropped position event: {}", e);
                None
            }
        }
    }

    /// Runs until the feed closes
    pub async fn run(mut self, mut feed: mpsc::Receiver<PositionEvent>) -> PollerStats {
        let mut stats = PollerStats::default();
        while let Some(event) = feed.recv().await {
            self.handle(event, &mut stats).await;
        }
        log::debug!("Position feed closed: {:?}", stats);
        stats
    }

    /// Runs on a background task
    pub fn spawn(self, feed: mpsc::Receiver<PositionEvent>) -> JoinHandle<PollerStats> {
        tokio::spawn(self.run(feed))
    }
}

impl std::fmt::Debug for PositionPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionPoller")
            .field("tracker", &self.tracker)
            .field("has_listener", &self.listener.is_some())
            .field("has_error_sink", &self.errors.is_some())
            .finish()
    }
}
