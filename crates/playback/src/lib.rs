//! Playback position and chapter state engine
//!
//! Keeps one consistent answer to "where is playback right now" for a book
//! split across several tracks. [`StateController`] owns the current
//! [`PlaybackState`] snapshot; [`SeekCommandHandler`] turns user and voice
//! commands into acknowledged seeks; [`PositionPoller`] pumps the media
//! engine's position feed into the controller.
//!
//! ```no_run
//! use std::sync::Arc;
//! use storystream_core::{Audiobook, Track};
//! use storystream_playback::{EngineSettings, MemoryProgressStore, StateController};
//!
//! # async fn demo() -> storystream_playback::PlaybackResult<()> {
//! let store = Arc::new(MemoryProgressStore::new());
//! let controller = Arc::new(StateController::new(EngineSettings::default(), store));
//!
//! let tracks = vec![Track::new(0, 60_000), Track::new(1, 60_000)];
//! controller
//!     .load_audiobook(Audiobook::new("Dune"), tracks, Vec::new(), 1, 30_000)
//!     .await?;
//! assert_eq!(controller.snapshot().book_position_ms(), 90_000);
//! # Ok(())
//! # }
//! ```

pub mod chapters;
pub mod collaborators;
pub mod controller;
pub mod error;
pub mod navigator;
pub mod persistence;
pub mod poller;
pub mod seek;
pub mod settings;
pub mod stale;
pub mod view;

pub use chapters::{clamp_position, ChapterLocator, ChapterLookup};
pub use collaborators::{
    ErrorSink, LogErrorSink, MediaEngine, MemoryProgressStore, PositionEvent, ProgressRecord,
    ProgressStore,
};
pub use controller::{has_significant_position_change, FeedUpdate, StateController};
pub use error::{PlaybackError, PlaybackResult};
pub use navigator::{book_position, resolve_book_position, TrackNavigator, TrackPosition};
pub use persistence::ProgressDebouncer;
pub use poller::{ChapterChange, PollerStats, PositionPoller};
pub use seek::{SeekCommandHandler, SeekFrame, SeekRequest};
pub use settings::EngineSettings;
pub use stale::{PositionSource, StalePositionPolicy};
pub use view::{ChapterSpan, PlaybackView};

pub use storystream_core::PlaybackState;
