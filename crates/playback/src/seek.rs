//! Seek and transport commands
//!
//! Translates user and voice commands into media engine calls and, once the
//! engine acknowledges, into controller updates. Each wait on the engine is
//! bounded by the command timeout. A newer seek supersedes an older one still
//! in flight, and a book change cancels every command of the old book; in
//! both cases the stale completion never writes state.

use crate::chapters::{clamp_position, ChapterLocator, ChapterLookup};
use crate::collaborators::{ErrorSink, MediaEngine};
use crate::controller::StateController;
use crate::error::{PlaybackError, PlaybackResult};
use crate::navigator::{move_to, resolve_book_position};
use std::future::Future;
use std::sync::Arc;
use storystream_core::{AppError, PlaybackState, Timestamp};
use storystream_resilience::with_timeout;
use tokio::sync::watch;

/// Reference frame of a seek offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekFrame {
    /// Offset from the start of the current chapter
    ChapterRelative,
    /// Offset from the start of the book
    BookAbsolute,
}

/// A raw seek command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekRequest {
    pub offset_ms: i64,
    pub frame: SeekFrame,
}

impl SeekRequest {
    pub fn book_absolute(offset_ms: i64) -> Self {
        Self {
            offset_ms,
            frame: SeekFrame::BookAbsolute,
        }
    }

    pub fn chapter_relative(offset_ms: i64) -> Self {
        Self {
            offset_ms,
            frame: SeekFrame::ChapterRelative,
        }
    }

    /// Book-absolute target of this request against `state`
    ///
    /// Chapter-relative offsets without a current chapter are taken as
    /// book-absolute. The result is clamped to the book.
    pub fn target_in(&self, state: &PlaybackState) -> u64 {
        let book_duration = state.book_duration_ms();
        let base = match self.frame {
            SeekFrame::BookAbsolute => 0,
            SeekFrame::ChapterRelative => {
                match ChapterLocator::new(state.chapters()).locate(state.book_position_ms()) {
                    ChapterLookup::Found(index) => state.chapters()[index].start_offset_ms,
                    _ => 0,
                }
            }
        };
        clamp_position((base as i64).saturating_add(self.offset_ms), book_duration)
    }
}

/// Executes seek, skip and play/pause commands against a media engine
pub struct SeekCommandHandler {
    controller: Arc<StateController>,
    engine: Arc<dyn MediaEngine>,
    errors: Arc<dyn ErrorSink>,
    latest: watch::Sender<u64>,
}

impl SeekCommandHandler {
    pub fn new(
        controller: Arc<StateController>,
        engine: Arc<dyn MediaEngine>,
        errors: Arc<dyn ErrorSink>,
    ) -> Self {
        let (latest, _) = watch::channel(0);
        Self {
            controller,
            engine,
            errors,
            latest,
        }
    }

    pub fn controller(&self) -> &Arc<StateController> {
        &self.controller
    }

    /// Seeks to a chapter-relative or book-absolute position
    pub async fn seek(&self, request: SeekRequest) -> PlaybackResult<Arc<PlaybackState>> {
        let result = self
            .seek_with("seek", |state| Some(request.target_in(state)))
            .await;
        self.surface(result)
    }

    /// Seeks by `delta_ms` from the current position ("skip 30 seconds")
    pub async fn seek_relative(&self, delta_ms: i64) -> PlaybackResult<Arc<PlaybackState>> {
        let result = self
            .seek_with("seek", |state| {
                let target = (state.book_position_ms() as i64).saturating_add(delta_ms);
                Some(clamp_position(target, state.book_duration_ms()))
            })
            .await;
        self.surface(result)
    }

    /// Moves to the next or previous chapter
    ///
    /// Skipping forward from the last chapter leaves the position unchanged.
    pub async fn skip_chapter(&self, forward: bool) -> PlaybackResult<Arc<PlaybackState>> {
        let restart_window_ms = self.controller.settings().chapter_restart_window_ms;
        let result = self
            .seek_with("skip chapter", |state| {
                let locator = ChapterLocator::new(state.chapters());
                let position = state.book_position_ms();
                if forward {
                    locator.next_chapter_start(position)
                } else {
                    Some(locator.previous_chapter_start(position, restart_window_ms))
                }
            })
            .await;
        self.surface(result)
    }

    /// Starts or pauses playback once the engine acknowledges
    pub async fn set_playing(&self, is_playing: bool) -> PlaybackResult<Arc<PlaybackState>> {
        let command = if is_playing { "play" } else { "pause" };
        let result = self.transport(command, is_playing).await;
        self.surface(result)
    }

    async fn transport(
        &self,
        command: &'static str,
        is_playing: bool,
    ) -> PlaybackResult<Arc<PlaybackState>> {
        let (state, generation) = self.controller.snapshot_in_context().await?;
        if !state.has_media() {
            return Err(PlaybackError::NoMediaLoaded { operation: command });
        }

        let ack = if is_playing {
            self.engine.play()
        } else {
            self.engine.pause()
        };
        self.await_ack(command, None, generation, ack).await?;

        self.controller
            .update_state_in_context(generation, command, |current| {
                Ok(current.with_playing(is_playing, Timestamp::now()))
            })
            .await
    }

    async fn seek_with<F>(
        &self,
        command: &'static str,
        target: F,
    ) -> PlaybackResult<Arc<PlaybackState>>
    where
        F: FnOnce(&PlaybackState) -> Option<u64>,
    {
        let (state, generation) = self.controller.snapshot_in_context().await?;
        if !state.has_media() {
            return Err(PlaybackError::NoMediaLoaded { operation: command });
        }
        let Some(target_ms) = target(&state) else {
            log::debug!("'{}' has no target, keeping position", command);
            return Ok(state);
        };

        let token = self.next_token();
        let target = resolve_book_position(state.tracks(), target_ms as i64);
        log::debug!(
            "Seek #{} to {}ms (track {} at {}ms)",
            token,
            target_ms,
            target.track_index,
            target.position_ms
        );

        let ack = self.engine.seek(target.track_index, target.position_ms);
        self.await_ack(command, Some(token), generation, ack).await?;

        self.controller
            .update_state_in_context(generation, command, |current| {
                if *self.latest.borrow() != token {
                    return Err(PlaybackError::Superseded { command });
                }
                Ok(move_to(current, target))
            })
            .await
    }

    /// Waits for an engine acknowledgement, a newer seek, or a context change,
    /// whichever comes first, bounded by the command timeout
    async fn await_ack<A>(
        &self,
        command: &'static str,
        token: Option<u64>,
        generation: u64,
        ack: A,
    ) -> PlaybackResult<()>
    where
        A: Future<Output = Result<(), String>>,
    {
        let settings = self.controller.settings();
        let mut latest = self.latest.subscribe();
        let mut context = self.controller.context_changes();

        tokio::select! {
            result = with_timeout(settings.command_timeout, ack) => match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(message)) => Err(PlaybackError::Engine(message)),
                Err(_) => Err(PlaybackError::Timeout {
                    command,
                    millis: settings.command_timeout_ms(),
                }),
            },
            _ = latest.wait_for(|current| token.is_some_and(|t| *current != t)) => {
                Err(PlaybackError::Superseded { command })
            }
            _ = context.wait_for(|current| *current != generation) => {
                Err(PlaybackError::ContextChanged { command })
            }
        }
    }

    fn next_token(&self) -> u64 {
        let mut token = 0;
        self.latest.send_modify(|latest| {
            *latest += 1;
            token = *latest;
        });
        token
    }

    /// Forwards failures to the error sink before returning them
    fn surface<T>(&self, result: PlaybackResult<T>) -> PlaybackResult<T> {
        if let Err(err) = &result {
            if err.is_cancellation() {
                log::debug!("Command dropped: {}", err);
            } else {
                log::warn!("Command failed: {}", err);
            }
            let app: AppError = err.clone().into();
            self.errors.report(&app, &app.user_message());
        }
        result
    }
}

impl std::fmt::Debug for SeekCommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeekCommandHandler")
            .field("controller", &self.controller)
            .field("latest_seek", &*self.latest.borrow())
            .finish()
    }
}
