// FILE: crates/cli/src/simulator.rs

//! In-process stand-ins for the audio engine and the stream catalog

use async_trait::async_trait;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use storystream_core::{AppError, Audiobook};
use storystream_playback::{MediaEngine, PositionEvent};
use storystream_resilience::{with_timeout, RetryExecutor, RetryOutcome, RetryPolicy};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    track_index: usize,
    position_ms: u64,
    is_playing: bool,
}

/// A media engine that plays silence at the requested speed
#[derive(Debug)]
pub struct SimulatedEngine {
    track_durations: Vec<u64>,
    latency: Duration,
    cursor: Mutex<Cursor>,
}

impl SimulatedEngine {
    pub fn new(track_durations: Vec<u64>) -> Self {
        Self {
            track_durations,
            latency: Duration::ZERO,
            cursor: Mutex::new(Cursor::default()),
        }
    }

    /// Delay before each command is acknowledged
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Plays `elapsed_ms` of wall time and reports the resulting position
    ///
    /// Playback rolls into the next track at a track end and stops at the
    /// end of the last one.
    pub async fn advance(&self, elapsed_ms: u64, speed: f32) -> PositionEvent {
        let mut cursor = self.cursor.lock().await;
        if cursor.is_playing {
            let mut remaining = (elapsed_ms as f64 * f64::from(speed)).round() as u64;
            while remaining > 0 {
                let duration = self.track_durations.get(cursor.track_index).copied().unwrap_or(0);
                let left_in_track = duration.saturating_sub(cursor.position_ms);
                if remaining < left_in_track {
                    cursor.position_ms += remaining;
                    break;
                }
                if cursor.track_index + 1 >= self.track_durations.len() {
                    cursor.position_ms = duration;
                    cursor.is_playing = false;
                    log::info!("Simulated engine reached the end of the book");
                    break;
                }
                remaining -= left_in_track;
                cursor.track_index += 1;
                cursor.position_ms = 0;
            }
        }
        PositionEvent::new(cursor.track_index, cursor.position_ms, cursor.is_playing)
    }

    async fn acknowledge(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl MediaEngine for SimulatedEngine {
    async fn seek(&self, track_index: usize, position_ms: u64) -> Result<(), String> {
        self.acknowledge().await;
        let duration = self
            .track_durations
            .get(track_index)
            .copied()
            .ok_or_else(|| format!("no track {}", track_index))?;

        let mut cursor = self.cursor.lock().await;
        cursor.track_index = track_index;
        cursor.position_ms = position_ms.min(duration);
        Ok(())
    }

    async fn play(&self) -> Result<(), String> {
        self.acknowledge().await;
        self.cursor.lock().await.is_playing = true;
        Ok(())
    }

    async fn pause(&self) -> Result<(), String> {
        self.acknowledge().await;
        self.cursor.lock().await.is_playing = false;
        Ok(())
    }
}

/// Resolves stream URLs, stalling and then failing a fixed number of times first
#[derive(Debug)]
pub struct FlakyResolver {
    base_url: String,
    stalls_left: AtomicU32,
    failures_left: AtomicU32,
}

impl FlakyResolver {
    pub fn new(base_url: impl Into<String>, failures: u32) -> Self {
        Self {
            base_url: base_url.into(),
            stalls_left: AtomicU32::new(0),
            failures_left: AtomicU32::new(failures),
        }
    }

    /// The first `stalls` lookups never answer
    pub fn with_stalls(self, stalls: u32) -> Self {
        self.stalls_left.store(stalls, Ordering::SeqCst);
        self
    }

    pub async fn resolve(&self, book: &Audiobook) -> io::Result<String> {
        if take_one(&self.stalls_left) {
            std::future::pending::<()>().await;
        }
        if take_one(&self.failures_left) {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            ));
        }
        Ok(format!("{}/books/{}/stream", self.base_url.trim_end_matches('/'), book.id))
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Resolves the stream URL for `book` under the retry policy
///
/// Each attempt is bounded by `attempt_timeout` and fails with
/// [`AppError::NetworkTimeout`] when it runs over. Exhausting the policy
/// maps to [`AppError::NetworkUnavailable`]; a failure that is not worth
/// retrying is returned as is.
pub async fn resolve_stream_url(
    resolver: &FlakyResolver,
    policy: RetryPolicy,
    attempt_timeout: Duration,
    book: &Audiobook,
) -> Result<String, AppError> {
    let executor = RetryExecutor::new(policy)
        .with_should_retry(AppError::is_retryable)
        .with_observer(|attempt, delay, error: &AppError| {
            log::warn!(
                "Stream lookup attempt {} failed ({}), retrying in {}ms",
                attempt,
                error,
                delay.as_millis()
            );
        });

    let outcome = executor
        .execute(move |_| async move {
            match with_timeout(attempt_timeout, resolver.resolve(book)).await {
                Ok(Ok(url)) => Ok(url),
                Ok(Err(e)) => Err(AppError::network("stream lookup failed", e)),
                Err(_) => Err(AppError::NetworkTimeout {
                    operation: "stream lookup".to_string(),
                    millis: attempt_timeout.as_millis() as u64,
                }),
            }
        })
        .await;

    match outcome {
        RetryOutcome::Success { value, .. } => Ok(value),
        RetryOutcome::Failure { error, attempts } if error.is_retryable() => {
            Err(AppError::NetworkUnavailable {
                attempts,
                reason: error.to_string(),
            })
        }
        RetryOutcome::Failure { error, .. } => Err(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_advance_rolls_into_next_track() {
        let engine = SimulatedEngine::new(vec![10_000, 10_000]);
        engine.seek(0, 9_000).await.unwrap();
        engine.play().await.unwrap();

        let event = engine.advance(1_500, 1.0).await;
        assert_eq!(event, PositionEvent::new(1, 500, true));
    }

    #[tokio::test]
    async fn test_advance_stops_at_book_end() {
        let engine = SimulatedEngine::new(vec![10_000]);
        engine.play().await.unwrap();

        let event = engine.advance(60_000, 1.0).await;
        assert_eq!(event, PositionEvent::new(0, 10_000, false));
    }

    #[tokio::test]
    async fn test_paused_engine_does_not_move() {
        let engine = SimulatedEngine::new(vec![10_000]);
        engine.seek(0, 2_000).await.unwrap();

        let event = engine.advance(5_000, 2.0).await;
        assert_eq!(event, PositionEvent::new(0, 2_000, false));
    }

    #[tokio::test]
    async fn test_speed_scales_progress() {
        let engine = SimulatedEngine::new(vec![100_000]);
        engine.play().await.unwrap();

        let event = engine.advance(1_000, 1.5).await;
        assert_eq!(event.position_ms, 1_500);
    }

    #[tokio::test]
    async fn test_seek_to_missing_track_fails() {
        let engine = SimulatedEngine::new(vec![10_000]);
        assert!(engine.seek(3, 0).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolver_recovers_within_policy() {
        let resolver = FlakyResolver::new("https://catalog.example/", 2);
        let book = Audiobook::new("Test");
        let policy = RetryPolicy::new(4).with_initial_delay(Duration::from_millis(10));

        let url = resolve_stream_url(&resolver, policy, Duration::from_secs(1), &book)
            .await
            .unwrap();
        assert_eq!(url, format!("https://catalog.example/books/{}/stream", book.id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolver_exhaustion_is_network_unavailable() {
        let resolver = FlakyResolver::new("https://catalog.example", 10);
        let book = Audiobook::new("Test");
        let policy = RetryPolicy::new(3).with_initial_delay(Duration::from_millis(10));

        let err = resolve_stream_url(&resolver, policy, Duration::from_secs(1), &book)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NetworkUnavailable { attempts: 4, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_lookup_times_out_and_is_retried() {
        let resolver = FlakyResolver::new("https://catalog.example", 0).with_stalls(1);
        let book = Audiobook::new("Test");
        let policy = RetryPolicy::new(2).with_initial_delay(Duration::from_millis(10));
        let started = tokio::time::Instant::now();

        let url = resolve_stream_url(&resolver, policy, Duration::from_millis(500), &book)
            .await
            .unwrap();

        assert!(url.ends_with("/stream"));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(510));
        assert!(elapsed <= Duration::from_millis(520));
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_attempt_stalling_reports_timeout_reason() {
        let resolver = FlakyResolver::new("https://catalog.example", 0).with_stalls(10);
        let book = Audiobook::new("Test");
        let policy = RetryPolicy::new(1).with_initial_delay(Duration::from_millis(10));

        let err = resolve_stream_url(&resolver, policy, Duration::from_millis(200), &book)
            .await
            .unwrap_err();

        match err {
            AppError::NetworkUnavailable { attempts, reason } => {
                assert_eq!(attempts, 2);
                assert!(reason.starts_with("Network timeout after 200ms"));
            }
            other => panic!("Expected NetworkUnavailable, got {:?}", other),
        }
    }
}
