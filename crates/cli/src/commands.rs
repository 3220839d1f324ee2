// FILE: crates/cli/src/commands.rs

use crate::book::{load_book, LoadedBook};
use crate::simulator::{resolve_stream_url, FlakyResolver, SimulatedEngine};
use anyhow::{Context, Result};
use console::style;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storystream_config::{Config, ConfigManager};
use storystream_core::Duration as CoreDuration;
use storystream_playback::{
    clamp_position, resolve_book_position, ChapterChange, ChapterLocator, ChapterLookup,
    LogErrorSink, MemoryProgressStore, PlaybackView, PollerStats, PositionPoller, ProgressRecord,
    SeekCommandHandler, SeekRequest, StateController,
};

#[cfg(test)]
mod tests;

/// Simulated playback time covered by one feed tick
const FEED_INTERVAL_MS: u64 = 1_000;

/// What one chapter lookup resolved to
#[derive(Debug, Clone, PartialEq)]
pub struct LocateReport {
    pub position_ms: u64,
    pub lookup: ChapterLookup,
    pub chapter_title: Option<String>,
    pub progress_label: String,
    pub track_index: usize,
    pub track_position_ms: u64,
    pub near_boundary: bool,
}

/// Finds the chapter and track at a book-absolute position
pub fn locate(book: &LoadedBook, position_ms: i64, tolerance_ms: u64) -> LocateReport {
    let duration = book.tracks.iter().map(|t| t.duration_ms).sum();
    let position = clamp_position(position_ms, duration);
    let locator = ChapterLocator::new(&book.chapters).with_book_duration(duration);
    let lookup = locator.locate(position);
    let track = resolve_book_position(&book.tracks, position as i64);

    LocateReport {
        position_ms: position,
        lookup,
        chapter_title: locator.chapter_at(position).map(|c| c.title.clone()),
        progress_label: locator.progress_label(position),
        track_index: track.track_index,
        track_position_ms: track.position_ms,
        near_boundary: locator.is_near_chapter_boundary(position, tolerance_ms),
    }
}

pub fn run_locate(config: &Config, book_path: &Path, position_ms: i64) -> Result<()> {
    let book = load_book(book_path)?;
    let report = locate(&book, position_ms, config.engine.boundary_tolerance_ms);

    println!("\n{}", style(&book.audiobook.title).bold().cyan());
    println!("{}", "=".repeat(60));
    println!("Position: {}", CoreDuration::from_millis(report.position_ms));
    match &report.chapter_title {
        Some(title) => println!("Chapter:  {} ({})", style(title).bold(), report.progress_label),
        None => println!("Chapter:  - ({:?})", report.lookup),
    }
    println!(
        "Track:    {} at {}",
        report.track_index + 1,
        CoreDuration::from_millis(report.track_position_ms)
    );
    if report.near_boundary {
        println!("{}", style("Near a chapter boundary").yellow());
    }
    Ok(())
}

/// Parameters of a simulated listening session
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub book_path: PathBuf,
    /// Simulated seconds of playback
    pub seconds: u64,
    /// Book-absolute start position
    pub start_ms: Option<i64>,
    pub speed: Option<f32>,
    /// Wall-clock time between feed ticks
    pub tick: Duration,
    /// Stream lookups that fail before one succeeds
    pub resolver_failures: u32,
}

/// Everything a simulated session observed
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub stream_url: String,
    pub stats: PollerStats,
    pub chapter_changes: Vec<ChapterChange>,
    pub final_view: PlaybackView,
    pub saved: Vec<ProgressRecord>,
}

/// Plays a book against the simulated engine with a ~1 Hz position feed
pub async fn simulate(config: &Config, options: &SimulateOptions) -> Result<SimulationReport> {
    let book = load_book(&options.book_path)?;

    let resolver = FlakyResolver::new("https://catalog.invalid", options.resolver_failures);
    let stream_url = resolve_stream_url(
        &resolver,
        config.retry.to_policy(),
        config.retry.attempt_timeout(),
        &book.audiobook,
    )
    .await
    .context("Could not start playback")?;
    log::info!("Streaming from {}", stream_url);

    let store = Arc::new(MemoryProgressStore::new());
    let controller = Arc::new(StateController::new(
        config.engine.to_settings(),
        store.clone(),
    ));
    let engine = Arc::new(SimulatedEngine::new(book.track_durations()));
    let handler =
        SeekCommandHandler::new(controller.clone(), engine.clone(), Arc::new(LogErrorSink));

    let LoadedBook {
        audiobook,
        tracks,
        chapters,
    } = book;
    controller
        .load_audiobook(audiobook, tracks, chapters, 0, 0)
        .await?;
    if let Some(speed) = options.speed {
        controller.with_playback_speed(speed).await?;
    }
    if let Some(start_ms) = options.start_ms {
        handler.seek(SeekRequest::book_absolute(start_ms)).await?;
    }

    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = changes.clone();
    let (feed, events) = tokio::sync::mpsc::channel(16);
    let poller = PositionPoller::new(controller.clone())
        .with_chapter_listener(move |change| {
            if let Ok(mut changes) = sink.lock() {
                changes.push(*change);
            }
        })
        .spawn(events);

    handler.set_playing(true).await?;

    let mut ticker = tokio::time::interval(options.tick);
    ticker.tick().await;
    for _ in 0..options.seconds {
        ticker.tick().await;
        let speed = controller.snapshot().playback_speed().value();
        let event = engine.advance(FEED_INTERVAL_MS, speed).await;
        if feed.send(event).await.is_err() {
            break;
        }
        if !event.is_playing {
            break;
        }
    }

    drop(feed);
    let stats = poller.await.context("Position poller stopped unexpectedly")?;

    // Pausing writes the final position without waiting for the debounce
    if controller.snapshot().is_playing() {
        handler.set_playing(false).await?;
    } else {
        controller.flush();
    }

    let chapter_changes = changes.lock().map(|c| c.clone()).unwrap_or_default();
    Ok(SimulationReport {
        stream_url,
        stats,
        chapter_changes,
        final_view: controller.view(),
        saved: store.records(),
    })
}

pub async fn run_simulate(config: &Config, options: &SimulateOptions) -> Result<()> {
    let report = simulate(config, options).await?;

    println!("\n{} {}", style("▶").green().bold(), style(&report.stream_url).dim());
    for change in &report.chapter_changes {
        let label = change
            .current
            .map(|index| format!("chapter {}", index + 1))
            .unwrap_or_else(|| "outside chapters".to_string());
        println!(
            "  {}  {}",
            CoreDuration::from_millis(change.book_position_ms),
            style(label).bold()
        );
    }

    let view = &report.final_view;
    println!("{}", "=".repeat(60));
    println!(
        "Stopped at {} of {} ({:.1}%)",
        CoreDuration::from_millis(view.book_position_ms),
        CoreDuration::from_millis(view.book_duration_ms),
        view.book_progress() * 100.0
    );
    if let Some(title) = &view.chapter_title {
        println!(
            "Chapter:   {} ({:.0}% through)",
            title,
            view.chapter_progress() * 100.0
        );
    }
    println!(
        "Feed:      {} applied, {} stale, {} failed",
        report.stats.applied, report.stats.rejected_stale, report.stats.failed
    );
    match report.saved.last() {
        Some(record) => println!(
            "Saved:     track {} at {} ({} writes)",
            record.track_index + 1,
            CoreDuration::from_millis(record.position_ms),
            report.saved.len()
        ),
        None => println!("Saved:     nothing"),
    }
    Ok(())
}

/// Prints the effective configuration as TOML
pub fn run_show_config(manager: &ConfigManager, config: &Config) -> Result<()> {
    println!("# {}", manager.config_path().display());
    let text = toml::to_string_pretty(config).context("Failed to serialize config")?;
    println!("{}", text);

    if let Err(errors) = config.validate() {
        for error in errors {
            println!("{} {}", style("!").yellow().bold(), error);
        }
    }
    Ok(())
}
