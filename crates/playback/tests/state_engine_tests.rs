//! End-to-end behaviour of the state engine

mod support;

use std::sync::{Arc, Mutex};
use std::time::Duration;
use storystream_core::{normalize_chapters, Audiobook, Chapter, ChapterFrame};
use storystream_playback::{
    ChapterLocator, ChapterLookup, EngineSettings, MemoryProgressStore, PollerStats, PositionEvent,
    PositionPoller, StateController, TrackNavigator,
};
use support::{cross_track_chapters, load, tracks, RecordingSink};
use tokio::sync::mpsc;

fn controller() -> (Arc<MemoryProgressStore>, Arc<StateController>) {
    let store = Arc::new(MemoryProgressStore::new());
    let controller = Arc::new(StateController::new(EngineSettings::default(), store.clone()));
    (store, controller)
}

#[test]
fn test_half_open_chapter_boundary() {
    let chapters = vec![
        Chapter::new(0, "Chapter 1", 0, 16_573),
        Chapter::new(1, "Chapter 2", 16_573, 88_282),
    ];
    let locator = ChapterLocator::new(&chapters);

    assert_eq!(locator.locate(16_573), ChapterLookup::Found(1));
    assert_eq!(locator.locate(16_572), ChapterLookup::Found(0));
}

#[tokio::test]
async fn test_cross_track_chapter_detection() {
    let (_, controller) = controller();
    load(&controller, cross_track_chapters(), 1, 30_000).await;

    let view = controller.view();
    assert_eq!(view.book_position_ms, 90_000);
    assert_eq!(view.chapter_index(), Some(1));
    assert_eq!(view.chapter_title.as_deref(), Some("Chapter 2"));
}

#[tokio::test]
async fn test_track_relative_chapters_are_normalized() {
    let (_, controller) = controller();
    let tracks = tracks(3, 60_000);
    let chapters = vec![
        Chapter::new(0, "Chapter 1", 0, 60_000).in_track(tracks[0].id),
        Chapter::new(1, "Chapter 2", 0, 30_000).in_track(tracks[1].id),
        Chapter::new(2, "Chapter 3", 30_000, 60_000).in_track(tracks[1].id),
    ];
    let chapters = normalize_chapters(chapters, &tracks, ChapterFrame::TrackRelative);

    controller
        .load_audiobook(Audiobook::new("Relative"), tracks, chapters, 1, 45_000)
        .await
        .unwrap();

    assert_eq!(controller.view().chapter_title.as_deref(), Some("Chapter 3"));
}

#[tokio::test]
async fn test_relative_seek_without_boundary_crossing() {
    let (_, controller) = controller();
    controller
        .load_audiobook(Audiobook::new("Five"), tracks(5, 60_000), Vec::new(), 2, 30_000)
        .await
        .unwrap();
    let navigator = TrackNavigator::new(controller.clone());

    let state = navigator.seek_by_relative(5_000).await.unwrap();

    assert_eq!(state.book_position_ms(), 155_000);
    assert_eq!(state.current_track_index(), 2);
    assert_eq!(state.current_track_position_ms(), 35_000);
}

#[tokio::test]
async fn test_clamping_on_load() {
    let (_, controller) = controller();

    let state = controller
        .load_audiobook(Audiobook::new("Clamp"), tracks(3, 60_000), Vec::new(), 99, -100)
        .await
        .unwrap();

    assert_eq!(state.current_track_index(), 2);
    assert_eq!(state.current_track_position_ms(), 0);
}

#[tokio::test]
async fn test_idempotent_republish() {
    let (_, controller) = controller();
    load(&controller, cross_track_chapters(), 0, 0).await;

    let first = controller.update_position(1, 20_000).await.unwrap();
    let second = controller.update_position(1, 20_000).await.unwrap();

    assert!(second.last_updated_at() >= first.last_updated_at());
    assert_eq!(first.current_track_index(), second.current_track_index());
    assert_eq!(first.current_track_position_ms(), second.current_track_position_ms());
    assert_eq!(first.tracks(), second.tracks());
    assert_eq!(first.chapters(), second.chapters());
    assert_eq!(first.is_playing(), second.is_playing());
    assert_eq!(first.playback_speed(), second.playback_speed());
    assert_eq!(first.book_id(), second.book_id());
}

#[tokio::test]
async fn test_concurrent_writers_never_tear() {
    let (_, controller) = controller();
    load(&controller, cross_track_chapters(), 0, 0).await;

    let mut tasks = Vec::new();
    for writer in 0..8i64 {
        let controller = controller.clone();
        tasks.push(tokio::spawn(async move {
            for step in 0..25i64 {
                controller
                    .update_position(writer % 3, step * 1_000)
                    .await
                    .unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let snapshot = controller.snapshot();
    let consistent = controller
        .read_consistent(|s| (s.current_track_index(), s.current_track_position_ms()))
        .await
        .unwrap();
    assert_eq!(
        (snapshot.current_track_index(), snapshot.current_track_position_ms()),
        consistent
    );
    assert!(snapshot.current_track_index() < 3);
}

#[tokio::test(start_paused = true)]
async fn test_poller_reports_chapter_transitions() {
    let (store, controller) = controller();
    load(&controller, cross_track_chapters(), 1, 25_000).await;

    let changes = Arc::new(Mutex::new(Vec::new()));
    let seen = changes.clone();
    let poller = PositionPoller::new(controller.clone())
        .with_chapter_listener(move |change| seen.lock().unwrap().push(change.current));

    let (feed, rx) = mpsc::channel(16);
    let handle = poller.spawn(rx);
    for position_ms in [28_000, 29_000, 30_000, 31_000] {
        feed.send(PositionEvent::new(1, position_ms, true)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    // Stale read racing a track change
    feed.send(PositionEvent::new(1, 0, true)).await.unwrap();
    drop(feed);

    let stats = handle.await.unwrap();
    assert_eq!(stats.applied, 4);
    assert_eq!(stats.rejected_stale, 1);
    assert_eq!(*changes.lock().unwrap(), vec![Some(0), Some(1)]);
    assert_eq!(controller.snapshot().current_track_position_ms(), 31_000);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(store.last().map(|r| r.position_ms), Some(31_000));
}

#[tokio::test]
async fn test_poller_forwards_stale_rejections() {
    let (_, controller) = controller();
    load(&controller, cross_track_chapters(), 1, 25_000).await;
    let sink = Arc::new(RecordingSink::default());
    let mut poller = PositionPoller::new(controller.clone()).with_error_sink(sink.clone());
    let mut stats = PollerStats::default();

    poller.handle(PositionEvent::new(1, 26_000, true), &mut stats).await;
    poller.handle(PositionEvent::new(1, 0, true), &mut stats).await;

    assert_eq!((stats.applied, stats.rejected_stale), (1, 1));
    assert_eq!(sink.len(), 1);
    assert!(sink.reports.lock().unwrap()[0].0.starts_with("Stale position rejected"));
    assert_eq!(controller.snapshot().current_track_position_ms(), 26_000);
}

#[tokio::test]
async fn test_subscribers_see_latest_snapshot() {
    let (_, controller) = controller();
    let mut updates = controller.subscribe();
    load(&controller, cross_track_chapters(), 0, 0).await;

    controller.update_position(2, 1_000).await.unwrap();
    updates.changed().await.unwrap();

    assert_eq!(updates.borrow().book_position_ms(), 121_000);
}

#[tokio::test]
async fn test_clear_bumps_context() {
    let (_, controller) = controller();
    let mut context = controller.context_changes();
    load(&controller, cross_track_chapters(), 0, 0).await;
    let loaded = controller.context_generation();

    controller.clear().await.unwrap();

    assert!(context.has_changed().unwrap());
    assert_eq!(controller.context_generation(), loaded + 1);
    assert!(!controller.snapshot().has_media());
}
