use super::*;
use std::io::Write;
use tempfile::NamedTempFile;

const BOOK: &str = r#"
title = "Test Book"
chapter_frame = "track_relative"

[[tracks]]
duration_ms = 10000

[[tracks]]
duration_ms = 10000

[[chapters]]
title = "Opening"
start_ms = 0
end_ms = 6000
track = 0

[[chapters]]
title = "Crossing"
start_ms = 6000
end_ms = 10000
track = 0

[[chapters]]
title = "Closing"
start_ms = 0
end_ms = 10000
track = 1
"#;

fn book_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(BOOK.as_bytes()).unwrap();
    file
}

fn options(file: &NamedTempFile, seconds: u64) -> SimulateOptions {
    SimulateOptions {
        book_path: file.path().to_path_buf(),
        seconds,
        start_ms: None,
        speed: None,
        tick: Duration::from_millis(1_000),
        resolver_failures: 0,
    }
}

#[test]
fn test_locate_uses_half_open_chapters() {
    let book = load_book(book_file().path()).unwrap();

    let report = locate(&book, 6_000, 500);
    assert_eq!(report.chapter_title.as_deref(), Some("Crossing"));
    assert_eq!(report.progress_label, "2/3");
    assert!(report.near_boundary);

    let report = locate(&book, 12_000, 500);
    assert_eq!(report.chapter_title.as_deref(), Some("Closing"));
    assert_eq!((report.track_index, report.track_position_ms), (1, 2_000));
    assert!(!report.near_boundary);
}

#[test]
fn test_locate_clamps_position() {
    let book = load_book(book_file().path()).unwrap();

    assert_eq!(locate(&book, -50, 0).position_ms, 0);
    let end = locate(&book, 99_000, 0);
    assert_eq!(end.position_ms, 20_000);
    assert_eq!(end.lookup, ChapterLookup::AfterAllChapters);
}

#[tokio::test(start_paused = true)]
async fn test_simulate_reports_chapter_transitions() {
    let file = book_file();
    let report = simulate(&Config::default(), &options(&file, 13)).await.unwrap();

    let chapters: Vec<Option<usize>> = report.chapter_changes.iter().map(|c| c.current).collect();
    assert_eq!(chapters, vec![Some(0), Some(1), Some(2)]);
    assert_eq!(report.final_view.book_position_ms, 13_000);
    assert_eq!(report.final_view.chapter_title.as_deref(), Some("Closing"));
    assert!(!report.final_view.is_playing);
    assert_eq!(report.stats.applied, 13);
}

#[tokio::test(start_paused = true)]
async fn test_simulate_persists_final_position() {
    let file = book_file();
    let report = simulate(&Config::default(), &options(&file, 5)).await.unwrap();

    let last = report.saved.last().expect("pause flushes progress");
    assert_eq!((last.track_index, last.position_ms), (0, 5_000));
}

#[tokio::test(start_paused = true)]
async fn test_simulate_stops_at_book_end() {
    let file = book_file();
    let mut opts = options(&file, 60);
    opts.start_ms = Some(18_000);

    let report = simulate(&Config::default(), &opts).await.unwrap();
    assert_eq!(report.final_view.book_position_ms, 20_000);
    assert!(report.stats.applied <= 3);
}

#[tokio::test(start_paused = true)]
async fn test_simulate_retries_stream_lookup() {
    let file = book_file();
    let mut opts = options(&file, 1);
    opts.resolver_failures = 2;

    let report = simulate(&Config::default(), &opts).await.unwrap();
    assert!(report.stream_url.ends_with("/stream"));
}

#[tokio::test(start_paused = true)]
async fn test_simulate_gives_up_after_policy() {
    let file = book_file();
    let mut opts = options(&file, 1);
    opts.resolver_failures = 10;

    let err = simulate(&Config::default(), &opts).await.unwrap_err();
    assert!(err.to_string().contains("Could not start playback"));
}

#[test]
fn test_show_config_accepts_defaults() {
    let dir = tempfile::TempDir::new().unwrap();
    let manager = ConfigManager::with_directory(dir.path().to_path_buf());
    assert!(run_show_config(&manager, &Config::default()).is_ok());
}
