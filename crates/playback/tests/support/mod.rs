//! Shared fakes for the playback integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storystream_core::{AppError, Audiobook, Chapter, Track};
use storystream_playback::{
    EngineSettings, ErrorSink, MediaEngine, MemoryProgressStore, SeekCommandHandler,
    StateController,
};

/// Media engine whose acknowledgements take a configurable time
#[derive(Default)]
pub struct ScriptedEngine {
    pub seek_delay: Mutex<Duration>,
    pub failure: Mutex<Option<String>>,
    pub seeks: Mutex<Vec<(usize, u64)>>,
    pub transport: Mutex<Vec<&'static str>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seek_delay(self, delay: Duration) -> Self {
        *self.seek_delay.lock().unwrap() = delay;
        self
    }

    pub fn failing(self, message: &str) -> Self {
        *self.failure.lock().unwrap() = Some(message.to_string());
        self
    }

    pub fn seeks(&self) -> Vec<(usize, u64)> {
        self.seeks.lock().unwrap().clone()
    }

    fn outcome(&self) -> Result<(), String> {
        match self.failure.lock().unwrap().clone() {
            Some(message) => Err(message),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MediaEngine for ScriptedEngine {
    async fn seek(&self, track_index: usize, position_ms: u64) -> Result<(), String> {
        self.seeks.lock().unwrap().push((track_index, position_ms));
        let delay = *self.seek_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        self.outcome()
    }

    async fn play(&self) -> Result<(), String> {
        self.transport.lock().unwrap().push("play");
        self.outcome()
    }

    async fn pause(&self) -> Result<(), String> {
        self.transport.lock().unwrap().push("pause");
        self.outcome()
    }
}

/// Error sink remembering every report
#[derive(Default)]
pub struct RecordingSink {
    pub reports: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.reports.lock().unwrap().iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().unwrap().len()
    }
}

impl ErrorSink for RecordingSink {
    fn report(&self, error: &AppError, user_message: &str) {
        self.reports
            .lock()
            .unwrap()
            .push((error.to_string(), user_message.to_string()));
    }
}

pub struct Harness {
    pub store: Arc<MemoryProgressStore>,
    pub controller: Arc<StateController>,
    pub engine: Arc<ScriptedEngine>,
    pub sink: Arc<RecordingSink>,
    pub handler: SeekCommandHandler,
}

pub fn harness(engine: ScriptedEngine) -> Harness {
    harness_with(EngineSettings::default(), engine)
}

pub fn harness_with(settings: EngineSettings, engine: ScriptedEngine) -> Harness {
    let store = Arc::new(MemoryProgressStore::new());
    let controller = Arc::new(StateController::new(settings, store.clone()));
    let engine = Arc::new(engine);
    let sink = Arc::new(RecordingSink::default());
    let handler = SeekCommandHandler::new(controller.clone(), engine.clone(), sink.clone());
    Harness {
        store,
        controller,
        engine,
        sink,
        handler,
    }
}

pub fn tracks(count: usize, duration_ms: u64) -> Vec<Track> {
    (0..count).map(|i| Track::new(i, duration_ms)).collect()
}

/// Three 60s tracks with chapters crossing the track boundaries
pub fn cross_track_chapters() -> Vec<Chapter> {
    vec![
        Chapter::new(0, "Chapter 1", 0, 90_000),
        Chapter::new(1, "Chapter 2", 90_000, 150_000),
        Chapter::new(2, "Chapter 3", 150_000, 180_000),
    ]
}

pub async fn load(controller: &StateController, chapters: Vec<Chapter>, track: i64, position: i64) {
    controller
        .load_audiobook(Audiobook::new("Harness"), tracks(3, 60_000), chapters, track, position)
        .await
        .unwrap();
}
