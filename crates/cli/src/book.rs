// FILE: crates/cli/src/book.rs

//! Book description files
//!
//! ```toml
//! title = "The Long Road"
//! chapter_frame = "track_relative"
//!
//! [[tracks]]
//! duration_ms = 1800000
//!
//! [[chapters]]
//! title = "Departure"
//! start_ms = 0
//! end_ms = 900000
//! track = 0
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use storystream_core::{normalize_chapters, Audiobook, Chapter, ChapterFrame, Track};

#[derive(Debug, Clone, Deserialize)]
pub struct BookFile {
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub chapter_frame: ChapterFrame,
    pub tracks: Vec<TrackEntry>,
    #[serde(default)]
    pub chapters: Vec<ChapterEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackEntry {
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChapterEntry {
    pub title: String,
    pub start_ms: u64,
    pub end_ms: u64,
    /// Track the offsets are relative to (track-relative frame only)
    #[serde(default)]
    pub track: Option<usize>,
}

/// A book ready to hand to the state controller
#[derive(Debug, Clone)]
pub struct LoadedBook {
    pub audiobook: Audiobook,
    pub tracks: Vec<Track>,
    /// Book-absolute and sorted
    pub chapters: Vec<Chapter>,
}

impl LoadedBook {
    pub fn track_durations(&self) -> Vec<u64> {
        self.tracks.iter().map(|t| t.duration_ms).collect()
    }
}

impl BookFile {
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read book file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid book file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let book: BookFile = toml::from_str(text)?;
        if book.tracks.is_empty() {
            bail!("A book needs at least one track");
        }
        Ok(book)
    }

    pub fn into_loaded(self) -> Result<LoadedBook> {
        let mut audiobook = Audiobook::new(self.title);
        if let Some(author) = self.author {
            audiobook = audiobook.with_author(author);
        }

        let tracks: Vec<Track> = self
            .tracks
            .iter()
            .enumerate()
            .map(|(index, t)| Track::new(index, t.duration_ms))
            .collect();

        let mut chapters = Vec::with_capacity(self.chapters.len());
        for (index, entry) in self.chapters.into_iter().enumerate() {
            let mut chapter = Chapter::new(index, entry.title, entry.start_ms, entry.end_ms)
                .for_book(audiobook.id);
            if let Some(track_index) = entry.track {
                let track = tracks.get(track_index).with_context(|| {
                    format!(
                        "Chapter '{}' references track {} but the book has {}",
                        chapter.title,
                        track_index,
                        tracks.len()
                    )
                })?;
                chapter = chapter.in_track(track.id);
            }
            chapters.push(chapter);
        }

        let chapters = normalize_chapters(chapters, &tracks, self.chapter_frame);
        Ok(LoadedBook {
            audiobook,
            tracks,
            chapters,
        })
    }
}

/// Reads and normalizes a book description file
pub fn load_book(path: &Path) -> Result<LoadedBook> {
    BookFile::read(path)?.into_loaded()
}
