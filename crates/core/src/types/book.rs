//! Book, track and chapter domain models

use crate::types::{Timestamp, Validator};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parses an identifier from a UUID string
            pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s)?))
            }

            /// Returns the identifier as a string
            pub fn as_string(&self) -> String {
                self.0.to_string()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Unique identifier for a book
    BookId
);
entity_id!(
    /// Unique identifier for a track (one audio file of a book)
    TrackId
);
entity_id!(
    /// Unique identifier for a chapter
    ChapterId
);

/// The book currently loaded into the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audiobook {
    pub id: BookId,
    pub title: String,
    pub author: Option<String>,
}

impl Audiobook {
    /// Creates a new audiobook reference with a random id
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: BookId::new(),
            title: title.into(),
            author: None,
        }
    }

    /// Sets the author
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}

/// One audio file of a book
///
/// `last_viewed` and `progress_ms` carry the per-track progress recorded by
/// the persistence layer; they are only consulted when picking the track to
/// resume from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    /// Ordinal position in the book (0-based)
    pub index: usize,
    pub duration_ms: u64,
    pub last_viewed: Option<Timestamp>,
    pub progress_ms: u64,
}

impl Track {
    /// Creates a track with no recorded progress
    pub fn new(index: usize, duration_ms: u64) -> Self {
        Self {
            id: TrackId::new(),
            index,
            duration_ms,
            last_viewed: None,
            progress_ms: 0,
        }
    }

    /// Attaches recorded progress to the track
    pub fn with_progress(mut self, progress_ms: u64, last_viewed: Timestamp) -> Self {
        self.progress_ms = progress_ms;
        self.last_viewed = Some(last_viewed);
        self
    }
}

/// Book-absolute start offset of the track at `index`
///
/// Indexes past the end yield the total duration of all tracks.
pub fn track_start_ms(tracks: &[Track], index: usize) -> u64 {
    tracks.iter().take(index).map(|t| t.duration_ms).sum()
}

/// How a chapter source expresses its offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterFrame {
    /// Milliseconds from the start of the first track
    #[default]
    BookAbsolute,
    /// Milliseconds from the start of the track named by `Chapter::track_id`
    TrackRelative,
}

/// Represents a chapter within an audiobook
///
/// Inside the engine offsets are always book-absolute; see
/// [`normalize_chapters`]. `book_id` and `track_id` are lookup references only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: ChapterId,
    pub book_id: Option<BookId>,
    pub track_id: Option<TrackId>,
    pub title: String,
    pub index: usize,
    pub start_offset_ms: u64,
    /// Exclusive end offset
    pub end_offset_ms: u64,
}

impl Chapter {
    /// Creates a new chapter
    pub fn new(
        index: usize,
        title: impl Into<String>,
        start_offset_ms: u64,
        end_offset_ms: u64,
    ) -> Self {
        Self {
            id: ChapterId::new(),
            book_id: None,
            track_id: None,
            title: title.into(),
            index,
            start_offset_ms,
            end_offset_ms,
        }
    }

    /// Sets the owning book reference
    pub fn for_book(mut self, book_id: BookId) -> Self {
        self.book_id = Some(book_id);
        self
    }

    /// Sets the track reference (needed for track-relative sources)
    pub fn in_track(mut self, track_id: TrackId) -> Self {
        self.track_id = Some(track_id);
        self
    }

    /// Length of the `[start, end)` interval
    pub fn span_ms(&self) -> u64 {
        self.end_offset_ms.saturating_sub(self.start_offset_ms)
    }

    /// Checks if a position falls in `[start, end)`
    pub fn contains(&self, position_ms: u64) -> bool {
        position_ms >= self.start_offset_ms && position_ms < self.end_offset_ms
    }
}

impl Validator for Chapter {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.title.trim().is_empty() {
            errors.push("Chapter title cannot be empty".to_string());
        }

        if self.end_offset_ms < self.start_offset_ms {
            errors.push("End offset must not precede start offset".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Converts chapters into the book-absolute frame and sorts them by start
///
/// Track-relative offsets are shifted by the start of the track their
/// `track_id` names. Chapters that reference an unknown track are kept at
/// their raw offsets. Inverted intervals are collapsed to zero length, and
/// indexes are reassigned to match the sorted order.
pub fn normalize_chapters(
    chapters: Vec<Chapter>,
    tracks: &[Track],
    frame: ChapterFrame,
) -> Vec<Chapter> {
    let mut normalized: Vec<Chapter> = chapters
        .into_iter()
        .map(|mut chapter| {
            if frame == ChapterFrame::TrackRelative {
                let track_position = chapter
                    .track_id
                    .and_then(|id| tracks.iter().position(|t| t.id == id));

                match track_position {
                    Some(position) => {
                        let shift = track_start_ms(tracks, position);
                        chapter.start_offset_ms += shift;
                        chapter.end_offset_ms += shift;
                    }
                    None => log::warn!(
                        "Chapter '{}' has no resolvable track, keeping raw offsets",
                        chapter.title
                    ),
                }
            }

            if let Err(errors) = chapter.validate() {
                log::warn!("Chapter '{}' is malformed: {}", chapter.title, errors.join("; "));
            }
            if chapter.end_offset_ms < chapter.start_offset_ms {
                chapter.end_offset_ms = chapter.start_offset_ms;
            }
            chapter
        })
        .collect();

    normalized.sort_by_key(|c| c.start_offset_ms);
    for (index, chapter) in normalized.iter_mut().enumerate() {
        chapter.index = index;
    }
    normalized
}
