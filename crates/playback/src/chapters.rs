//! Chapter lookup over book-absolute positions
//!
//! Chapters are half-open `[start, end)` intervals: a position equal to a
//! chapter's end belongs to the next chapter. All functions here are pure and
//! never fail; they answer with an explicit [`ChapterLookup`] variant when no
//! chapter covers a position.

use storystream_core::Chapter;

/// Outcome of locating a position among a book's chapters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterLookup {
    /// Index into the sorted chapter list
    Found(usize),
    /// The book has no chapter data
    NoChapters,
    /// Position precedes the first chapter's start
    BeforeAllChapters,
    /// Position is at or beyond the latest chapter end
    AfterAllChapters,
}

impl ChapterLookup {
    /// Returns the chapter index, if one was found
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Found(index) => Some(*index),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Clamps a raw position into `[0, book_duration_ms]`
pub fn clamp_position(position_ms: i64, book_duration_ms: u64) -> u64 {
    (position_ms.max(0) as u64).min(book_duration_ms)
}

/// Read-only view over a sorted chapter list
///
/// The chapter list must be sorted by `start_offset_ms`, as every published
/// [`PlaybackState`](storystream_core::PlaybackState) guarantees.
#[derive(Debug, Clone, Copy)]
pub struct ChapterLocator<'a> {
    chapters: &'a [Chapter],
    book_duration_ms: Option<u64>,
}

impl<'a> ChapterLocator<'a> {
    /// Creates a locator over `chapters`
    pub fn new(chapters: &'a [Chapter]) -> Self {
        Self {
            chapters,
            book_duration_ms: None,
        }
    }

    /// Sets the book duration used for the last chapter's length
    pub fn with_book_duration(mut self, book_duration_ms: u64) -> Self {
        self.book_duration_ms = Some(book_duration_ms);
        self
    }

    pub fn chapters(&self) -> &'a [Chapter] {
        self.chapters
    }

    /// Returns the total number of chapters
    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    /// Returns true if there are chapters
    pub fn has_chapters(&self) -> bool {
        !self.chapters.is_empty()
    }

    /// Finds the chapter active at `position_ms`
    ///
    /// The active chapter is the latest-starting chapter whose `[start, end)`
    /// contains the position, so where chapters overlap the later start wins
    /// and a nested chapter hands back to its enclosing one once it ends. A
    /// position covered by no chapter (a gap) stays in the last chapter that
    /// started before it.
    pub fn locate(&self, position_ms: u64) -> ChapterLookup {
        let Some(first) = self.chapters.first() else {
            return ChapterLookup::NoChapters;
        };

        if position_ms < first.start_offset_ms {
            return ChapterLookup::BeforeAllChapters;
        }
        let book_end = self
            .chapters
            .iter()
            .map(|c| c.end_offset_ms)
            .max()
            .unwrap_or(first.end_offset_ms);
        if position_ms >= book_end {
            return ChapterLookup::AfterAllChapters;
        }

        let started = self
            .chapters
            .partition_point(|c| c.start_offset_ms <= position_ms);
        let covering = self.chapters[..started]
            .iter()
            .rposition(|c| position_ms < c.end_offset_ms);
        ChapterLookup::Found(covering.unwrap_or(started - 1))
    }

    /// Finds the chapter that contains the given position
    pub fn chapter_at(&self, position_ms: u64) -> Option<&'a Chapter> {
        self.locate(position_ms)
            .index()
            .and_then(|index| self.chapters.get(index))
    }

    /// Gets a chapter by index
    pub fn get(&self, index: usize) -> Option<&'a Chapter> {
        self.chapters.get(index)
    }

    /// Length of chapter `index`: next chapter's start minus its own start,
    /// or book end minus its start for the last chapter
    ///
    /// Without a book duration the last chapter falls back to its own end.
    pub fn chapter_duration(&self, index: usize) -> u64 {
        let Some(chapter) = self.chapters.get(index) else {
            return 0;
        };

        let end = match self.chapters.get(index + 1) {
            Some(next) => next.start_offset_ms,
            None => self.book_duration_ms.unwrap_or(chapter.end_offset_ms),
        };
        end.saturating_sub(chapter.start_offset_ms)
    }

    /// Index of the chapter whose start lies within `tolerance_ms` of the position
    ///
    /// When two starts are equally close the later chapter is returned.
    pub fn nearest_boundary(&self, position_ms: u64, tolerance_ms: u64) -> Option<usize> {
        self.chapters
            .iter()
            .enumerate()
            .map(|(index, c)| (index, c.start_offset_ms.abs_diff(position_ms)))
            .filter(|(_, distance)| *distance <= tolerance_ms)
            .min_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
            .map(|(index, _)| index)
    }

    /// True when a chapter start lies within `tolerance_ms` of the position
    pub fn is_near_chapter_boundary(&self, position_ms: u64, tolerance_ms: u64) -> bool {
        self.nearest_boundary(position_ms, tolerance_ms).is_some()
    }

    /// Start of the chapter after the one active at `position_ms`
    pub fn next_chapter_start(&self, position_ms: u64) -> Option<u64> {
        match self.locate(position_ms) {
            ChapterLookup::Found(index) => self.chapters.get(index + 1).map(|c| c.start_offset_ms),
            ChapterLookup::BeforeAllChapters => self.chapters.first().map(|c| c.start_offset_ms),
            ChapterLookup::NoChapters | ChapterLookup::AfterAllChapters => None,
        }
    }

    /// Target of a "previous chapter" command
    ///
    /// More than `restart_window_ms` into a chapter restarts it; closer to its
    /// start moves to the previous chapter. Falls back to the book start.
    pub fn previous_chapter_start(&self, position_ms: u64, restart_window_ms: u64) -> u64 {
        match self.locate(position_ms) {
            ChapterLookup::Found(index) => {
                let start = self.chapters[index].start_offset_ms;
                if position_ms - start > restart_window_ms || index == 0 {
                    start
                } else {
                    self.chapters[index - 1].start_offset_ms
                }
            }
            ChapterLookup::AfterAllChapters => self
                .chapters
                .last()
                .map(|c| c.start_offset_ms)
                .unwrap_or(0),
            ChapterLookup::NoChapters | ChapterLookup::BeforeAllChapters => 0,
        }
    }

    /// Returns formatted chapter info (e.g., "3/15")
    pub fn progress_label(&self, position_ms: u64) -> String {
        match (self.locate(position_ms), self.chapter_count()) {
            (ChapterLookup::Found(index), count) => format!("{}/{}", index + 1, count),
            (_, count) if count > 0 => format!("?/{}", count),
            _ => "No chapters".to_string(),
        }
    }
}
