//! Values derived from a single playback snapshot

use crate::chapters::{ChapterLocator, ChapterLookup};
use storystream_core::{Chapter, PlaybackState};

/// The chapter interval a position is measured against
///
/// When no chapter covers the position the answer is an implicit chapter:
/// the whole book without chapter data, the lead-in before the first
/// chapter, or the tail after the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChapterSpan {
    pub lookup: ChapterLookup,
    pub start_ms: u64,
    pub duration_ms: u64,
}

impl ChapterSpan {
    /// Resolves the span active at `position_ms`
    pub fn resolve(chapters: &[Chapter], position_ms: u64, book_duration_ms: u64) -> Self {
        let locator = ChapterLocator::new(chapters).with_book_duration(book_duration_ms);
        let lookup = locator.locate(position_ms);

        let (start_ms, end_ms) = match lookup {
            ChapterLookup::Found(index) => {
                let start = chapters[index].start_offset_ms;
                (start, start + locator.chapter_duration(index))
            }
            ChapterLookup::NoChapters => (0, book_duration_ms),
            ChapterLookup::BeforeAllChapters => (0, chapters[0].start_offset_ms),
            ChapterLookup::AfterAllChapters => {
                let tail = chapters.iter().map(|c| c.end_offset_ms).max().unwrap_or(0);
                (tail, book_duration_ms.max(tail))
            }
        };

        Self {
            lookup,
            start_ms,
            duration_ms: end_ms.saturating_sub(start_ms),
        }
    }
}

/// Derived read-only properties of one snapshot
///
/// Every field comes from the same [`PlaybackState`], so the values are
/// mutually consistent.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackView {
    pub has_media: bool,
    pub is_playing: bool,
    pub playback_speed: f32,
    pub track_index: usize,
    pub track_position_ms: u64,
    pub track_duration_ms: u64,
    pub book_position_ms: u64,
    pub book_duration_ms: u64,
    pub chapter: ChapterSpan,
    pub chapter_title: Option<String>,
    pub chapter_position_ms: u64,
}

impl PlaybackView {
    pub fn of(state: &PlaybackState) -> Self {
        let book_position_ms = state.book_position_ms();
        let book_duration_ms = state.book_duration_ms();
        let chapter = ChapterSpan::resolve(state.chapters(), book_position_ms, book_duration_ms);
        let chapter_title = chapter
            .lookup
            .index()
            .and_then(|index| state.chapters().get(index))
            .map(|c| c.title.clone());

        Self {
            has_media: state.has_media(),
            is_playing: state.is_playing(),
            playback_speed: state.playback_speed().value(),
            track_index: state.current_track_index(),
            track_position_ms: state.current_track_position_ms(),
            track_duration_ms: state.current_track().map(|t| t.duration_ms).unwrap_or(0),
            book_position_ms,
            book_duration_ms,
            chapter,
            chapter_title,
            chapter_position_ms: book_position_ms.saturating_sub(chapter.start_ms),
        }
    }

    pub fn chapter_index(&self) -> Option<usize> {
        self.chapter.lookup.index()
    }

    pub fn chapter_duration_ms(&self) -> u64 {
        self.chapter.duration_ms
    }

    pub fn book_progress(&self) -> f64 {
        fraction(self.book_position_ms, self.book_duration_ms)
    }

    pub fn track_progress(&self) -> f64 {
        fraction(self.track_position_ms, self.track_duration_ms)
    }

    pub fn chapter_progress(&self) -> f64 {
        fraction(self.chapter_position_ms, self.chapter.duration_ms)
    }
}

/// `part / whole` clamped to `[0, 1]`, 0 for an empty whole
fn fraction(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storystream_core::{Audiobook, Timestamp, Track};

    fn state(chapters: Vec<Chapter>, track_index: i64, position_ms: i64) -> PlaybackState {
        PlaybackState::loaded(
            Audiobook::new("View"),
            (0..3).map(|i| Track::new(i, 60_000)).collect(),
            chapters,
            track_index,
            position_ms,
            Timestamp::from_millis(1),
        )
    }

    fn book_chapters() -> Vec<Chapter> {
        vec![
            Chapter::new(0, "One", 0, 90_000),
            Chapter::new(1, "Two", 90_000, 150_000),
            Chapter::new(2, "Three", 150_000, 180_000),
        ]
    }

    #[test]
    fn test_cross_track_chapter() {
        let view = PlaybackView::of(&state(book_chapters(), 1, 30_000));

        assert_eq!(view.book_position_ms, 90_000);
        assert_eq!(view.chapter_index(), Some(1));
        assert_eq!(view.chapter_title.as_deref(), Some("Two"));
        assert_eq!(view.chapter_position_ms, 0);
        assert_eq!(view.chapter_duration_ms(), 60_000);
    }

    #[test]
    fn test_progress_fractions() {
        let view = PlaybackView::of(&state(book_chapters(), 2, 15_000));

        assert_eq!(view.book_position_ms, 135_000);
        assert!((view.book_progress() - 0.75).abs() < 1e-9);
        assert!((view.track_progress() - 0.25).abs() < 1e-9);
        assert!((view.chapter_progress() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_no_chapters_uses_whole_book() {
        let view = PlaybackView::of(&state(Vec::new(), 1, 0));

        assert_eq!(view.chapter.lookup, ChapterLookup::NoChapters);
        assert_eq!(view.chapter.start_ms, 0);
        assert_eq!(view.chapter_duration_ms(), 180_000);
        assert_eq!(view.chapter_position_ms, 60_000);
        assert!(view.chapter_title.is_none());
    }

    #[test]
    fn test_lead_in_and_tail_spans() {
        let chapters = vec![Chapter::new(0, "Middle", 30_000, 120_000)];

        let lead_in = PlaybackView::of(&state(chapters.clone(), 0, 10_000));
        assert_eq!(lead_in.chapter.lookup, ChapterLookup::BeforeAllChapters);
        assert_eq!(lead_in.chapter_duration_ms(), 30_000);

        let tail = PlaybackView::of(&state(chapters, 2, 30_000));
        assert_eq!(tail.chapter.lookup, ChapterLookup::AfterAllChapters);
        assert_eq!(tail.chapter.start_ms, 120_000);
        assert_eq!(tail.chapter_position_ms, 30_000);
    }

    #[test]
    fn test_empty_state_is_all_zero() {
        let view = PlaybackView::of(&PlaybackState::empty());

        assert!(!view.has_media);
        assert_eq!(view.book_progress(), 0.0);
        assert_eq!(view.track_progress(), 0.0);
        assert_eq!(view.chapter_progress(), 0.0);
    }
}
