//! Core data model shared across ingestion, layout, and navigation.

/// Book metadata surfaced to the library/reader UI (Dublin Core subset).
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub title: String,
    pub authors: Vec<String>,
    pub language: String,
    pub identifier: String,
}

impl Metadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.authors.push(author.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

/// One spine entry after manifest resolution.
///
/// `order` is the 0-based spine position and is immutable once the manifest
/// has been resolved. `source_path` is the absolute archive path of the
/// chapter document (already resolved against the descriptor's directory).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterDescriptor {
    pub source_path: String,
    pub title: String,
    pub order: usize,
}

impl ChapterDescriptor {
    pub fn new(source_path: impl Into<String>, title: impl Into<String>, order: usize) -> Self {
        Self {
            source_path: source_path.into(),
            title: title.into(),
            order,
        }
    }
}

/// A materialized chapter: descriptor plus self-contained markup.
///
/// The markup needs no further archive access — referenced images have been
/// inlined as data URIs. Immutable once produced.
#[derive(Debug, Clone)]
pub struct ChapterContent {
    pub descriptor: ChapterDescriptor,
    pub markup: String,
}

/// Current reading position; the sole unit of truth persisted for
/// resume-reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadingPosition {
    pub chapter_order: usize,
    pub page_index: usize,
    pub total_pages_in_chapter: usize,
}

impl ReadingPosition {
    /// Blended whole-book progress fraction: chapter position dominates,
    /// page position within the chapter refines it.
    pub fn progress(&self, total_chapters: usize) -> f64 {
        if total_chapters == 0 {
            return 0.0;
        }
        let chapter_part = if total_chapters > 1 {
            self.chapter_order as f64 / (total_chapters - 1) as f64
        } else {
            0.0
        };
        let page_part = if self.total_pages_in_chapter > 0 {
            self.page_index as f64 / self.total_pages_in_chapter as f64
        } else {
            0.0
        };
        chapter_part * 0.9 + page_part * 0.1
    }
}

/// One search hit within a paginated chapter.
///
/// Ordering is page-index ascending, then offset ascending — forward reading
/// order. Offsets index characters of the page's flattened text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    pub page_index: usize,
    pub char_offset_in_page: usize,
    pub length: usize,
    pub context: String,
}

/// Named style variant. Themes never affect measurement; switching one
/// still triggers a re-render for visual consistency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
    Sepia,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::Sepia => "sepia",
        }
    }
}

/// Per-book display settings handed to the persistence collaborator as an
/// opaque record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplaySettings {
    /// Font scale as a percentage (100 = nominal).
    pub font_scale: u16,
    pub theme: Theme,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            font_scale: 100,
            theme: Theme::default(),
        }
    }
}
