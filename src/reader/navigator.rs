//! Page and chapter navigation.
//!
//! The [`Navigator`] owns the current [`ReadingPosition`] and moves it
//! across page and chapter boundaries. It never paginates by itself:
//! callers supply a page-count lookup, which paginates chapters lazily
//! (crossing into a previous chapter needs that chapter's layout before its
//! last page index is known). Every committed transition is pushed to the
//! persistence collaborator synchronously.

use std::collections::HashMap;

use crate::document::{DisplaySettings, ReadingPosition};

/// Persistence collaborator: reading positions and display settings keyed
/// by document identity. The engine only requires get/set semantics; the
/// storage medium is the host's concern.
pub trait PositionStore {
    fn load_position(&self, document_id: &str) -> Option<ReadingPosition>;
    fn save_position(&mut self, document_id: &str, position: ReadingPosition);
    fn load_settings(&self, document_id: &str) -> Option<DisplaySettings>;
    fn save_settings(&mut self, document_id: &str, settings: DisplaySettings);
}

/// In-memory store for tests and headless sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    positions: HashMap<String, ReadingPosition>,
    settings: HashMap<String, DisplaySettings>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PositionStore for MemoryStore {
    fn load_position(&self, document_id: &str) -> Option<ReadingPosition> {
        self.positions.get(document_id).copied()
    }

    fn save_position(&mut self, document_id: &str, position: ReadingPosition) {
        self.positions.insert(document_id.to_string(), position);
    }

    fn load_settings(&self, document_id: &str) -> Option<DisplaySettings> {
        self.settings.get(document_id).copied()
    }

    fn save_settings(&mut self, document_id: &str, settings: DisplaySettings) {
        self.settings.insert(document_id.to_string(), settings);
    }
}

/// Tracks the current (chapter, page) position for one open document.
#[derive(Debug)]
pub struct Navigator {
    document_id: String,
    total_chapters: usize,
    position: ReadingPosition,
}

impl Navigator {
    pub fn new(document_id: impl Into<String>, total_chapters: usize) -> Self {
        Self {
            document_id: document_id.into(),
            total_chapters,
            position: ReadingPosition::default(),
        }
    }

    /// Restore a previously saved position, clamped to the current document
    /// shape (a shorter document than when the position was saved must not
    /// leave the position out of range).
    pub fn restore(&mut self, store: &dyn PositionStore) {
        if let Some(saved) = store.load_position(&self.document_id) {
            self.position.chapter_order =
                saved.chapter_order.min(self.total_chapters.saturating_sub(1));
            self.position.page_index = saved.page_index;
            self.position.total_pages_in_chapter = saved.total_pages_in_chapter;
        }
    }

    pub fn position(&self) -> ReadingPosition {
        self.position
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Advance one page, crossing into the next chapter from the last page.
    /// No-op on the document's final page. Returns whether a transition was
    /// committed.
    pub fn next(
        &mut self,
        store: &mut dyn PositionStore,
        mut page_count: impl FnMut(usize) -> usize,
    ) -> bool {
        let total = page_count(self.position.chapter_order);
        self.position.total_pages_in_chapter = total;

        if self.position.page_index + 1 < total {
            self.position.page_index += 1;
        } else if self.position.chapter_order + 1 < self.total_chapters {
            self.position.chapter_order += 1;
            self.position.page_index = 0;
            self.position.total_pages_in_chapter = page_count(self.position.chapter_order);
        } else {
            return false;
        }

        store.save_position(&self.document_id, self.position);
        true
    }

    /// Retreat one page, landing on the previous chapter's last page from
    /// page 0 (which paginates that chapter on entry). No-op at the very
    /// beginning.
    pub fn previous(
        &mut self,
        store: &mut dyn PositionStore,
        mut page_count: impl FnMut(usize) -> usize,
    ) -> bool {
        if self.position.page_index > 0 {
            self.position.page_index -= 1;
        } else if self.position.chapter_order > 0 {
            self.position.chapter_order -= 1;
            let total = page_count(self.position.chapter_order);
            self.position.total_pages_in_chapter = total;
            self.position.page_index = total.saturating_sub(1);
        } else {
            return false;
        }

        store.save_position(&self.document_id, self.position);
        true
    }

    /// Jump to a page in the current chapter, clamped into
    /// `[0, total_pages - 1]`. A pure index change; returns the committed
    /// index.
    pub fn go_to(
        &mut self,
        store: &mut dyn PositionStore,
        page_index: usize,
        mut page_count: impl FnMut(usize) -> usize,
    ) -> usize {
        let total = page_count(self.position.chapter_order);
        self.position.total_pages_in_chapter = total;
        self.position.page_index = page_index.min(total.saturating_sub(1));
        store.save_position(&self.document_id, self.position);
        self.position.page_index
    }

    /// Switch to a chapter (clamped), starting at its first page.
    pub fn set_chapter(
        &mut self,
        store: &mut dyn PositionStore,
        order: usize,
        mut page_count: impl FnMut(usize) -> usize,
    ) {
        self.position.chapter_order = order.min(self.total_chapters.saturating_sub(1));
        self.position.page_index = 0;
        self.position.total_pages_in_chapter = page_count(self.position.chapter_order);
        store.save_position(&self.document_id, self.position);
    }
}
