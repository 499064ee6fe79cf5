//! Reading session: one open document, its layout state, and navigation.

pub mod layout;
pub mod navigator;
pub mod search;

use log::debug;

use crate::document::{ChapterContent, DisplaySettings, Metadata, ReadingPosition, SearchMatch, Theme};
use crate::epub::{materialize_chapters, resolve_manifest};
use crate::error::Result;
use crate::reader::layout::{Measure, PageFragment, Paginator, Viewport};
use crate::reader::navigator::{Navigator, PositionStore};
use crate::Package;

/// Explicit session configuration. Replaces ambient process-wide state:
/// font scale and the summarization endpoint travel with the session.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    pub viewport: Viewport,
    pub settings: DisplaySettings,
    /// Endpoint handed to the host's summarization collaborator together
    /// with the current page text. Opaque to the engine.
    pub summary_endpoint: Option<String>,
}

impl ReaderConfig {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            settings: DisplaySettings::default(),
            summary_endpoint: None,
        }
    }

    pub fn with_settings(mut self, settings: DisplaySettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_summary_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.summary_endpoint = Some(endpoint.into());
        self
    }
}

/// One reading session over one document.
///
/// Owns the materialized chapters, the current chapter's page fragments,
/// and the navigation state. All derived structures are torn down together
/// when the session is dropped.
pub struct ReaderSession {
    metadata: Metadata,
    chapters: Vec<ChapterContent>,
    config: ReaderConfig,
    navigator: Navigator,
    store: Box<dyn PositionStore>,
    /// Current chapter's fragments; rebuilt wholesale on invalidation.
    pages: Vec<PageFragment>,
    /// Cached page counts per chapter at the current layout parameters.
    page_counts: Vec<Option<usize>>,
    /// Bumped on every invalidating event. Results computed against an
    /// older epoch must be discarded, never merged (last-invalidation-wins).
    layout_epoch: u64,
}

impl ReaderSession {
    /// Open a document from container bytes.
    ///
    /// Ingestion is eager: the archive is unpacked, the manifest resolved,
    /// and every chapter materialized up front, after which the archive is
    /// dropped — materialized markup needs no further archive access.
    pub fn open(
        bytes: Vec<u8>,
        config: ReaderConfig,
        store: Box<dyn PositionStore>,
    ) -> Result<Self> {
        let mut package = Package::open(bytes)?;
        let outline = resolve_manifest(&mut package)?;
        let chapters = materialize_chapters(&mut package, &outline);
        drop(package);

        let document_id = if outline.metadata.identifier.is_empty() {
            outline.metadata.title.clone()
        } else {
            outline.metadata.identifier.clone()
        };

        let mut config = config;
        if let Some(saved) = store.load_settings(&document_id) {
            config.settings = saved;
        }

        let mut navigator = Navigator::new(document_id, chapters.len());
        navigator.restore(store.as_ref());

        let page_counts = vec![None; chapters.len()];
        debug!("opened document with {} chapters", chapters.len());

        Ok(Self {
            metadata: outline.metadata,
            chapters,
            config,
            navigator,
            store,
            pages: Vec::new(),
            page_counts,
            layout_epoch: 0,
        })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn chapters(&self) -> &[ChapterContent] {
        &self.chapters
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn position(&self) -> ReadingPosition {
        self.navigator.position()
    }

    /// Current layout epoch. Fragments computed before the latest
    /// invalidating event belong to an older epoch and must be discarded.
    pub fn layout_epoch(&self) -> u64 {
        self.layout_epoch
    }

    /// Page fragments of the current chapter (empty until the first
    /// [`paginate_current`](Self::paginate_current) call).
    pub fn pages(&self) -> &[PageFragment] {
        &self.pages
    }

    /// Lay out the current chapter, clamping the page index into the new
    /// page count, and return the fragments.
    pub fn paginate_current(&mut self, measure: &dyn Measure) -> &[PageFragment] {
        let order = self.navigator.position().chapter_order;
        let paginator = self.paginator();
        let chapter = &self.chapters[order];
        self.pages = paginator.paginate(chapter, measure);
        self.page_counts[order] = Some(self.pages.len());

        let page = self.navigator.position().page_index;
        let counts = &mut self.page_counts;
        let pages_len = self.pages.len();
        self.navigator.go_to(self.store.as_mut(), page, |o| {
            counts[o].unwrap_or(pages_len)
        });

        &self.pages
    }

    /// Advance one page (crossing chapter boundaries). Returns whether the
    /// position changed.
    pub fn next(&mut self, measure: &dyn Measure) -> bool {
        let moved = {
            let paginator = self.paginator();
            let chapters = &self.chapters;
            let counts = &mut self.page_counts;
            self.navigator.next(self.store.as_mut(), |order| {
                chapter_page_count(chapters, counts, paginator, measure, order)
            })
        };
        if moved {
            self.sync_pages(measure);
        }
        moved
    }

    /// Retreat one page (landing on the previous chapter's last page from
    /// page 0). Returns whether the position changed.
    pub fn previous(&mut self, measure: &dyn Measure) -> bool {
        let moved = {
            let paginator = self.paginator();
            let chapters = &self.chapters;
            let counts = &mut self.page_counts;
            self.navigator.previous(self.store.as_mut(), |order| {
                chapter_page_count(chapters, counts, paginator, measure, order)
            })
        };
        if moved {
            self.sync_pages(measure);
        }
        moved
    }

    /// Jump to a page in the current chapter (clamped); a pure index change
    /// with no re-layout. Returns the committed index.
    pub fn go_to(&mut self, page_index: usize, measure: &dyn Measure) -> usize {
        let paginator = self.paginator();
        let chapters = &self.chapters;
        let counts = &mut self.page_counts;
        self.navigator.go_to(self.store.as_mut(), page_index, |order| {
            chapter_page_count(chapters, counts, paginator, measure, order)
        })
    }

    /// Switch chapters (clamped), starting at page 0.
    pub fn set_chapter(&mut self, order: usize, measure: &dyn Measure) {
        {
            let paginator = self.paginator();
            let chapters = &self.chapters;
            let counts = &mut self.page_counts;
            self.navigator.set_chapter(self.store.as_mut(), order, |o| {
                chapter_page_count(chapters, counts, paginator, measure, o)
            });
        }
        self.sync_pages(measure);
    }

    /// Change the font scale and re-lay out (invalidates all cached
    /// layout).
    pub fn set_font_scale(&mut self, font_scale: u16, measure: &dyn Measure) {
        self.config.settings.font_scale = font_scale;
        self.invalidate_layout();
        self.save_settings();
        self.paginate_current(measure);
    }

    /// Change the theme. Themes never affect measured heights, but the
    /// layout epoch still advances so the surface re-renders consistently.
    pub fn set_theme(&mut self, theme: Theme, measure: &dyn Measure) {
        self.config.settings.theme = theme;
        self.layout_epoch += 1;
        self.save_settings();
        self.paginate_current(measure);
    }

    /// Change the viewport and re-lay out (invalidates all cached layout).
    pub fn resize(&mut self, viewport: Viewport, measure: &dyn Measure) {
        self.config.viewport = viewport;
        self.invalidate_layout();
        self.paginate_current(measure);
    }

    /// Flattened text of the current page: the payload handed to the
    /// summarization collaborator. That collaborator's failures never touch
    /// pagination or navigation state.
    pub fn current_page_text(&self) -> String {
        let page = self.navigator.position().page_index;
        self.pages
            .get(page)
            .map(|p| p.flatten_text())
            .unwrap_or_default()
    }

    /// "n of m" pair for UI display.
    pub fn page_label(&self) -> String {
        let position = self.navigator.position();
        format!(
            "{} of {}",
            position.page_index + 1,
            self.pages.len().max(1)
        )
    }

    /// Title of the current chapter.
    pub fn chapter_title(&self) -> &str {
        let order = self.navigator.position().chapter_order;
        &self.chapters[order].descriptor.title
    }

    /// Search the current chapter's pages. Never alters the reading
    /// position.
    pub fn search(&self, query: &str) -> Vec<SearchMatch> {
        search::search(query, &self.pages)
    }

    /// Highlight one match in the current chapter's pages.
    pub fn highlight(&mut self, m: &SearchMatch) {
        if let Some(page) = self.pages.get_mut(m.page_index) {
            search::highlight(page, m);
        }
    }

    /// Remove all highlights from the current chapter's pages.
    pub fn clear_highlights(&mut self) {
        for page in &mut self.pages {
            search::clear_highlights(page);
        }
    }

    fn paginator(&self) -> Paginator {
        Paginator::new(self.config.viewport, self.config.settings.font_scale)
    }

    fn invalidate_layout(&mut self) {
        self.layout_epoch += 1;
        self.page_counts = vec![None; self.chapters.len()];
        self.pages.clear();
    }

    fn save_settings(&mut self) {
        self.store
            .save_settings(self.navigator.document_id(), self.config.settings);
    }

    /// Rebuild `pages` when the current chapter no longer matches the
    /// cached fragments.
    fn sync_pages(&mut self, measure: &dyn Measure) {
        let order = self.navigator.position().chapter_order;
        let stale = self
            .pages
            .first()
            .map(|p| p.chapter_order != order)
            .unwrap_or(true);
        if stale {
            let paginator = self.paginator();
            self.pages = paginator.paginate(&self.chapters[order], measure);
            self.page_counts[order] = Some(self.pages.len());
        }
    }
}

/// Lazily computed page count for a chapter, cached until the next layout
/// invalidation.
fn chapter_page_count(
    chapters: &[ChapterContent],
    counts: &mut [Option<usize>],
    paginator: Paginator,
    measure: &dyn Measure,
    order: usize,
) -> usize {
    if let Some(count) = counts[order] {
        return count;
    }
    let count = paginator.paginate(&chapters[order], measure).len();
    counts[order] = Some(count);
    count
}
