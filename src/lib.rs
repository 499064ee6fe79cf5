//! # folio
//!
//! EPUB ingestion and viewport-aware pagination for ereader frontends.
//!
//! folio unpacks an EPUB container, resolves its manifest and spine into an
//! ordered chapter list, materializes each chapter as self-contained markup
//! (images inlined as data URIs), and slices chapters into fixed-size pages
//! that fit a given viewport. It also provides page-indexed navigation and
//! full-text search with in-place highlighting.
//!
//! The crate never talks to a rendering surface directly. Layout measurement
//! goes through the [`Measure`] trait: an embedding UI supplies real text
//! metrics, while [`CharCountMeasure`] offers deterministic character-count
//! heights for tests and headless use.
//!
//! ## Quick Start
//!
//! ```no_run
//! use folio::{CharCountMeasure, MemoryStore, ReaderConfig, ReaderSession, Viewport};
//!
//! let bytes = std::fs::read("book.epub")?;
//! let config = ReaderConfig::new(Viewport::new(390.0, 844.0));
//! let mut session = ReaderSession::open(bytes, config, Box::new(MemoryStore::new()))?;
//!
//! let measure = CharCountMeasure::default();
//! session.paginate_current(&measure);
//! println!("{}", session.page_label());
//! session.next(&measure);
//! # Ok::<(), folio::Error>(())
//! ```

pub mod document;
pub mod epub;
pub mod error;
pub mod markup;
pub mod reader;

pub use document::{
    ChapterContent, ChapterDescriptor, DisplaySettings, Metadata, ReadingPosition, SearchMatch,
    Theme,
};
pub use epub::archive::Package;
pub use epub::{materialize_chapters, resolve_manifest, DocumentOutline};
pub use error::{Error, Result};
pub use markup::Node;
pub use reader::layout::{CharCountMeasure, Measure, PageFragment, Paginator, Viewport};
pub use reader::navigator::{MemoryStore, Navigator, PositionStore};
pub use reader::search::{clear_highlights, highlight, search};
pub use reader::{ReaderConfig, ReaderSession};
