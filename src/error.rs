//! Error types for document ingestion and layout.

use thiserror::Error;

/// Errors that can occur while opening or paginating a document.
///
/// The first five variants are fatal to opening a document: re-opening the
/// same bytes will fail identically, so callers should surface them as
/// "cannot open this document" without retrying.
/// [`Error::ChapterFileMissing`] is recoverable: the materializer logs it
/// and substitutes placeholder content instead of failing the document.
#[derive(Error, Debug)]
pub enum Error {
    /// The compressed container stream could not be decoded.
    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    /// A named entry does not exist in the archive's entry table.
    #[error("entry not found in archive: {0}")]
    EntryNotFound(String),

    /// The fixed-path pointer entry (META-INF/container.xml) is absent.
    #[error("missing pointer file: {0}")]
    MissingPointerFile(String),

    /// The pointer file exists but could not be parsed, or names no
    /// package descriptor.
    #[error("malformed pointer file: {0}")]
    MalformedPointerFile(String),

    /// The spine resolved to zero readable chapters.
    #[error("document has no readable chapters")]
    EmptySpine,

    /// A spine chapter's href resolved to no archive entry.
    #[error("chapter file missing: {0}")]
    ChapterFileMissing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub type Result<T> = std::result::Result<T, Error>;
