//! EPUB container ingestion: archive access, manifest resolution, and
//! chapter materialization.

pub mod archive;
pub mod content;
pub mod manifest;

pub use content::materialize_chapters;
pub use manifest::{resolve_manifest, DocumentOutline};
