//! Compressed container access.
//!
//! A [`Package`] wraps one opened EPUB archive and owns its bytes for the
//! document's lifetime. Entries are read whole into memory — chapter files
//! are small, so no streaming is needed.

use std::io::{Cursor, Read};

use encoding_rs::WINDOWS_1252;
use zip::ZipArchive;

use crate::error::{Error, Result};

/// One opened archive. Created once at document load, dropped on unload.
pub struct Package {
    archive: ZipArchive<Cursor<Vec<u8>>>,
}

impl Package {
    /// Open a container from its raw bytes.
    ///
    /// Fails with [`Error::CorruptArchive`] if the compressed stream cannot
    /// be decoded.
    pub fn open(bytes: Vec<u8>) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| Error::CorruptArchive(e.to_string()))?;
        Ok(Self { archive })
    }

    /// Read a whole entry by archive path.
    ///
    /// Tries a direct lookup first, then a percent-decoded fallback —
    /// malformed EPUBs in the wild sometimes store encoded hrefs verbatim.
    pub fn read_entry(&mut self, path: &str) -> Result<Vec<u8>> {
        match self.archive.by_name(path) {
            Ok(mut file) => {
                let mut contents = Vec::new();
                file.read_to_end(&mut contents)?;
                return Ok(contents);
            }
            Err(zip::result::ZipError::FileNotFound) => {}
            Err(e) => return Err(Error::CorruptArchive(e.to_string())),
        }

        let decoded = percent_encoding::percent_decode_str(path)
            .decode_utf8()
            .map_err(|_| Error::EntryNotFound(path.to_string()))?;

        match self.archive.by_name(&decoded) {
            Ok(mut file) => {
                let mut contents = Vec::new();
                file.read_to_end(&mut contents)?;
                Ok(contents)
            }
            Err(zip::result::ZipError::FileNotFound) => Err(Error::EntryNotFound(path.to_string())),
            Err(e) => Err(Error::CorruptArchive(e.to_string())),
        }
    }

    /// Read an entry and decode it as text.
    ///
    /// Strips a UTF-8 BOM if present; falls back to CP1252 when the bytes
    /// are not valid UTF-8 (common in older ebooks).
    pub fn read_entry_text(&mut self, path: &str) -> Result<String> {
        let bytes = self.read_entry(path)?;
        let bytes = strip_bom(&bytes);
        match std::str::from_utf8(bytes) {
            Ok(s) => Ok(s.to_string()),
            Err(_) => {
                let (decoded, _, _) = WINDOWS_1252.decode(bytes);
                Ok(decoded.into_owned())
            }
        }
    }

    /// Whether the archive contains an entry at `path` (direct lookup only).
    pub fn has_entry(&mut self, path: &str) -> bool {
        self.archive.by_name(path).is_ok()
    }
}

/// Strip UTF-8 BOM (byte order mark) if present.
pub(crate) fn strip_bom(data: &[u8]) -> &[u8] {
    if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &data[3..]
    } else {
        data
    }
}
