//! Chapter materialization.
//!
//! Turns each [`ChapterDescriptor`] into self-contained markup: the chapter
//! entry is read from the archive, its title is repaired from in-content
//! headings, and referenced images are inlined as base64 data URIs so the
//! markup needs no further archive access when rendered.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::warn;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::document::{ChapterContent, ChapterDescriptor};
use crate::epub::archive::Package;
use crate::error::Error;
use crate::epub::manifest::{local_name, resolve_entity, resolve_path, DocumentOutline};

/// Substituted when a spine chapter's file is absent from the archive.
const MISSING_CHAPTER_PLACEHOLDER: &str = "<p>Chapter content not available</p>";

/// Materialize every chapter in the outline, in spine order.
///
/// A missing chapter file degrades to placeholder content rather than
/// aborting the document.
pub fn materialize_chapters(
    package: &mut Package,
    outline: &DocumentOutline,
) -> Vec<ChapterContent> {
    outline
        .chapters
        .iter()
        .map(|descriptor| materialize_chapter(package, descriptor))
        .collect()
}

/// Materialize a single chapter.
pub fn materialize_chapter(
    package: &mut Package,
    descriptor: &ChapterDescriptor,
) -> ChapterContent {
    let raw = match package.read_entry_text(&descriptor.source_path) {
        Ok(text) => text,
        Err(e) => {
            let e = match e {
                Error::EntryNotFound(path) => Error::ChapterFileMissing(path),
                other => other,
            };
            warn!("{e}, substituting placeholder");
            return ChapterContent {
                descriptor: descriptor.clone(),
                markup: MISSING_CHAPTER_PLACEHOLDER.to_string(),
            };
        }
    };

    let mut descriptor = descriptor.clone();
    if let Some(title) = extract_title(&raw) {
        descriptor.title = title;
    }

    let chapter_dir = descriptor
        .source_path
        .rfind('/')
        .map(|i| descriptor.source_path[..i].to_string())
        .unwrap_or_default();
    let markup = inline_images(package, &raw, &chapter_dir);

    ChapterContent { descriptor, markup }
}

/// Scan the raw markup for the best in-content title: first `h1`, else first
/// `h2`, else the document `title` element. Nested tags are stripped; a
/// title that is empty after stripping is discarded.
fn extract_title(markup: &str) -> Option<String> {
    // First occurrence of each candidate tag; None until seen, then the
    // stripped text (possibly empty).
    let mut h1: Option<String> = None;
    let mut h2: Option<String> = None;
    let mut title: Option<String> = None;

    let mut reader = Reader::from_str(markup);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    // (slot currently being captured, depth below its start tag)
    let mut capturing: Option<(u8, String)> = None;
    let mut depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let tag = String::from_utf8_lossy(local_name(e.name().as_ref())).to_lowercase();
                if capturing.is_some() {
                    depth += 1;
                    continue;
                }
                let slot = match tag.as_str() {
                    "h1" if h1.is_none() => Some(1),
                    "h2" if h2.is_none() => Some(2),
                    "title" if title.is_none() => Some(3),
                    _ => None,
                };
                if let Some(slot) = slot {
                    capturing = Some((slot, String::new()));
                    depth = 0;
                }
            }
            Ok(Event::Text(e)) => {
                if let Some((_, buf)) = capturing.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if let Some((_, buf)) = capturing.as_mut() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    if let Some(resolved) = resolve_entity(&entity) {
                        buf.push_str(&resolved);
                    }
                }
            }
            Ok(Event::End(_)) => {
                if capturing.is_some() {
                    if depth > 0 {
                        depth -= 1;
                    } else if let Some((slot, buf)) = capturing.take() {
                        let text = buf.trim().to_string();
                        match slot {
                            1 => h1 = Some(text),
                            2 => h2 = Some(text),
                            _ => title = Some(text),
                        }
                        // The first h1 settles the outcome, empty or not.
                        if h1.is_some() {
                            break;
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }

    // Priority order; an empty first occurrence keeps the spine default
    // rather than falling through to the next candidate.
    h1.or(h2).or(title).filter(|t| !t.is_empty())
}

/// Replace relative image references with base64 data URIs.
///
/// References that point outside the archive (URLs, data URIs) and
/// references whose target entry is missing are left untouched.
fn inline_images(package: &mut Package, markup: &str, chapter_dir: &str) -> String {
    let mut out = markup.to_string();

    for src in collect_image_srcs(markup) {
        if is_external(&src) {
            continue;
        }
        let full_path = resolve_path(chapter_dir, &src);
        match package.read_entry(&full_path) {
            Ok(bytes) => {
                let data_url = format!(
                    "data:image/{};base64,{}",
                    image_subtype(&src),
                    BASE64.encode(&bytes)
                );
                out = out
                    .replace(&format!("\"{src}\""), &format!("\"{data_url}\""))
                    .replace(&format!("'{src}'"), &format!("'{data_url}'"));
            }
            Err(e) => {
                warn!("image reference unresolved: {full_path} ({e})");
            }
        }
    }

    out
}

/// Distinct `img` src values in document order.
fn collect_image_srcs(markup: &str) -> Vec<String> {
    let mut srcs: Vec<String> = Vec::new();

    let mut reader = Reader::from_str(markup);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if local_name(e.name().as_ref()).eq_ignore_ascii_case(b"img") {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"src" {
                            let src = String::from_utf8_lossy(&attr.value).to_string();
                            if !src.is_empty() && !srcs.contains(&src) {
                                srcs.push(src);
                            }
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }

    srcs
}

/// Whether a reference points outside the archive.
fn is_external(src: &str) -> bool {
    src.starts_with("data:") || src.starts_with("//") || src.contains("://")
}

/// Image MIME subtype inferred from the file extension (png family default).
fn image_subtype(path: &str) -> &'static str {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "jpeg"
    } else {
        "png"
    }
}
