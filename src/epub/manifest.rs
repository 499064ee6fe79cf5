//! Package descriptor resolution.
//!
//! Locates the fixed pointer entry (`META-INF/container.xml`), follows it to
//! the OPF package descriptor, and maps the spine through the manifest into
//! an ordered chapter list.

use std::collections::HashMap;

use log::debug;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::document::{ChapterDescriptor, Metadata};
use crate::epub::archive::Package;
use crate::error::{Error, Result};

/// Well-known path of the pointer entry inside the container.
const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Resolved document structure: ordered chapters plus surfaced metadata.
#[derive(Debug, Clone)]
pub struct DocumentOutline {
    pub metadata: Metadata,
    pub chapters: Vec<ChapterDescriptor>,
}

/// Resolve the container's manifest and spine into a [`DocumentOutline`].
///
/// Spine entries whose idref has no manifest match are skipped rather than
/// failing the whole document. A spine that resolves to zero chapters is a
/// hard failure ([`Error::EmptySpine`]).
pub fn resolve_manifest(package: &mut Package) -> Result<DocumentOutline> {
    let container = match package.read_entry_text(CONTAINER_PATH) {
        Ok(text) => text,
        Err(Error::EntryNotFound(path)) => return Err(Error::MissingPointerFile(path)),
        Err(e) => return Err(e),
    };

    let opf_path = parse_container(&container)?;
    let opf_dir = opf_path
        .rfind('/')
        .map(|i| opf_path[..i].to_string())
        .unwrap_or_default();

    let opf_content = package.read_entry_text(&opf_path)?;
    let opf = parse_opf(&opf_content)?;

    let mut chapters = Vec::new();
    for id in &opf.spine_ids {
        let Some((href, _media_type)) = opf.manifest.get(id) else {
            debug!("spine idref {id:?} has no manifest entry, skipping");
            continue;
        };
        let order = chapters.len();
        chapters.push(ChapterDescriptor::new(
            resolve_path(&opf_dir, href),
            format!("Chapter {}", order + 1),
            order,
        ));
    }

    if chapters.is_empty() {
        return Err(Error::EmptySpine);
    }

    debug!(
        "resolved {} chapters from {opf_path:?}",
        chapters.len()
    );

    Ok(DocumentOutline {
        metadata: opf.metadata,
        chapters,
    })
}

/// Parse the pointer file to find the OPF path.
fn parse_container(content: &str) -> Result<String> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if local_name(e.name().as_ref()) == b"rootfile" =>
            {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"full-path" {
                        return String::from_utf8(attr.value.to_vec())
                            .map_err(|e| Error::MalformedPointerFile(e.to_string()));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::MalformedPointerFile(e.to_string())),
            _ => {}
        }
    }

    Err(Error::MalformedPointerFile(
        "no rootfile with full-path attribute".into(),
    ))
}

/// Parsed OPF package data.
struct OpfData {
    metadata: Metadata,
    /// Maps manifest id -> (href, media_type)
    manifest: HashMap<String, (String, String)>,
    spine_ids: Vec<String>,
}

/// Parse the OPF package descriptor: Dublin Core metadata, manifest table,
/// and spine order.
fn parse_opf(content: &str) -> Result<OpfData> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut metadata = Metadata::default();
    let mut manifest: HashMap<String, (String, String)> = HashMap::new();
    let mut spine_ids: Vec<String> = Vec::new();

    let mut in_metadata = false;
    let mut current_element: Option<String> = None;
    let mut buf_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());

                match local {
                    b"metadata" => in_metadata = true,
                    b"title" | b"creator" | b"language" | b"identifier" => {
                        if in_metadata {
                            current_element = Some(String::from_utf8_lossy(local).to_string());
                            buf_text.clear();
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());

                match local {
                    b"item" => {
                        let mut id = String::new();
                        let mut href = String::new();
                        let mut media_type = String::new();

                        for attr in e.attributes().flatten() {
                            match attr.key.as_ref() {
                                b"id" => id = String::from_utf8(attr.value.to_vec())?,
                                b"href" => href = String::from_utf8(attr.value.to_vec())?,
                                b"media-type" => {
                                    media_type = String::from_utf8(attr.value.to_vec())?
                                }
                                _ => {}
                            }
                        }

                        if !id.is_empty() {
                            manifest.insert(id, (href, media_type));
                        }
                    }
                    b"itemref" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"idref" {
                                spine_ids.push(String::from_utf8(attr.value.to_vec())?);
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if current_element.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if current_element.is_some() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    if let Some(resolved) = resolve_entity(&entity) {
                        buf_text.push_str(&resolved);
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());

                if local == b"metadata" {
                    in_metadata = false;
                }

                if let Some(ref elem) = current_element {
                    match elem.as_str() {
                        "title" => metadata.title = buf_text.clone(),
                        "creator" => metadata.authors.push(buf_text.clone()),
                        "language" => metadata.language = buf_text.clone(),
                        "identifier" if metadata.identifier.is_empty() => {
                            metadata.identifier = buf_text.clone()
                        }
                        _ => {}
                    }
                    current_element = None;
                    buf_text.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    Ok(OpfData {
        metadata,
        manifest,
        spine_ids,
    })
}

/// Resolve an href against a base directory inside the archive.
///
/// Handles `./`, `../`, and leading-`/` segments; archive paths never start
/// with `/`.
pub(crate) fn resolve_path(base_dir: &str, href: &str) -> String {
    // A leading slash anchors the href at the archive root.
    let mut segments: Vec<&str> = if base_dir.is_empty() || href.starts_with('/') {
        Vec::new()
    } else {
        base_dir.split('/').filter(|s| !s.is_empty()).collect()
    };

    for part in href.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

/// Extract local name from a namespaced XML name (e.g. "dc:title" -> "title").
pub(crate) fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

/// Resolve XML entity references (named subset plus numeric forms).
pub(crate) fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        "nbsp" => return Some("\u{a0}".to_string()),
        _ => {}
    }

    if let Some(hex) = entity.strip_prefix("#x") {
        if let Ok(code) = u32::from_str_radix(hex, 16)
            && let Some(c) = char::from_u32(code)
        {
            return Some(c.to_string());
        }
    } else if let Some(dec) = entity.strip_prefix('#')
        && let Ok(code) = dec.parse::<u32>()
        && let Some(c) = char::from_u32(code)
    {
        return Some(c.to_string());
    }

    None
}
