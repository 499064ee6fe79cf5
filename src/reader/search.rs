//! Full-text search over paginated chapters.
//!
//! Each page's flattened text is scanned independently, so a query string
//! split across a page boundary is not found; this is a documented
//! limitation of page-scoped search, not a defect. Case folding is ASCII.
//! Highlighting rewrites the page's text nodes in place and is round-trip
//! safe: clearing restores the original node structure exactly.

use std::ops::Range;

use memchr::memmem;

use crate::document::SearchMatch;
use crate::markup::Node;
use crate::reader::layout::PageFragment;

/// Characters of surrounding context captured on each side of a match.
const CONTEXT_CHARS: usize = 30;

/// Tag wrapped around highlighted spans.
const HIGHLIGHT_TAG: &str = "mark";

/// Case-insensitive substring search across a chapter's pages.
///
/// Case folding is ASCII-only: non-ASCII characters compare exactly, so
/// "Ä" does not match "ä". Matches are ordered page-index ascending, then
/// offset ascending — forward reading order. Offsets and lengths count
/// characters of the page's flattened text. An empty query yields no
/// matches.
pub fn search(query: &str, pages: &[PageFragment]) -> Vec<SearchMatch> {
    if query.is_empty() {
        return Vec::new();
    }

    let needle = query.to_ascii_lowercase();
    let finder = memmem::Finder::new(needle.as_bytes());
    let mut matches = Vec::new();

    for page in pages {
        let text = page.flatten_text();
        let haystack = text.to_ascii_lowercase();

        for byte_offset in finder.find_iter(haystack.as_bytes()) {
            // ASCII lowercasing preserves byte offsets, but a match can
            // still begin mid-codepoint when the query starts with a
            // non-ASCII byte sequence; skip those.
            if !text.is_char_boundary(byte_offset)
                || !text.is_char_boundary(byte_offset + needle.len())
            {
                continue;
            }

            let char_offset = text[..byte_offset].chars().count();
            let length = text[byte_offset..byte_offset + needle.len()].chars().count();

            matches.push(SearchMatch {
                page_index: page.page_index,
                char_offset_in_page: char_offset,
                length,
                context: context_around(&text, byte_offset, needle.len()),
            });
        }
    }

    matches
}

/// Surrounding context: up to 30 characters on each side, clipped to the
/// page's text bounds.
fn context_around(text: &str, byte_offset: usize, byte_len: usize) -> String {
    let start = text[..byte_offset]
        .char_indices()
        .rev()
        .nth(CONTEXT_CHARS - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let end = text[byte_offset + byte_len..]
        .char_indices()
        .nth(CONTEXT_CHARS)
        .map(|(i, _)| byte_offset + byte_len + i)
        .unwrap_or(text.len());
    text[start..end].to_string()
}

/// Wrap the matched character span in highlight markers.
///
/// Text nodes are walked in reading order with a running character offset;
/// each text node intersecting the match range gets its own wrapper, so a
/// match spanning inline tags highlights piecewise.
pub fn highlight(page: &mut PageFragment, m: &SearchMatch) {
    let range = m.char_offset_in_page..m.char_offset_in_page + m.length;
    let mut offset = 0usize;
    highlight_nodes(&mut page.nodes, &range, &mut offset);
}

fn highlight_nodes(nodes: &mut Vec<Node>, range: &Range<usize>, offset: &mut usize) {
    let mut i = 0;
    while i < nodes.len() {
        match &mut nodes[i] {
            Node::Element { children, .. } => {
                highlight_nodes(children, range, offset);
                i += 1;
            }
            Node::Text(text) => {
                let char_len = text.chars().count();
                let node_start = *offset;
                let node_end = *offset + char_len;
                *offset = node_end;

                let start = range.start.max(node_start);
                let end = range.end.min(node_end);
                if start >= end {
                    i += 1;
                    continue;
                }

                let text = text.clone();
                let byte_start = char_to_byte(&text, start - node_start);
                let byte_end = char_to_byte(&text, end - node_start);

                let mut replacement = Vec::new();
                if byte_start > 0 {
                    replacement.push(Node::text(&text[..byte_start]));
                }
                replacement.push(Node::Element {
                    tag: HIGHLIGHT_TAG.to_string(),
                    attrs: Vec::new(),
                    children: vec![Node::text(&text[byte_start..byte_end])],
                });
                if byte_end < text.len() {
                    replacement.push(Node::text(&text[byte_end..]));
                }

                let count = replacement.len();
                nodes.splice(i..i + 1, replacement);
                i += count;
            }
        }
    }
}

fn char_to_byte(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

/// Remove all highlight markers from a page, merging the text nodes back
/// together so the original node structure is restored exactly.
pub fn clear_highlights(page: &mut PageFragment) {
    clear_nodes(&mut page.nodes);
}

fn clear_nodes(nodes: &mut Vec<Node>) {
    let mut i = 0;
    while i < nodes.len() {
        let is_marker = matches!(
            &nodes[i],
            Node::Element { tag, .. } if tag == HIGHLIGHT_TAG
        );
        if is_marker {
            let Node::Element { children, .. } = nodes.remove(i) else {
                unreachable!()
            };
            nodes.splice(i..i, children);
            // Re-examine from the same index: unwrapped children may
            // themselves contain markers.
        } else {
            if let Node::Element { children, .. } = &mut nodes[i] {
                clear_nodes(children);
            }
            i += 1;
        }
    }

    merge_adjacent_text(nodes);
}

fn merge_adjacent_text(nodes: &mut Vec<Node>) {
    let mut i = 0;
    while i + 1 < nodes.len() {
        if matches!((&nodes[i], &nodes[i + 1]), (Node::Text(_), Node::Text(_))) {
            let Node::Text(next) = nodes.remove(i + 1) else {
                unreachable!()
            };
            if let Node::Text(current) = &mut nodes[i] {
                current.push_str(&next);
            }
        } else {
            i += 1;
        }
    }
}
