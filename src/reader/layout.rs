//! Viewport-aware pagination.
//!
//! Slices a materialized chapter into page fragments that each fit the
//! viewport's content height. Layout measurement is abstracted behind the
//! [`Measure`] trait so the bin-packing logic runs identically against a
//! real rendering surface or the deterministic [`CharCountMeasure`] stub.

use std::collections::VecDeque;

use log::warn;

use crate::document::ChapterContent;
use crate::markup::{self, Node};

/// Vertical space reserved for fixed chrome (chapter title block + footer).
const CHROME_HEIGHT: f32 = 120.0;

/// A node taller than this fraction of the page content height gets a
/// dedicated page instead of sharing one. The slack below 1.0 avoids
/// one-node-per-page fragmentation from elements merely close to full
/// height.
const OVERSIZED_RATIO: f32 = 0.9;

/// Reader viewport in layout units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Height available to page content once fixed chrome is subtracted.
    pub fn content_height(&self) -> f32 {
        (self.height - CHROME_HEIGHT).max(0.0)
    }
}

/// One screen's worth of content nodes.
///
/// Fragments for a chapter form a total, order-preserving partition of the
/// chapter's top-level nodes: every node lands in exactly one fragment,
/// possibly split into two adjacent fragments when it alone exceeds the
/// page height.
#[derive(Debug, Clone, PartialEq)]
pub struct PageFragment {
    pub chapter_order: usize,
    pub page_index: usize,
    pub nodes: Vec<Node>,
}

impl PageFragment {
    /// Flattened text content of the page in reading order.
    pub fn flatten_text(&self) -> String {
        markup::flatten_nodes(&self.nodes)
    }
}

/// Layout measurement: rendered height of one node at a viewport width and
/// font scale. Supplied by the embedding rendering surface in production.
pub trait Measure {
    fn node_height(&self, node: &Node, viewport: Viewport, font_scale: u16) -> f32;
}

/// Deterministic stub measurement: height proportional to character count.
///
/// Stands in for a live layout surface in tests and headless use, keeping
/// the pagination algorithm's logic testable without real text metrics.
#[derive(Debug, Clone, Copy)]
pub struct CharCountMeasure {
    pub char_width: f32,
    pub line_height: f32,
    pub block_margin: f32,
}

impl Default for CharCountMeasure {
    fn default() -> Self {
        Self {
            char_width: 8.0,
            line_height: 20.0,
            block_margin: 10.0,
        }
    }
}

impl Measure for CharCountMeasure {
    fn node_height(&self, node: &Node, viewport: Viewport, font_scale: u16) -> f32 {
        let scale = font_scale as f32 / 100.0;
        let chars = node.flatten_text().chars().count();
        let cols = (viewport.width / (self.char_width * scale)).floor().max(1.0);
        let lines = (chars as f32 / cols).ceil().max(1.0);
        lines * self.line_height * scale + self.block_margin
    }
}

/// Pagination pass over one chapter. Stateless between calls; re-run it
/// wholesale on any invalidating event (chapter switch, font-scale change,
/// theme change, viewport resize) and discard the previous fragments.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    pub viewport: Viewport,
    pub font_scale: u16,
}

impl Paginator {
    pub fn new(viewport: Viewport, font_scale: u16) -> Self {
        Self {
            viewport,
            font_scale,
        }
    }

    /// Slice a chapter into page fragments.
    ///
    /// Every chapter yields at least one page, even when its markup is
    /// empty, so navigation always has a page to land on.
    pub fn paginate(&self, chapter: &ChapterContent, measure: &dyn Measure) -> Vec<PageFragment> {
        let nodes = prepare_nodes(&chapter.markup);
        let page_height = self.viewport.content_height();

        let mut pages: Vec<Vec<Node>> = Vec::new();
        let mut current: Vec<Node> = Vec::new();
        let mut acc = 0.0f32;
        let mut queue: VecDeque<Node> = nodes.into();

        while let Some(node) = queue.pop_front() {
            let height = measure.node_height(&node, self.viewport, self.font_scale);

            if !height.is_finite() || height < 0.0 {
                warn!("non-finite measurement for <{}>, placing alone", tag_of(&node));
                flush(&mut pages, &mut current, &mut acc);
                pages.push(vec![node]);
                continue;
            }

            // Oversized media/tables get dedicated pages rather than being
            // split; splittable text flows through the word-split path below.
            if !node.is_splittable() && height > page_height * OVERSIZED_RATIO {
                flush(&mut pages, &mut current, &mut acc);
                pages.push(vec![node]);
                continue;
            }

            if acc + height > page_height {
                if node.is_splittable() {
                    let fitting = self.largest_fitting_prefix(&node, page_height - acc, measure);
                    match fitting {
                        Some((prefix, rest)) => {
                            current.push(prefix);
                            flush(&mut pages, &mut current, &mut acc);
                            if let Some(rest) = rest {
                                queue.push_front(rest);
                            }
                        }
                        None if current.is_empty() => {
                            // Not even one word fits an empty page; a
                            // dedicated page is the only way forward.
                            pages.push(vec![node]);
                        }
                        None => {
                            flush(&mut pages, &mut current, &mut acc);
                            queue.push_front(node);
                        }
                    }
                } else {
                    flush(&mut pages, &mut current, &mut acc);
                    current.push(node);
                    acc = height;
                }
            } else {
                current.push(node);
                acc += height;
            }
        }

        flush(&mut pages, &mut current, &mut acc);

        if pages.is_empty() {
            pages.push(Vec::new());
        }

        pages
            .into_iter()
            .enumerate()
            .map(|(page_index, nodes)| PageFragment {
                chapter_order: chapter.descriptor.order,
                page_index,
                nodes,
            })
            .collect()
    }

    /// Binary-search the largest word-count prefix of `node` whose rendered
    /// height fits `remaining`. Returns the prefix and the (possibly empty)
    /// remainder, or `None` when not even one word fits.
    fn largest_fitting_prefix(
        &self,
        node: &Node,
        remaining: f32,
        measure: &dyn Measure,
    ) -> Option<(Node, Option<Node>)> {
        let total = node.word_count();
        if total == 0 {
            return None;
        }

        let mut lo = 0usize;
        let mut hi = total;
        while lo < hi {
            let mid = (lo + hi + 1) / 2;
            let fits = match node.split_at_words(mid).0 {
                Some(prefix) => {
                    measure.node_height(&prefix, self.viewport, self.font_scale) <= remaining
                }
                None => false,
            };
            if fits {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }

        if lo == 0 {
            return None;
        }

        let (prefix, rest) = node.split_at_words(lo);
        prefix.map(|p| (p, rest))
    }
}

/// Parse chapter markup into the top-level node list fed to pagination:
/// unwrap a single wrapping container, and synthesize a paragraph when
/// parsing yields text but no elements.
fn prepare_nodes(content: &str) -> Vec<Node> {
    let mut nodes = markup::parse_fragment(content);

    // Chapters whose entire body is a single wrapping container. A root
    // that is itself splittable stays whole: unwrapping it would scatter
    // bare text and inline nodes, none of which can be word-split.
    if nodes.len() == 1
        && !nodes[0].is_splittable()
        && let Node::Element { children, .. } = &nodes[0]
        && !children.is_empty()
    {
        let Node::Element { children, .. } = nodes.remove(0) else {
            unreachable!()
        };
        nodes = children;
    }

    let has_elements = nodes.iter().any(|n| matches!(n, Node::Element { .. }));
    let has_text = nodes
        .iter()
        .any(|n| matches!(n, Node::Text(t) if !t.trim().is_empty()));
    if !has_elements && has_text {
        nodes = vec![Node::Element {
            tag: "p".to_string(),
            attrs: Vec::new(),
            children: nodes,
        }];
    }

    nodes
}

fn flush(pages: &mut Vec<Vec<Node>>, current: &mut Vec<Node>, acc: &mut f32) {
    if !current.is_empty() {
        pages.push(std::mem::take(current));
    }
    *acc = 0.0;
}

fn tag_of(node: &Node) -> &str {
    node.tag().unwrap_or("#text")
}
