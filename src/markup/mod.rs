//! Lightweight owned markup tree.
//!
//! Chapter documents are XHTML, so they parse with the same quick-xml event
//! loop used for the package descriptor, in a tolerant configuration
//! (unmatched end tags ignored, HTML void elements treated as empty). The
//! resulting [`Node`] tree is what the pagination engine slices into pages
//! and what search highlighting rewrites in place.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::epub::manifest::{local_name, resolve_entity};

/// Block-level containers whose text may be divided at word boundaries
/// across two pages.
const SPLITTABLE_TAGS: &[&str] = &["p", "div", "blockquote", "section", "li"];

/// Inline tags allowed inside a splittable block.
const INLINE_TAGS: &[&str] = &[
    "a", "b", "i", "em", "strong", "span", "small", "sub", "sup", "u", "code", "br", "mark",
];

/// Elements that never have content, even when written without a closing tag.
const VOID_TAGS: &[&str] = &["img", "br", "hr", "input", "meta", "link", "col", "wbr"];

/// One markup node: an element with attributes and children, or a text run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<Node>,
    },
    Text(String),
}

impl Node {
    pub fn element(tag: impl Into<String>) -> Self {
        Node::Element {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Node::Text(content.into())
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            Node::Element { tag, .. } => Some(tag),
            Node::Text(_) => None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            Node::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            Node::Text(_) => None,
        }
    }

    /// Concatenated text content in reading order (DOM textContent
    /// semantics: no separators are inserted at element boundaries).
    pub fn flatten_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(t) => out.push_str(t),
            Node::Element { children, .. } => {
                for child in children {
                    child.collect_text(out);
                }
            }
        }
    }

    /// Number of whitespace-separated words in the node's text content.
    pub fn word_count(&self) -> usize {
        self.flatten_text().split_whitespace().count()
    }

    /// Whether this node may be split at word boundaries: a block-level text
    /// container whose descendants are text or inline markup only.
    pub fn is_splittable(&self) -> bool {
        match self {
            Node::Text(_) => false,
            Node::Element { tag, children, .. } => {
                SPLITTABLE_TAGS.contains(&tag.as_str())
                    && children.iter().all(Node::is_inline_content)
            }
        }
    }

    fn is_inline_content(&self) -> bool {
        match self {
            Node::Text(_) => true,
            Node::Element { tag, children, .. } => {
                INLINE_TAGS.contains(&tag.as_str())
                    && children.iter().all(Node::is_inline_content)
            }
        }
    }

    /// Split this node after its first `n` words.
    ///
    /// Element structure is preserved on both sides: an inline tag crossing
    /// the split point appears in both halves, each wrapping its own text
    /// portion. Concatenating the flattened text of both halves reproduces
    /// the original exactly. Returns `None` sides for empty halves.
    pub fn split_at_words(&self, n: usize) -> (Option<Node>, Option<Node>) {
        let mut remaining = n;
        self.split_words_inner(&mut remaining)
    }

    fn split_words_inner(&self, remaining: &mut usize) -> (Option<Node>, Option<Node>) {
        match self {
            Node::Text(t) => {
                let idx = word_boundary_index(t, remaining);
                let (head, tail) = t.split_at(idx);
                let prefix = (!head.is_empty()).then(|| Node::text(head));
                let rest = (!tail.is_empty()).then(|| Node::text(tail));
                (prefix, rest)
            }
            Node::Element { tag, attrs, children } => {
                let mut prefix_children = Vec::new();
                let mut rest_children = Vec::new();

                for child in children {
                    if *remaining == 0 {
                        rest_children.push(child.clone());
                        continue;
                    }
                    let (p, r) = child.split_words_inner(remaining);
                    if let Some(p) = p {
                        prefix_children.push(p);
                    }
                    if let Some(r) = r {
                        rest_children.push(r);
                    }
                }

                let make = |children: Vec<Node>| Node::Element {
                    tag: tag.clone(),
                    attrs: attrs.clone(),
                    children,
                };
                let prefix = (!prefix_children.is_empty()).then(|| make(prefix_children));
                let rest = (!rest_children.is_empty()).then(|| make(rest_children));
                (prefix, rest)
            }
        }
    }
}

/// Byte index just past the `*remaining`-th word of `text`, decrementing
/// `*remaining` for each word consumed. Trailing whitespace after the last
/// consumed word stays with the remainder.
fn word_boundary_index(text: &str, remaining: &mut usize) -> usize {
    if *remaining == 0 {
        return 0;
    }
    let mut in_word = false;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if in_word {
                in_word = false;
                *remaining -= 1;
                if *remaining == 0 {
                    return i;
                }
            }
        } else {
            in_word = true;
        }
    }
    if in_word {
        *remaining -= 1;
    }
    text.len()
}

/// Parse a chapter markup string into a top-level node list.
///
/// Tolerant of real-world XHTML: unmatched end tags are ignored, HTML void
/// elements written without a closing tag do not swallow their siblings, and
/// unknown entities are dropped. `html` and `body` wrappers are unwrapped;
/// `head` subtrees are pruned.
pub fn parse_fragment(content: &str) -> Vec<Node> {
    let mut reader = Reader::from_str(content);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    // Stack of open elements; index 0 is the synthetic root.
    let mut stack: Vec<Node> = vec![Node::element("#root")];

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let tag = String::from_utf8_lossy(local_name(e.name().as_ref())).to_lowercase();
                let attrs = read_attrs(&e);
                let node = Node::Element {
                    tag: tag.clone(),
                    attrs,
                    children: Vec::new(),
                };
                if VOID_TAGS.contains(&tag.as_str()) {
                    append_child(&mut stack, node);
                } else {
                    stack.push(node);
                }
            }
            Ok(Event::Empty(e)) => {
                let tag = String::from_utf8_lossy(local_name(e.name().as_ref())).to_lowercase();
                let node = Node::Element {
                    tag,
                    attrs: read_attrs(&e),
                    children: Vec::new(),
                };
                append_child(&mut stack, node);
            }
            Ok(Event::End(e)) => {
                let tag = String::from_utf8_lossy(local_name(e.name().as_ref())).to_lowercase();
                close_element(&mut stack, &tag);
            }
            Ok(Event::Text(e)) => {
                let text = String::from_utf8_lossy(e.as_ref()).to_string();
                append_text(&mut stack, &text);
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(e.as_ref()).to_string();
                append_text(&mut stack, &text);
            }
            Ok(Event::GeneralRef(e)) => {
                let entity = String::from_utf8_lossy(e.as_ref());
                if let Some(resolved) = resolve_entity(&entity) {
                    append_text(&mut stack, &resolved);
                }
            }
            Ok(Event::Eof) => break,
            // Malformed markup past this point: keep what parsed so far.
            Err(_) => break,
            _ => {}
        }
    }

    // Close any still-open elements.
    while stack.len() > 1 {
        let node = stack.pop().unwrap_or_else(|| Node::element("#root"));
        if let Some(parent) = stack.last_mut()
            && let Node::Element { children, .. } = parent
        {
            children.push(node);
        }
    }

    let Some(Node::Element { children, .. }) = stack.pop() else {
        return Vec::new();
    };

    unwrap_document(children)
}

fn read_attrs(e: &quick_xml::events::BytesStart<'_>) -> Vec<(String, String)> {
    e.attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            // Unescape so serialization does not double-escape.
            let value = match attr.unescape_value() {
                Ok(v) => v.to_string(),
                Err(_) => String::from_utf8_lossy(&attr.value).to_string(),
            };
            (key, value)
        })
        .collect()
}

fn append_child(stack: &mut Vec<Node>, node: Node) {
    if let Some(Node::Element { children, .. }) = stack.last_mut() {
        children.push(node);
    }
}

fn append_text(stack: &mut Vec<Node>, text: &str) {
    if let Some(Node::Element { children, .. }) = stack.last_mut() {
        if let Some(Node::Text(existing)) = children.last_mut() {
            existing.push_str(text);
        } else {
            children.push(Node::text(text));
        }
    }
}

/// Close the innermost open element with the given tag. Intermediate open
/// elements are folded into their parents; an end tag matching nothing is
/// dropped.
fn close_element(stack: &mut Vec<Node>, tag: &str) {
    let Some(pos) = stack
        .iter()
        .skip(1)
        .rposition(|n| n.tag() == Some(tag))
        .map(|i| i + 1)
    else {
        return;
    };

    while stack.len() > pos {
        let node = match stack.pop() {
            Some(n) => n,
            None => return,
        };
        if let Some(Node::Element { children, .. }) = stack.last_mut() {
            children.push(node);
        }
    }
}

/// Strip document scaffolding: drop `head`, unwrap `html` and `body`.
fn unwrap_document(nodes: Vec<Node>) -> Vec<Node> {
    let mut out = Vec::new();
    for node in nodes {
        match node {
            Node::Element { ref tag, .. } if tag == "head" => {}
            Node::Element { tag, children, .. } if tag == "html" || tag == "body" => {
                out.extend(unwrap_document(children));
            }
            Node::Text(t) if t.trim().is_empty() => {}
            other => out.push(other),
        }
    }
    out
}

/// Serialize a node list back to markup.
pub fn serialize(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        serialize_node(node, &mut out);
    }
    out
}

fn serialize_node(node: &Node, out: &mut String) {
    match node {
        Node::Text(t) => out.push_str(&escape_text(t)),
        Node::Element { tag, attrs, children } => {
            out.push('<');
            out.push_str(tag);
            for (k, v) in attrs {
                out.push(' ');
                out.push_str(k);
                out.push_str("=\"");
                out.push_str(&escape_attr(v));
                out.push('"');
            }
            if children.is_empty() && VOID_TAGS.contains(&tag.as_str()) {
                out.push_str("/>");
            } else {
                out.push('>');
                for child in children {
                    serialize_node(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

/// Flattened text of a whole node list (textContent of each, concatenated).
pub fn flatten_nodes(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        node.collect_text(&mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_fragment() {
        let nodes = parse_fragment("<p>Hello <b>world</b></p><p>Second</p>");
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].tag(), Some("p"));
        assert_eq!(nodes[0].flatten_text(), "Hello world");
        assert_eq!(nodes[1].flatten_text(), "Second");
    }

    #[test]
    fn test_parse_unwraps_document() {
        let markup = "<html><head><title>T</title></head><body><p>Content</p></body></html>";
        let nodes = parse_fragment(markup);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].tag(), Some("p"));
        assert_eq!(nodes[0].flatten_text(), "Content");
    }

    #[test]
    fn test_parse_stray_end_tag() {
        let nodes = parse_fragment("<p>one</p></div><p>two</p>");
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn test_parse_unclosed_void_element() {
        // An <img> without a closing tag must not swallow its siblings.
        let nodes = parse_fragment("<div><img src=\"a.png\"><p>after</p></div>");
        let Node::Element { children, .. } = &nodes[0] else {
            panic!("expected element");
        };
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].tag(), Some("img"));
        assert_eq!(children[0].attr("src"), Some("a.png"));
        assert_eq!(children[1].tag(), Some("p"));
    }

    #[test]
    fn test_parse_entities() {
        let nodes = parse_fragment("<p>Don&apos;t &amp; won&#8217;t</p>");
        assert_eq!(nodes[0].flatten_text(), "Don't & won\u{2019}t");
    }

    #[test]
    fn test_serialize_roundtrip() {
        let markup = r#"<p class="lead">Hello <b>world</b></p>"#;
        let nodes = parse_fragment(markup);
        assert_eq!(serialize(&nodes), markup);
    }

    #[test]
    fn test_serialize_escapes() {
        let nodes = vec![Node::text("a < b & c")];
        assert_eq!(serialize(&nodes), "a &lt; b &amp; c");
    }

    #[test]
    fn test_word_count() {
        let nodes = parse_fragment("<p>one two <b>three</b> four</p>");
        assert_eq!(nodes[0].word_count(), 4);
    }

    #[test]
    fn test_is_splittable() {
        let para = parse_fragment("<p>text <em>inline</em></p>").remove(0);
        assert!(para.is_splittable());

        let table = parse_fragment("<table><tr><td>x</td></tr></table>").remove(0);
        assert!(!table.is_splittable());

        let nested = parse_fragment("<div><p>block inside</p></div>").remove(0);
        assert!(!nested.is_splittable());
    }

    #[test]
    fn test_split_at_words_plain() {
        let para = parse_fragment("<p>one two three four five</p>").remove(0);
        let (prefix, rest) = para.split_at_words(2);
        let prefix = prefix.unwrap();
        let rest = rest.unwrap();
        assert_eq!(prefix.flatten_text(), "one two");
        assert_eq!(rest.flatten_text(), " three four five");
        // Lossless: concatenation reproduces the original.
        assert_eq!(
            prefix.flatten_text() + &rest.flatten_text(),
            "one two three four five"
        );
    }

    #[test]
    fn test_split_at_words_across_inline_tag() {
        let para = parse_fragment("<p>alpha <em>beta gamma</em> delta</p>").remove(0);
        let (prefix, rest) = para.split_at_words(2);
        let prefix = prefix.unwrap();
        let rest = rest.unwrap();
        assert_eq!(prefix.flatten_text(), "alpha beta");
        assert_eq!(rest.flatten_text(), " gamma delta");
        // The <em> appears on both sides, wrapping its own portion.
        assert_eq!(serialize(&[prefix]), "<p>alpha <em>beta</em></p>");
        assert_eq!(serialize(&[rest]), "<p><em> gamma</em> delta</p>");
    }

    #[test]
    fn test_split_at_words_all_or_nothing() {
        let para = parse_fragment("<p>one two</p>").remove(0);

        let (prefix, rest) = para.split_at_words(0);
        assert!(prefix.is_none());
        assert_eq!(rest.unwrap().flatten_text(), "one two");

        let (prefix, rest) = para.split_at_words(5);
        assert_eq!(prefix.unwrap().flatten_text(), "one two");
        assert!(rest.is_none());
    }
}
