//! Lossless HTML scanner.
//!
//! Builds an index arena (`Vec<Node>` addressed by [`NodeId`]) where every node
//! carries byte spans into the original text. Nothing is normalised or
//! re-serialised here: edits are expressed later as splices against the source,
//! so bytes outside an edited range survive exactly.
//!
//! This is a forgiving, practical scanner for generated markup, not an HTML5
//! state machine:
//! - stray end tags are ignored,
//! - `<p>`, `<li>` and `<option>` are implicitly closed by the usual siblings,
//! - raw text elements (`script`, `style`, `textarea`, `title`) keep their
//!   content as a single text node,
//! - unterminated tags, comments and quoted values run to end of input.

use crate::ast::{
    is_raw_text_element, is_void_element, Attribute, AttributeValue, Element, Node, NodeId,
    NodeKind, Span,
};
use crate::selector::Selector;

const COMMENT_START: &str = "<!--";
const COMMENT_END: &str = "-->";

/// Parsed HTML document borrowing its source text
#[derive(Debug, Clone)]
pub struct HtmlDocument<'src> {
    source: &'src str,
    nodes: Vec<Node>,
}

/// Parse markup into a span-annotated arena. Never fails; malformed input
/// degrades to text or implicitly closed elements.
pub fn parse_html(source: &str) -> HtmlDocument<'_> {
    TreeBuilder::new(source).build()
}

impl<'src> HtmlDocument<'src> {
    pub fn source(&self) -> &'src str {
        self.source
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes.get(id.0)?.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// All elements in document order
    pub fn elements(&self) -> impl Iterator<Item = (NodeId, &Element)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(index, node)| match &node.kind {
                NodeKind::Element(element) => Some((NodeId(index), element)),
                _ => None,
            })
    }

    /// Descendants of `id` in document order, excluding `id` itself
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    pub fn is_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        while let Some(parent) = self.parent(node) {
            if parent == ancestor {
                return true;
            }
            node = parent;
        }
        false
    }

    /// Raw value of an attribute as written in the source
    pub fn attribute_value(&self, id: NodeId, name: &str) -> Option<&'src str> {
        let attr = self.element(id)?.attribute(name)?;
        Some(attr.raw_value(self.source))
    }

    pub fn class_list(&self, id: NodeId) -> Vec<&'src str> {
        self.attribute_value(id, "class")
            .map(|value| value.split_ascii_whitespace().collect())
            .unwrap_or_default()
    }

    /// First element whose attribute `name` has exactly the raw value `value`
    pub fn find_by_attribute(&self, name: &str, value: &str) -> Option<NodeId> {
        self.elements()
            .find(|(_, element)| {
                element
                    .attribute(name)
                    .map(|attr| attr.raw_value(self.source) == value)
                    .unwrap_or(false)
            })
            .map(|(id, _)| id)
    }

    pub fn select(&self, selector: &Selector) -> Vec<NodeId> {
        self.elements()
            .filter(|(id, _)| selector.matches(self, *id))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn select_first(&self, selector: &Selector) -> Option<NodeId> {
        self.elements()
            .find(|(id, _)| selector.matches(self, *id))
            .map(|(id, _)| id)
    }

    /// Matches of `selector` strictly inside `scope`
    pub fn select_within(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|id| self.element(*id).is_some() && selector.matches(self, *id))
            .collect()
    }

    /// Concatenated raw text of all descendant text nodes, whitespace collapsed
    pub fn text_content(&self, id: NodeId) -> String {
        let mut raw = String::new();
        for node_id in self.descendants(id) {
            let node = self.node(node_id);
            if node.kind == NodeKind::Text && !self.inside_raw_text(node_id) {
                raw.push_str(node.span.slice(self.source));
                raw.push(' ');
            }
        }
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Trimmed span of the first direct text child carrying non-whitespace content
    pub fn direct_text(&self, id: NodeId) -> Option<Span> {
        self.direct_text_runs(id).into_iter().next()
    }

    /// Trimmed spans of every direct text child carrying non-whitespace content
    pub fn direct_text_runs(&self, id: NodeId) -> Vec<Span> {
        self.children(id)
            .iter()
            .filter_map(|child| {
                let node = self.node(*child);
                if node.kind != NodeKind::Text {
                    return None;
                }
                let text = node.span.slice(self.source);
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return None;
                }
                let leading = text.len() - text.trim_start().len();
                let start = node.span.start + leading;
                Some(Span::new(start, start + trimmed.len()))
            })
            .collect()
    }

    /// Byte offset just after the start tag
    pub fn content_start(&self, id: NodeId) -> Option<usize> {
        self.element(id).map(|element| element.start_tag.end)
    }

    /// Byte offset where the element's content ends (its end tag, or implicit close)
    pub fn content_end(&self, id: NodeId) -> Option<usize> {
        let element = self.element(id)?;
        Some(
            element
                .end_tag
                .map(|tag| tag.start)
                .unwrap_or(self.node(id).span.end),
        )
    }

    /// Whitespace run immediately before a node, if it sits in a text sibling
    pub fn leading_whitespace(&self, id: NodeId) -> &'src str {
        let start = self.node(id).span.start;
        let before = &self.source[..start];
        let trimmed = before.trim_end_matches(|c: char| c.is_ascii_whitespace());
        &before[trimmed.len()..]
    }

    fn inside_raw_text(&self, id: NodeId) -> bool {
        self.parent(id)
            .and_then(|parent| self.element(parent))
            .map(|element| is_raw_text_element(&element.name) && element.name != "title")
            .unwrap_or(false)
    }
}

struct TreeBuilder<'src> {
    source: &'src str,
    bytes: &'src [u8],
    pos: usize,
    nodes: Vec<Node>,
    open: Vec<NodeId>,
}

impl<'src> TreeBuilder<'src> {
    fn new(source: &'src str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            nodes: Vec::new(),
            open: Vec::new(),
        }
    }

    fn build(mut self) -> HtmlDocument<'src> {
        self.nodes.push(Node {
            kind: NodeKind::Document,
            span: Span::new(0, self.source.len()),
            parent: None,
            children: Vec::new(),
        });
        self.open.push(NodeId::ROOT);

        while self.pos < self.bytes.len() {
            if self.starts_markup(self.pos) {
                self.scan_markup();
            } else {
                self.scan_text();
            }
        }

        let end = self.source.len();
        while self.open.len() > 1 {
            self.close_top(end, None);
        }

        HtmlDocument {
            source: self.source,
            nodes: self.nodes,
        }
    }

    // `<` only opens markup when followed by a tag-ish character
    fn starts_markup(&self, at: usize) -> bool {
        self.bytes[at] == b'<'
            && self
                .bytes
                .get(at + 1)
                .map(|b| b.is_ascii_alphabetic() || matches!(b, b'/' | b'!' | b'?'))
                .unwrap_or(false)
    }

    fn current(&self) -> NodeId {
        self.open.last().copied().unwrap_or(NodeId::ROOT)
    }

    fn push_node(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len());
        let parent = self.current();
        self.nodes.push(Node {
            kind,
            span,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    fn scan_text(&mut self) {
        let start = self.pos;
        self.pos += 1;
        while self.pos < self.bytes.len() && !self.starts_markup(self.pos) {
            self.pos += 1;
        }
        self.push_node(NodeKind::Text, Span::new(start, self.pos));
    }

    fn find_from(&self, from: usize, needle: &str) -> Option<usize> {
        self.source[from..].find(needle).map(|offset| from + offset)
    }

    fn scan_markup(&mut self) {
        let start = self.pos;
        let rest = &self.source[start..];

        if rest.starts_with(COMMENT_START) {
            let end = self
                .find_from(start + COMMENT_START.len(), COMMENT_END)
                .map(|at| at + COMMENT_END.len())
                .unwrap_or(self.source.len());
            self.push_node(NodeKind::Comment, Span::new(start, end));
            self.pos = end;
            return;
        }

        match self.bytes[start + 1] {
            b'!' | b'?' => {
                let end = self.tag_close_after(start);
                let is_doctype =
                    rest.len() >= 9 && rest.as_bytes()[..9].eq_ignore_ascii_case(b"<!doctype");
                let kind = if is_doctype {
                    NodeKind::Doctype
                } else {
                    NodeKind::Comment
                };
                self.push_node(kind, Span::new(start, end));
                self.pos = end;
            }
            b'/' => {
                let name_start = start + 2;
                if self
                    .bytes
                    .get(name_start)
                    .map(|b| b.is_ascii_alphabetic())
                    .unwrap_or(false)
                {
                    let name_end = self.scan_tag_name(name_start);
                    let name = self.source[name_start..name_end].to_ascii_lowercase();
                    let end = self.tag_close_after(name_end);
                    self.pos = end;
                    self.handle_end_tag(&name, Span::new(start, end));
                } else {
                    // `</ ...>` is a bogus comment
                    let end = self.tag_close_after(start);
                    self.push_node(NodeKind::Comment, Span::new(start, end));
                    self.pos = end;
                }
            }
            _ => self.scan_start_tag(start),
        }
    }

    fn scan_tag_name(&self, from: usize) -> usize {
        let mut i = from;
        while i < self.bytes.len() {
            let b = self.bytes[i];
            if b.is_ascii_whitespace() || b == b'/' || b == b'>' {
                break;
            }
            i += 1;
        }
        i
    }

    // Offset just past the next `>`, or end of input
    fn tag_close_after(&self, from: usize) -> usize {
        self.find_from(from, ">")
            .map(|at| at + 1)
            .unwrap_or(self.source.len())
    }

    fn skip_whitespace(&self, mut i: usize) -> usize {
        while i < self.bytes.len() && self.bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        i
    }

    fn scan_start_tag(&mut self, start: usize) {
        let len = self.bytes.len();
        let name_start = start + 1;
        let name_end = self.scan_tag_name(name_start);
        let name = self.source[name_start..name_end].to_ascii_lowercase();

        let mut attributes = Vec::new();
        let mut self_closing = false;
        let mut i = name_end;
        let tag_end = loop {
            i = self.skip_whitespace(i);
            if i >= len {
                break len;
            }
            match self.bytes[i] {
                b'>' => break i + 1,
                b'/' if self.bytes.get(i + 1) == Some(&b'>') => {
                    self_closing = true;
                    break i + 2;
                }
                b'/' => {
                    i += 1;
                    continue;
                }
                _ => {}
            }
            let (attribute, next) = self.scan_attribute(i);
            attributes.push(attribute);
            i = next;
        };

        let element = Element {
            name: name.clone(),
            name_span: Span::new(name_start, name_end),
            attributes,
            start_tag: Span::new(start, tag_end),
            end_tag: None,
            self_closing,
        };

        self.close_implied(&name, start);
        let id = self.push_node(NodeKind::Element(element), Span::new(start, tag_end));
        self.pos = tag_end;

        if is_void_element(&name) || self_closing {
            return;
        }

        if is_raw_text_element(&name) {
            self.scan_raw_text(id, &name);
            return;
        }

        self.open.push(id);
    }

    fn scan_attribute(&self, start: usize) -> (Attribute, usize) {
        let len = self.bytes.len();
        let mut i = start;
        // A leading `=` is taken as part of the name
        if self.bytes[i] == b'=' {
            i += 1;
        }
        while i < len {
            let b = self.bytes[i];
            if b.is_ascii_whitespace() || b == b'/' || b == b'>' || b == b'=' {
                break;
            }
            i += 1;
        }
        let name_span = Span::new(start, i);
        let name = name_span.slice(self.source).to_ascii_lowercase();

        let after_name = self.skip_whitespace(i);
        if after_name >= len || self.bytes[after_name] != b'=' {
            return (
                Attribute {
                    name,
                    name_span,
                    span: name_span,
                    value: None,
                },
                i,
            );
        }

        let value_start = self.skip_whitespace(after_name + 1);
        let (value, next) = if value_start >= len {
            (
                AttributeValue {
                    span: Span::empty(len),
                    inner: Span::empty(len),
                    quote: None,
                },
                len,
            )
        } else {
            match self.bytes[value_start] {
                quote @ (b'"' | b'\'') => {
                    let inner_start = value_start + 1;
                    let close = self.find_from(inner_start, if quote == b'"' { "\"" } else { "'" });
                    let (inner_end, span_end) = match close {
                        Some(at) => (at, at + 1),
                        None => (len, len),
                    };
                    (
                        AttributeValue {
                            span: Span::new(value_start, span_end),
                            inner: Span::new(inner_start, inner_end),
                            quote: Some(quote as char),
                        },
                        span_end,
                    )
                }
                _ => {
                    let mut j = value_start;
                    while j < len && !self.bytes[j].is_ascii_whitespace() && self.bytes[j] != b'>' {
                        j += 1;
                    }
                    let span = Span::new(value_start, j);
                    (
                        AttributeValue {
                            span,
                            inner: span,
                            quote: None,
                        },
                        j,
                    )
                }
            }
        };

        (
            Attribute {
                name,
                name_span,
                span: Span::new(start, value.span.end),
                value: Some(value),
            },
            next,
        )
    }

    fn scan_raw_text(&mut self, id: NodeId, name: &str) {
        let content_start = self.pos;
        let close = find_raw_text_close(self.source, content_start, name);
        let (content_end, end_tag) = match close {
            Some((tag_start, tag_end)) => (tag_start, Some(Span::new(tag_start, tag_end))),
            None => (self.source.len(), None),
        };

        if content_end > content_start {
            self.open.push(id);
            self.push_node(NodeKind::Text, Span::new(content_start, content_end));
            self.open.pop();
        }

        let end = end_tag.map(|tag| tag.end).unwrap_or(content_end);
        if let NodeKind::Element(element) = &mut self.nodes[id.0].kind {
            element.end_tag = end_tag;
        }
        self.nodes[id.0].span.end = end;
        self.pos = end;
    }

    fn open_element_name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(element) => Some(element.name.as_str()),
            _ => None,
        }
    }

    fn close_implied(&mut self, incoming: &str, at: usize) {
        let Some(top) = self.open_element_name(self.current()) else {
            return;
        };
        let implied = match top {
            "p" => closes_paragraph(incoming),
            "li" => incoming == "li",
            "option" => incoming == "option",
            "dt" | "dd" => matches!(incoming, "dt" | "dd"),
            _ => false,
        };
        if implied {
            self.close_top(at, None);
        }
    }

    fn handle_end_tag(&mut self, name: &str, span: Span) {
        let position = self
            .open
            .iter()
            .rposition(|id| *id != NodeId::ROOT && self.open_element_name(*id) == Some(name));

        let Some(position) = position else {
            // Stray end tag
            return;
        };

        while self.open.len() > position + 1 {
            self.close_top(span.start, None);
        }
        self.close_top(span.end, Some(span));
    }

    fn close_top(&mut self, end: usize, end_tag: Option<Span>) {
        let Some(id) = self.open.pop() else {
            return;
        };
        let node = &mut self.nodes[id.0];
        node.span.end = end;
        if let NodeKind::Element(element) = &mut node.kind {
            element.end_tag = end_tag;
        }
    }
}

fn closes_paragraph(name: &str) -> bool {
    matches!(
        name,
        "p" | "div"
            | "ul"
            | "ol"
            | "dl"
            | "table"
            | "section"
            | "article"
            | "aside"
            | "header"
            | "footer"
            | "nav"
            | "main"
            | "form"
            | "pre"
            | "blockquote"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "hr"
    )
}

// Finds `</name` followed by optional whitespace and `>`, case-insensitively
fn find_raw_text_close(source: &str, from: usize, name: &str) -> Option<(usize, usize)> {
    let bytes = source.as_bytes();
    let needle_len = name.len() + 2;
    let mut i = from;
    while i + needle_len <= bytes.len() {
        let rel = source[i..].find("</")?;
        i += rel;
        if i + needle_len > bytes.len() {
            return None;
        }
        if bytes[i + 2..i + needle_len].eq_ignore_ascii_case(name.as_bytes()) {
            let mut k = i + needle_len;
            while k < bytes.len() && bytes[k].is_ascii_whitespace() {
                k += 1;
            }
            if k < bytes.len() && bytes[k] == b'>' {
                return Some((i, k + 1));
            }
        }
        i += 2;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element_names(doc: &HtmlDocument) -> Vec<String> {
        doc.elements().map(|(_, e)| e.name.clone()).collect()
    }

    #[test]
    fn test_parse_nested_elements() {
        let source = r#"<div class="card"><h1>Title</h1><p>Body <span>x</span></p></div>"#;
        let doc = parse_html(source);

        assert_eq!(element_names(&doc), vec!["div", "h1", "p", "span"]);

        let (h1, _) = doc.elements().find(|(_, e)| e.name == "h1").unwrap();
        assert_eq!(doc.direct_text(h1).unwrap().slice(source), "Title");
        assert_eq!(doc.node(h1).span.slice(source), "<h1>Title</h1>");
    }

    #[test]
    fn test_attribute_spans_and_quotes() {
        let source = r#"<a href="/x" class='btn primary' disabled data-n=7>Go</a>"#;
        let doc = parse_html(source);
        let (id, a) = doc.elements().next().unwrap();

        assert_eq!(a.attributes.len(), 4);
        assert_eq!(doc.attribute_value(id, "href"), Some("/x"));
        assert_eq!(doc.class_list(id), vec!["btn", "primary"]);
        assert_eq!(a.attribute("class").unwrap().value.as_ref().unwrap().quote, Some('\''));
        assert_eq!(doc.attribute_value(id, "disabled"), Some(""));
        assert_eq!(doc.attribute_value(id, "data-n"), Some("7"));
        assert_eq!(a.attribute("data-n").unwrap().span.slice(source), "data-n=7");
    }

    #[test]
    fn test_void_and_self_closing_elements() {
        let source = r#"<p>a<img src="x.png"><br/>b</p>"#;
        let doc = parse_html(source);
        let (p, _) = doc.elements().next().unwrap();
        let child_names: Vec<_> = doc
            .children(p)
            .iter()
            .filter_map(|c| doc.element(*c).map(|e| e.name.clone()))
            .collect();
        assert_eq!(child_names, vec!["img", "br"]);
    }

    #[test]
    fn test_implied_list_item_close() {
        let source = "<ul><li>One<li>Two</ul>";
        let doc = parse_html(source);
        let items: Vec<_> = doc.elements().filter(|(_, e)| e.name == "li").collect();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|(_, e)| e.end_tag.is_none()));
        let (ul, _) = doc.elements().next().unwrap();
        assert_eq!(doc.children(ul).len(), 2);
    }

    #[test]
    fn test_raw_text_is_opaque() {
        let source = "<style>.a > b { color: red }</style><script>if (a < b) {}</script><p>x</p>";
        let doc = parse_html(source);
        assert_eq!(element_names(&doc), vec!["style", "script", "p"]);
    }

    #[test]
    fn test_lone_angle_bracket_is_text() {
        let source = "<p>1 < 2 and 3 > 2</p>";
        let doc = parse_html(source);
        let (p, _) = doc.elements().next().unwrap();
        assert_eq!(doc.direct_text(p).unwrap().slice(source), "1 < 2 and 3 > 2");
    }

    #[test]
    fn test_comments_and_doctype() {
        let source = "<!DOCTYPE html><!-- note --><html><body></body></html>";
        let doc = parse_html(source);
        let kinds: Vec<_> = doc
            .children(doc.root())
            .iter()
            .map(|c| doc.node(*c).kind.clone())
            .collect();
        assert_eq!(kinds[0], NodeKind::Doctype);
        assert_eq!(kinds[1], NodeKind::Comment);
    }

    #[test]
    fn test_stray_end_tag_ignored() {
        let source = "<div>a</span>b</div>";
        let doc = parse_html(source);
        let (div, element) = doc.elements().next().unwrap();
        assert!(element.end_tag.is_some());
        assert_eq!(doc.children(div).len(), 2);
        assert_eq!(doc.text_content(div), "a b");
    }

    #[test]
    fn test_text_content_collapses_whitespace() {
        let source = "<h1>\n   Hello\n   <span>big</span>\n   world\n</h1>";
        let doc = parse_html(source);
        let (h1, _) = doc.elements().next().unwrap();
        assert_eq!(doc.text_content(h1), "Hello big world");

        let runs: Vec<&str> = doc
            .direct_text_runs(h1)
            .iter()
            .map(|span| span.slice(source))
            .collect();
        assert_eq!(runs, vec!["Hello", "world"]);
    }
}
