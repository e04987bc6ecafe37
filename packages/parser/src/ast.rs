use serde::{Deserialize, Serialize};

/// Byte range into the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn empty(at: usize) -> Self {
        Self { start: at, end: at }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Slice the source this span was taken from
    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// Index of a node inside an [`HtmlDocument`](crate::HtmlDocument) arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    /// Full extent of the node, including tags for elements
    pub span: Span,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Document,
    Element(Element),
    Text,
    Comment,
    Doctype,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Lowercased tag name
    pub name: String,
    pub name_span: Span,
    pub attributes: Vec<Attribute>,
    /// `<tag ...>` including the angle brackets
    pub start_tag: Span,
    /// `</tag>` if the element was explicitly closed
    pub end_tag: Option<Span>,
    pub self_closing: bool,
}

impl Element {
    /// First attribute with this (case-insensitive) name. Later duplicates are ignored.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|attr| attr.name.eq_ignore_ascii_case(name))
    }

    /// Position where a new attribute can be inserted: after the last attribute,
    /// or after the tag name when there are none.
    pub fn attribute_insert_point(&self) -> usize {
        self.attributes
            .last()
            .map(|attr| attr.span.end)
            .unwrap_or(self.name_span.end)
    }

    pub fn is_void(&self) -> bool {
        is_void_element(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Lowercased attribute name
    pub name: String,
    pub name_span: Span,
    /// `name`, `name=value`, `name="value"` as written
    pub span: Span,
    pub value: Option<AttributeValue>,
}

impl Attribute {
    /// Raw value text as written (entity references are not decoded)
    pub fn raw_value<'a>(&self, source: &'a str) -> &'a str {
        self.value
            .as_ref()
            .map(|v| v.inner.slice(source))
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeValue {
    /// Value including quotes
    pub span: Span,
    /// Value without quotes
    pub inner: Span,
    pub quote: Option<char>,
}

pub fn is_void_element(name: &str) -> bool {
    matches!(
        name,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

/// Elements whose content is not markup
pub fn is_raw_text_element(name: &str) -> bool {
    matches!(name, "script" | "style" | "textarea" | "title")
}
