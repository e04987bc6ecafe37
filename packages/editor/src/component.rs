//! Component records: what an injected identifier points at.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::EditError;

/// Identifier attribute stamped on every editable element
pub const ID_ATTR: &str = "data-ncd-id";
/// Document the element was generated into
pub const FILE_ATTR: &str = "data-ncd-file";
/// Coarse edit kind of the element
pub const TYPE_ATTR: &str = "data-ncd-type";

/// Attribute-based selector that resolves back to one identifier
pub fn selector_for(id: &str) -> String {
    format!("[{}=\"{}\"]", ID_ATTR, id)
}

/// Whether an attribute belongs to the identifier scheme
pub fn is_identity_attribute(name: &str) -> bool {
    [ID_ATTR, FILE_ATTR, TYPE_ATTR]
        .iter()
        .any(|attr| attr.eq_ignore_ascii_case(name))
}

/// Which mutation primitives a component accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditKind {
    Text,
    Link,
    Button,
    Image,
    Element,
}

impl EditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditKind::Text => "text",
            EditKind::Link => "link",
            EditKind::Button => "button",
            EditKind::Image => "image",
            EditKind::Element => "element",
        }
    }
}

impl fmt::Display for EditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EditKind {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(EditKind::Text),
            "link" => Ok(EditKind::Link),
            "button" => Ok(EditKind::Button),
            "image" => Ok(EditKind::Image),
            "element" => Ok(EditKind::Element),
            other => Err(EditError::invalid_operation(format!(
                "unknown edit kind `{}`",
                other
            ))),
        }
    }
}

/// Role of the tagged element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Heading,
    Paragraph,
    Link,
    Button,
    Image,
    Container,
    Generic,
}

impl ElementKind {
    /// Classify an allow-listed tag. Tags outside the allow-list are not editable.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let kind = match tag {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => ElementKind::Heading,
            "p" => ElementKind::Paragraph,
            "span" => ElementKind::Generic,
            "a" => ElementKind::Link,
            "button" => ElementKind::Button,
            "img" => ElementKind::Image,
            "div" | "section" | "article" | "header" | "footer" | "main" | "aside" | "nav" => {
                ElementKind::Container
            }
            _ => return None,
        };
        Some(kind)
    }

    pub fn edit_kind(&self) -> EditKind {
        match self {
            ElementKind::Heading | ElementKind::Paragraph | ElementKind::Generic => EditKind::Text,
            ElementKind::Link => EditKind::Link,
            ElementKind::Button => EditKind::Button,
            ElementKind::Image => EditKind::Image,
            ElementKind::Container => EditKind::Element,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Heading => "heading",
            ElementKind::Paragraph => "paragraph",
            ElementKind::Link => "link",
            ElementKind::Button => "button",
            ElementKind::Image => "image",
            ElementKind::Container => "container",
            ElementKind::Generic => "generic",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One injected identifier and where it lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRecord {
    pub id: String,
    pub document: String,
    pub element_kind: ElementKind,
    pub edit_kind: EditKind,
    pub selector: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl ComponentRecord {
    pub fn new(id: impl Into<String>, document: impl Into<String>, element_kind: ElementKind) -> Self {
        let id = id.into();
        Self {
            selector: selector_for(&id),
            id,
            document: document.into(),
            edit_kind: element_kind.edit_kind(),
            element_kind,
            metadata: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Tag name recorded at injection time
    pub fn tag(&self) -> Option<&str> {
        self.metadata.get("tag").and_then(|v| v.as_str())
    }
}
