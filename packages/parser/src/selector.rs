//! Minimal CSS selector engine for resolving edit targets.
//!
//! Supported: type selectors, `*`, `#id`, `.class`, `[attr]`, `[attr=v]`,
//! `[attr~=v]`, `[attr*=v]`, and the descendant combinator. Other combinators,
//! pseudo-classes and selector lists are rejected.

use crate::ast::NodeId;
use crate::error::{ParseError, ParseResult};
use crate::html::HtmlDocument;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    /// Descendant chain; the last compound is the subject
    parts: Vec<Compound>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Compound {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attributes: Vec<AttributeMatcher>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeMatcher {
    pub name: String,
    pub op: AttributeOp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeOp {
    Exists,
    Equals(String),
    /// `~=`: whitespace-separated list contains the value
    Includes(String),
    /// `*=`: substring
    Contains(String),
}

impl Selector {
    pub fn parse(input: &str) -> ParseResult<Self> {
        SelectorParser::new(input).parse()
    }

    /// `[name="value"]`
    pub fn attribute_equals(name: &str, value: &str) -> Self {
        Self {
            parts: vec![Compound {
                attributes: vec![AttributeMatcher {
                    name: name.to_ascii_lowercase(),
                    op: AttributeOp::Equals(value.to_string()),
                }],
                ..Compound::default()
            }],
        }
    }

    pub fn parts(&self) -> &[Compound] {
        &self.parts
    }

    pub fn matches(&self, doc: &HtmlDocument, id: NodeId) -> bool {
        let Some((subject, ancestors)) = self.parts.split_last() else {
            return false;
        };
        if !subject.matches(doc, id) {
            return false;
        }

        // Descendant-only chains can be matched greedily, nearest ancestor first
        let mut current = id;
        for compound in ancestors.iter().rev() {
            let mut found = None;
            let mut cursor = doc.parent(current);
            while let Some(candidate) = cursor {
                if compound.matches(doc, candidate) {
                    found = Some(candidate);
                    break;
                }
                cursor = doc.parent(candidate);
            }
            match found {
                Some(ancestor) => current = ancestor,
                None => return false,
            }
        }
        true
    }
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attributes.is_empty()
    }

    pub fn matches(&self, doc: &HtmlDocument, id: NodeId) -> bool {
        let Some(element) = doc.element(id) else {
            return false;
        };
        if let Some(tag) = &self.tag {
            if tag != "*" && !element.name.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(wanted) = &self.id {
            if doc.attribute_value(id, "id") != Some(wanted.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let classes = doc.class_list(id);
            if !self.classes.iter().all(|c| classes.contains(&c.as_str())) {
                return false;
            }
        }
        self.attributes.iter().all(|matcher| {
            let Some(value) = doc.attribute_value(id, &matcher.name) else {
                return false;
            };
            match &matcher.op {
                AttributeOp::Exists => true,
                AttributeOp::Equals(expected) => value == expected,
                AttributeOp::Includes(expected) => {
                    value.split_ascii_whitespace().any(|part| part == expected)
                }
                AttributeOp::Contains(expected) => {
                    !expected.is_empty() && value.contains(expected.as_str())
                }
            }
        })
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, part) in self.parts.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            if let Some(tag) = &part.tag {
                f.write_str(tag)?;
            }
            if let Some(id) = &part.id {
                write!(f, "#{}", id)?;
            }
            for class in &part.classes {
                write!(f, ".{}", class)?;
            }
            for attr in &part.attributes {
                match &attr.op {
                    AttributeOp::Exists => write!(f, "[{}]", attr.name)?,
                    AttributeOp::Equals(v) => write!(f, "[{}=\"{}\"]", attr.name, v)?,
                    AttributeOp::Includes(v) => write!(f, "[{}~=\"{}\"]", attr.name, v)?,
                    AttributeOp::Contains(v) => write!(f, "[{}*=\"{}\"]", attr.name, v)?,
                }
            }
        }
        Ok(())
    }
}

/// Collapse whitespace and unify quotes so equivalent selectors compare equal
pub fn normalize_selector(selector: &str) -> String {
    let mut out = String::with_capacity(selector.len());
    let mut pending_space = false;
    for c in selector.trim().chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        let tight = matches!(c, '[' | ']' | '=' | '~' | '*' | '>' | '+' | ',');
        let after_tight = out.ends_with(|p: char| matches!(p, '[' | '=' | '~' | '*' | '>' | '+' | ','));
        if pending_space && !out.is_empty() && !tight && !after_tight {
            out.push(' ');
        }
        pending_space = false;
        out.push(if c == '\'' { '"' } else { c });
    }
    out
}

struct SelectorParser<'a> {
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> SelectorParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::invalid_selector(self.input, message)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().map(char::is_whitespace).unwrap_or(false) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn parse(mut self) -> ParseResult<Selector> {
        let mut parts = Vec::new();
        self.skip_whitespace();
        while self.peek().is_some() {
            let compound = self.parse_compound()?;
            if compound.is_empty() {
                let found = self.peek().map(String::from).unwrap_or_default();
                return Err(self.error(format!("unexpected `{}`", found)));
            }
            parts.push(compound);
            self.skip_whitespace();
        }
        if parts.is_empty() {
            return Err(self.error("empty selector"));
        }
        Ok(Selector { parts })
    }

    fn parse_compound(&mut self) -> ParseResult<Compound> {
        let mut compound = Compound::default();

        if self.peek() == Some('*') {
            self.pos += 1;
            compound.tag = Some("*".to_string());
        } else if self.peek().map(is_ident_char).unwrap_or(false) {
            compound.tag = Some(self.parse_ident()?.to_ascii_lowercase());
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.id = Some(self.parse_ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.parse_ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attributes.push(self.parse_attribute()?);
                }
                Some(c @ ('>' | '+' | '~')) => {
                    return Err(self.error(format!("combinator `{}` is not supported", c)));
                }
                Some(',') => return Err(self.error("selector lists are not supported")),
                Some(':') => return Err(self.error("pseudo-classes are not supported")),
                _ => break,
            }
        }

        Ok(compound)
    }

    fn parse_ident(&mut self) -> ParseResult<String> {
        let start = self.pos;
        while self.peek().map(is_ident_char).unwrap_or(false) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected identifier"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_attribute(&mut self) -> ParseResult<AttributeMatcher> {
        self.skip_whitespace();
        let name = self.parse_ident()?.to_ascii_lowercase();
        self.skip_whitespace();

        let op = match self.peek() {
            Some(']') => {
                self.pos += 1;
                return Ok(AttributeMatcher {
                    name,
                    op: AttributeOp::Exists,
                });
            }
            Some('=') => {
                self.pos += 1;
                AttributeOp::Equals(String::new())
            }
            Some(c @ ('~' | '*')) if self.chars.get(self.pos + 1) == Some(&'=') => {
                self.pos += 2;
                if c == '~' {
                    AttributeOp::Includes(String::new())
                } else {
                    AttributeOp::Contains(String::new())
                }
            }
            _ => return Err(self.error("expected `]` or attribute operator")),
        };

        self.skip_whitespace();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().map(|c| c != quote).unwrap_or(false) {
                    self.pos += 1;
                }
                if self.peek().is_none() {
                    return Err(self.error("unterminated attribute value"));
                }
                let value: String = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                value
            }
            _ => self.parse_ident()?,
        };
        self.skip_whitespace();
        if self.peek() != Some(']') {
            return Err(self.error("expected `]`"));
        }
        self.pos += 1;

        let op = match op {
            AttributeOp::Equals(_) => AttributeOp::Equals(value),
            AttributeOp::Includes(_) => AttributeOp::Includes(value),
            AttributeOp::Contains(_) => AttributeOp::Contains(value),
            AttributeOp::Exists => AttributeOp::Exists,
        };
        Ok(AttributeMatcher { name, op })
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::parse_html;

    #[test]
    fn test_parse_attribute_selector() {
        let selector = Selector::parse(r#"[data-ncd-id="ncd-0007"]"#).unwrap();
        assert_eq!(selector, Selector::attribute_equals("data-ncd-id", "ncd-0007"));
        assert_eq!(selector.to_string(), r#"[data-ncd-id="ncd-0007"]"#);
    }

    #[test]
    fn test_rejects_unsupported_syntax() {
        assert!(Selector::parse("nav > ul").is_err());
        assert!(Selector::parse("a:hover").is_err());
        assert!(Selector::parse("a, b").is_err());
        assert!(Selector::parse("").is_err());
        assert!(Selector::parse(r#"[data-id="x"#).is_err());
    }

    #[test]
    fn test_descendant_matching() {
        let source = r#"<nav><ul class="menu"><li><a href="a.html">A</a></li></ul></nav><ul><li>x</li></ul>"#;
        let doc = parse_html(source);

        let selector = Selector::parse("nav ul").unwrap();
        let matches = doc.select(&selector);
        assert_eq!(matches.len(), 1);
        assert_eq!(doc.class_list(matches[0]), vec!["menu"]);

        let links = Selector::parse("ul.menu a[href]").unwrap();
        assert_eq!(doc.select(&links).len(), 1);
    }

    #[test]
    fn test_id_class_and_contains() {
        let source = r#"<div id="nav-links" class="top bar"></div><div class="main-navigation"></div>"#;
        let doc = parse_html(source);

        assert_eq!(doc.select(&Selector::parse("div#nav-links").unwrap()).len(), 1);
        assert_eq!(doc.select(&Selector::parse(".top.bar").unwrap()).len(), 1);
        assert_eq!(doc.select(&Selector::parse("[class~=bar]").unwrap()).len(), 1);
        assert_eq!(doc.select(&Selector::parse("[class*=navigation]").unwrap()).len(), 1);
    }

    #[test]
    fn test_normalize_selector() {
        assert_eq!(
            normalize_selector("[data-ncd-id = 'ncd-0001']"),
            r#"[data-ncd-id="ncd-0001"]"#
        );
        assert_eq!(normalize_selector("  nav    ul  "), "nav ul");
    }
}
