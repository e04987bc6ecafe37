//! Span-preserving HTML and CSS scanning for in-place content edits.

pub mod ast;
pub mod css;
pub mod error;
pub mod html;
pub mod id_generator;
pub mod selector;
pub mod splice;
pub mod text;

pub use ast::{Attribute, AttributeValue, Element, Node, NodeId, NodeKind, Span};
pub use css::{tokenize_css, CssToken, Declaration, Rule, Stylesheet};
pub use error::{ParseError, ParseResult};
pub use html::{parse_html, HtmlDocument};
pub use id_generator::{namespace_for, IdGenerator};
pub use selector::{normalize_selector, Selector};
pub use splice::{apply_splices, splice, Splice};
pub use text::{collapse_whitespace, escape_text, quote_attribute_value};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_and_splice() {
        let source = "<nav><a href=\"/\">Home</a></nav>";
        let doc = parse_html(source);
        let link = doc
            .select_first(&Selector::parse("nav a").unwrap())
            .unwrap();
        let text = doc.direct_text(link).unwrap();
        let out = splice(source, Splice::replace(text, "Start")).unwrap();
        assert_eq!(out, "<nav><a href=\"/\">Start</a></nav>");
    }
}
