use crate::ast::Span;
use crate::error::{ParseError, ParseResult};

/// A byte-range replacement against an original source.
///
/// Edits never re-serialize a tree. Every byte outside the spliced spans is
/// copied from the original verbatim, which keeps formatting, comments and
/// unrelated markup untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splice {
    pub span: Span,
    pub replacement: String,
}

impl Splice {
    pub fn replace(span: Span, replacement: impl Into<String>) -> Self {
        Self {
            span,
            replacement: replacement.into(),
        }
    }

    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self::replace(Span::empty(at), text)
    }

    pub fn delete(span: Span) -> Self {
        Self::replace(span, String::new())
    }
}

/// Apply a set of non-overlapping splices to `source`
pub fn apply_splices(source: &str, splices: &[Splice]) -> ParseResult<String> {
    let mut ordered: Vec<&Splice> = splices.iter().collect();
    ordered.sort_by_key(|s| (s.span.start, s.span.end));

    let mut output = String::with_capacity(source.len());
    let mut last_end = 0;
    for splice in ordered {
        let Span { start, end } = splice.span;
        if start < last_end || end > source.len() || start > end {
            return Err(ParseError::OverlappingEdit { pos: start });
        }
        if !source.is_char_boundary(start) || !source.is_char_boundary(end) {
            return Err(ParseError::unexpected_token(start, "splice inside a character"));
        }
        output.push_str(&source[last_end..start]);
        output.push_str(&splice.replacement);
        last_end = end;
    }
    output.push_str(&source[last_end..]);
    Ok(output)
}

/// Apply a single splice
pub fn splice(source: &str, edit: Splice) -> ParseResult<String> {
    apply_splices(source, std::slice::from_ref(&edit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untouched_bytes_are_preserved() {
        let source = "<p>  Hello  </p>\n<!-- keep -->";
        let out = splice(source, Splice::replace(Span::new(5, 10), "Howdy")).unwrap();
        assert_eq!(out, "<p>  Howdy  </p>\n<!-- keep -->");
    }

    #[test]
    fn test_multiple_splices_in_any_order() {
        let source = "abcdef";
        let out = apply_splices(
            source,
            &[
                Splice::insert(6, "!"),
                Splice::delete(Span::new(0, 1)),
                Splice::replace(Span::new(2, 4), "XY"),
            ],
        )
        .unwrap();
        assert_eq!(out, "bXYef!");
    }

    #[test]
    fn test_overlap_is_rejected() {
        let err = apply_splices(
            "abcdef",
            &[
                Splice::replace(Span::new(0, 3), "x"),
                Splice::replace(Span::new(2, 4), "y"),
            ],
        )
        .unwrap_err();
        assert_eq!(err, ParseError::OverlappingEdit { pos: 2 });
    }
}
