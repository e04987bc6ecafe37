//! Escaping helpers for values written back into markup.
//!
//! Values are raw markup text. Only the characters that would change the
//! document structure are escaped, so entities the author already wrote
//! survive a read-modify-write cycle unchanged.

/// Escape a `<` that would open a tag, comment or declaration
pub fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '<' && chars.peek().is_some_and(|&n| opens_markup(n)) {
            out.push_str("&lt;");
        } else {
            out.push(c);
        }
    }
    out
}

fn opens_markup(next: char) -> bool {
    next.is_ascii_alphabetic() || matches!(next, '/' | '!' | '?')
}

/// Quote an attribute value, keeping the author's quote style.
///
/// `quote` is the original delimiter (`None` for unquoted or new attributes).
/// Unquoted values stay unquoted while they remain safe to write that way.
pub fn quote_attribute_value(value: &str, quote: Option<char>) -> String {
    match quote {
        Some('\'') => format!("'{}'", value.replace('\'', "&#39;")),
        Some(_) => format!("\"{}\"", value.replace('"', "&quot;")),
        None if is_safe_unquoted(value) => value.to_string(),
        None => format!("\"{}\"", value.replace('"', "&quot;")),
    }
}

fn is_safe_unquoted(value: &str) -> bool {
    !value.is_empty()
        && !value
            .chars()
            .any(|c| c.is_ascii_whitespace() || matches!(c, '"' | '\'' | '=' | '<' | '>' | '`'))
}

/// Collapse runs of ASCII whitespace into single spaces and trim
pub fn collapse_whitespace(value: &str) -> String {
    value.split_ascii_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_only_tag_openers() {
        assert_eq!(escape_text("a < b"), "a < b");
        assert_eq!(escape_text("<b>bold</b>"), "&lt;b>bold&lt;/b>");
        assert_eq!(escape_text("&amp; <!--"), "&amp; &lt;!--");
        assert_eq!(escape_text("Tom & Jerry"), "Tom & Jerry");
    }

    #[test]
    fn test_quote_keeps_style() {
        assert_eq!(quote_attribute_value("x", Some('\'')), "'x'");
        assert_eq!(quote_attribute_value("it's", Some('\'')), "'it&#39;s'");
        assert_eq!(quote_attribute_value("say \"hi\"", Some('"')), "\"say &quot;hi&quot;\"");
        assert_eq!(quote_attribute_value("plain", None), "plain");
        assert_eq!(quote_attribute_value("two words", None), "\"two words\"");
        assert_eq!(quote_attribute_value("", None), "\"\"");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), "a b");
    }
}
