//! CSS rule-block scanner.
//!
//! Tokenizes with `logos` and records spans for every rule's selector, block,
//! body and declarations. Values are never interpreted; the scanner only needs
//! to know where things are so a single declaration can be rewritten in place.

use crate::ast::Span;
use crate::error::{ParseError, ParseResult};
use crate::selector::normalize_selector;
use logos::{Lexer, Logos};

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CssToken {
    #[token("/*", lex_comment)]
    Comment,

    #[token("\"", |lex| lex_string(lex, b'"'))]
    #[token("'", |lex| lex_string(lex, b'\''))]
    String,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token(";")]
    Semicolon,

    #[token(":")]
    Colon,

    #[regex(r"[ \t\r\n\f]+")]
    Whitespace,

    #[token("/")]
    Slash,

    #[regex(r#"[^{};:"'/ \t\r\n\f]+"#)]
    Text,
}

impl CssToken {
    fn is_trivia(self) -> bool {
        matches!(self, CssToken::Whitespace | CssToken::Comment)
    }
}

fn lex_comment(lex: &mut Lexer<CssToken>) -> bool {
    match lex.remainder().find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            true
        }
        None => {
            lex.bump(lex.remainder().len());
            false
        }
    }
}

fn lex_string(lex: &mut Lexer<CssToken>, quote: u8) -> bool {
    let bytes = lex.remainder().as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => {
                lex.bump(i);
                return false;
            }
            b if b == quote => {
                lex.bump(i + 1);
                return true;
            }
            _ => i += 1,
        }
    }
    lex.bump(bytes.len());
    false
}

/// Tokenize a stylesheet, failing on unterminated comments or strings
pub fn tokenize_css(source: &str) -> ParseResult<Vec<(CssToken, Span)>> {
    let mut tokens = Vec::new();
    let mut lexer = CssToken::lexer(source);
    while let Some(result) = lexer.next() {
        let range = lexer.span();
        match result {
            Ok(token) => tokens.push((token, Span::new(range.start, range.end))),
            Err(()) => {
                let pos = range.start;
                return Err(if source[pos..].starts_with("/*") {
                    ParseError::UnterminatedComment { pos }
                } else if source[pos..].starts_with(|c| c == '"' || c == '\'') {
                    ParseError::UnterminatedString { pos }
                } else {
                    ParseError::unexpected_token(pos, &source[range])
                });
            }
        }
    }
    Ok(tokens)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stylesheet {
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Selector (or at-rule prelude) with whitespace normalised
    pub selector: String,
    pub selector_span: Span,
    /// `{` through `}` inclusive
    pub block: Span,
    /// Between the braces
    pub body: Span,
    pub declarations: Vec<Declaration>,
    /// Prelude starts with `@`
    pub at_rule: bool,
    /// Rule sits inside an at-rule block (e.g. `@media`)
    pub nested: bool,
    /// End of the last non-trivia token inside the body, if any
    pub content_end: Option<usize>,
    /// Whether the last non-trivia token in the body is an unterminated declaration
    pub open_declaration: bool,
}

impl Rule {
    /// Full rule text span: selector through closing brace
    pub fn span(&self) -> Span {
        Span::new(self.selector_span.start, self.block.end)
    }

    /// Last declaration of `property` (the one that wins the cascade)
    pub fn declaration(&self, property: &str) -> Option<&Declaration> {
        self.declarations
            .iter()
            .rev()
            .find(|decl| property_eq(&decl.property, property))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub property: String,
    pub property_span: Span,
    /// Trimmed value text
    pub value_span: Span,
    /// Property start through `;` (or value end when unterminated)
    pub span: Span,
    pub terminated: bool,
}

/// Custom properties are case-sensitive, everything else is not
pub fn property_eq(a: &str, b: &str) -> bool {
    if a.starts_with("--") || b.starts_with("--") {
        a == b
    } else {
        a.eq_ignore_ascii_case(b)
    }
}

impl Stylesheet {
    pub fn parse(source: &str) -> ParseResult<Self> {
        let tokens = tokenize_css(source)?;
        let pairs = match_braces(&tokens)?;
        let mut rules = Vec::new();
        RuleScanner {
            source,
            tokens: &tokens,
            pairs: &pairs,
        }
        .scan(0, tokens.len(), false, &mut rules);
        Ok(Self { rules })
    }

    /// Top-level style rules whose selector is equivalent to `selector`
    pub fn rules_for<'a>(&'a self, selector: &str) -> impl Iterator<Item = &'a Rule> + 'a {
        let wanted = normalize_selector(selector);
        self.rules
            .iter()
            .filter(move |rule| !rule.nested && !rule.at_rule && rule.selector == wanted)
    }

    /// The rule a property edit should target: the last matching rule that
    /// declares `property`, else the last matching rule.
    pub fn target_rule(&self, selector: &str, property: &str) -> Option<&Rule> {
        let candidates: Vec<&Rule> = self.rules_for(selector).collect();
        candidates
            .iter()
            .rev()
            .find(|rule| rule.declaration(property).is_some())
            .or_else(|| candidates.last())
            .copied()
    }
}

// Maps every `{` token index to its matching `}` token index
fn match_braces(tokens: &[(CssToken, Span)]) -> ParseResult<Vec<Option<usize>>> {
    let mut pairs = vec![None; tokens.len()];
    let mut stack = Vec::new();
    for (index, (token, span)) in tokens.iter().enumerate() {
        match token {
            CssToken::LBrace => stack.push(index),
            CssToken::RBrace => {
                let open = stack
                    .pop()
                    .ok_or(ParseError::UnbalancedBrace { pos: span.start })?;
                pairs[open] = Some(index);
            }
            _ => {}
        }
    }
    if let Some(open) = stack.pop() {
        return Err(ParseError::UnbalancedBrace {
            pos: tokens[open].1.start,
        });
    }
    Ok(pairs)
}

struct RuleScanner<'a> {
    source: &'a str,
    tokens: &'a [(CssToken, Span)],
    pairs: &'a [Option<usize>],
}

impl<'a> RuleScanner<'a> {
    fn scan(&self, from: usize, to: usize, nested: bool, out: &mut Vec<Rule>) {
        let mut prelude: Option<(usize, usize)> = None;
        let mut i = from;
        while i < to {
            let (token, span) = self.tokens[i];
            match token {
                CssToken::LBrace => {
                    let close = self.pairs[i].unwrap_or(to.saturating_sub(1));
                    let (prelude_start, prelude_end) = prelude.take().unwrap_or((span.start, span.start));
                    let selector_span = Span::new(prelude_start, prelude_end);
                    let selector = normalize_selector(selector_span.slice(self.source));
                    let at_rule = selector.starts_with('@');
                    let block = Span::new(span.start, self.tokens[close].1.end);
                    let body = Span::new(span.end, self.tokens[close].1.start);
                    let (declarations, content_end, open_declaration) =
                        self.scan_declarations(i + 1, close);

                    out.push(Rule {
                        selector,
                        selector_span,
                        block,
                        body,
                        declarations: if at_rule { Vec::new() } else { declarations },
                        at_rule,
                        nested,
                        content_end,
                        open_declaration,
                    });

                    // Rules inside at-rule blocks or nested style rules
                    self.scan(i + 1, close, true, out);
                    i = close + 1;
                }
                CssToken::Semicolon => {
                    // `@import ...;` and friends have no block
                    prelude = None;
                    i += 1;
                }
                t if t.is_trivia() => i += 1,
                _ => {
                    let entry = prelude.get_or_insert((span.start, span.end));
                    entry.1 = span.end;
                    i += 1;
                }
            }
        }
    }

    fn scan_declarations(&self, from: usize, to: usize) -> (Vec<Declaration>, Option<usize>, bool) {
        let mut declarations = Vec::new();
        let mut content_end = None;
        let mut open_declaration = false;
        let mut i = from;

        while i < to {
            // One segment runs to the next top-level `;` or nested block
            let segment_start = i;
            let mut has_block = false;
            while i < to {
                match self.tokens[i].0 {
                    CssToken::Semicolon => break,
                    CssToken::LBrace => {
                        has_block = true;
                        i = self.pairs[i].unwrap_or(to);
                        break;
                    }
                    _ => i += 1,
                }
            }
            let segment_end = i.min(to);
            let terminator = (i < to && self.tokens[i].0 == CssToken::Semicolon).then_some(i);

            if let Some(last) = self.tokens[segment_start..segment_end]
                .iter()
                .rev()
                .find(|(t, _)| !t.is_trivia())
            {
                content_end = Some(last.1.end);
            }
            if let Some(semi) = terminator {
                content_end = Some(self.tokens[semi].1.end);
            }
            if has_block {
                content_end = Some(self.tokens[segment_end.min(to - 1)].1.end);
            }

            open_declaration = false;
            if !has_block {
                if let Some(decl) = self.declaration(segment_start, segment_end, terminator) {
                    open_declaration = !decl.terminated;
                    declarations.push(decl);
                }
            }
            i += 1;
        }

        (declarations, content_end, open_declaration)
    }

    fn declaration(&self, from: usize, to: usize, terminator: Option<usize>) -> Option<Declaration> {
        let significant: Vec<usize> = (from..to).filter(|&k| !self.tokens[k].0.is_trivia()).collect();
        let (&name_index, rest) = significant.split_first()?;
        let (name_token, property_span) = self.tokens[name_index];
        if name_token != CssToken::Text {
            return None;
        }
        let (&colon_index, value_indices) = rest.split_first()?;
        if self.tokens[colon_index].0 != CssToken::Colon {
            return None;
        }

        let value_span = match (value_indices.first(), value_indices.last()) {
            (Some(&first), Some(&last)) => {
                Span::new(self.tokens[first].1.start, self.tokens[last].1.end)
            }
            _ => Span::empty(self.tokens[colon_index].1.end),
        };
        let end = terminator
            .map(|semi| self.tokens[semi].1.end)
            .unwrap_or(value_span.end);

        Some(Declaration {
            property: property_span.slice(self.source).to_string(),
            property_span,
            value_span,
            span: Span::new(property_span.start, end),
            terminated: terminator.is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_basic_rule() {
        let tokens = tokenize_css(".a { color: red; }").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|(t, _)| *t).collect();
        assert_eq!(
            kinds,
            vec![
                CssToken::Text,
                CssToken::Whitespace,
                CssToken::LBrace,
                CssToken::Whitespace,
                CssToken::Text,
                CssToken::Colon,
                CssToken::Whitespace,
                CssToken::Text,
                CssToken::Semicolon,
                CssToken::Whitespace,
                CssToken::RBrace,
            ]
        );
    }

    #[test]
    fn test_rule_and_declaration_spans() {
        let source = "[data-ncd-id=\"ncd-0001\"] {\n  color: red;\n  margin: 0 auto\n}\n";
        let sheet = Stylesheet::parse(source).unwrap();
        assert_eq!(sheet.rules.len(), 1);

        let rule = &sheet.rules[0];
        assert_eq!(rule.selector, "[data-ncd-id=\"ncd-0001\"]");
        assert_eq!(rule.declarations.len(), 2);
        assert_eq!(rule.declarations[0].value_span.slice(source), "red");
        assert_eq!(rule.declarations[1].value_span.slice(source), "0 auto");
        assert!(!rule.declarations[1].terminated);
        assert!(rule.open_declaration);
    }

    #[test]
    fn test_values_with_urls_and_strings() {
        let source = r#".hero { background: url("a;b.png") no-repeat; content: 'x}y'; }"#;
        let sheet = Stylesheet::parse(source).unwrap();
        let rule = &sheet.rules[0];
        assert_eq!(
            rule.declaration("background").unwrap().value_span.slice(source),
            r#"url("a;b.png") no-repeat"#
        );
        assert_eq!(rule.declaration("content").unwrap().value_span.slice(source), "'x}y'");
    }

    #[test]
    fn test_media_rules_are_nested() {
        let source = ".a { color: red }\n@media (max-width: 600px) { .a { color: blue } }";
        let sheet = Stylesheet::parse(source).unwrap();

        let top: Vec<_> = sheet.rules_for(".a").collect();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].declaration("color").unwrap().value_span.slice(source), "red");
        assert!(sheet.rules.iter().any(|r| r.at_rule));
        assert!(sheet.rules.iter().any(|r| r.nested && r.selector == ".a"));
    }

    #[test]
    fn test_comment_only_body() {
        let source = "[data-ncd-id=\"ncd-0001\"] {\n  /* Editable element */\n}\n";
        let sheet = Stylesheet::parse(source).unwrap();
        let rule = &sheet.rules[0];
        assert!(rule.declarations.is_empty());
        assert!(!rule.open_declaration);
        assert_eq!(rule.content_end, None);
    }

    #[test]
    fn test_unparseable_css() {
        assert_eq!(
            Stylesheet::parse(".a { color: red").unwrap_err(),
            ParseError::UnbalancedBrace { pos: 3 }
        );
        assert!(matches!(
            Stylesheet::parse(".a } "),
            Err(ParseError::UnbalancedBrace { .. })
        ));
        assert!(matches!(
            Stylesheet::parse(".a { /* open"),
            Err(ParseError::UnterminatedComment { pos: 5 })
        ));
        assert!(matches!(
            Stylesheet::parse(".a { content: \"x\n }"),
            Err(ParseError::UnterminatedString { .. })
        ));
    }

    #[test]
    fn test_target_rule_prefers_declaring_block() {
        let source = ".a { color: red; }\n.a { margin: 0; }\n";
        let sheet = Stylesheet::parse(source).unwrap();
        let rule = sheet.target_rule(".a", "color").unwrap();
        assert_eq!(rule.block.start, 3);
        let rule = sheet.target_rule(".a", "padding").unwrap();
        assert!(rule.block.start > 3);
    }
}
