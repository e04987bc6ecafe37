//! # Safe Edit Engine
//!
//! Pure, selector-scoped mutations of document text.
//!
//! ## Design Principles
//!
//! 1. **Splice, don't re-serialize**: the document is scanned into a span
//!    arena, the edit becomes a byte-range splice, and every byte outside the
//!    splice is copied through untouched.
//! 2. **One element per edit**: each operation resolves exactly one element
//!    (or one CSS rule block), so edits to different identifiers commute.
//! 3. **All or nothing**: an operation returns new content and the prior
//!    value, or a typed error and no content at all.
//!
//! ## Values
//!
//! Text and attribute values are markup-level strings. Entity references are
//! neither decoded on read nor encoded on write; only characters that would
//! change the document structure are escaped. Writing back a `before` value
//! therefore restores the original bytes.

use ncd_parser::{
    apply_splices, escape_text, normalize_selector, parse_html, quote_attribute_value, splice,
    Element, HtmlDocument, NodeId, Rule, Selector, Span, Splice, Stylesheet,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::component::is_identity_attribute;
use crate::errors::{EditError, EditResult};
use crate::history::DiffKind;

/// The closed set of edits a caller (or planner) may request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "camelCase", deny_unknown_fields)]
pub enum Mutation {
    /// Replace the element's text
    SetText { text: String },

    /// Set or overwrite one attribute
    SetAttribute { attribute: String, value: String },

    /// Set one property in the element's scoped rule block (stylesheet edit)
    SetStyleProperty { property: String, value: String },

    AddClass {
        #[serde(rename = "className")]
        class_name: String,
    },

    RemoveClass {
        #[serde(rename = "className")]
        class_name: String,
    },
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::SetText { .. } => "setText",
            Mutation::SetAttribute { .. } => "setAttribute",
            Mutation::SetStyleProperty { .. } => "setStyleProperty",
            Mutation::AddClass { .. } => "addClass",
            Mutation::RemoveClass { .. } => "removeClass",
        }
    }

    /// Whether this edit applies to the stylesheet rather than the page
    pub fn targets_stylesheet(&self) -> bool {
        matches!(self, Mutation::SetStyleProperty { .. })
    }

    pub fn diff_kind(&self) -> DiffKind {
        match self {
            Mutation::SetText { .. } => DiffKind::Text,
            Mutation::SetAttribute { .. } => DiffKind::Attribute,
            Mutation::SetStyleProperty { .. } => DiffKind::Style,
            Mutation::AddClass { .. } => DiffKind::AddClass,
            Mutation::RemoveClass { .. } => DiffKind::RemoveClass,
        }
    }

    /// Attribute, property or class name the edit concerns
    pub fn target(&self) -> Option<String> {
        match self {
            Mutation::SetText { .. } => None,
            Mutation::SetAttribute { attribute, .. } => Some(attribute.clone()),
            Mutation::SetStyleProperty { property, .. } => Some(property.clone()),
            Mutation::AddClass { class_name } | Mutation::RemoveClass { class_name } => {
                Some(class_name.clone())
            }
        }
    }

    /// Apply to `content` (HTML, or CSS for style edits) at the element `selector` resolves to
    pub fn apply(&self, content: &str, selector: &str) -> EditResult<MutationOutcome> {
        match self {
            Mutation::SetText { text } => set_text(content, selector, text),
            Mutation::SetAttribute { attribute, value } => {
                set_attribute(content, selector, attribute, value)
            }
            Mutation::SetStyleProperty { property, value } => {
                set_style_property(content, selector, property, value)
            }
            Mutation::AddClass { class_name } => add_class(content, selector, class_name),
            Mutation::RemoveClass { class_name } => remove_class(content, selector, class_name),
        }
    }
}

/// Inverse operations used when replaying history backwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reversal {
    SetText { text: String },
    SetAttribute { attribute: String, value: String },
    RemoveAttribute { attribute: String },
    SetStyleProperty { property: String, value: String },
    /// Drop a property that did not exist before. `drop_empty_rule` also
    /// removes the rule block when the forward edit created it.
    RemoveStyleProperty { property: String, drop_empty_rule: bool },
    /// Restore the full `class` attribute (`None` removes it)
    RestoreClassList { value: Option<String> },
}

impl Reversal {
    pub fn targets_stylesheet(&self) -> bool {
        matches!(
            self,
            Reversal::SetStyleProperty { .. } | Reversal::RemoveStyleProperty { .. }
        )
    }

    pub fn apply(&self, content: &str, selector: &str) -> EditResult<MutationOutcome> {
        match self {
            Reversal::SetText { text } => set_text(content, selector, text),
            Reversal::SetAttribute { attribute, value } => {
                write_attribute(content, selector, attribute, value)
            }
            Reversal::RemoveAttribute { attribute } => remove_attribute(content, selector, attribute),
            Reversal::SetStyleProperty { property, value } => {
                set_style_property(content, selector, property, value)
            }
            Reversal::RemoveStyleProperty {
                property,
                drop_empty_rule,
            } => remove_style_property(content, selector, property, *drop_empty_rule),
            Reversal::RestoreClassList { value: Some(value) } => {
                write_attribute(content, selector, "class", value)
            }
            Reversal::RestoreClassList { value: None } => {
                remove_attribute(content, selector, "class")
            }
        }
    }
}

/// Result of one engine operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    pub content: String,
    /// Live value before the edit (`None` when the attribute/property was absent)
    pub before: Option<String>,
    pub after: Option<String>,
    pub changed: bool,
    /// A new rule block was appended to the stylesheet
    pub rule_created: bool,
}

impl MutationOutcome {
    fn edited(content: String, before: Option<String>, after: Option<String>) -> Self {
        Self {
            changed: before != after,
            content,
            before,
            after,
            rule_created: false,
        }
    }

    fn unchanged(content: &str, value: Option<String>) -> Self {
        Self {
            content: content.to_string(),
            before: value.clone(),
            after: value,
            changed: false,
            rule_created: false,
        }
    }
}

fn resolve(doc: &HtmlDocument, selector: &str) -> EditResult<NodeId> {
    let parsed = Selector::parse(selector)?;
    let id = doc
        .select_first(&parsed)
        .ok_or_else(|| EditError::ComponentNotFound(selector.to_string()))?;
    debug!(selector = %selector, node = id.0, "Resolved element");
    Ok(id)
}

fn element_at<'d>(doc: &'d HtmlDocument, id: NodeId) -> EditResult<&'d Element> {
    doc.element(id)
        .ok_or_else(|| EditError::invalid_operation("selector resolved to a non-element node"))
}

/// The span a text edit reads and replaces: the element's one run of direct
/// text, or `None` when it has no direct text.
///
/// Text interleaved with child elements (`Build <em>fast</em> pages`) has no
/// single value that a later `setText(before)` could restore, so it is
/// rejected rather than partially replaced.
pub fn text_span(doc: &HtmlDocument, id: NodeId) -> EditResult<Option<Span>> {
    let element = element_at(doc, id)?;
    if element.is_void() || element.self_closing {
        return Err(EditError::invalid_operation(format!(
            "<{}> cannot contain text",
            element.name
        )));
    }

    let mut runs = doc.direct_text_runs(id).into_iter();
    match (runs.next(), runs.next()) {
        (first, None) => Ok(first),
        _ => Err(EditError::invalid_operation(format!(
            "<{}> mixes text with child elements; edit the children individually",
            element.name
        ))),
    }
}

/// Replace the element's text content.
///
/// The new value is trimmed and replaces the trimmed direct text (see
/// [`text_span`]); child elements are never touched. With no direct text the
/// value is inserted right after the start tag.
pub fn set_text(content: &str, selector: &str, text: &str) -> EditResult<MutationOutcome> {
    let doc = parse_html(content);
    let id = resolve(&doc, selector)?;
    let element = element_at(&doc, id)?;

    let new_text = escape_text(text.trim());
    let (edit, before) = match text_span(&doc, id)? {
        Some(span) => (
            Splice::replace(span, new_text.clone()),
            span.slice(content).to_string(),
        ),
        None => (Splice::insert(element.start_tag.end, new_text.clone()), String::new()),
    };

    if before == new_text {
        return Ok(MutationOutcome::unchanged(content, Some(before)));
    }
    let updated = splice(content, edit)?;
    Ok(MutationOutcome::edited(updated, Some(before), Some(new_text)))
}

/// Set or overwrite one attribute, leaving every other attribute as written
pub fn set_attribute(
    content: &str,
    selector: &str,
    attribute: &str,
    value: &str,
) -> EditResult<MutationOutcome> {
    validate_attribute_name(attribute)?;
    if is_identity_attribute(attribute) {
        return Err(EditError::invalid_operation(format!(
            "`{}` is managed by the identifier scheme",
            attribute
        )));
    }
    write_attribute(content, selector, attribute, value)
}

fn write_attribute(
    content: &str,
    selector: &str,
    attribute: &str,
    value: &str,
) -> EditResult<MutationOutcome> {
    let doc = parse_html(content);
    let id = resolve(&doc, selector)?;
    let element = element_at(&doc, id)?;

    let edit = match element.attribute(attribute) {
        Some(attr) => {
            let before = attr.raw_value(content).to_string();
            if before == value {
                return Ok(MutationOutcome::unchanged(content, Some(before)));
            }
            let name = attr.name_span.slice(content);
            let edit = match &attr.value {
                // An empty unquoted value is written as a bare attribute
                Some(v) if v.quote.is_none() && value.is_empty() => {
                    Splice::replace(attr.span, name)
                }
                Some(v) => Splice::replace(v.span, quote_attribute_value(value, v.quote)),
                None => Splice::replace(
                    attr.span,
                    format!("{}={}", name, quote_attribute_value(value, None)),
                ),
            };
            let updated = splice(content, edit)?;
            return Ok(MutationOutcome::edited(updated, Some(before), Some(value.to_string())));
        }
        None => Splice::insert(
            element.attribute_insert_point(),
            format!(" {}={}", attribute, quote_attribute_value(value, Some('"'))),
        ),
    };

    let updated = splice(content, edit)?;
    Ok(MutationOutcome::edited(updated, None, Some(value.to_string())))
}

/// Remove an attribute together with the whitespace that separated it
pub fn remove_attribute(content: &str, selector: &str, attribute: &str) -> EditResult<MutationOutcome> {
    let doc = parse_html(content);
    let id = resolve(&doc, selector)?;
    let element = element_at(&doc, id)?;

    let Some(attr) = element.attribute(attribute) else {
        return Ok(MutationOutcome::unchanged(content, None));
    };
    let before = attr.raw_value(content).to_string();
    let start = trim_whitespace_back(content, attr.span.start, element.name_span.end);
    let updated = splice(content, Splice::delete(Span::new(start, attr.span.end)))?;
    Ok(MutationOutcome::edited(updated, Some(before), None))
}

/// Append a class if it is not already in the list
pub fn add_class(content: &str, selector: &str, class_name: &str) -> EditResult<MutationOutcome> {
    validate_class_name(class_name)?;
    let doc = parse_html(content);
    let id = resolve(&doc, selector)?;
    let element = element_at(&doc, id)?;

    let before = element
        .attribute("class")
        .map(|attr| attr.raw_value(content).to_string());
    if doc.class_list(id).contains(&class_name) {
        return Ok(MutationOutcome::unchanged(content, before));
    }

    let value = match before.as_deref() {
        Some(raw) if !raw.trim().is_empty() => format!("{} {}", raw.trim_end(), class_name),
        _ => class_name.to_string(),
    };
    let mut outcome = write_attribute(content, selector, "class", &value)?;
    outcome.before = before;
    Ok(outcome)
}

/// Remove a class if present; the remaining list is joined with single spaces
pub fn remove_class(content: &str, selector: &str, class_name: &str) -> EditResult<MutationOutcome> {
    validate_class_name(class_name)?;
    let doc = parse_html(content);
    let id = resolve(&doc, selector)?;
    let element = element_at(&doc, id)?;

    let before = element
        .attribute("class")
        .map(|attr| attr.raw_value(content).to_string());
    let classes = doc.class_list(id);
    if !classes.contains(&class_name) {
        return Ok(MutationOutcome::unchanged(content, before));
    }

    let value = classes
        .into_iter()
        .filter(|c| *c != class_name)
        .collect::<Vec<_>>()
        .join(" ");
    write_attribute(content, selector, "class", &value)
}

/// Set a property inside the rule block scoped to `selector`.
///
/// Replaces only the value of an existing declaration, appends a declaration
/// to an existing block, or appends a new block at the end of the stylesheet.
/// Rules nested in at-rule blocks are never targeted.
pub fn set_style_property(
    css: &str,
    selector: &str,
    property: &str,
    value: &str,
) -> EditResult<MutationOutcome> {
    validate_property_name(property)?;
    let value = value.trim();
    validate_style_value(value)?;
    Selector::parse(selector)?;

    let sheet = Stylesheet::parse(css)?;
    let mut rule_created = false;
    let (splices, before) = match sheet.target_rule(selector, property) {
        Some(rule) => match rule.declaration(property) {
            Some(decl) => {
                let before = decl.value_span.slice(css).to_string();
                if before == value {
                    return Ok(MutationOutcome::unchanged(css, Some(before)));
                }
                (vec![Splice::replace(decl.value_span, value)], Some(before))
            }
            None => (append_declaration(css, rule, property, value), None),
        },
        None => {
            rule_created = true;
            let block = format!("\n{} {{\n  {}: {};\n}}\n", selector.trim(), property, value);
            (vec![Splice::insert(css.len(), block)], None)
        }
    };

    let updated = apply_splices(css, &splices)?;
    Stylesheet::parse(&updated).map_err(|e| {
        EditError::invalid_operation(format!("value `{}` would corrupt the stylesheet: {}", value, e))
    })?;
    debug!(
        selector = %normalize_selector(selector),
        property = %property,
        rule_created,
        "Updated style property"
    );

    let mut outcome = MutationOutcome::edited(updated, before, Some(value.to_string()));
    outcome.rule_created = rule_created;
    Ok(outcome)
}

/// Remove a property from the rule block scoped to `selector`.
///
/// With `drop_empty_rule`, a block left with nothing but whitespace is removed
/// along with the newline on each side of it.
pub fn remove_style_property(
    css: &str,
    selector: &str,
    property: &str,
    drop_empty_rule: bool,
) -> EditResult<MutationOutcome> {
    let sheet = Stylesheet::parse(css)?;
    let Some(rule) = sheet.target_rule(selector, property) else {
        return Ok(MutationOutcome::unchanged(css, None));
    };
    let Some(decl) = rule.declaration(property) else {
        return Ok(MutationOutcome::unchanged(css, None));
    };

    let before = decl.value_span.slice(css).to_string();
    let start = trim_whitespace_back(css, decl.span.start, rule.body.start);
    let rest_is_blank = css[rule.body.start..start].trim().is_empty()
        && css[decl.span.end..rule.body.end].trim().is_empty();

    let removed = if drop_empty_rule && rest_is_blank {
        let (mut start, mut end) = (rule.selector_span.start, rule.block.end);
        if css[..start].ends_with('\n') && css[end..].starts_with('\n') {
            start -= 1;
            end += 1;
        }
        Span::new(start, end)
    } else {
        Span::new(start, decl.span.end)
    };

    let updated = splice(css, Splice::delete(removed))?;
    Ok(MutationOutcome::edited(updated, Some(before), None))
}

fn append_declaration(css: &str, rule: &Rule, property: &str, value: &str) -> Vec<Splice> {
    let body = rule.body.slice(css);
    let insert_at = rule.body.start + body.trim_end().len();
    let declaration = format!("{}: {};", property, value);

    let mut splices = Vec::new();
    if rule.open_declaration {
        if let Some(last) = rule.declarations.last() {
            splices.push(Splice::insert(last.value_span.end, ";"));
        }
    }
    let text = if body.contains('\n') {
        format!("\n{}{}", block_indent(css, rule), declaration)
    } else {
        format!(" {}", declaration)
    };
    splices.push(Splice::insert(insert_at, text));
    splices
}

// Indentation of the last declaration (or last content line) in a block
fn block_indent(css: &str, rule: &Rule) -> String {
    let anchor = match rule.declarations.last() {
        Some(decl) => decl.span.start,
        None => {
            let body = rule.body.slice(css);
            let trimmed = body.trim_end();
            match trimmed.rfind('\n') {
                Some(nl) => {
                    let line = &trimmed[nl + 1..];
                    rule.body.start + nl + 1 + (line.len() - line.trim_start().len())
                }
                None => return "  ".to_string(),
            }
        }
    };
    let line_start = css[..anchor].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let prefix = &css[line_start..anchor];
    if !prefix.is_empty() && prefix.chars().all(|c| c == ' ' || c == '\t') {
        prefix.to_string()
    } else {
        "  ".to_string()
    }
}

// Start of the whitespace run ending at `pos`, not going before `floor`
fn trim_whitespace_back(source: &str, pos: usize, floor: usize) -> usize {
    let before = &source[floor..pos];
    floor + before.trim_end_matches(|c: char| c.is_ascii_whitespace()).len()
}

fn validate_attribute_name(name: &str) -> EditResult<()> {
    let valid = !name.is_empty()
        && !name.chars().any(|c| {
            c.is_whitespace() || c.is_control() || matches!(c, '"' | '\'' | '<' | '>' | '/' | '=')
        });
    if valid {
        Ok(())
    } else {
        Err(EditError::invalid_operation(format!(
            "invalid attribute name `{}`",
            name
        )))
    }
}

fn validate_class_name(class_name: &str) -> EditResult<()> {
    let valid = !class_name.is_empty()
        && !class_name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '"' | '\'' | '<' | '>'));
    if valid {
        Ok(())
    } else {
        Err(EditError::invalid_operation(format!(
            "invalid class name `{}`",
            class_name
        )))
    }
}

fn validate_property_name(property: &str) -> EditResult<()> {
    let valid = !property.is_empty()
        && !property.starts_with(|c: char| c.is_ascii_digit())
        && property
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(EditError::invalid_operation(format!(
            "invalid CSS property `{}`",
            property
        )))
    }
}

fn validate_style_value(value: &str) -> EditResult<()> {
    if value.is_empty() {
        return Err(EditError::invalid_operation("CSS value is empty"));
    }
    let forbidden = value.contains(|c| matches!(c, ';' | '{' | '}'))
        || value.contains("/*")
        || value.contains("*/")
        || value.to_ascii_lowercase().contains("</");
    if forbidden {
        return Err(EditError::invalid_operation(format!(
            "CSS value `{}` may only contain a single declaration value",
            value
        )));
    }
    Ok(())
}
