//! # Identifier Injector
//!
//! Stamps every editable element of freshly generated markup with a stable
//! identifier, its document and its edit kind:
//!
//! ```html
//! <h1 data-ncd-id="ncd-0007" data-ncd-file="index.html" data-ncd-type="text">Welcome</h1>
//! ```
//!
//! One [`IdGenerator`] is shared across every page of a run so identifiers are
//! unique site-wide. Elements that already carry an identifier are skipped and
//! their ids observed, which makes re-running the injector a no-op.

use ncd_parser::{apply_splices, parse_html, quote_attribute_value, IdGenerator, Splice, Stylesheet};
use serde_json::Value;
use tracing::{debug, info};

use crate::component::{selector_for, ComponentRecord, ElementKind, FILE_ATTR, ID_ATTR, TYPE_ATTR};
use crate::errors::EditResult;

/// Result of injecting one document
#[derive(Debug, Clone, PartialEq)]
pub struct InjectedDocument {
    pub document: String,
    pub content: String,
    /// Records for identifiers minted in this run
    pub records: Vec<ComponentRecord>,
    /// Identifiers that were already present
    pub existing: Vec<String>,
}

impl InjectedDocument {
    pub fn changed(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.existing
            .iter()
            .map(String::as_str)
            .chain(self.records.iter().map(|r| r.id.as_str()))
    }
}

/// Identifiers already present in a page
pub fn existing_ids(markup: &str) -> Vec<String> {
    let doc = parse_html(markup);
    doc.elements()
        .filter_map(|(id, _)| doc.attribute_value(id, ID_ATTR))
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

/// Inject identifiers into one page
pub fn inject(markup: &str, document: &str, generator: &mut IdGenerator) -> EditResult<InjectedDocument> {
    let doc = parse_html(markup);

    // Resume past ids already in the page before minting anything
    let existing = existing_ids(markup);
    for id in &existing {
        generator.observe(id);
    }

    let mut splices = Vec::new();
    let mut records = Vec::new();
    for (node, element) in doc.elements() {
        if element.attribute(ID_ATTR).is_some() {
            continue;
        }
        let Some(element_kind) = ElementKind::from_tag(&element.name) else {
            continue;
        };

        let id = generator.new_id();
        let edit_kind = element_kind.edit_kind();
        splices.push(Splice::insert(
            element.name_span.end,
            format!(
                " {}={} {}={} {}={}",
                ID_ATTR,
                quote_attribute_value(&id, Some('"')),
                FILE_ATTR,
                quote_attribute_value(document, Some('"')),
                TYPE_ATTR,
                quote_attribute_value(edit_kind.as_str(), Some('"')),
            ),
        ));

        let classes: Vec<Value> = doc
            .class_list(node)
            .into_iter()
            .map(|c| Value::String(c.to_string()))
            .collect();
        debug!(component_id = %id, tag = %element.name, "Injecting identifier");
        records.push(
            ComponentRecord::new(id, document, element_kind)
                .with_metadata("tag", element.name.clone())
                .with_metadata("classes", Value::Array(classes)),
        );
    }

    let content = apply_splices(markup, &splices)?;
    info!(
        document = %document,
        injected = records.len(),
        existing = existing.len(),
        "Injected identifiers"
    );

    Ok(InjectedDocument {
        document: document.to_string(),
        content,
        records,
        existing,
    })
}

/// Inject a whole page set with one generator.
///
/// Every page's existing ids are observed before the first new id is minted,
/// so a partially injected site never receives a colliding identifier.
pub fn inject_site(
    pages: &[(String, String)],
    generator: &mut IdGenerator,
) -> EditResult<Vec<InjectedDocument>> {
    for (_, markup) in pages {
        for id in existing_ids(markup) {
            generator.observe(&id);
        }
    }

    pages
        .iter()
        .map(|(document, markup)| inject(markup, document, generator))
        .collect()
}

/// Append an empty scoped rule block for every identifier that has none yet
pub fn scoped_stylesheet<'a>(css: &str, ids: impl IntoIterator<Item = &'a str>) -> EditResult<String> {
    let sheet = Stylesheet::parse(css)?;

    let mut out = css.to_string();
    let mut added = 0;
    for id in ids {
        let selector = selector_for(id);
        if sheet.rules_for(&selector).next().is_some() || out[css.len()..].contains(&selector) {
            continue;
        }
        out.push_str(&format!("\n{} {{\n  /* Editable element */\n}}\n", selector));
        added += 1;
    }

    debug!(added, "Appended scoped rule blocks");
    Ok(out)
}
