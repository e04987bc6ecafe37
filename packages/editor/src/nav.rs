//! # Navigation Propagator
//!
//! Adds a link to a newly created page into every other page's navigation,
//! and strips links to a removed page.
//!
//! The navigation container is located with a fixed search order:
//!
//! 1. `ul.nav-links`
//! 2. `ul#nav-links`
//! 3. `div#nav-links`
//! 4. the first `ul` inside the first `nav`
//! 5. a `div` whose class matches `nav-links|navigation|menu`
//!
//! Pages where none of these match (or where the container is not explicitly
//! closed) are handled by [`NavPolicy`]: skipped with a warning, or the whole
//! propagation fails before anything is modified.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use ncd_parser::{
    apply_splices, escape_text, parse_html, quote_attribute_value, HtmlDocument, IdGenerator,
    NodeId, Selector, Span, Splice,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::component::{ComponentRecord, ElementKind, FILE_ATTR, ID_ATTR, TYPE_ATTR};
use crate::config::NavPolicy;
use crate::errors::{EditError, EditResult};

/// A page being added to the site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPage {
    pub filename: String,
    pub link_label: String,
}

impl NewPage {
    pub fn new(filename: impl Into<String>, link_label: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            link_label: link_label.into(),
        }
    }
}

/// What happened to each page during propagation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropagationReport {
    pub updated: Vec<String>,
    pub already_linked: Vec<String>,
    pub skipped: Vec<String>,
}

/// New contents and records produced by a propagation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Propagation {
    /// Modified documents only
    pub documents: BTreeMap<String, String>,
    pub records: Vec<ComponentRecord>,
    pub report: PropagationReport,
}

impl Propagation {
    pub fn updated_count(&self) -> usize {
        self.documents.len()
    }
}

fn nav_class_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"nav-links|navigation|menu").ok())
        .as_ref()
}

/// Locate a page's navigation container
pub fn find_nav_container(doc: &HtmlDocument) -> Option<NodeId> {
    for selector in ["ul.nav-links", "ul#nav-links", "div#nav-links"] {
        let parsed = Selector::parse(selector).ok()?;
        if let Some(found) = doc.select_first(&parsed) {
            return Some(found);
        }
    }

    let nav = Selector::parse("nav").ok()?;
    let list = Selector::parse("ul").ok()?;
    if let Some(first_nav) = doc.select_first(&nav) {
        if let Some(found) = doc.select_within(first_nav, &list).first() {
            return Some(*found);
        }
    }

    doc.elements()
        .find(|(id, element)| {
            element.name == "div"
                && doc
                    .attribute_value(*id, "class")
                    .zip(nav_class_pattern())
                    .map(|(class, pattern)| pattern.is_match(class))
                    .unwrap_or(false)
        })
        .map(|(id, _)| id)
}

fn document_dir(document: &str) -> Vec<&str> {
    document
        .rsplit_once('/')
        .map(|(dir, _)| dir.split('/').filter(|s| !s.is_empty() && *s != ".").collect())
        .unwrap_or_default()
}

/// Site key a local `href` inside `document` resolves to. Query and fragment
/// are dropped; external and fragment-only links resolve to `None`.
pub fn resolve_href(document: &str, href: &str) -> Option<String> {
    let path = href
        .split(|c| c == '?' || c == '#')
        .next()
        .unwrap_or("")
        .trim();
    if path.is_empty() || path.contains(':') || path.starts_with("//") {
        return None;
    }

    let mut segments = if path.starts_with('/') {
        Vec::new()
    } else {
        document_dir(document)
    };
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    (!segments.is_empty()).then(|| segments.join("/"))
}

fn site_key(path: &str) -> String {
    resolve_href("", path).unwrap_or_default()
}

/// Whether `href`, found in `document`, points at the page `filename`
pub fn href_targets(document: &str, href: &str, filename: &str) -> bool {
    resolve_href(document, href).as_deref() == Some(site_key(filename).as_str())
}

/// Link from `document` to the page `filename`, relative to the document's directory
pub fn relative_href(document: &str, filename: &str) -> String {
    let key = site_key(filename);
    let from = document_dir(document);
    let to: Vec<&str> = key.split('/').collect();

    let target_dir = &to[..to.len().saturating_sub(1)];
    let common = from
        .iter()
        .zip(target_dir)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = vec![".."; from.len() - common];
    parts.extend(&to[common..]);
    parts.join("/")
}

fn links_within(doc: &HtmlDocument, scope: NodeId) -> Vec<NodeId> {
    match Selector::parse("a") {
        Ok(anchor) => doc.select_within(scope, &anchor),
        Err(_) => Vec::new(),
    }
}

fn same_file(document: &str, filename: &str) -> bool {
    site_key(document) == site_key(filename)
}

/// Insert a link to `page` into every other document's navigation.
///
/// Pure with respect to storage: returns the modified documents and the
/// records for the new links; the caller persists and registers them.
pub fn propagate_new_page(
    documents: &BTreeMap<String, String>,
    page: &NewPage,
    generator: &mut IdGenerator,
    policy: NavPolicy,
) -> EditResult<Propagation> {
    let mut propagation = Propagation::default();

    for (document, content) in documents {
        if same_file(document, &page.filename) {
            continue;
        }

        let doc = parse_html(content);
        let container = find_nav_container(&doc)
            .filter(|id| doc.element(*id).map(|e| e.end_tag.is_some()).unwrap_or(false));
        let Some(container) = container else {
            match policy {
                NavPolicy::Skip => {
                    warn!(document = %document, "Navigation container not found, page skipped");
                    propagation.report.skipped.push(document.clone());
                    continue;
                }
                NavPolicy::Fail => return Err(EditError::NavigationNotFound(document.clone())),
            }
        };

        let links = links_within(&doc, container);
        let already_linked = links.iter().any(|link| {
            doc.attribute_value(*link, "href")
                .map(|href| href_targets(document, href, &page.filename))
                .unwrap_or(false)
        });
        if already_linked {
            debug!(document = %document, filename = %page.filename, "Link already present");
            propagation.report.already_linked.push(document.clone());
            continue;
        }

        let id = generator.new_id();
        let (updated, record) = insert_link(&doc, container, &links, document, page, id)?;
        propagation.documents.insert(document.clone(), updated);
        propagation.records.push(record);
        propagation.report.updated.push(document.clone());
    }

    info!(
        filename = %page.filename,
        updated = propagation.updated_count(),
        skipped = propagation.report.skipped.len(),
        "Propagated new page"
    );
    Ok(propagation)
}

fn insert_link(
    doc: &HtmlDocument,
    container: NodeId,
    links: &[NodeId],
    document: &str,
    page: &NewPage,
    id: String,
) -> EditResult<(String, ComponentRecord)> {
    let source = doc.source();
    let sibling = links.first().copied();

    // Presentation attributes cloned from the first existing link
    let href = relative_href(document, &page.filename);
    let mut attributes = format!(" href={}", quote_attribute_value(&href, Some('"')));
    if let Some(sibling) = sibling {
        for name in ["class", "style"] {
            if let Some(attr) = doc.element(sibling).and_then(|e| e.attribute(name)) {
                let quote = attr.value.as_ref().and_then(|v| v.quote).unwrap_or('"');
                attributes.push_str(&format!(
                    " {}={}",
                    name,
                    quote_attribute_value(attr.raw_value(source), Some(quote))
                ));
            }
        }
    }
    attributes.push_str(&format!(
        " {}=\"{}\" {}={} {}=\"link\"",
        ID_ATTR,
        id,
        FILE_ATTR,
        quote_attribute_value(document, Some('"')),
        TYPE_ATTR
    ));
    let anchor = format!("<a{}>{}</a>", attributes, escape_text(page.link_label.trim()));

    let container_is_list = doc
        .element(container)
        .map(|e| e.name == "ul" || e.name == "ol")
        .unwrap_or(false);
    let sibling_item = sibling
        .and_then(|s| doc.parent(s))
        .filter(|p| doc.element(*p).map(|e| e.name == "li").unwrap_or(false));

    let (item, last_item) = if container_is_list || sibling_item.is_some() {
        let li_attrs = sibling_item
            .and_then(|li| doc.element(li))
            .and_then(|li| li.attribute("class"))
            .map(|attr| {
                let quote = attr.value.as_ref().and_then(|v| v.quote).unwrap_or('"');
                format!(" class={}", quote_attribute_value(attr.raw_value(source), Some(quote)))
            })
            .unwrap_or_default();
        let last_li = doc
            .children(container)
            .iter()
            .rev()
            .find(|child| doc.element(**child).map(|e| e.name == "li").unwrap_or(false))
            .copied()
            .or(sibling_item);
        (format!("<li{}>{}</li>", li_attrs, anchor), last_li)
    } else {
        (anchor, links.last().copied())
    };

    let edit = match last_item {
        Some(last) => {
            let indent = doc.leading_whitespace(last);
            Splice::insert(item_end(doc, last), format!("{}{}", indent, item))
        }
        None => {
            let at = doc
                .content_end(container)
                .ok_or_else(|| EditError::NavigationNotFound(document.to_string()))?;
            Splice::insert(at, item)
        }
    };

    let updated = apply_splices(source, &[edit])?;
    let record = ComponentRecord::new(id, document, ElementKind::Link)
        .with_metadata("tag", "a")
        .with_metadata("navigationFor", page.filename.clone());
    Ok((updated, record))
}

// End of an item, not counting whitespace swallowed by an implicitly closed `<li>`
fn item_end(doc: &HtmlDocument, item: NodeId) -> usize {
    let span = doc.node(item).span;
    let explicit = doc.element(item).and_then(|e| e.end_tag).is_some();
    if explicit {
        span.end
    } else {
        let text = span.slice(doc.source());
        span.start + text.trim_end().len()
    }
}

/// Remove links to `filename` (and a wrapping `<li>`) from every document.
/// Returns only the documents that changed.
pub fn remove_page_link(
    documents: &BTreeMap<String, String>,
    filename: &str,
) -> EditResult<BTreeMap<String, String>> {
    let mut updated = BTreeMap::new();

    for (document, content) in documents {
        let doc = parse_html(content);
        let mut spans: Vec<Span> = links_within(&doc, doc.root())
            .into_iter()
            .filter(|link| {
                doc.attribute_value(*link, "href")
                    .map(|href| href_targets(document, href, filename))
                    .unwrap_or(false)
            })
            .map(|link| {
                let target = doc
                    .parent(link)
                    .filter(|p| doc.element(*p).map(|e| e.name == "li").unwrap_or(false))
                    .unwrap_or(link);
                let end = item_end(&doc, target);
                let start = doc.node(target).span.start - doc.leading_whitespace(target).len();
                Span::new(start, end)
            })
            .collect();
        if spans.is_empty() {
            continue;
        }

        spans.sort_by_key(|s| s.start);
        let mut splices: Vec<Splice> = Vec::new();
        let mut last_end = 0;
        for span in spans {
            if span.start < last_end {
                continue;
            }
            last_end = span.end;
            splices.push(Splice::delete(span));
        }

        info!(document = %document, removed = splices.len(), filename = %filename, "Removed page links");
        updated.insert(document.clone(), apply_splices(content, &splices)?);
    }

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(pages: &[(&str, &str)]) -> BTreeMap<String, String> {
        pages
            .iter()
            .map(|(name, content)| (name.to_string(), content.to_string()))
            .collect()
    }

    const INDEX: &str = "<nav>\n  <ul class=\"nav-links\">\n    <li class=\"item\"><a href=\"index.html\" class=\"nav-link\" data-ncd-id=\"ncd-0001\">Home</a></li>\n    <li class=\"item\"><a href=\"about.html\" class=\"nav-link\">About</a></li>\n  </ul>\n</nav>\n<h1>Home</h1>\n";

    #[test]
    fn test_href_targets() {
        assert!(href_targets("index.html", "pricing.html", "pricing.html"));
        assert!(href_targets("index.html", "./pricing.html#plans", "pricing.html"));
        assert!(href_targets("index.html", "/pricing.html?ref=nav", "pricing.html"));
        assert!(href_targets("blog/post.html", "../pricing.html", "pricing.html"));
        assert!(href_targets("blog/post.html", "pricing.html", "blog/pricing.html"));
        assert!(!href_targets("index.html", "blog/pricing.html", "pricing.html"));
        assert!(!href_targets("index.html", "old-pricing.html", "pricing.html"));
        assert!(!href_targets("index.html", "https://example.com/pricing.html", "pricing.html"));
        assert!(!href_targets("index.html", "#", "pricing.html"));
    }

    #[test]
    fn test_relative_href() {
        assert_eq!(relative_href("index.html", "pricing.html"), "pricing.html");
        assert_eq!(relative_href("blog/post.html", "pricing.html"), "../pricing.html");
        assert_eq!(relative_href("blog/post.html", "blog/new.html"), "new.html");
        assert_eq!(relative_href("index.html", "./docs/start.html"), "docs/start.html");
    }

    #[test]
    fn test_nested_pages_compare_full_paths() {
        let index = "<nav><ul><li><a href=\"blog/pricing.html\">Blog pricing</a></li></ul></nav>";
        let nested = "<nav><ul><li><a href=\"../index.html\">Home</a></li></ul></nav>";
        let documents = docs(&[("index.html", index), ("blog/pricing.html", nested)]);

        let out = propagate_new_page(
            &documents,
            &NewPage::new("pricing.html", "Pricing"),
            &mut IdGenerator::new(),
            NavPolicy::Skip,
        )
        .unwrap();

        assert_eq!(out.report.updated, vec!["blog/pricing.html", "index.html"]);
        assert!(out.report.already_linked.is_empty());
        assert!(out.documents["index.html"].contains("<li><a href=\"pricing.html\""));
        assert!(out.documents["blog/pricing.html"].contains("<li><a href=\"../pricing.html\""));
    }

    #[test]
    fn test_inserts_link_matching_siblings() {
        let documents = docs(&[("index.html", INDEX)]);
        let mut gen = IdGenerator::new();
        gen.observe("ncd-0001");
        let out = propagate_new_page(
            &documents,
            &NewPage::new("pricing.html", "Pricing"),
            &mut gen,
            NavPolicy::Skip,
        )
        .unwrap();

        assert_eq!(out.updated_count(), 1);
        let html = &out.documents["index.html"];
        assert!(html.contains(
            "About</a></li>\n    <li class=\"item\"><a href=\"pricing.html\" class=\"nav-link\" data-ncd-id=\"ncd-0002\" data-ncd-file=\"index.html\" data-ncd-type=\"link\">Pricing</a></li>\n  </ul>"
        ));
        assert_eq!(out.records[0].id, "ncd-0002");
        assert_eq!(out.records[0].document, "index.html");
    }

    #[test]
    fn test_fallback_to_first_list_in_nav() {
        let page = "<header><nav><ul><li><a href=\"/\">Home</a></li></ul></nav></header>";
        let documents = docs(&[("a.html", page)]);
        let out = propagate_new_page(
            &documents,
            &NewPage::new("b.html", "B"),
            &mut IdGenerator::new(),
            NavPolicy::Skip,
        )
        .unwrap();
        assert!(out.documents["a.html"].contains("</li><li><a href=\"b.html\""));
    }

    #[test]
    fn test_menu_div_without_list() {
        let page = "<div class=\"main-menu\">\n  <a href=\"index.html\" class=\"link\">Home</a>\n</div>";
        let documents = docs(&[("index.html", page)]);
        let out = propagate_new_page(
            &documents,
            &NewPage::new("blog.html", "Blog"),
            &mut IdGenerator::new(),
            NavPolicy::Skip,
        )
        .unwrap();
        let html = &out.documents["index.html"];
        assert!(html.contains("Home</a>\n  <a href=\"blog.html\" class=\"link\""));
        assert!(!html.contains("<li"));
    }

    #[test]
    fn test_policy_for_pages_without_navigation() {
        let documents = docs(&[("index.html", INDEX), ("landing.html", "<h1>Landing</h1>")]);
        let page = NewPage::new("pricing.html", "Pricing");

        let out = propagate_new_page(&documents, &page, &mut IdGenerator::new(), NavPolicy::Skip)
            .unwrap();
        assert_eq!(out.report.skipped, vec!["landing.html"]);
        assert_eq!(out.updated_count(), 1);

        let err = propagate_new_page(&documents, &page, &mut IdGenerator::new(), NavPolicy::Fail)
            .unwrap_err();
        assert!(matches!(err, EditError::NavigationNotFound(doc) if doc == "landing.html"));
    }

    #[test]
    fn test_remove_page_link() {
        let documents = docs(&[("index.html", INDEX), ("other.html", "<p>No nav</p>")]);
        let out = remove_page_link(&documents, "about.html").unwrap();
        assert_eq!(out.len(), 1);
        let html = &out["index.html"];
        assert!(!html.contains("about.html"));
        assert!(html.contains("Home</a></li>\n  </ul>"));
    }

    #[test]
    fn test_add_then_remove_restores_page() {
        let documents = docs(&[("index.html", INDEX)]);
        let added = propagate_new_page(
            &documents,
            &NewPage::new("pricing.html", "Pricing"),
            &mut IdGenerator::new(),
            NavPolicy::Skip,
        )
        .unwrap();
        let removed = remove_page_link(&added.documents, "pricing.html").unwrap();
        assert_eq!(removed["index.html"], INDEX);
    }
}
