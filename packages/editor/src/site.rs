//! # Site Editor
//!
//! The service layer tying the pieces together. Owns the registry, the
//! history, the configuration and a [`ContentStore`], and performs every
//! committed edit as:
//!
//! ```text
//! lock(document) → read → engine → recordDiff → write → unlock
//! ```
//!
//! The diff is recorded before the document is written, so a document is
//! never changed without a diff describing it. A diff whose write then fails
//! describes a change that never landed; its reversal sets absolute values,
//! so replaying it during rollback leaves the document as it is.
//!
//! Locks are per document, so two edits to the same page are serialized
//! while edits to different pages proceed in parallel. Operations spanning
//! several documents (injection, page add/remove, rollback) take all their
//! locks up front in sorted order.
//!
//! Rollback replays inverses and never appends to or trims the history, so
//! `current_version` never goes down.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ncd_parser::{parse_html, IdGenerator, Selector};
use serde::Serialize;
use tracing::{debug, info};

use crate::component::{selector_for, ComponentRecord, EditKind};
use crate::config::EditorConfig;
use crate::errors::{EditError, EditResult};
use crate::history::{DiffDraft, DiffRecord, EditHistory};
use crate::injector::{inject, inject_site, scoped_stylesheet};
use crate::mutations::{text_span, Mutation};
use crate::nav::{propagate_new_page, remove_page_link, NewPage, PropagationReport};
use crate::planner::{check_mutation, parse_plan, validate_plan, EditPlanner, PlannerRequest};
use crate::registry::ComponentRegistry;
use crate::store::{ContentStore, DirectoryStore};

/// A committed (or no-op) edit
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedEdit {
    pub component_id: String,
    pub document: String,
    /// `None` when the edit changed nothing and no diff was recorded
    pub version: Option<u64>,
    pub before: Option<String>,
    pub after: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectionReport {
    /// Pages that received new identifiers
    pub documents: Vec<String>,
    pub injected: usize,
    pub existing: usize,
    pub stylesheet_updated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackReport {
    /// Version whose state the documents now reflect
    pub target: u64,
    /// Latest recorded version, unchanged by the rollback
    pub current_version: u64,
    /// Reverted versions, newest first
    pub reverted: Vec<u64>,
    pub documents: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageAddition {
    pub filename: String,
    /// Identifiers injected into the new page itself
    pub injected: usize,
    pub updated: Vec<String>,
    pub already_linked: Vec<String>,
    pub skipped: Vec<String>,
}

impl PageAddition {
    pub fn updated_count(&self) -> usize {
        self.updated.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRemoval {
    pub filename: String,
    pub removed: bool,
    pub updated: Vec<String>,
}

pub struct SiteEditor {
    config: EditorConfig,
    store: Box<dyn ContentStore>,
    registry: ComponentRegistry,
    history: EditHistory,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl std::fmt::Debug for SiteEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteEditor")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}

impl SiteEditor {
    pub fn new(
        store: Box<dyn ContentStore>,
        registry: ComponentRegistry,
        history: EditHistory,
        config: EditorConfig,
    ) -> Self {
        Self {
            config,
            store,
            registry,
            history,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Open a site directory: config from `ncd.config.json`, registry and
    /// history under the state directory
    pub fn open(root: impl AsRef<Path>) -> EditResult<Self> {
        let root = root.as_ref();
        let config = EditorConfig::load(root)?;
        let state = config.state_dir(root);

        let store = DirectoryStore::new(root).ignoring(config.state_dir.clone());
        let registry = ComponentRegistry::open(state.join("registry"))?;
        let history = EditHistory::open(state.join("history"))?;
        debug!(root = %root.display(), components = registry.len(), versions = history.current_version(), "Opened site");

        Ok(Self::new(Box::new(store), registry, history, config))
    }

    /// Ephemeral editor over any store with in-memory registry and history
    pub fn in_memory(store: impl ContentStore + 'static, config: EditorConfig) -> Self {
        Self::new(
            Box::new(store),
            ComponentRegistry::in_memory(),
            EditHistory::in_memory(),
            config,
        )
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    pub fn store(&self) -> &dyn ContentStore {
        self.store.as_ref()
    }

    /// Generator continuing past every registered identifier
    pub fn generator(&self) -> IdGenerator {
        let mut generator = self.config.generator();
        for id in self.registry.ids() {
            generator.observe(&id);
        }
        generator
    }

    /// Components, optionally restricted to one document
    pub fn components(&self, document: Option<&str>) -> Vec<ComponentRecord> {
        match document {
            Some(document) => self.registry.get_by_document(document),
            None => self.registry.list().into_values().collect(),
        }
    }

    /// Most recent diffs; `limit` defaults to the configured page size
    pub fn recent_history(&self, limit: Option<usize>) -> Vec<DiffRecord> {
        self.history
            .list_recent(limit.unwrap_or(self.config.history_limit))
    }

    /// Inject identifiers into every page, register them and extend the stylesheet
    pub fn inject_site(&self) -> EditResult<InjectionReport> {
        let pages = self.store.list_pages()?;
        let mut documents: BTreeSet<String> = pages.iter().cloned().collect();
        documents.insert(self.config.stylesheet.clone());
        let locks = self.locks_for(documents);
        let _guards = guard_all(&locks);

        let contents = pages
            .iter()
            .map(|page| Ok((page.clone(), self.store.read(page)?)))
            .collect::<EditResult<Vec<_>>>()?;

        let mut generator = self.generator();
        let injected = inject_site(&contents, &mut generator)?;

        let records: Vec<ComponentRecord> = injected
            .iter()
            .flat_map(|doc| doc.records.iter().cloned())
            .collect();
        self.registry.register_all(records)?;

        let mut report = InjectionReport::default();
        for doc in &injected {
            report.existing += doc.existing.len();
            report.injected += doc.records.len();
            if doc.changed() {
                self.store.write(&doc.document, &doc.content)?;
                report.documents.push(doc.document.clone());
            }
        }

        if self.config.scoped_css {
            let ids: Vec<&str> = injected.iter().flat_map(|doc| doc.ids()).collect();
            report.stylesheet_updated = self.extend_stylesheet(ids)?;
        }

        info!(
            pages = pages.len(),
            injected = report.injected,
            existing = report.existing,
            "Injected site"
        );
        Ok(report)
    }

    /// Validate and commit one edit against a registered component
    pub fn apply(&self, component_id: &str, mutation: &Mutation) -> EditResult<AppliedEdit> {
        let record = self.registry.get(component_id)?;
        check_mutation(&record, mutation, &self.config)?;

        let document = if mutation.targets_stylesheet() {
            self.config.stylesheet.clone()
        } else {
            record.document.clone()
        };

        let lock = self.document_lock(&document);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let content = self.read_document(&document, mutation.targets_stylesheet())?;
        let outcome = mutation.apply(&content, &record.selector)?;

        if !outcome.changed {
            debug!(component_id = %record.id, operation = mutation.name(), "Edit changed nothing");
            return Ok(AppliedEdit {
                component_id: record.id,
                document,
                version: None,
                before: outcome.before,
                after: outcome.after,
            });
        }

        let diff = self.history.record(
            DiffDraft::new(&document, &record.id, mutation.diff_kind())
                .target(mutation.target())
                .values(outcome.before.clone(), outcome.after.clone())
                .rule_created(outcome.rule_created),
        )?;
        self.store.write(&document, &outcome.content)?;

        info!(
            component_id = %record.id,
            document = %document,
            operation = mutation.name(),
            version = diff.version,
            "Applied edit"
        );
        Ok(AppliedEdit {
            component_id: record.id,
            document,
            version: Some(diff.version),
            before: outcome.before,
            after: outcome.after,
        })
    }

    /// Parse, validate and commit raw planner output
    pub fn apply_plan(&self, raw: &str) -> EditResult<AppliedEdit> {
        let plan = parse_plan(raw)?;
        validate_plan(&plan, &self.registry, &self.config)?;
        self.apply(&plan.component_id, &plan.action)
    }

    /// Ask `planner` for an edit to `component_id` and commit it
    pub fn plan_and_apply(
        &self,
        planner: &dyn EditPlanner,
        component_id: &str,
        instruction: &str,
    ) -> EditResult<AppliedEdit> {
        let record = self.registry.get(component_id)?;
        let request = PlannerRequest {
            component_id: record.id.clone(),
            document: record.document.clone(),
            element_kind: record.element_kind,
            edit_kind: record.edit_kind,
            current_value: self.current_value(component_id)?,
            instruction: instruction.to_string(),
        };

        let raw = planner.plan(&request)?;
        let plan = parse_plan(&raw)?;
        if plan.component_id != record.id {
            return Err(EditError::invalid_operation(format!(
                "planner targeted {} instead of {}",
                plan.component_id, record.id
            )));
        }
        validate_plan(&plan, &self.registry, &self.config)?;
        self.apply(&plan.component_id, &plan.action)
    }

    /// Live value handed to the planner: text, `href`, `src` or `class`
    pub fn current_value(&self, component_id: &str) -> EditResult<String> {
        let record = self.registry.get(component_id)?;
        let content = self.store.read(&record.document)?;
        let doc = parse_html(&content);
        let node = doc
            .select_first(&Selector::parse(&record.selector)?)
            .ok_or_else(|| EditError::ComponentNotFound(record.id.clone()))?;

        let value = match record.edit_kind {
            EditKind::Text | EditKind::Button => match text_span(&doc, node) {
                Ok(span) => Some(span.map(|s| s.slice(&content).to_string()).unwrap_or_default()),
                // Not settable as text; the planner still gets the readable content
                Err(_) => Some(doc.text_content(node)),
            },
            EditKind::Link => doc.attribute_value(node, "href").map(str::to_string),
            EditKind::Image => doc.attribute_value(node, "src").map(str::to_string),
            EditKind::Element => doc.attribute_value(node, "class").map(str::to_string),
        };
        Ok(value.unwrap_or_default())
    }

    /// Undo every diff newer than `target`, newest first.
    ///
    /// Every affected document stays locked for the whole replay. The history
    /// itself is left untouched. A failure stops the replay; the diffs
    /// already reverted stay reverted.
    pub fn rollback(&self, target: i64) -> EditResult<RollbackReport> {
        let plan = self.history.plan_rollback(target)?;
        let mut report = RollbackReport {
            target: target.max(0) as u64,
            current_version: self.history.current_version(),
            reverted: Vec::new(),
            documents: Vec::new(),
        };

        let documents: BTreeSet<String> = plan.iter().map(|diff| diff.document.clone()).collect();
        let locks = self.locks_for(documents);
        let _guards = guard_all(&locks);

        for diff in plan {
            let reversal = diff.reversal()?;
            let selector = selector_for(&diff.component_id);

            let content = self.read_document(&diff.document, reversal.targets_stylesheet())?;
            let outcome = reversal.apply(&content, &selector)?;
            if outcome.changed || outcome.content != content {
                self.store.write(&diff.document, &outcome.content)?;
            }

            debug!(version = diff.version, component_id = %diff.component_id, "Reverted diff");
            report.reverted.push(diff.version);
            if !report.documents.contains(&diff.document) {
                report.documents.push(diff.document);
            }
        }

        info!(
            target_version = report.target,
            reverted = report.reverted.len(),
            "Rolled back"
        );
        Ok(report)
    }

    /// Add a page and link it from every other page's navigation.
    ///
    /// With `content`, the page is written first and gets its own identifiers.
    pub fn add_page(
        &self,
        filename: &str,
        label: &str,
        content: Option<&str>,
    ) -> EditResult<PageAddition> {
        let pages: Vec<String> = self
            .store
            .list_pages()?
            .into_iter()
            .filter(|page| page != filename)
            .collect();
        let mut documents: BTreeSet<String> = pages.iter().cloned().collect();
        documents.insert(filename.to_string());
        documents.insert(self.config.stylesheet.clone());
        let locks = self.locks_for(documents);
        let _guards = guard_all(&locks);

        let mut generator = self.generator();

        let new_page = match content {
            Some(markup) => {
                if self.store.exists(filename)? {
                    return Err(EditError::invalid_operation(format!(
                        "page {} already exists",
                        filename
                    )));
                }
                Some(inject(markup, filename, &mut generator)?)
            }
            None => None,
        };

        let contents = pages
            .iter()
            .map(|page| Ok((page.clone(), self.store.read(page)?)))
            .collect::<EditResult<BTreeMap<_, _>>>()?;
        let propagation = propagate_new_page(
            &contents,
            &NewPage::new(filename, label),
            &mut generator,
            self.config.navigation_policy,
        )?;

        let mut records: Vec<ComponentRecord> = Vec::new();
        if let Some(page) = &new_page {
            records.extend(page.records.iter().cloned());
        }
        records.extend(propagation.records.iter().cloned());
        self.registry.register_all(records.clone())?;

        if let Some(page) = &new_page {
            self.store.write(filename, &page.content)?;
        }
        for (document, updated) in &propagation.documents {
            self.store.write(document, updated)?;
        }
        if self.config.scoped_css && !records.is_empty() {
            self.extend_stylesheet(records.iter().map(|r| r.id.as_str()))?;
        }

        let PropagationReport {
            updated,
            already_linked,
            skipped,
        } = propagation.report;
        info!(filename = %filename, updated = updated.len(), "Added page");
        Ok(PageAddition {
            filename: filename.to_string(),
            injected: new_page.map(|page| page.records.len()).unwrap_or(0),
            updated,
            already_linked,
            skipped,
        })
    }

    /// Delete a page and strip links to it. Registry records are kept.
    pub fn remove_page(&self, filename: &str) -> EditResult<PageRemoval> {
        let pages = self.store.list_pages()?;
        let mut documents: BTreeSet<String> = pages.iter().cloned().collect();
        documents.insert(filename.to_string());
        let locks = self.locks_for(documents);
        let _guards = guard_all(&locks);

        let removed = self.store.remove(filename)?;
        let contents = pages
            .iter()
            .filter(|page| page.as_str() != filename)
            .map(|page| Ok((page.clone(), self.store.read(page)?)))
            .collect::<EditResult<BTreeMap<_, _>>>()?;

        let updated = remove_page_link(&contents, filename)?;
        for (document, content) in &updated {
            self.store.write(document, content)?;
        }

        info!(filename = %filename, removed, updated = updated.len(), "Removed page");
        Ok(PageRemoval {
            filename: filename.to_string(),
            removed,
            updated: updated.into_keys().collect(),
        })
    }

    // Caller holds the stylesheet lock
    fn extend_stylesheet<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> EditResult<bool> {
        let stylesheet = &self.config.stylesheet;
        let css = self.read_document(stylesheet, true)?;
        let updated = scoped_stylesheet(&css, ids)?;
        if updated == css {
            return Ok(false);
        }
        self.store.write(stylesheet, &updated)?;
        Ok(true)
    }

    // A missing stylesheet reads as empty so the first style edit creates it
    fn read_document(&self, document: &str, stylesheet: bool) -> EditResult<String> {
        match self.store.read(document) {
            Err(EditError::DocumentNotFound(_)) if stylesheet => Ok(String::new()),
            other => other,
        }
    }

    fn document_lock(&self, document: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(document.to_string())
            .or_default()
            .clone()
    }

    fn locks_for(&self, documents: BTreeSet<String>) -> Vec<Arc<Mutex<()>>> {
        documents
            .iter()
            .map(|document| self.document_lock(document))
            .collect()
    }
}

fn guard_all(locks: &[Arc<Mutex<()>>]) -> Vec<MutexGuard<'_, ()>> {
    locks
        .iter()
        .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const INDEX: &str = "<nav><ul class=\"nav-links\"><li><a href=\"index.html\">Home</a></li></ul></nav>\n<h1>Welcome</h1>\n<p class=\"lead\">Intro</p>\n";

    fn editor() -> SiteEditor {
        let store = MemoryStore::new().with_document("index.html", INDEX);
        let editor = SiteEditor::in_memory(store, EditorConfig::default());
        editor.inject_site().unwrap();
        editor
    }

    fn id_of(editor: &SiteEditor, tag: &str) -> String {
        editor
            .components(Some("index.html"))
            .into_iter()
            .find(|r| r.tag() == Some(tag))
            .map(|r| r.id)
            .unwrap()
    }

    #[test]
    fn test_inject_site_registers_and_scopes() {
        let editor = editor();
        assert_eq!(editor.registry().len(), 4);

        let css = editor.store().read("styles/main.css").unwrap();
        assert_eq!(css.matches("/* Editable element */").count(), 4);

        let again = editor.inject_site().unwrap();
        assert_eq!(again.injected, 0);
        assert_eq!(again.existing, 4);
        assert!(!again.stylesheet_updated);
    }

    #[test]
    fn test_apply_records_diff() {
        let editor = editor();
        let h1 = id_of(&editor, "h1");

        let edit = editor
            .apply(&h1, &Mutation::SetText { text: "Hello".into() })
            .unwrap();
        assert_eq!(edit.version, Some(1));
        assert_eq!(edit.before.as_deref(), Some("Welcome"));
        assert_eq!(editor.current_value(&h1).unwrap(), "Hello");

        let noop = editor
            .apply(&h1, &Mutation::SetText { text: "Hello".into() })
            .unwrap();
        assert_eq!(noop.version, None);
        assert_eq!(editor.history().current_version(), 1);
    }

    #[test]
    fn test_current_value_is_the_recorded_text() {
        let store = MemoryStore::new().with_document(
            "index.html",
            "<h1>Plans <small>monthly</small></h1>\n<p>Build <em>fast</em> pages</p>\n",
        );
        let editor = SiteEditor::in_memory(store, EditorConfig::default());
        editor.inject_site().unwrap();

        let h1 = id_of(&editor, "h1");
        let shown = editor.current_value(&h1).unwrap();
        let edit = editor
            .apply(&h1, &Mutation::SetText { text: "Pricing".into() })
            .unwrap();
        assert_eq!(shown, "Plans");
        assert_eq!(edit.before.as_deref(), Some(shown.as_str()));

        // Interleaved text is shown whole but cannot be replaced as text
        let p = id_of(&editor, "p");
        assert_eq!(editor.current_value(&p).unwrap(), "Build fast pages");
        let page = editor.store().read("index.html").unwrap();
        let err = editor
            .apply(&p, &Mutation::SetText { text: "Ship faster".into() })
            .unwrap_err();
        assert!(matches!(err, EditError::InvalidOperation(_)));
        assert_eq!(editor.store().read("index.html").unwrap(), page);
        assert_eq!(editor.history().current_version(), 1);
    }

    #[test]
    fn test_rollback_keeps_current_version() {
        let editor = editor();
        let h1 = id_of(&editor, "h1");
        for text in ["One", "Two"] {
            editor
                .apply(&h1, &Mutation::SetText { text: text.into() })
                .unwrap();
        }

        let report = editor.rollback(0).unwrap();
        assert_eq!(report.target, 0);
        assert_eq!(report.current_version, 2);
        assert_eq!(report.reverted, vec![2, 1]);
        assert_eq!(report.documents, vec!["index.html"]);
        assert_eq!(editor.current_value(&h1).unwrap(), "Welcome");
        assert_eq!(editor.history().current_version(), 2);
    }

    #[test]
    fn test_style_edit_targets_stylesheet() {
        let editor = editor();
        let nav = id_of(&editor, "nav");
        let edit = editor
            .apply(
                &nav,
                &Mutation::SetStyleProperty {
                    property: "color".into(),
                    value: "navy".into(),
                },
            )
            .unwrap();
        assert_eq!(edit.document, "styles/main.css");
        assert_eq!(edit.before, None);

        let css = editor.store().read("styles/main.css").unwrap();
        assert!(css.contains(&format!("{} {{\n  /* Editable element */\n  color: navy;\n}}", selector_for(&nav))));

        editor.rollback(0).unwrap();
        let restored = editor.store().read("styles/main.css").unwrap();
        assert!(!restored.contains("color: navy"));
    }

    #[test]
    fn test_rejects_incompatible_edit() {
        let editor = editor();
        let h1 = id_of(&editor, "h1");
        let err = editor
            .apply(
                &h1,
                &Mutation::SetStyleProperty {
                    property: "color".into(),
                    value: "red".into(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, EditError::InvalidOperation(_)));
        assert!(editor.history().is_empty());
    }

    struct Canned(String);

    impl EditPlanner for Canned {
        fn plan(&self, request: &PlannerRequest) -> EditResult<String> {
            assert_eq!(request.current_value, "Intro");
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_plan_and_apply() {
        let editor = editor();
        let p = id_of(&editor, "p");
        let planner = Canned(format!(
            r#"{{"componentId":"{}","action":{{"operation":"addClass","className":"big"}},"justification":"emphasis"}}"#,
            p
        ));

        let edit = editor.plan_and_apply(&planner, &p, "make it bigger").unwrap();
        assert_eq!(edit.before.as_deref(), Some("lead"));
        assert_eq!(edit.after.as_deref(), Some("lead big"));
    }

    #[test]
    fn test_add_and_remove_page() {
        let editor = editor();
        let added = editor
            .add_page("pricing.html", "Pricing", Some("<h1>Pricing</h1>"))
            .unwrap();
        assert_eq!(added.updated, vec!["index.html"]);
        assert_eq!(added.injected, 1);

        let index = editor.store().read("index.html").unwrap();
        assert!(index.contains("<a href=\"pricing.html\""));
        assert!(editor.store().read("pricing.html").unwrap().contains("data-ncd-id"));

        let removed = editor.remove_page("pricing.html").unwrap();
        assert!(removed.removed);
        assert_eq!(removed.updated, vec!["index.html"]);
        assert!(!editor.store().read("index.html").unwrap().contains("pricing.html"));
    }
}
