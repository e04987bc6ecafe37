//! # NCD Editor
//!
//! Identifier-addressed editing of generated static sites.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ parser: HTML/CSS text → span arena          │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor                                      │
//! │  - injector: stamp editable elements        │
//! │  - registry: id → document/kind/selector    │
//! │  - mutations: pure splice-based edits       │
//! │  - history: versioned diffs + rollback plan │
//! │  - nav: link new pages into navigation      │
//! │  - planner: untrusted edit requests         │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ site: lock → read → edit → write → record   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Identifiers are the only address**: callers never pass selectors or
//!    paths into the markup, only a registered `data-ncd-id`
//! 2. **Lossless edits**: every byte outside the edited range survives
//! 3. **History is append-only**: rollback replays inverses, it never
//!    rewrites the log
//! 4. **Planner output is data**: a closed union, validated before use
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ncd_editor::{Mutation, SiteEditor};
//!
//! let site = SiteEditor::open("./site")?;
//! site.inject_site()?;
//!
//! let edit = site.apply("ncd-0007", &Mutation::SetText { text: "Hello World".into() })?;
//! assert_eq!(edit.version, Some(1));
//!
//! site.rollback(0)?;
//! ```

mod component;
mod config;
mod errors;
mod history;
mod injector;
pub mod mutations;
mod nav;
mod planner;
mod registry;
mod site;
mod store;

pub use component::{
    is_identity_attribute, selector_for, ComponentRecord, EditKind, ElementKind, FILE_ATTR,
    ID_ATTR, TYPE_ATTR,
};
pub use config::{EditorConfig, NavPolicy, DEFAULT_CONFIG_NAME};
pub use errors::{EditError, EditResult};
pub use history::{DiffDraft, DiffKind, DiffRecord, EditHistory, HistoryStorage};
pub use injector::{existing_ids, inject, inject_site, scoped_stylesheet, InjectedDocument};
pub use mutations::{Mutation, MutationOutcome, Reversal};
pub use nav::{
    find_nav_container, href_targets, propagate_new_page, relative_href, remove_page_link,
    resolve_href, NewPage, Propagation, PropagationReport,
};
pub use planner::{
    check_mutation, is_compatible, parse_plan, validate_plan, EditPlanner, PlannedEdit,
    PlannerRequest,
};
pub use registry::{ComponentRegistry, RegistryStorage};
pub use site::{AppliedEdit, InjectionReport, PageAddition, PageRemoval, RollbackReport, SiteEditor};
pub use store::{is_page, ContentStore, DirectoryStore, MemoryStore};

// Re-export common parser types for convenience
pub use ncd_parser::IdGenerator;
