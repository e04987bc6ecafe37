pub mod add_page;
pub mod components;
pub mod edit;
pub mod history;
pub mod init;
pub mod inject;
pub mod plan;
pub mod remove_page;
pub mod rollback;

pub use add_page::{add_page, AddPageArgs};
pub use components::{components, ComponentsArgs};
pub use edit::{edit, EditArgs};
pub use history::{history, HistoryArgs};
pub use init::{init, InitArgs};
pub use inject::{inject, InjectArgs};
pub use plan::{plan, PlanArgs};
pub use remove_page::{remove_page, RemovePageArgs};
pub use rollback::{rollback, RollbackArgs};

use anyhow::{Context, Result};
use colored::Colorize;
use ncd_editor::{AppliedEdit, SiteEditor};
use std::path::Path;

pub(crate) fn open_site(root: &Path) -> Result<SiteEditor> {
    SiteEditor::open(root).with_context(|| format!("Failed to open site at {}", root.display()))
}

pub(crate) fn print_applied(edit: &AppliedEdit) {
    match edit.version {
        Some(version) => println!(
            "{} {} in {} {}",
            "✓".green(),
            edit.component_id.bright_white(),
            edit.document,
            format!("(v{})", version).dimmed()
        ),
        None => println!(
            "{} {} already up to date",
            "•".yellow(),
            edit.component_id.bright_white()
        ),
    }
    println!(
        "   before: {}",
        edit.before.as_deref().unwrap_or("<none>").dimmed()
    );
    println!("   after:  {}", edit.after.as_deref().unwrap_or("<none>"));
}
