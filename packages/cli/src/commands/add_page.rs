use super::open_site;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct AddPageArgs {
    /// Page filename relative to the site root
    pub filename: String,

    /// Navigation link text
    pub label: String,

    /// Markup for the new page (it is written and injected)
    #[arg(long)]
    pub from: Option<PathBuf>,
}

pub fn add_page(args: AddPageArgs, root: &Path) -> Result<()> {
    let content = match &args.from {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?,
        ),
        None => None,
    };

    let site = open_site(root)?;
    let added = site.add_page(&args.filename, &args.label, content.as_deref())?;

    if added.injected > 0 {
        println!(
            "   {} {} ({} identifiers)",
            "✓".green(),
            added.filename,
            added.injected
        );
    }
    for page in &added.updated {
        println!("   {} linked from {}", "✓".green(), page);
    }
    for page in &added.already_linked {
        println!("   {} {} already links here", "•".dimmed(), page.dimmed());
    }
    for page in &added.skipped {
        println!("   {} {} has no navigation", "⚠️".yellow(), page);
    }

    println!();
    println!(
        "✨ {} Updated {} page(s)",
        "Done".green().bold(),
        added.updated_count()
    );
    Ok(())
}
