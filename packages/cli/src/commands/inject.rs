use super::open_site;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use ncd_editor::ContentStore;
use std::path::Path;

#[derive(Args, Debug)]
pub struct InjectArgs {
    /// List every page, including unchanged ones
    #[arg(short, long)]
    pub all: bool,
}

pub fn inject(args: InjectArgs, root: &Path) -> Result<()> {
    println!("🔖 {} identifiers", "Injecting".green().bold());
    println!("   Site: {}", root.display());
    println!();

    let site = open_site(root)?;
    let pages = site.store().list_pages()?;
    if pages.is_empty() {
        println!("   {} No pages found", "⚠️".yellow());
        return Ok(());
    }

    let report = site.inject_site()?;
    for page in &pages {
        if report.documents.contains(page) {
            println!("   {} {}", "✓".green(), page);
        } else if args.all {
            println!("   {} {}", "•".dimmed(), page.dimmed());
        }
    }

    println!();
    println!("✨ {} Injection complete!", "Done".green().bold());
    println!("   Pages scanned: {}", pages.len());
    println!("   New identifiers: {}", report.injected);
    println!("   Existing identifiers: {}", report.existing);
    if report.stylesheet_updated {
        println!("   Stylesheet: {}", site.config().stylesheet);
    }

    Ok(())
}
