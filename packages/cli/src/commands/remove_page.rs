use super::open_site;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::Path;

#[derive(Args, Debug)]
pub struct RemovePageArgs {
    /// Page filename relative to the site root
    pub filename: String,
}

pub fn remove_page(args: RemovePageArgs, root: &Path) -> Result<()> {
    let site = open_site(root)?;
    let removal = site.remove_page(&args.filename)?;

    if removal.removed {
        println!("   {} deleted {}", "✓".green(), removal.filename);
    } else {
        println!("   {} {} did not exist", "•".yellow(), removal.filename);
    }
    for page in &removal.updated {
        println!("   {} unlinked from {}", "✓".green(), page);
    }

    Ok(())
}
