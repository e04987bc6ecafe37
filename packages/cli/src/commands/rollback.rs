use super::open_site;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::Path;

#[derive(Args, Debug)]
pub struct RollbackArgs {
    /// Version to return to (0 undoes everything)
    #[arg(allow_negative_numbers = true)]
    pub version: i64,
}

pub fn rollback(args: RollbackArgs, root: &Path) -> Result<()> {
    let site = open_site(root)?;
    let report = site.rollback(args.version)?;

    if report.reverted.is_empty() {
        println!("{} Already at v{}", "•".yellow(), report.target);
        return Ok(());
    }

    for version in &report.reverted {
        println!("   {} reverted v{}", "✓".green(), version);
    }
    println!();
    println!(
        "✨ {} Rolled back to v{}",
        "Done".green().bold(),
        report.target
    );
    println!("   Documents: {}", report.documents.join(", "));
    println!("   History kept through v{}", report.current_version);

    Ok(())
}
