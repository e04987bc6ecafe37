use super::open_site;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::Path;

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Number of diffs to show (defaults to historyLimit)
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

pub fn history(args: HistoryArgs, root: &Path) -> Result<()> {
    let site = open_site(root)?;
    let diffs = site.recent_history(args.limit);

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&diffs)?);
        return Ok(());
    }

    if diffs.is_empty() {
        println!("{} No edits recorded yet", "•".dimmed());
        return Ok(());
    }

    for diff in &diffs {
        let target = diff
            .target
            .as_deref()
            .map(|t| format!(" {}", t))
            .unwrap_or_default();
        println!(
            "{} {} {}{} {}",
            format!("v{:<4}", diff.version).bright_white(),
            diff.component_id.cyan(),
            diff.edit_kind,
            target,
            diff.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().dimmed()
        );
        println!(
            "      {} → {}",
            diff.before.as_deref().unwrap_or("<none>").dimmed(),
            diff.after.as_deref().unwrap_or("<none>")
        );
    }
    println!();
    println!("   Current version: {}", site.history().current_version());

    Ok(())
}
