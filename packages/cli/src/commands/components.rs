use super::open_site;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::Path;

#[derive(Args, Debug)]
pub struct ComponentsArgs {
    /// Only components in this document
    #[arg(long)]
    pub document: Option<String>,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

pub fn components(args: ComponentsArgs, root: &Path) -> Result<()> {
    let site = open_site(root)?;
    let records = site.components(args.document.as_deref());

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("{} No components registered. Run: ncd inject", "⚠️".yellow());
        return Ok(());
    }

    for record in &records {
        println!(
            "{}  {:<8} {:<10} {}",
            record.id.bright_white(),
            record.edit_kind.to_string().cyan(),
            record.tag().unwrap_or(record.element_kind.as_str()),
            record.document.dimmed()
        );
    }
    println!();
    println!("   Total: {}", records.len());

    Ok(())
}
