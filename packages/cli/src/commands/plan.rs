use super::{open_site, print_applied};
use anyhow::{Context, Result};
use clap::Args;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Planner JSON; read from --file or stdin when omitted
    pub json: Option<String>,

    /// File holding the planner JSON
    #[arg(short, long, conflicts_with = "json")]
    pub file: Option<PathBuf>,
}

pub fn plan(args: PlanArgs, root: &Path) -> Result<()> {
    let raw = match (args.json, args.file) {
        (Some(json), _) => json,
        (None, Some(file)) => std::fs::read_to_string(&file)
            .with_context(|| format!("Failed to read {}", file.display()))?,
        (None, None) => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read planner output from stdin")?;
            input
        }
    };

    let site = open_site(root)?;
    let applied = site.apply_plan(&raw)?;
    print_applied(&applied);
    Ok(())
}
