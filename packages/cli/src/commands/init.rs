use anyhow::Result;
use clap::Args;
use colored::Colorize;
use ncd_editor::{EditorConfig, NavPolicy, DEFAULT_CONFIG_NAME};
use std::fs;
use std::path::Path;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Stylesheet that scoped style edits target
    #[arg(short, long, default_value = "styles/main.css")]
    pub stylesheet: String,

    /// Key for namespaced identifiers (ncd-1a2b3c4d-0001)
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Abort page propagation when a page has no navigation
    #[arg(long)]
    pub strict_navigation: bool,

    /// Force overwrite existing config
    #[arg(short, long)]
    pub force: bool,
}

pub fn init(args: InitArgs, root: &Path) -> Result<()> {
    let config_path = root.join(DEFAULT_CONFIG_NAME);

    // Check if config already exists
    if config_path.exists() && !args.force {
        println!(
            "{} {} already exists",
            "⚠️".yellow(),
            DEFAULT_CONFIG_NAME.bright_white()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    let config = EditorConfig {
        stylesheet: args.stylesheet,
        id_namespace: args.namespace,
        navigation_policy: if args.strict_navigation {
            NavPolicy::Fail
        } else {
            NavPolicy::Skip
        },
        ..EditorConfig::default()
    };

    fs::create_dir_all(root)?;
    let config_json = serde_json::to_string_pretty(&config)?;
    fs::write(&config_path, config_json)?;

    println!("  {} Created {}", "✓".green(), DEFAULT_CONFIG_NAME);
    println!();
    println!("Next steps:");
    println!("  1. Generate your pages into {}", root.display());
    println!("  2. Run: ncd inject");
    println!("  3. Edit with: ncd edit <id> set-text \"...\"");

    Ok(())
}
