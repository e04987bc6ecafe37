mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{
    add_page, components, edit, history, init, inject, plan, remove_page, rollback, AddPageArgs,
    ComponentsArgs, EditArgs, HistoryArgs, InitArgs, InjectArgs, PlanArgs, RemovePageArgs,
    RollbackArgs,
};
use std::path::PathBuf;

/// NCD - identifier-addressed editing for generated sites
#[derive(Parser, Debug)]
#[command(name = "ncd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Site root directory
    #[arg(short, long, global = true, default_value = ".")]
    dir: PathBuf,

    /// Log edits and resolution details
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default ncd.config.json
    Init(InitArgs),

    /// Stamp identifiers on every page and register them
    Inject(InjectArgs),

    /// List registered components
    Components(ComponentsArgs),

    /// Apply one edit to a component
    Edit(EditArgs),

    /// Validate and apply raw planner output
    Plan(PlanArgs),

    /// Show recent diffs
    History(HistoryArgs),

    /// Undo every diff newer than a version
    Rollback(RollbackArgs),

    /// Add a page and link it from every navigation
    AddPage(AddPageArgs),

    /// Delete a page and the links pointing at it
    RemovePage(RemovePageArgs),
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let root = match std::env::current_dir() {
        Ok(cwd) => cwd.join(&cli.dir),
        Err(_) => cli.dir.clone(),
    };

    let result = match cli.command {
        Command::Init(args) => init(args, &root),
        Command::Inject(args) => inject(args, &root),
        Command::Components(args) => components(args, &root),
        Command::Edit(args) => edit(args, &root),
        Command::Plan(args) => plan(args, &root),
        Command::History(args) => history(args, &root),
        Command::Rollback(args) => rollback(args, &root),
        Command::AddPage(args) => add_page(args, &root),
        Command::RemovePage(args) => remove_page(args, &root),
    };

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_edit_command() {
        let cli = Cli::parse_from([
            "ncd", "--dir", "site", "edit", "ncd-0007", "set-text", "Hello World",
        ]);
        assert_eq!(cli.dir, PathBuf::from("site"));
        assert!(matches!(cli.command, Command::Edit(_)));
    }
}
