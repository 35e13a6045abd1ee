//! # sturdy-cli
//!
//! Operator CLI for Sturdy repositories.
//!
//! Drives the same services the API server uses, against the repositories
//! and JSON stores configured in `sturdy.toml`:
//! - `sturdy codebase create/log` — codebases and trunk history
//! - `sturdy user create` — identities
//! - `sturdy workspace …` — drafts: snapshot, diff, describe, land
//! - `sturdy view …` — working copies, including rebase recovery
//! - `sturdy suggestion …` — hunk-level review between peers

mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::SturdyConfig;

/// Sturdy — collaborative version control.
#[derive(Parser)]
#[command(name = "sturdy", version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "sturdy.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage codebases.
    Codebase {
        #[command(subcommand)]
        command: commands::codebase::CodebaseCommands,
    },
    /// Manage users.
    User {
        #[command(subcommand)]
        command: commands::user::UserCommands,
    },
    /// Manage draft workspaces.
    Workspace {
        #[command(subcommand)]
        command: commands::workspace::WorkspaceCommands,
    },
    /// Manage views (working copies).
    View {
        #[command(subcommand)]
        command: commands::view::ViewCommands,
    },
    /// Manage suggestions.
    Suggestion {
        #[command(subcommand)]
        command: commands::suggestion::SuggestionCommands,
    },
}

fn main() -> Result<()> {
    // Logs go to stderr so command output stays scriptable.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let config = SturdyConfig::load_or_default(&cli.config);
    let app = commands::App::build(&config)?;

    match cli.command {
        Commands::Codebase { command } => commands::codebase::run(&app, command),
        Commands::User { command } => commands::user::run(&app, command),
        Commands::Workspace { command } => commands::workspace::run(&app, command),
        Commands::View { command } => commands::view::run(&app, command),
        Commands::Suggestion { command } => commands::suggestion::run(&app, command),
    }
}
