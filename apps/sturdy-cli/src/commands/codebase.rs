// codebase.rs — `sturdy codebase …`

use clap::Subcommand;
use uuid::Uuid;

use super::App;

#[derive(Subcommand)]
pub enum CodebaseCommands {
    /// Create a codebase (record and trunk repository).
    Create {
        /// Display name.
        name: String,
        /// Make the codebase public.
        #[arg(long)]
        public: bool,
    },
    /// Show the landed changes on trunk, newest first.
    Log {
        id: Uuid,
        #[arg(long, default_value_t = 25)]
        limit: usize,
    },
}

pub fn run(app: &App, command: CodebaseCommands) -> anyhow::Result<()> {
    match command {
        CodebaseCommands::Create { name, public } => {
            let codebase = app.codebases.create(name, public)?;
            println!("{}  {}  {}", codebase.id, codebase.short_id, codebase.name);
        }
        CodebaseCommands::Log { id, limit } => {
            for entry in app.codebases.list_changes(&app.ctx, id, limit)? {
                println!(
                    "{}  {}  ({})",
                    &entry.commit_sha[..8.min(entry.commit_sha.len())],
                    entry.message,
                    entry.author_name
                );
            }
        }
    }
    Ok(())
}
