// suggestion.rs — `sturdy suggestion …`

use clap::Subcommand;
use uuid::Uuid;

use super::App;

#[derive(Subcommand)]
pub enum SuggestionCommands {
    /// Fork a workspace into a suggestion.
    Create {
        /// The suggesting user.
        #[arg(long)]
        user: Uuid,
        /// The workspace the suggestion targets.
        #[arg(long)]
        workspace: Uuid,
    },
    /// List open suggestions for a workspace.
    List { workspace: Uuid },
    /// Show a suggestion's hunks with their ledger state.
    Diff { id: Uuid },
    /// Apply selected hunks to the target workspace.
    Apply {
        id: Uuid,
        /// Hunk ids, as printed by `suggestion diff`.
        hunks: Vec<String>,
    },
    /// Dismiss selected hunks (ledger only).
    DismissHunks {
        id: Uuid,
        hunks: Vec<String>,
    },
    /// Dismiss the whole suggestion.
    Dismiss { id: Uuid },
}

pub fn run(app: &App, command: SuggestionCommands) -> anyhow::Result<()> {
    match command {
        SuggestionCommands::Create { user, workspace } => {
            let suggestion = app.suggestions.create(&app.ctx, user, workspace)?;
            println!("{}", suggestion.id);
        }
        SuggestionCommands::List { workspace } => {
            for suggestion in app.suggestions.list_for_workspace(workspace)? {
                println!(
                    "{}  by {}  ({} applied, {} dismissed)",
                    suggestion.id,
                    suggestion.user_id,
                    suggestion.applied_hunks.len(),
                    suggestion.dismissed_hunks.len()
                );
            }
        }
        SuggestionCommands::Diff { id } => {
            let suggestion = app.suggestions.get(id)?;
            for file_diff in app.suggestions.diffs(&app.ctx, &suggestion)? {
                println!("{}", file_diff.preferred_name);
                for hunk in &file_diff.hunks {
                    let mut state = Vec::new();
                    if hunk.is_applied {
                        state.push("applied");
                    }
                    if hunk.is_dismissed {
                        state.push("dismissed");
                    }
                    if hunk.is_outdated {
                        state.push("outdated");
                    }
                    println!("  {}  {}", hunk.id, state.join(","));
                }
            }
        }
        SuggestionCommands::Apply { id, hunks } => {
            app.suggestions.apply_hunks(&app.ctx, id, &hunks)?;
            println!("applied {} hunk(s)", hunks.len());
        }
        SuggestionCommands::DismissHunks { id, hunks } => {
            app.suggestions.dismiss_hunks(&app.ctx, id, &hunks)?;
        }
        SuggestionCommands::Dismiss { id } => {
            app.suggestions.dismiss(id)?;
        }
    }
    Ok(())
}
