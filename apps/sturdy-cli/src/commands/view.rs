// view.rs — `sturdy view …`

use clap::Subcommand;
use uuid::Uuid;

use super::App;

#[derive(Subcommand)]
pub enum ViewCommands {
    /// Create a view for a workspace and check it out.
    Create {
        #[arg(long)]
        codebase: Uuid,
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        workspace: Uuid,
    },
    /// Open a workspace on an existing view.
    Open {
        #[arg(long)]
        view: Uuid,
        #[arg(long)]
        workspace: Uuid,
    },
    /// Abort an unresolved rebase on a view.
    AbortRebase { view: Uuid },
    /// Show a view's status.
    Status { view: Uuid },
}

pub fn run(app: &App, command: ViewCommands) -> anyhow::Result<()> {
    match command {
        ViewCommands::Create {
            codebase,
            user,
            workspace,
        } => {
            let view = app.views.create(&app.ctx, codebase, user, workspace)?;
            println!("{}", view.id);
        }
        ViewCommands::Open { view, workspace } => {
            app.views.open_workspace(&app.ctx, view, workspace)?;
            println!("opened {workspace} on {view}");
        }
        ViewCommands::AbortRebase { view } => {
            app.views.abort_rebase(&app.ctx, view)?;
            println!("aborted rebase on {view}");
        }
        ViewCommands::Status { view } => {
            let record = app.view_store.get(view)?;
            let rebasing = app.views.is_rebasing(&app.ctx, &record)?;
            match record.workspace_id {
                Some(workspace_id) => println!("workspace: {workspace_id}"),
                None => println!("workspace: none"),
            }
            println!("rebasing: {rebasing}");
        }
    }
    Ok(())
}
