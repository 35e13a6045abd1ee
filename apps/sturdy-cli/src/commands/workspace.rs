// workspace.rs — `sturdy workspace …`

use clap::Subcommand;
use uuid::Uuid;

use sturdy_snapshots::Action;

use super::App;

#[derive(Subcommand)]
pub enum WorkspaceCommands {
    /// Create a draft workspace.
    Create {
        #[arg(long)]
        codebase: Uuid,
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        name: Option<String>,
    },
    /// Snapshot the workspace's view right now.
    Snapshot { id: Uuid },
    /// Show the workspace's diff against trunk.
    Diff { id: Uuid },
    /// Set the draft description (the future commit message).
    Describe {
        id: Uuid,
        message: String,
    },
    /// Land the draft as a change on trunk.
    Land { id: Uuid },
    /// Detach the workspace from its view.
    Close { id: Uuid },
    Archive { id: Uuid },
    Unarchive { id: Uuid },
    /// Show the workspace record.
    Status { id: Uuid },
}

pub fn run(app: &App, command: WorkspaceCommands) -> anyhow::Result<()> {
    match command {
        WorkspaceCommands::Create {
            codebase,
            user,
            name,
        } => {
            let workspace = app.workspaces.create(codebase, user, name)?;
            println!("{}", workspace.id);
        }
        WorkspaceCommands::Snapshot { id } => {
            let workspace = app.workspaces.get(id)?;
            let view_id = workspace
                .view_id
                .ok_or_else(|| anyhow::anyhow!("workspace {id} is not open on a view"))?;
            let snapshot = app.snapshotter.snapshot(
                &app.ctx,
                workspace.codebase_id,
                workspace.id,
                &view_id.to_string(),
                Action::Snapshot,
            )?;
            println!("{}  {}", snapshot.id, snapshot.commit_sha);
        }
        WorkspaceCommands::Diff { id } => {
            let workspace = app.workspaces.get(id)?;
            for file_diff in app.workspaces.diffs(&app.ctx, &workspace)? {
                println!("{} ({} hunks)", file_diff.preferred_name, file_diff.hunks.len());
                for hunk in &file_diff.hunks {
                    println!("  {}", hunk.id);
                }
            }
        }
        WorkspaceCommands::Describe { id, message } => {
            app.workspaces.update_draft_description(id, message)?;
        }
        WorkspaceCommands::Land { id } => {
            let (workspace, change) = app.workspaces.land(&app.ctx, id)?;
            println!(
                "landed {} as change {} ({})",
                workspace.id, change.id, change.commit_sha
            );
        }
        WorkspaceCommands::Close { id } => {
            app.workspaces.close_view(&app.ctx, id)?;
            println!("closed {id}");
        }
        WorkspaceCommands::Archive { id } => {
            app.workspaces.archive(id)?;
        }
        WorkspaceCommands::Unarchive { id } => {
            app.workspaces.unarchive(id)?;
        }
        WorkspaceCommands::Status { id } => {
            let workspace = app.workspaces.get(id)?;
            let up_to_date = app.workspaces.up_to_date_with_trunk(&app.ctx, id)?;
            println!("workspace: {}", workspace.id);
            if let Some(name) = &workspace.name {
                println!("name: {name}");
            }
            match workspace.view_id {
                Some(view_id) => println!("view: {view_id}"),
                None => println!("view: none (snapshot-only)"),
            }
            match workspace.latest_snapshot_id {
                Some(snapshot_id) => {
                    let snapshot = app.snapshot_store.get(snapshot_id)?;
                    println!("latest snapshot: {snapshot_id} ({})", snapshot.commit_sha);
                }
                None => println!("latest snapshot: none"),
            }
            println!("diffs: {}", workspace.diffs_count.unwrap_or(0));
            println!("up to date with trunk: {up_to_date}");
            println!("archived: {}", workspace.is_archived());
        }
    }
    Ok(())
}
