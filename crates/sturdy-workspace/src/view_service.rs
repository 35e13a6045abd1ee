// view_service.rs — Opening workspaces on views.
//
// Checkout order matters: the draft's latest snapshot is restored first,
// then rebased onto the current trunk tip. A clean rebase re-snapshots the
// rebased state (the chain restarts on top of new trunk); a conflicted one
// leaves the view mid-rebase with conflict markers — the view owns those
// conflicts, and no other workspace can open on it until they are resolved
// or the rebase is aborted.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use sturdy_events::{Event, EventBus, EventKind, Topic};
use sturdy_snapshots::{Action, SnapshotOptions, SnapshotStore, Snapshotter};
use sturdy_vcs::{
    CommitAuthor, ExecutorProvider, OperationContext, RebaseOutcome, ORIGIN_TRUNK_REF, TRUNK_REF,
};

use crate::error::WorkspaceError;
use crate::view::{View, ViewStore};
use crate::workspace::{Workspace, WorkspaceStore};

pub struct ViewService {
    view_store: Arc<ViewStore>,
    workspace_store: Arc<WorkspaceStore>,
    snapshot_store: Arc<SnapshotStore>,
    snapshotter: Arc<Snapshotter>,
    executors: Arc<ExecutorProvider>,
    bus: EventBus,
}

impl ViewService {
    pub fn new(
        view_store: Arc<ViewStore>,
        workspace_store: Arc<WorkspaceStore>,
        snapshot_store: Arc<SnapshotStore>,
        snapshotter: Arc<Snapshotter>,
        executors: Arc<ExecutorProvider>,
        bus: EventBus,
    ) -> Self {
        Self {
            view_store,
            workspace_store,
            snapshot_store,
            snapshotter,
            executors,
            bus,
        }
    }

    /// Create a view (record + working copy cloned from trunk) and open
    /// the workspace on it.
    pub fn create(
        &self,
        ctx: &OperationContext,
        codebase_id: Uuid,
        user_id: Uuid,
        workspace_id: Uuid,
    ) -> Result<View, WorkspaceError> {
        let workspace = self.workspace_store.get(workspace_id)?;
        if workspace.codebase_id != codebase_id {
            return Err(WorkspaceError::InvalidInput(
                "workspace belongs to a different codebase".to_string(),
            ));
        }

        let view = View::new(codebase_id, user_id);
        self.executors
            .repo_provider()
            .create_view_clone(&codebase_id.to_string(), &view.id.to_string())?;
        self.view_store.save(&view)?;

        self.open_workspace(ctx, view.id, workspace_id)?;
        self.view_store.get(view.id)
    }

    /// Open a workspace on an existing view, checking its latest snapshot
    /// out and rebasing it onto current trunk. Returns
    /// [`WorkspaceError::Rebasing`] when the rebase hits conflicts.
    pub fn open_workspace(
        &self,
        ctx: &OperationContext,
        view_id: Uuid,
        workspace_id: Uuid,
    ) -> Result<(), WorkspaceError> {
        let mut view = self.view_store.get(view_id)?;
        let workspace = self.workspace_store.get(workspace_id)?;

        if workspace.is_archived() {
            return Err(WorkspaceError::Archived(workspace.id));
        }
        if workspace.user_id != view.user_id {
            return Err(WorkspaceError::InvalidInput(
                "only the workspace owner can open it on a view; start a suggestion instead"
                    .to_string(),
            ));
        }
        if workspace.view_id == Some(view.id) {
            return Ok(());
        }
        if workspace.view_id.is_some() {
            return Err(WorkspaceError::Conflict(
                "workspace is already open on another view".to_string(),
            ));
        }

        // The workspace previously on this view gets a final snapshot and
        // is detached.
        let old_workspace: Option<Workspace> = match view.workspace_id {
            Some(old_id) if old_id != workspace.id => self
                .workspace_store
                .get(old_id)
                .ok()
                .filter(|old| !old.is_archived()),
            _ => None,
        };

        let snapshot = match workspace.latest_snapshot_id {
            Some(id) => Some(self.snapshot_store.get(id)?),
            None => None,
        };

        let mut conflicted = false;
        self.executors
            .executor::<WorkspaceError>()
            .write(|repo| {
                repo.fetch_ref(&format!("+{TRUNK_REF}:{ORIGIN_TRUNK_REF}"))?;
                let trunk_tip = repo.resolve(ORIGIN_TRUNK_REF)?;

                if let Some(old) = &old_workspace {
                    self.snapshotter.snapshot_on_repo(
                        old.codebase_id,
                        old.id,
                        Action::ViewSync,
                        repo,
                        SnapshotOptions::mark_as_latest(),
                    )?;
                }

                let Some(snapshot) = &snapshot else {
                    repo.checkout_branch(&workspace.id.to_string(), &trunk_tip)?;
                    repo.clean_untracked()?;
                    return Ok(());
                };

                self.snapshotter.checkout_snapshot(snapshot, repo)?;

                let base = repo.merge_base(&trunk_tip, &snapshot.commit_sha)?;
                if base == trunk_tip {
                    return Ok(());
                }

                // Trunk moved since the draft forked. Squash the draft to a
                // single commit on its base and replay that onto the tip.
                let tree = repo.tree_of_commit(&snapshot.commit_sha)?;
                let squashed = repo.commit_tree(
                    &tree,
                    &[&base],
                    "sturdy: rebase",
                    &CommitAuthor::snapshotter(),
                )?;
                repo.checkout_branch(&workspace.id.to_string(), &squashed)?;

                match repo.rebase_onto(&trunk_tip, &base)? {
                    RebaseOutcome::Completed => {
                        let head = repo.resolve("HEAD")?;
                        self.snapshotter.snapshot_on_repo(
                            workspace.codebase_id,
                            workspace.id,
                            Action::ViewSync,
                            repo,
                            SnapshotOptions::mark_as_latest().with_parent_commit(head),
                        )?;
                    }
                    RebaseOutcome::Conflicted => {
                        conflicted = true;
                    }
                }
                Ok(())
            })
            .exec_view(
                ctx,
                &workspace.codebase_id.to_string(),
                &view.id.to_string(),
                "openWorkspaceOnView",
            )?;

        // Git state is in place; update the records.
        if let Some(mut old) = old_workspace {
            old.view_id = None;
            old.touch();
            self.workspace_store.save(&old)?;
        }

        let mut workspace = self.workspace_store.get(workspace_id)?;
        workspace.view_id = Some(view.id);
        workspace.touch();
        self.workspace_store.save(&workspace)?;

        view.workspace_id = Some(workspace.id);
        view.last_used_at = Some(Utc::now());
        self.view_store.save(&view)?;

        self.bus.publish(
            Topic::View(view.id),
            Event::new(EventKind::ViewUpdated, view.id.to_string()),
        );

        if conflicted {
            self.bus.publish(
                Topic::View(view.id),
                Event::new(EventKind::ViewStatusUpdated, view.id.to_string()),
            );
            tracing::warn!(
                view_id = %view.id,
                workspace_id = %workspace.id,
                "workspace checkout left the view rebasing"
            );
            return Err(WorkspaceError::Rebasing);
        }
        Ok(())
    }

    /// Whether the view sits mid-rebase with unresolved conflicts.
    pub fn is_rebasing(&self, ctx: &OperationContext, view: &View) -> Result<bool, WorkspaceError> {
        let mut rebasing = false;
        self.executors
            .executor::<WorkspaceError>()
            .allow_rebasing()
            .read(|repo| {
                rebasing = repo.rebase_in_progress();
                Ok(())
            })
            .exec_view(
                ctx,
                &view.codebase_id.to_string(),
                &view.id.to_string(),
                "isRebasing",
            )?;
        Ok(rebasing)
    }

    /// Give up on a conflicted rebase, returning the view to the draft
    /// state it had before the checkout attempted to rebase.
    pub fn abort_rebase(&self, ctx: &OperationContext, view_id: Uuid) -> Result<(), WorkspaceError> {
        let view = self.view_store.get(view_id)?;
        self.executors
            .executor::<WorkspaceError>()
            .allow_rebasing()
            .write(|repo| {
                if repo.rebase_in_progress() {
                    repo.rebase_abort()?;
                }
                Ok(())
            })
            .exec_view(
                ctx,
                &view.codebase_id.to_string(),
                &view.id.to_string(),
                "abortRebase",
            )?;

        self.bus.publish(
            Topic::View(view.id),
            Event::new(EventKind::ViewStatusUpdated, view.id.to_string()),
        );
        Ok(())
    }
}
