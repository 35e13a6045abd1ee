// service.rs — WorkspaceService: the draft-change lifecycle.
//
// All repository mutations go through the executor; the workspace record is
// only updated after the git operation has committed, so a failed git op
// never produces a half-updated record. Reads reconcile the record against
// the snapshot store, healing a crash between "snapshot persisted" and
// "workspace updated".

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use sturdy_diff::{FileDiff, Unidiff};
use sturdy_events::{Event, EventBus, EventKind, Topic};
use sturdy_snapshots::{Action, SnapshotOptions, SnapshotStore, Snapshotter};
use sturdy_vcs::{CommitAuthor, ExecutorProvider, OperationContext, TRUNK_REF};

use crate::change::{Change, ChangeStore};
use crate::error::WorkspaceError;
use crate::user::UserStore;
use crate::view::ViewStore;
use crate::workspace::{Workspace, WorkspaceStore};

pub struct WorkspaceService {
    store: Arc<WorkspaceStore>,
    view_store: Arc<ViewStore>,
    change_store: Arc<ChangeStore>,
    user_store: Arc<UserStore>,
    snapshot_store: Arc<SnapshotStore>,
    snapshotter: Arc<Snapshotter>,
    executors: Arc<ExecutorProvider>,
    bus: EventBus,
}

impl WorkspaceService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<WorkspaceStore>,
        view_store: Arc<ViewStore>,
        change_store: Arc<ChangeStore>,
        user_store: Arc<UserStore>,
        snapshot_store: Arc<SnapshotStore>,
        snapshotter: Arc<Snapshotter>,
        executors: Arc<ExecutorProvider>,
        bus: EventBus,
    ) -> Self {
        Self {
            store,
            view_store,
            change_store,
            user_store,
            snapshot_store,
            snapshotter,
            executors,
            bus,
        }
    }

    pub fn store(&self) -> &Arc<WorkspaceStore> {
        &self.store
    }

    /// Create a new snapshot-only draft.
    pub fn create(
        &self,
        codebase_id: Uuid,
        user_id: Uuid,
        name: Option<String>,
    ) -> Result<Workspace, WorkspaceError> {
        let workspace = Workspace::new(codebase_id, user_id, name);
        self.store.save(&workspace)?;
        tracing::info!(workspace_id = %workspace.id, %codebase_id, "created workspace");
        Ok(workspace)
    }

    /// Fork a workspace: a fresh draft for `user_id` on the same codebase.
    /// The caller copies patches over when the fork should start from the
    /// source's state.
    pub fn create_from_workspace(
        &self,
        source: &Workspace,
        user_id: Uuid,
        name: Option<String>,
    ) -> Result<Workspace, WorkspaceError> {
        self.create(source.codebase_id, user_id, name)
    }

    /// Read a workspace, promoting the newest snapshot record if the
    /// record lost a race (idempotent reconciliation).
    pub fn get(&self, id: Uuid) -> Result<Workspace, WorkspaceError> {
        let mut workspace = self.store.get(id)?;
        if let Some(newest) = self.snapshot_store.latest_by_workspace(id)? {
            if workspace.latest_snapshot_id != Some(newest.id) {
                workspace.latest_snapshot_id = Some(newest.id);
                workspace.touch();
                self.store.save(&workspace)?;
            }
        }
        Ok(workspace)
    }

    /// The workspace's changes against its trunk base, hunk-expanded.
    pub fn diffs(
        &self,
        ctx: &OperationContext,
        workspace: &Workspace,
    ) -> Result<Vec<FileDiff>, WorkspaceError> {
        self.diffs_inner(ctx, workspace, true)
    }

    fn diffs_inner(
        &self,
        ctx: &OperationContext,
        workspace: &Workspace,
        expanded: bool,
    ) -> Result<Vec<FileDiff>, WorkspaceError> {
        let Some(snapshot_id) = workspace.latest_snapshot_id else {
            return Ok(Vec::new());
        };
        let snapshot = self.snapshot_store.get(snapshot_id)?;

        let mut diffs = Vec::new();
        self.executors
            .executor::<WorkspaceError>()
            .git_read(|repo| {
                let trunk_tip = repo.resolve(TRUNK_REF)?;
                let base = repo.merge_base(&trunk_tip, &snapshot.commit_sha)?;
                let raw = repo.diff_commits(&base, &snapshot.commit_sha)?;
                let mut unidiff = Unidiff::new(raw).with_ignore_binary();
                if expanded {
                    unidiff = unidiff.with_expanded_hunks();
                }
                diffs = unidiff.decorate()?;
                Ok(())
            })
            .exec_trunk(ctx, &workspace.codebase_id.to_string(), "workspaceDiffs")?;
        Ok(diffs)
    }

    /// Raw per-hunk patches of the workspace's current state, un-expanded.
    pub fn patches(
        &self,
        ctx: &OperationContext,
        workspace: &Workspace,
    ) -> Result<Vec<Vec<u8>>, WorkspaceError> {
        let diffs = self.diffs_inner(ctx, workspace, false)?;
        Ok(diffs
            .iter()
            .flat_map(|fd| fd.hunks.iter())
            .map(|hunk| hunk.patch.clone().into_bytes())
            .collect())
    }

    /// Detach the workspace from its view, capturing a final snapshot
    /// first so nothing is lost.
    pub fn close_view(
        &self,
        ctx: &OperationContext,
        workspace_id: Uuid,
    ) -> Result<Workspace, WorkspaceError> {
        let workspace = self.get(workspace_id)?;
        let Some(view_id) = workspace.view_id else {
            return Err(WorkspaceError::InvalidInput(
                "workspace is not open on a view".to_string(),
            ));
        };

        self.snapshotter.snapshot(
            ctx,
            workspace.codebase_id,
            workspace.id,
            &view_id.to_string(),
            Action::ViewSync,
        )?;

        let mut workspace = self.get(workspace_id)?;
        workspace.view_id = None;
        workspace.touch();
        self.store.save(&workspace)?;

        let mut view = self.view_store.get(view_id)?;
        view.workspace_id = None;
        self.view_store.save(&view)?;

        self.bus.publish(
            Topic::View(view_id),
            Event::new(EventKind::ViewUpdated, view_id.to_string()),
        );
        self.bus.publish(
            Topic::Workspace(workspace.id),
            Event::new(EventKind::WorkspaceUpdated, workspace.id.to_string()),
        );
        Ok(workspace)
    }

    /// Apply `src`'s current patches onto `dst`'s latest state, in a
    /// temporary view, and make the result `dst`'s latest snapshot.
    pub fn copy_patches(
        &self,
        ctx: &OperationContext,
        dst: &Workspace,
        src: &Workspace,
    ) -> Result<(), WorkspaceError> {
        if dst.codebase_id != src.codebase_id {
            return Err(WorkspaceError::InvalidInput(
                "workspaces belong to different codebases".to_string(),
            ));
        }
        if dst.is_archived() {
            return Err(WorkspaceError::Archived(dst.id));
        }

        let patches = self.patches(ctx, src)?;
        if patches.is_empty() {
            return Ok(());
        }

        let dst_snapshot = match dst.latest_snapshot_id {
            Some(id) => Some(self.snapshot_store.get(id)?),
            None => None,
        };

        self.executors
            .executor::<WorkspaceError>()
            .write(|repo| {
                if let Some(snapshot) = &dst_snapshot {
                    self.snapshotter.checkout_snapshot(snapshot, repo)?;
                }
                repo.apply_patches_to_workdir(&patches)?;
                self.snapshotter.snapshot_on_repo(
                    dst.codebase_id,
                    dst.id,
                    Action::Snapshot,
                    repo,
                    SnapshotOptions::mark_as_latest(),
                )?;
                Ok(())
            })
            .exec_temporary_view(ctx, &dst.codebase_id.to_string(), "copyPatches")?;
        Ok(())
    }

    /// Land the draft as a change on trunk.
    ///
    /// The landed commit reuses the snapshot's tree, parented on the trunk
    /// tip; the workspace is archived and unbound, and every workspace in
    /// the codebase drops to "up to date with trunk: unknown".
    pub fn land(
        &self,
        ctx: &OperationContext,
        workspace_id: Uuid,
    ) -> Result<(Workspace, Change), WorkspaceError> {
        let workspace = self.get(workspace_id)?;
        if workspace.is_archived() {
            return Err(WorkspaceError::Archived(workspace.id));
        }
        if workspace.draft_description.trim().is_empty() {
            return Err(WorkspaceError::InvalidInput(
                "draft description is empty".to_string(),
            ));
        }

        // Capture the final view state. A rebasing view refuses the
        // snapshot, so a conflicted draft cannot land.
        if let Some(view_id) = workspace.view_id {
            self.snapshotter.snapshot(
                ctx,
                workspace.codebase_id,
                workspace.id,
                &view_id.to_string(),
                Action::Land,
            )?;
        }
        let workspace = self.get(workspace_id)?;

        let Some(snapshot_id) = workspace.latest_snapshot_id else {
            return Err(WorkspaceError::InvalidInput(
                "workspace has no snapshot to land".to_string(),
            ));
        };
        let snapshot = self.snapshot_store.get(snapshot_id)?;

        if self.diffs(ctx, &workspace)?.is_empty() {
            return Err(WorkspaceError::InvalidInput(
                "workspace has no changes against trunk".to_string(),
            ));
        }

        // The landed commit reuses the snapshot's tree, so the draft must
        // sit on the current trunk tip.
        if !self.up_to_date_with_trunk(ctx, workspace_id)? {
            return Err(WorkspaceError::Conflict(
                "workspace is not up to date with trunk; rebase it first".to_string(),
            ));
        }

        let author = match self.user_store.get(workspace.user_id) {
            Ok(user) => CommitAuthor::new(user.name, user.email),
            Err(WorkspaceError::NotFound { .. }) => {
                CommitAuthor::new("Sturdy", "support@getsturdy.com")
            }
            Err(err) => return Err(err),
        };

        let mut landed: Option<(String, String)> = None;
        self.executors
            .executor::<WorkspaceError>()
            .git_write(|repo| {
                let trunk_tip = repo.resolve(TRUNK_REF)?;
                let tree = repo.tree_of_commit(&snapshot.commit_sha)?;
                let commit_sha = repo.commit_tree(
                    &tree,
                    &[&trunk_tip],
                    &workspace.draft_description,
                    &author,
                )?;
                repo.update_ref(TRUNK_REF, &commit_sha)?;
                landed = Some((commit_sha, trunk_tip));
                Ok(())
            })
            .exec_trunk(ctx, &workspace.codebase_id.to_string(), "landChange")?;

        let (commit_sha, parent_sha) = landed.ok_or_else(|| {
            WorkspaceError::InvariantViolated("land step did not run".to_string())
        })?;

        let change = Change::new(
            workspace.codebase_id,
            commit_sha,
            Some(parent_sha),
            workspace.draft_description.clone(),
            author.name.clone(),
        );
        self.change_store.save(&change)?;

        let now = Utc::now();
        let mut workspace = workspace;
        workspace.change_id = Some(change.id);
        workspace.head_change_id = Some(change.id);
        workspace.last_landed_at = Some(now);
        workspace.archived_at = Some(now);
        if let Some(view_id) = workspace.view_id.take() {
            let mut view = self.view_store.get(view_id)?;
            view.workspace_id = None;
            self.view_store.save(&view)?;
        }
        workspace.touch();
        self.store.save(&workspace)?;

        // Trunk moved under everyone.
        self.store
            .unset_up_to_date_with_trunk_for_all_in_codebase(workspace.codebase_id)?;

        self.bus.publish(
            Topic::Workspace(workspace.id),
            Event::new(EventKind::WorkspaceUpdated, workspace.id.to_string()),
        );
        self.bus.publish(
            Topic::Codebase(workspace.codebase_id),
            Event::new(EventKind::CodebaseUpdated, workspace.codebase_id.to_string()),
        );

        tracing::info!(
            workspace_id = %workspace.id,
            change_id = %change.id,
            commit_sha = %change.commit_sha,
            "landed workspace"
        );
        Ok((workspace, change))
    }

    /// Update the draft description that will become the landed commit's
    /// message.
    pub fn update_draft_description(
        &self,
        workspace_id: Uuid,
        description: impl Into<String>,
    ) -> Result<Workspace, WorkspaceError> {
        let mut workspace = self.get(workspace_id)?;
        if workspace.is_archived() {
            return Err(WorkspaceError::Archived(workspace.id));
        }
        workspace.draft_description = description.into();
        workspace.touch();
        self.store.save(&workspace)?;
        self.bus.publish(
            Topic::Workspace(workspace.id),
            Event::new(EventKind::WorkspaceUpdated, workspace.id.to_string()),
        );
        Ok(workspace)
    }

    pub fn archive(&self, workspace_id: Uuid) -> Result<Workspace, WorkspaceError> {
        let mut workspace = self.get(workspace_id)?;
        if !workspace.is_archived() {
            workspace.archived_at = Some(Utc::now());
            workspace.touch();
            self.store.save(&workspace)?;
            self.bus.publish(
                Topic::Workspace(workspace.id),
                Event::new(EventKind::WorkspaceUpdated, workspace.id.to_string()),
            );
        }
        Ok(workspace)
    }

    pub fn unarchive(&self, workspace_id: Uuid) -> Result<Workspace, WorkspaceError> {
        let mut workspace = self.store.get(workspace_id)?;
        if workspace.is_archived() {
            workspace.archived_at = None;
            workspace.unarchived_at = Some(Utc::now());
            workspace.touch();
            self.store.save(&workspace)?;
            self.bus.publish(
                Topic::Workspace(workspace.id),
                Event::new(EventKind::WorkspaceUpdated, workspace.id.to_string()),
            );
        }
        Ok(workspace)
    }

    /// Lazily computed: true iff the latest snapshot sits on the trunk
    /// tip. The cached value is cleared whenever trunk moves.
    pub fn up_to_date_with_trunk(
        &self,
        ctx: &OperationContext,
        workspace_id: Uuid,
    ) -> Result<bool, WorkspaceError> {
        let mut workspace = self.get(workspace_id)?;
        if let Some(cached) = workspace.up_to_date_with_trunk {
            return Ok(cached);
        }

        let computed = match workspace.latest_snapshot_id {
            // Nothing drafted yet, so nothing to rebase.
            None => true,
            Some(snapshot_id) => {
                let snapshot = self.snapshot_store.get(snapshot_id)?;
                let mut up_to_date = false;
                self.executors
                    .executor::<WorkspaceError>()
                    .git_read(|repo| {
                        let trunk_tip = repo.resolve(TRUNK_REF)?;
                        up_to_date = repo.is_ancestor(&trunk_tip, &snapshot.commit_sha)?;
                        Ok(())
                    })
                    .exec_trunk(
                        ctx,
                        &workspace.codebase_id.to_string(),
                        "upToDateWithTrunk",
                    )?;
                up_to_date
            }
        };

        workspace.up_to_date_with_trunk = Some(computed);
        workspace.touch();
        self.store.save(&workspace)?;
        Ok(computed)
    }
}
