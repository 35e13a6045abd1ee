// suggestion_service.rs — Forking a workspace into a suggestion and moving
// hunks back.
//
// Diffs are computed between the fork's latest snapshot and the target's
// snapshot at fork time, both resolved on trunk. The applied/dismissed
// ledger decorates them; hunks that no longer apply against the target's
// working tree are marked outdated instead of failing silently on apply.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use sturdy_diff::{FileDiff, Unidiff};
use sturdy_events::{Event, EventBus, EventKind, Topic};
use sturdy_snapshots::{Action, SnapshotOptions, SnapshotStore, Snapshotter};
use sturdy_vcs::{ExecutorProvider, OperationContext};

use crate::error::WorkspaceError;
use crate::notification::{NotificationKind, NotificationSender};
use crate::service::WorkspaceService;
use crate::suggestion::{HunkRef, Suggestion, SuggestionStore};
use crate::workspace::Workspace;

pub struct SuggestionService {
    store: Arc<SuggestionStore>,
    workspace_service: Arc<WorkspaceService>,
    snapshot_store: Arc<SnapshotStore>,
    snapshotter: Arc<Snapshotter>,
    executors: Arc<ExecutorProvider>,
    bus: EventBus,
    notifier: Arc<dyn NotificationSender>,
}

impl SuggestionService {
    pub fn new(
        store: Arc<SuggestionStore>,
        workspace_service: Arc<WorkspaceService>,
        snapshot_store: Arc<SnapshotStore>,
        snapshotter: Arc<Snapshotter>,
        executors: Arc<ExecutorProvider>,
        bus: EventBus,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            store,
            workspace_service,
            snapshot_store,
            snapshotter,
            executors,
            bus,
            notifier,
        }
    }

    pub fn get(&self, id: Uuid) -> Result<Suggestion, WorkspaceError> {
        self.store.get(id)
    }

    /// Fork `for_workspace` into a suggestion workspace owned by `user_id`.
    pub fn create(
        &self,
        ctx: &OperationContext,
        user_id: Uuid,
        for_workspace_id: Uuid,
    ) -> Result<Suggestion, WorkspaceError> {
        let for_workspace = self.workspace_service.get(for_workspace_id)?;
        let Some(for_snapshot_id) = for_workspace.latest_snapshot_id else {
            return Err(WorkspaceError::InvalidInput(
                "workspace has no snapshot to suggest against".to_string(),
            ));
        };

        let name = for_workspace
            .name
            .as_ref()
            .map(|name| format!("Suggestions: {name}"));
        let fork = self
            .workspace_service
            .create_from_workspace(&for_workspace, user_id, name)?;
        self.workspace_service
            .copy_patches(ctx, &fork, &for_workspace)?;

        let suggestion = Suggestion::new(
            fork.codebase_id,
            fork.id,
            for_workspace.id,
            for_snapshot_id,
            user_id,
        );
        self.store.save(&suggestion)?;
        tracing::info!(
            suggestion_id = %suggestion.id,
            for_workspace_id = %for_workspace.id,
            "created suggestion"
        );
        Ok(suggestion)
    }

    /// Suggestions currently open against a workspace (forks that are
    /// still alive).
    pub fn list_for_workspace(
        &self,
        for_workspace_id: Uuid,
    ) -> Result<Vec<Suggestion>, WorkspaceError> {
        let mut active = Vec::new();
        for suggestion in self.store.list_for_workspace_id(for_workspace_id)? {
            let fork = self.workspace_service.get(suggestion.workspace_id)?;
            if !fork.is_archived() {
                active.push(suggestion);
            }
        }
        Ok(active)
    }

    /// The suggestion's diffs as seen by the target workspace, decorated
    /// with applied/dismissed/outdated flags.
    pub fn diffs(
        &self,
        ctx: &OperationContext,
        suggestion: &Suggestion,
    ) -> Result<Vec<FileDiff>, WorkspaceError> {
        let target = self.workspace_service.get(suggestion.for_workspace_id)?;
        self.diffs_for_target(ctx, suggestion, &target)
    }

    fn diffs_for_target(
        &self,
        ctx: &OperationContext,
        suggestion: &Suggestion,
        target: &Workspace,
    ) -> Result<Vec<FileDiff>, WorkspaceError> {
        let fork = self.workspace_service.get(suggestion.workspace_id)?;
        let Some(fork_snapshot_id) = fork.latest_snapshot_id else {
            return Ok(Vec::new());
        };
        let fork_snapshot = self.snapshot_store.get(fork_snapshot_id)?;
        let base_snapshot = self.snapshot_store.get(suggestion.for_snapshot_id)?;

        let mut diffs = Vec::new();
        self.executors
            .executor::<WorkspaceError>()
            .git_read(|repo| {
                let raw =
                    repo.diff_commits(&base_snapshot.commit_sha, &fork_snapshot.commit_sha)?;
                diffs = Unidiff::new(raw)
                    .with_expanded_hunks()
                    .with_ignore_binary()
                    .decorate()?;
                Ok(())
            })
            .exec_trunk(ctx, &suggestion.codebase_id.to_string(), "suggestionDiffs")?;

        for file_diff in &mut diffs {
            for (index, hunk) in file_diff.hunks.iter_mut().enumerate() {
                let hunk_ref = HunkRef::new(&file_diff.preferred_name, index);
                hunk.is_applied = suggestion.applied_hunks.contains(&hunk_ref);
                hunk.is_dismissed = suggestion.dismissed_hunks.contains(&hunk_ref);
            }
        }

        // Outdated detection needs a working tree; a detached target is
        // checked at apply time instead.
        let Some(view_id) = target.view_id else {
            return Ok(diffs);
        };
        self.executors
            .executor::<WorkspaceError>()
            .read(|repo| {
                for file_diff in &mut diffs {
                    for hunk in &mut file_diff.hunks {
                        if hunk.is_applied || hunk.is_dismissed {
                            continue;
                        }
                        if !repo.can_apply_patch(hunk.patch.as_bytes())? {
                            hunk.is_outdated = true;
                        }
                    }
                }
                Ok(())
            })
            .exec_view(
                ctx,
                &target.codebase_id.to_string(),
                &view_id.to_string(),
                "suggestionOutdatedHunks",
            )?;

        Ok(diffs)
    }

    /// Apply the selected hunks to the target workspace and record them in
    /// the ledger. An outdated hunk aborts the whole batch with a conflict.
    pub fn apply_hunks(
        &self,
        ctx: &OperationContext,
        suggestion_id: Uuid,
        hunk_ids: &[String],
    ) -> Result<(), WorkspaceError> {
        if hunk_ids.is_empty() {
            return Ok(());
        }
        let mut suggestion = self.store.get(suggestion_id)?;
        let target = self.workspace_service.get(suggestion.for_workspace_id)?;
        if target.is_archived() {
            return Err(WorkspaceError::Archived(target.id));
        }

        let diffs = self.diffs_for_target(ctx, &suggestion, &target)?;
        let (patches, selected) = select_hunks(&diffs, hunk_ids)?;

        if let Some(view_id) = target.view_id {
            self.executors
                .executor::<WorkspaceError>()
                .write(|repo| {
                    repo.apply_patches_to_workdir(&patches)?;
                    self.snapshotter.snapshot_on_repo(
                        target.codebase_id,
                        target.id,
                        Action::SuggestionApply,
                        repo,
                        SnapshotOptions::mark_as_latest(),
                    )?;
                    Ok(())
                })
                .exec_view(
                    ctx,
                    &target.codebase_id.to_string(),
                    &view_id.to_string(),
                    "applySuggestionHunks",
                )?;
        } else {
            let Some(snapshot_id) = target.latest_snapshot_id else {
                return Err(WorkspaceError::InvalidInput(
                    "target workspace has no view nor snapshot".to_string(),
                ));
            };
            let snapshot = self.snapshot_store.get(snapshot_id)?;
            self.executors
                .executor::<WorkspaceError>()
                .write(|repo| {
                    self.snapshotter.checkout_snapshot(&snapshot, repo)?;
                    repo.apply_patches_to_workdir(&patches)?;
                    self.snapshotter.snapshot_on_repo(
                        target.codebase_id,
                        target.id,
                        Action::SuggestionApply,
                        repo,
                        SnapshotOptions::mark_as_latest(),
                    )?;
                    Ok(())
                })
                .exec_temporary_view(
                    ctx,
                    &target.codebase_id.to_string(),
                    "applySuggestionHunks",
                )?;
        }

        suggestion.applied_hunks.extend(selected);
        self.store.save(&suggestion)?;
        Ok(())
    }

    /// Dismiss the selected hunks. Ledger only; the repositories are
    /// untouched.
    pub fn dismiss_hunks(
        &self,
        ctx: &OperationContext,
        suggestion_id: Uuid,
        hunk_ids: &[String],
    ) -> Result<(), WorkspaceError> {
        if hunk_ids.is_empty() {
            return Ok(());
        }
        let mut suggestion = self.store.get(suggestion_id)?;
        let target = self.workspace_service.get(suggestion.for_workspace_id)?;

        let diffs = self.diffs_for_target(ctx, &suggestion, &target)?;
        let (_, selected) = select_hunks(&diffs, hunk_ids)?;

        suggestion.dismissed_hunks.extend(selected);
        self.store.save(&suggestion)?;
        Ok(())
    }

    /// Dismiss the whole suggestion.
    pub fn dismiss(&self, suggestion_id: Uuid) -> Result<(), WorkspaceError> {
        let mut suggestion = self.store.get(suggestion_id)?;
        suggestion.dismissed_at = Some(Utc::now());
        self.store.save(&suggestion)?;
        Ok(())
    }

    /// Undo the selected hunks inside the suggesting workspace itself.
    pub fn remove_patches(
        &self,
        ctx: &OperationContext,
        suggestion_id: Uuid,
        hunk_ids: &[String],
    ) -> Result<(), WorkspaceError> {
        if hunk_ids.is_empty() {
            return Ok(());
        }
        let suggestion = self.store.get(suggestion_id)?;
        let fork = self.workspace_service.get(suggestion.workspace_id)?;

        let target = self.workspace_service.get(suggestion.for_workspace_id)?;
        let diffs = self.diffs_for_target(ctx, &suggestion, &target)?;
        let (patches, _) = select_hunks(&diffs, hunk_ids)?;

        if let Some(view_id) = fork.view_id {
            self.executors
                .executor::<WorkspaceError>()
                .write(|repo| self.undo_patches_in_repo(&fork, &patches, repo))
                .exec_view(
                    ctx,
                    &fork.codebase_id.to_string(),
                    &view_id.to_string(),
                    "removeSuggestionPatches",
                )?;
        } else if let Some(snapshot_id) = fork.latest_snapshot_id {
            let snapshot = self.snapshot_store.get(snapshot_id)?;
            self.executors
                .executor::<WorkspaceError>()
                .write(|repo| {
                    self.snapshotter.checkout_snapshot(&snapshot, repo)?;
                    self.undo_patches_in_repo(&fork, &patches, repo)
                })
                .exec_temporary_view(
                    ctx,
                    &fork.codebase_id.to_string(),
                    "removeSuggestionPatches",
                )?;
        } else {
            return Err(WorkspaceError::InvalidInput(
                "workspace has no view nor snapshot".to_string(),
            ));
        }
        Ok(())
    }

    fn undo_patches_in_repo(
        &self,
        fork: &Workspace,
        patches: &[Vec<u8>],
        repo: &sturdy_vcs::RepoWriter<'_>,
    ) -> Result<(), WorkspaceError> {
        repo.remove_patches_from_workdir(patches)?;
        self.snapshotter.snapshot_on_repo(
            fork.codebase_id,
            fork.id,
            Action::FileUndoPatch,
            repo,
            SnapshotOptions::mark_as_latest(),
        )?;
        Ok(())
    }

    /// Called on the suggester's first edit: notify the target owner once
    /// and resurrect the suggestion if it was dismissed.
    pub fn record_activity(
        &self,
        _ctx: &OperationContext,
        suggesting_workspace_id: Uuid,
    ) -> Result<(), WorkspaceError> {
        let Some(mut suggestion) = self.store.get_by_workspace_id(suggesting_workspace_id)?
        else {
            return Ok(());
        };
        let target = self.workspace_service.get(suggestion.for_workspace_id)?;

        let should_notify = suggestion.notified_at.is_none();
        if should_notify {
            if let Err(err) = self.notifier.notify_user(
                target.user_id,
                NotificationKind::NewSuggestion,
                &suggestion.id.to_string(),
            ) {
                tracing::error!(error = %err, "failed to send suggestion notification");
            }
            suggestion.notified_at = Some(Utc::now());
        }

        let should_resurrect = suggestion.dismissed_at.is_some();
        if should_resurrect {
            suggestion.dismissed_at = None;
        }

        if should_notify || should_resurrect {
            self.store.save(&suggestion)?;
            self.bus.publish(
                Topic::Workspace(target.id),
                Event::new(
                    EventKind::WorkspaceUpdatedSuggestion,
                    suggestion.id.to_string(),
                ),
            );
        }
        Ok(())
    }
}

/// Resolve requested hunk ids into patches and ledger refs. An id that
/// matches no hunk is invalid input.
fn select_hunks(
    diffs: &[FileDiff],
    hunk_ids: &[String],
) -> Result<(Vec<Vec<u8>>, Vec<HunkRef>), WorkspaceError> {
    let wanted: HashSet<&str> = hunk_ids.iter().map(String::as_str).collect();
    let mut patches = Vec::new();
    let mut selected = Vec::new();
    let mut found: HashSet<&str> = HashSet::new();

    for file_diff in diffs {
        for (index, hunk) in file_diff.hunks.iter().enumerate() {
            if let Some(&id) = wanted.get(hunk.id.as_str()) {
                found.insert(id);
                patches.push(hunk.patch.clone().into_bytes());
                selected.push(HunkRef::new(&file_diff.preferred_name, index));
            }
        }
    }

    for id in &wanted {
        if !found.contains(id) {
            return Err(WorkspaceError::InvalidInput(format!(
                "unknown hunk id: {id}"
            )));
        }
    }
    Ok((patches, selected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sturdy_diff::Hunk;

    fn file_diff(name: &str, hunk_ids: &[&str]) -> FileDiff {
        FileDiff {
            orig_name: Some(name.to_string()),
            new_name: Some(name.to_string()),
            preferred_name: name.to_string(),
            is_new: false,
            is_deleted: false,
            is_moved: false,
            is_binary: false,
            hunks: hunk_ids
                .iter()
                .map(|id| Hunk {
                    id: id.to_string(),
                    patch: format!("patch-{id}"),
                    is_outdated: false,
                    is_applied: false,
                    is_dismissed: false,
                })
                .collect(),
        }
    }

    #[test]
    fn select_hunks_maps_ids_to_refs() {
        let diffs = vec![file_diff("a.txt", &["h0", "h1"]), file_diff("b.txt", &["h2"])];
        let (patches, selected) =
            select_hunks(&diffs, &["h1".to_string(), "h2".to_string()]).unwrap();

        assert_eq!(patches.len(), 2);
        assert_eq!(
            selected,
            vec![HunkRef::new("a.txt", 1), HunkRef::new("b.txt", 0)]
        );
    }

    #[test]
    fn unknown_hunk_id_is_invalid_input() {
        let diffs = vec![file_diff("a.txt", &["h0"])];
        assert!(matches!(
            select_hunks(&diffs, &["nope".to_string()]),
            Err(WorkspaceError::InvalidInput(_))
        ));
    }
}
