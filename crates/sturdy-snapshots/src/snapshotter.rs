// snapshotter.rs — Materializes a view's working tree as commits on a
// dedicated ref.
//
// Creation path, always under the view's write lock:
//   stage everything → write tree → (idempotency: same tree as the previous
//   snapshot returns it unchanged) → commit parented on the previous
//   snapshot (or the trunk tip the view is based on) → move
//   refs/snapshots/<workspaceID> → push the ref to trunk so the commit
//   resolves in the codebase's object database → persist the record → tell
//   the workspace → publish WorkspaceUpdatedSnapshot.
//
// A snapshot that fails before the record is persisted leaves the
// workspace untouched; a record persisted without the workspace update is
// healed by the reconciliation pass at workspace read time.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use uuid::Uuid;

use sturdy_diff::Unidiff;
use sturdy_events::{Event, EventBus, EventKind, Topic};
use sturdy_vcs::{CommitAuthor, ExecutorProvider, OperationContext, RepoWriter, ORIGIN_TRUNK_REF};

use crate::error::SnapshotError;
use crate::snapshot::{commit_message, snapshot_ref, Action, Snapshot};
use crate::store::SnapshotStore;

/// Per-snapshot soft time budget; exceeding it is logged, not fatal.
const SOFT_BUDGET: Duration = Duration::from_secs(30);

/// The snapshotter's view of the workspace record. Implemented by the
/// workspace store so the snapshotter can mark a new snapshot as the
/// workspace's latest without owning the record itself.
pub trait WorkspaceHook: Send + Sync {
    fn snapshot_created(
        &self,
        workspace_id: Uuid,
        snapshot_id: Uuid,
        diffs_count: usize,
    ) -> Result<(), SnapshotError>;
}

/// Options for one snapshot invocation.
#[derive(Debug, Clone, Default)]
pub struct SnapshotOptions {
    mark_as_latest: bool,
    parent_commit: Option<String>,
}

impl SnapshotOptions {
    /// Update the workspace's `latest_snapshot_id` after the snapshot.
    pub fn mark_as_latest() -> Self {
        Self {
            mark_as_latest: true,
            parent_commit: None,
        }
    }

    /// Internal intermediate snapshot: record only, workspace untouched.
    pub fn unmarked() -> Self {
        Self::default()
    }

    /// Parent the snapshot commit on `sha` instead of the previous
    /// snapshot. Used after a rebase, when the chain restarts on top of
    /// new trunk.
    pub fn with_parent_commit(mut self, sha: impl Into<String>) -> Self {
        self.parent_commit = Some(sha.into());
        self
    }
}

pub struct Snapshotter {
    executors: Arc<ExecutorProvider>,
    store: Arc<SnapshotStore>,
    workspaces: Arc<dyn WorkspaceHook>,
    bus: EventBus,
    // Snapshots of a view-bound workspace already serialize on the view
    // lock; detached workspaces run in temporary views, so they serialize
    // here instead.
    workspace_mutexes: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl Snapshotter {
    pub fn new(
        executors: Arc<ExecutorProvider>,
        store: Arc<SnapshotStore>,
        workspaces: Arc<dyn WorkspaceHook>,
        bus: EventBus,
    ) -> Self {
        Self {
            executors,
            store,
            workspaces,
            bus,
            workspace_mutexes: Mutex::new(HashMap::new()),
        }
    }

    fn workspace_mutex(&self, workspace_id: Uuid) -> Arc<Mutex<()>> {
        Arc::clone(
            self.workspace_mutexes
                .lock()
                .entry(workspace_id)
                .or_default(),
        )
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn get_by_id(&self, id: Uuid) -> Result<Snapshot, SnapshotError> {
        self.store.get(id)
    }

    /// Snapshot a workspace's view.
    pub fn snapshot(
        &self,
        ctx: &OperationContext,
        codebase_id: Uuid,
        workspace_id: Uuid,
        view_id: &str,
        action: Action,
    ) -> Result<Snapshot, SnapshotError> {
        let mut result = None;
        self.executors
            .executor::<SnapshotError>()
            .write(|repo| {
                result = Some(self.snapshot_on_repo(
                    codebase_id,
                    workspace_id,
                    action,
                    repo,
                    SnapshotOptions::mark_as_latest(),
                )?);
                Ok(())
            })
            .exec_view(ctx, &codebase_id.to_string(), view_id, "snapshot")?;

        result.ok_or_else(|| {
            SnapshotError::InvariantViolated("snapshot step did not run".to_string())
        })
    }

    /// Snapshot an already-open repository handle inside an executor chain.
    pub fn snapshot_on_repo(
        &self,
        codebase_id: Uuid,
        workspace_id: Uuid,
        action: Action,
        repo: &RepoWriter<'_>,
        options: SnapshotOptions,
    ) -> Result<Snapshot, SnapshotError> {
        let started = Instant::now();
        let workspace_mutex = self.workspace_mutex(workspace_id);
        let _serialized = workspace_mutex.lock();

        repo.stage_all()?;
        let tree = repo.write_tree()?;

        let previous = self.store.latest_by_workspace(workspace_id)?;

        // Unchanged tree: same commit, no new record.
        if let Some(prev) = &previous {
            if repo.ref_exists(&prev.commit_sha)
                && repo.tree_of_commit(&prev.commit_sha)? == tree
            {
                return Ok(prev.clone());
            }
        }

        let parent = match &options.parent_commit {
            Some(sha) => Some(sha.clone()),
            None => match &previous {
                Some(prev) if repo.ref_exists(&prev.commit_sha) => {
                    Some(prev.commit_sha.clone())
                }
                _ => repo.resolve(ORIGIN_TRUNK_REF).ok(),
            },
        };
        let parents: Vec<&str> = parent.as_deref().into_iter().collect();

        let previous_id = previous.as_ref().map(|prev| prev.id);
        let message = commit_message(action, workspace_id, previous_id);
        let commit_sha =
            repo.commit_tree(&tree, &parents, &message, &CommitAuthor::snapshotter())?;

        let ref_name = snapshot_ref(workspace_id);
        repo.update_ref(&ref_name, &commit_sha)?;
        repo.push_ref(&format!("+{ref_name}:{ref_name}"))?;

        let diffs_count = self.diffs_count(repo, &commit_sha);

        let snapshot = Snapshot {
            id: Uuid::new_v4(),
            codebase_id,
            view_id: repo.view_id().unwrap_or_default().to_string(),
            workspace_id,
            action,
            commit_sha,
            previous_snapshot_id: previous_id,
            created_at: chrono::Utc::now(),
        };
        self.store.save(&snapshot)?;

        if options.mark_as_latest {
            if let Err(err) = self
                .workspaces
                .snapshot_created(workspace_id, snapshot.id, diffs_count)
            {
                // Healed by reconciliation at the next workspace read.
                tracing::warn!(
                    %workspace_id,
                    snapshot_id = %snapshot.id,
                    error = %err,
                    "failed to mark snapshot as latest"
                );
            }
        }

        let elapsed = started.elapsed();
        if elapsed > SOFT_BUDGET {
            tracing::warn!(
                %workspace_id,
                elapsed_secs = elapsed.as_secs(),
                "snapshot exceeded soft budget"
            );
        }

        self.bus.publish(
            Topic::Workspace(workspace_id),
            Event::new(EventKind::WorkspaceUpdatedSnapshot, snapshot.id.to_string()),
        );

        Ok(snapshot)
    }

    /// Check a snapshot out into a (possibly temporary) view: put the
    /// workspace branch on the snapshot commit, restore its files, drop
    /// leftovers, preserve `.git`.
    pub fn checkout_snapshot(
        &self,
        snapshot: &Snapshot,
        repo: &RepoWriter<'_>,
    ) -> Result<(), SnapshotError> {
        let ref_name = snapshot_ref(snapshot.workspace_id);
        if !repo.ref_exists(&snapshot.commit_sha) {
            repo.fetch_ref(&format!("+{ref_name}:{ref_name}"))?;
        }
        if !repo.ref_exists(&snapshot.commit_sha) {
            return Err(SnapshotError::CommitUnavailable {
                snapshot_id: snapshot.id,
                commit_sha: snapshot.commit_sha.clone(),
            });
        }

        repo.checkout_branch(&snapshot.workspace_id.to_string(), &snapshot.commit_sha)?;
        repo.clean_untracked()?;
        Ok(())
    }

    /// Number of changed files between the view's trunk base and `commit`.
    /// Best effort: diff failures log and report zero.
    fn diffs_count(&self, repo: &RepoWriter<'_>, commit: &str) -> usize {
        let result = (|| -> Result<usize, SnapshotError> {
            let trunk = repo.resolve(ORIGIN_TRUNK_REF)?;
            let base = repo.merge_base(&trunk, commit)?;
            let raw = repo.diff_commits(&base, commit)?;
            Ok(Unidiff::new(raw).decorate()?.len())
        })();
        match result {
            Ok(count) => count,
            Err(err) => {
                tracing::warn!(error = %err, "failed to count workspace diffs");
                0
            }
        }
    }
}
