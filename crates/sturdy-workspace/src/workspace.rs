// workspace.rs — Workspace: the draft change and its record store.
//
// A workspace is the unit of in-progress work, backed by a chain of
// snapshots. Its lifecycle state is derived from the record rather than
// stored: on a view (view_id set), snapshot-only (no view, snapshot set),
// archived (archived_at set), or landed (change_id set).
//
// The store also implements the snapshotter's WorkspaceHook, which is how
// a new snapshot becomes the workspace's latest without the snapshotter
// owning the record.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sturdy_snapshots::{SnapshotError, WorkspaceHook};

use crate::error::WorkspaceError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Uuid,
    pub codebase_id: Uuid,
    pub user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Becomes the commit message when the workspace lands.
    #[serde(default)]
    pub draft_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_snapshot_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_change_id: Option<Uuid>,
    /// Three-valued: `None` means not computed since trunk last moved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up_to_date_with_trunk: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diffs_count: Option<usize>,
    /// Set iff the workspace has landed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unarchived_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_landed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workspace {
    pub fn new(codebase_id: Uuid, user_id: Uuid, name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            codebase_id,
            user_id,
            name,
            draft_description: String::new(),
            view_id: None,
            latest_snapshot_id: None,
            head_change_id: None,
            up_to_date_with_trunk: None,
            diffs_count: None,
            change_id: None,
            archived_at: None,
            unarchived_at: None,
            last_landed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    pub fn is_landed(&self) -> bool {
        self.change_id.is_some()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Persistent store for workspace records, one JSON file per workspace.
pub struct WorkspaceStore {
    store_dir: PathBuf,
}

impl WorkspaceStore {
    pub fn new(store_dir: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        let store_dir = store_dir.as_ref().to_path_buf();
        fs::create_dir_all(&store_dir).map_err(|source| WorkspaceError::IoError {
            path: store_dir.clone(),
            source,
        })?;
        Ok(Self { store_dir })
    }

    pub fn save(&self, workspace: &Workspace) -> Result<(), WorkspaceError> {
        let path = self.workspace_file(workspace.id);
        let json = serde_json::to_string_pretty(workspace)?;
        fs::write(&path, json).map_err(|source| WorkspaceError::IoError { path, source })?;
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Result<Workspace, WorkspaceError> {
        let path = self.workspace_file(id);
        if !path.exists() {
            return Err(WorkspaceError::not_found("workspace", id));
        }
        let json = fs::read_to_string(&path)
            .map_err(|source| WorkspaceError::IoError { path, source })?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn list_by_codebase(
        &self,
        codebase_id: Uuid,
        include_archived: bool,
    ) -> Result<Vec<Workspace>, WorkspaceError> {
        let mut workspaces = Vec::new();
        let entries = fs::read_dir(&self.store_dir).map_err(|source| WorkspaceError::IoError {
            path: self.store_dir.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| WorkspaceError::IoError {
                path: self.store_dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let json = fs::read_to_string(&path)
                    .map_err(|source| WorkspaceError::IoError { path, source })?;
                if let Ok(workspace) = serde_json::from_str::<Workspace>(&json) {
                    if workspace.codebase_id == codebase_id
                        && (include_archived || !workspace.is_archived())
                    {
                        workspaces.push(workspace);
                    }
                }
            }
        }
        workspaces.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(workspaces)
    }

    /// The non-archived workspace currently open on a view, if any.
    pub fn get_by_view_id(&self, view_id: Uuid) -> Result<Option<Workspace>, WorkspaceError> {
        let entries = fs::read_dir(&self.store_dir).map_err(|source| WorkspaceError::IoError {
            path: self.store_dir.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| WorkspaceError::IoError {
                path: self.store_dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let json = fs::read_to_string(&path)
                    .map_err(|source| WorkspaceError::IoError { path, source })?;
                if let Ok(workspace) = serde_json::from_str::<Workspace>(&json) {
                    if workspace.view_id == Some(view_id) && !workspace.is_archived() {
                        return Ok(Some(workspace));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Trunk moved: every workspace's `up_to_date_with_trunk` becomes
    /// unknown until recomputed on read.
    pub fn unset_up_to_date_with_trunk_for_all_in_codebase(
        &self,
        codebase_id: Uuid,
    ) -> Result<(), WorkspaceError> {
        for mut workspace in self.list_by_codebase(codebase_id, true)? {
            if workspace.up_to_date_with_trunk.is_some() {
                workspace.up_to_date_with_trunk = None;
                workspace.touch();
                self.save(&workspace)?;
            }
        }
        Ok(())
    }

    fn workspace_file(&self, id: Uuid) -> PathBuf {
        self.store_dir.join(format!("{id}.json"))
    }
}

impl WorkspaceHook for WorkspaceStore {
    fn snapshot_created(
        &self,
        workspace_id: Uuid,
        snapshot_id: Uuid,
        diffs_count: usize,
    ) -> Result<(), SnapshotError> {
        let mut workspace = self
            .get(workspace_id)
            .map_err(|err| SnapshotError::WorkspaceUpdate(err.to_string()))?;
        workspace.latest_snapshot_id = Some(snapshot_id);
        workspace.diffs_count = Some(diffs_count);
        workspace.touch();
        self.save(&workspace)
            .map_err(|err| SnapshotError::WorkspaceUpdate(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn new_workspace_is_a_snapshotless_draft() {
        let ws = Workspace::new(Uuid::new_v4(), Uuid::new_v4(), None);
        assert!(!ws.is_archived());
        assert!(!ws.is_landed());
        assert!(ws.view_id.is_none());
        assert!(ws.latest_snapshot_id.is_none());
    }

    #[test]
    fn save_and_get_round_trip() {
        let dir = tempdir().unwrap();
        let store = WorkspaceStore::new(dir.path().join("workspaces")).unwrap();

        let ws = Workspace::new(Uuid::new_v4(), Uuid::new_v4(), Some("feature".to_string()));
        store.save(&ws).unwrap();

        let found = store.get(ws.id).unwrap();
        assert_eq!(found.name.as_deref(), Some("feature"));
    }

    #[test]
    fn get_by_view_id_skips_archived() {
        let dir = tempdir().unwrap();
        let store = WorkspaceStore::new(dir.path().join("workspaces")).unwrap();
        let view_id = Uuid::new_v4();

        let mut archived = Workspace::new(Uuid::new_v4(), Uuid::new_v4(), None);
        archived.view_id = Some(view_id);
        archived.archived_at = Some(Utc::now());
        store.save(&archived).unwrap();

        assert!(store.get_by_view_id(view_id).unwrap().is_none());

        let mut open = Workspace::new(Uuid::new_v4(), Uuid::new_v4(), None);
        open.view_id = Some(view_id);
        store.save(&open).unwrap();

        assert_eq!(
            store.get_by_view_id(view_id).unwrap().map(|ws| ws.id),
            Some(open.id)
        );
    }

    #[test]
    fn unset_up_to_date_clears_the_whole_codebase() {
        let dir = tempdir().unwrap();
        let store = WorkspaceStore::new(dir.path().join("workspaces")).unwrap();
        let codebase = Uuid::new_v4();

        let mut a = Workspace::new(codebase, Uuid::new_v4(), None);
        a.up_to_date_with_trunk = Some(true);
        let mut b = Workspace::new(codebase, Uuid::new_v4(), None);
        b.up_to_date_with_trunk = Some(false);
        let mut other = Workspace::new(Uuid::new_v4(), Uuid::new_v4(), None);
        other.up_to_date_with_trunk = Some(true);
        store.save(&a).unwrap();
        store.save(&b).unwrap();
        store.save(&other).unwrap();

        store
            .unset_up_to_date_with_trunk_for_all_in_codebase(codebase)
            .unwrap();

        assert_eq!(store.get(a.id).unwrap().up_to_date_with_trunk, None);
        assert_eq!(store.get(b.id).unwrap().up_to_date_with_trunk, None);
        assert_eq!(
            store.get(other.id).unwrap().up_to_date_with_trunk,
            Some(true)
        );
    }

    #[test]
    fn snapshot_hook_marks_latest() {
        let dir = tempdir().unwrap();
        let store = WorkspaceStore::new(dir.path().join("workspaces")).unwrap();

        let ws = Workspace::new(Uuid::new_v4(), Uuid::new_v4(), None);
        store.save(&ws).unwrap();

        let snapshot_id = Uuid::new_v4();
        store.snapshot_created(ws.id, snapshot_id, 3).unwrap();

        let found = store.get(ws.id).unwrap();
        assert_eq!(found.latest_snapshot_id, Some(snapshot_id));
        assert_eq!(found.diffs_count, Some(3));
    }
}
