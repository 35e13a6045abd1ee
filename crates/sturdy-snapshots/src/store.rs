// store.rs — SnapshotStore: persistence for snapshot records.
//
// Each snapshot is stored as a JSON file: `<store_dir>/<snapshot_id>.json`.
// The git object store is canonical for content; these records carry the
// chain metadata (workspace, action, previous snapshot).

use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::SnapshotError;
use crate::snapshot::Snapshot;

/// Persistent store for snapshot records.
pub struct SnapshotStore {
    store_dir: PathBuf,
}

impl SnapshotStore {
    /// Create a new store backed by the given directory.
    /// Creates the directory if it doesn't exist.
    pub fn new(store_dir: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let store_dir = store_dir.as_ref().to_path_buf();
        fs::create_dir_all(&store_dir).map_err(|source| SnapshotError::IoError {
            path: store_dir.clone(),
            source,
        })?;
        Ok(Self { store_dir })
    }

    pub fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let path = self.snapshot_file(snapshot.id);
        let json = serde_json::to_string_pretty(snapshot)?;
        fs::write(&path, json).map_err(|source| SnapshotError::IoError { path, source })?;
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Result<Snapshot, SnapshotError> {
        let path = self.snapshot_file(id);
        if !path.exists() {
            return Err(SnapshotError::NotFound(id));
        }
        let json = fs::read_to_string(&path)
            .map_err(|source| SnapshotError::IoError { path, source })?;
        Ok(serde_json::from_str(&json)?)
    }

    /// All snapshots of a workspace, newest first.
    pub fn list_by_workspace(&self, workspace_id: Uuid) -> Result<Vec<Snapshot>, SnapshotError> {
        let mut snapshots = Vec::new();

        let entries =
            fs::read_dir(&self.store_dir).map_err(|source| SnapshotError::IoError {
                path: self.store_dir.clone(),
                source,
            })?;
        for entry in entries {
            let entry = entry.map_err(|source| SnapshotError::IoError {
                path: self.store_dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let json = fs::read_to_string(&path)
                    .map_err(|source| SnapshotError::IoError { path, source })?;
                if let Ok(snapshot) = serde_json::from_str::<Snapshot>(&json) {
                    if snapshot.workspace_id == workspace_id {
                        snapshots.push(snapshot);
                    }
                }
            }
        }

        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(snapshots)
    }

    /// The newest snapshot of a workspace, if any.
    pub fn latest_by_workspace(
        &self,
        workspace_id: Uuid,
    ) -> Result<Option<Snapshot>, SnapshotError> {
        Ok(self.list_by_workspace(workspace_id)?.into_iter().next())
    }

    fn snapshot_file(&self, id: Uuid) -> PathBuf {
        self.store_dir.join(format!("{id}.json"))
    }
}
