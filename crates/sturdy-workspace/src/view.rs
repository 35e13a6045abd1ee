// view.rs — View: a user's working copy on a host machine.
//
// A view belongs to one user on one codebase and is bound to at most one
// workspace; the workspace points back with its own nullable id. Both
// bindings are plain ids plus a uniqueness invariant — nothing owns
// anything across the pair.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WorkspaceError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct View {
    pub id: Uuid,
    pub codebase_id: Uuid,
    pub user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl View {
    pub fn new(codebase_id: Uuid, user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            codebase_id,
            user_id,
            workspace_id: None,
            mount_path: None,
            mount_hostname: None,
            last_used_at: None,
            created_at: Utc::now(),
        }
    }
}

/// Persistent store for view records, one JSON file per view.
pub struct ViewStore {
    store_dir: PathBuf,
}

impl ViewStore {
    pub fn new(store_dir: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        let store_dir = store_dir.as_ref().to_path_buf();
        fs::create_dir_all(&store_dir).map_err(|source| WorkspaceError::IoError {
            path: store_dir.clone(),
            source,
        })?;
        Ok(Self { store_dir })
    }

    pub fn save(&self, view: &View) -> Result<(), WorkspaceError> {
        let path = self.view_file(view.id);
        let json = serde_json::to_string_pretty(view)?;
        fs::write(&path, json).map_err(|source| WorkspaceError::IoError { path, source })?;
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Result<View, WorkspaceError> {
        let path = self.view_file(id);
        if !path.exists() {
            return Err(WorkspaceError::not_found("view", id));
        }
        let json = fs::read_to_string(&path)
            .map_err(|source| WorkspaceError::IoError { path, source })?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn list_by_codebase(&self, codebase_id: Uuid) -> Result<Vec<View>, WorkspaceError> {
        let mut views = Vec::new();
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
                if let Ok(view) = serde_json::from_str::<View>(&json) {
                    if view.codebase_id == codebase_id {
                        views.push(view);
                    }
                }
            }
        }
        views.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(views)
    }

    fn view_file(&self, id: Uuid) -> PathBuf {
        self.store_dir.join(format!("{id}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_and_get_round_trip() {
        let dir = tempdir().unwrap();
        let store = ViewStore::new(dir.path().join("views")).unwrap();

        let view = View::new(Uuid::new_v4(), Uuid::new_v4());
        store.save(&view).unwrap();

        let found = store.get(view.id).unwrap();
        assert_eq!(found.codebase_id, view.codebase_id);
        assert!(found.workspace_id.is_none());
    }

    #[test]
    fn list_by_codebase_is_scoped() {
        let dir = tempdir().unwrap();
        let store = ViewStore::new(dir.path().join("views")).unwrap();
        let codebase = Uuid::new_v4();

        store.save(&View::new(codebase, Uuid::new_v4())).unwrap();
        store.save(&View::new(codebase, Uuid::new_v4())).unwrap();
        store
            .save(&View::new(Uuid::new_v4(), Uuid::new_v4()))
            .unwrap();

        assert_eq!(store.list_by_codebase(codebase).unwrap().len(), 2);
    }
}
