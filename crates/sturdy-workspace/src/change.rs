// change.rs — Change: a landed commit on trunk.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WorkspaceError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
    pub id: Uuid,
    pub codebase_id: Uuid,
    /// Reachable from `refs/heads/sturdytrunk`.
    pub commit_sha: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_commit_sha: Option<String>,
    pub message: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

impl Change {
    pub fn new(
        codebase_id: Uuid,
        commit_sha: impl Into<String>,
        parent_commit_sha: Option<String>,
        message: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            codebase_id,
            commit_sha: commit_sha.into(),
            parent_commit_sha,
            message: message.into(),
            author: author.into(),
            created_at: Utc::now(),
        }
    }
}

/// Persistent store for change records, one JSON file per change.
pub struct ChangeStore {
    store_dir: PathBuf,
}

impl ChangeStore {
    pub fn new(store_dir: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        let store_dir = store_dir.as_ref().to_path_buf();
        fs::create_dir_all(&store_dir).map_err(|source| WorkspaceError::IoError {
            path: store_dir.clone(),
            source,
        })?;
        Ok(Self { store_dir })
    }

    pub fn save(&self, change: &Change) -> Result<(), WorkspaceError> {
        let path = self.change_file(change.id);
        let json = serde_json::to_string_pretty(change)?;
        fs::write(&path, json).map_err(|source| WorkspaceError::IoError { path, source })?;
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Result<Change, WorkspaceError> {
        let path = self.change_file(id);
        if !path.exists() {
            return Err(WorkspaceError::not_found("change", id));
        }
        let json = fs::read_to_string(&path)
            .map_err(|source| WorkspaceError::IoError { path, source })?;
        Ok(serde_json::from_str(&json)?)
    }

    /// All changes of a codebase, newest first.
    pub fn list_by_codebase(&self, codebase_id: Uuid) -> Result<Vec<Change>, WorkspaceError> {
        let mut changes = Vec::new();
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
                if let Ok(change) = serde_json::from_str::<Change>(&json) {
                    if change.codebase_id == codebase_id {
                        changes.push(change);
                    }
                }
            }
        }
        changes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(changes)
    }

    fn change_file(&self, id: Uuid) -> PathBuf {
        self.store_dir.join(format!("{id}.json"))
    }
}
