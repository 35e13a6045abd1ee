// user.rs — User records. The core only needs enough identity to attribute
// views, workspaces and landed commits.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WorkspaceError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            created_at: Utc::now(),
        }
    }
}

/// Persistent store for user records, one JSON file per user.
pub struct UserStore {
    store_dir: PathBuf,
}

impl UserStore {
    pub fn new(store_dir: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        let store_dir = store_dir.as_ref().to_path_buf();
        fs::create_dir_all(&store_dir).map_err(|source| WorkspaceError::IoError {
            path: store_dir.clone(),
            source,
        })?;
        Ok(Self { store_dir })
    }

    pub fn save(&self, user: &User) -> Result<(), WorkspaceError> {
        let path = self.user_file(user.id);
        let json = serde_json::to_string_pretty(user)?;
        fs::write(&path, json).map_err(|source| WorkspaceError::IoError { path, source })?;
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Result<User, WorkspaceError> {
        let path = self.user_file(id);
        if !path.exists() {
            return Err(WorkspaceError::not_found("user", id));
        }
        let json = fs::read_to_string(&path)
            .map_err(|source| WorkspaceError::IoError { path, source })?;
        Ok(serde_json::from_str(&json)?)
    }

    fn user_file(&self, id: Uuid) -> PathBuf {
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
        let store = UserStore::new(dir.path().join("users")).unwrap();

        let user = User::new("Ada", "ada@example.com");
        store.save(&user).unwrap();

        let found = store.get(user.id).unwrap();
        assert_eq!(found.email, "ada@example.com");
    }

    #[test]
    fn missing_user_is_not_found() {
        let dir = tempdir().unwrap();
        let store = UserStore::new(dir.path().join("users")).unwrap();
        assert!(matches!(
            store.get(Uuid::new_v4()),
            Err(WorkspaceError::NotFound { .. })
        ));
    }
}
