// codebase.rs — Codebase: the logical repository container.
//
// Exactly one bare trunk repository exists on disk per codebase; creating
// the record creates the trunk (with its root commit) in the same call, so
// the invariant holds from the start.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sturdy_vcs::{
    ExecutorProvider, LogEntry, OperationContext, RepoProvider, ROOT_COMMIT_MESSAGE, TRUNK_REF,
};

use crate::error::WorkspaceError;

/// A logical repository and its access-control root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Codebase {
    pub id: Uuid,
    /// Stable 7-character handle used in URLs.
    pub short_id: String,
    pub name: String,
    pub is_public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
}

impl Codebase {
    pub fn new(name: impl Into<String>, is_public: bool) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            short_id: short_id(id),
            name: name.into(),
            is_public,
            organization_id: None,
            created_at: Utc::now(),
            archived_at: None,
        }
    }
}

/// First seven hex chars of the id.
fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..7].to_string()
}

/// Persistent store for codebase records, one JSON file per codebase.
pub struct CodebaseStore {
    store_dir: PathBuf,
}

impl CodebaseStore {
    pub fn new(store_dir: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        let store_dir = store_dir.as_ref().to_path_buf();
        fs::create_dir_all(&store_dir).map_err(|source| WorkspaceError::IoError {
            path: store_dir.clone(),
            source,
        })?;
        Ok(Self { store_dir })
    }

    pub fn save(&self, codebase: &Codebase) -> Result<(), WorkspaceError> {
        let path = self.codebase_file(codebase.id);
        let json = serde_json::to_string_pretty(codebase)?;
        fs::write(&path, json).map_err(|source| WorkspaceError::IoError { path, source })?;
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Result<Codebase, WorkspaceError> {
        let path = self.codebase_file(id);
        if !path.exists() {
            return Err(WorkspaceError::not_found("codebase", id));
        }
        let json = fs::read_to_string(&path)
            .map_err(|source| WorkspaceError::IoError { path, source })?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn get_by_short_id(&self, short_id: &str) -> Result<Codebase, WorkspaceError> {
        self.list()?
            .into_iter()
            .find(|codebase| codebase.short_id == short_id)
            .ok_or_else(|| WorkspaceError::not_found("codebase", short_id))
    }

    pub fn list(&self) -> Result<Vec<Codebase>, WorkspaceError> {
        let mut codebases = Vec::new();
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
                if let Ok(codebase) = serde_json::from_str::<Codebase>(&json) {
                    codebases.push(codebase);
                }
            }
        }
        codebases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(codebases)
    }

    fn codebase_file(&self, id: Uuid) -> PathBuf {
        self.store_dir.join(format!("{id}.json"))
    }
}

/// Creates codebases (record + trunk repository) and reads trunk history.
pub struct CodebaseService {
    store: Arc<CodebaseStore>,
    provider: Arc<RepoProvider>,
    executors: Arc<ExecutorProvider>,
}

impl CodebaseService {
    pub fn new(
        store: Arc<CodebaseStore>,
        provider: Arc<RepoProvider>,
        executors: Arc<ExecutorProvider>,
    ) -> Self {
        Self {
            store,
            provider,
            executors,
        }
    }

    /// Create the record and the trunk bare repository together.
    pub fn create(&self, name: impl Into<String>, is_public: bool) -> Result<Codebase, WorkspaceError> {
        let codebase = Codebase::new(name, is_public);
        self.provider.create_trunk(&codebase.id.to_string())?;
        self.store.save(&codebase)?;
        tracing::info!(codebase_id = %codebase.id, short_id = %codebase.short_id, "created codebase");
        Ok(codebase)
    }

    pub fn get(&self, id: Uuid) -> Result<Codebase, WorkspaceError> {
        self.store.get(id)
    }

    /// Trunk history, newest first, with the synthetic root commit
    /// filtered out. `limit` of zero means the default of 100.
    pub fn list_changes(
        &self,
        ctx: &OperationContext,
        codebase_id: Uuid,
        limit: usize,
    ) -> Result<Vec<LogEntry>, WorkspaceError> {
        let limit = if limit == 0 { 100 } else { limit };
        let mut entries = Vec::new();
        self.executors
            .executor::<WorkspaceError>()
            .git_read(|repo| {
                entries = repo.log(TRUNK_REF, limit)?;
                Ok(())
            })
            .exec_trunk(ctx, &codebase_id.to_string(), "listChanges")?;

        entries.retain(|entry| entry.message != ROOT_COMMIT_MESSAGE);
        Ok(entries)
    }
}
