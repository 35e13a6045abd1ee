// suggestion.rs — Suggestion: user B proposing hunks against user A's
// workspace.
//
// The record points at the suggesting workspace (a fork), the target
// workspace, and the target's snapshot at fork time. Which hunks were
// applied or dismissed is tracked as (preferred filename, hunk index)
// pairs, so the ledger survives text edits that would change hunk ids.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WorkspaceError;

/// One ledger entry: a hunk addressed by file and 0-based index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HunkRef {
    pub file_name: String,
    pub index: usize,
}

impl HunkRef {
    pub fn new(file_name: impl Into<String>, index: usize) -> Self {
        Self {
            file_name: file_name.into(),
            index,
        }
    }
}

impl fmt::Display for HunkRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.file_name, self.index)
    }
}

impl FromStr for HunkRef {
    type Err = WorkspaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (file_name, index) = s
            .rsplit_once('#')
            .ok_or_else(|| WorkspaceError::InvalidInput(format!("bad hunk ref: {s}")))?;
        let index = index
            .parse()
            .map_err(|_| WorkspaceError::InvalidInput(format!("bad hunk ref: {s}")))?;
        Ok(Self::new(file_name, index))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: Uuid,
    pub codebase_id: Uuid,
    /// The suggesting (fork) workspace.
    pub workspace_id: Uuid,
    /// The workspace the suggestion targets.
    pub for_workspace_id: Uuid,
    /// The target's snapshot at fork time; diffs are computed against it.
    pub for_snapshot_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dismissed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub applied_hunks: Vec<HunkRef>,
    #[serde(default)]
    pub dismissed_hunks: Vec<HunkRef>,
}

impl Suggestion {
    pub fn new(
        codebase_id: Uuid,
        workspace_id: Uuid,
        for_workspace_id: Uuid,
        for_snapshot_id: Uuid,
        user_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            codebase_id,
            workspace_id,
            for_workspace_id,
            for_snapshot_id,
            user_id,
            created_at: Utc::now(),
            dismissed_at: None,
            notified_at: None,
            applied_hunks: Vec::new(),
            dismissed_hunks: Vec::new(),
        }
    }
}

/// Persistent store for suggestion records, one JSON file per suggestion.
pub struct SuggestionStore {
    store_dir: PathBuf,
}

impl SuggestionStore {
    pub fn new(store_dir: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        let store_dir = store_dir.as_ref().to_path_buf();
        fs::create_dir_all(&store_dir).map_err(|source| WorkspaceError::IoError {
            path: store_dir.clone(),
            source,
        })?;
        Ok(Self { store_dir })
    }

    pub fn save(&self, suggestion: &Suggestion) -> Result<(), WorkspaceError> {
        let path = self.suggestion_file(suggestion.id);
        let json = serde_json::to_string_pretty(suggestion)?;
        fs::write(&path, json).map_err(|source| WorkspaceError::IoError { path, source })?;
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Result<Suggestion, WorkspaceError> {
        let path = self.suggestion_file(id);
        if !path.exists() {
            return Err(WorkspaceError::not_found("suggestion", id));
        }
        let json = fs::read_to_string(&path)
            .map_err(|source| WorkspaceError::IoError { path, source })?;
        Ok(serde_json::from_str(&json)?)
    }

    fn scan(
        &self,
        mut keep: impl FnMut(&Suggestion) -> bool,
    ) -> Result<Vec<Suggestion>, WorkspaceError> {
        let mut suggestions = Vec::new();
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
                if let Ok(suggestion) = serde_json::from_str::<Suggestion>(&json) {
                    if keep(&suggestion) {
                        suggestions.push(suggestion);
                    }
                }
            }
        }
        suggestions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(suggestions)
    }

    /// The suggestion made from a (fork) workspace, if any.
    pub fn get_by_workspace_id(
        &self,
        workspace_id: Uuid,
    ) -> Result<Option<Suggestion>, WorkspaceError> {
        Ok(self
            .scan(|s| s.workspace_id == workspace_id)?
            .into_iter()
            .next())
    }

    /// Suggestions targeting a workspace, newest first.
    pub fn list_for_workspace_id(
        &self,
        for_workspace_id: Uuid,
    ) -> Result<Vec<Suggestion>, WorkspaceError> {
        self.scan(|s| s.for_workspace_id == for_workspace_id)
    }

    /// Suggestions forked off a specific target snapshot.
    pub fn list_by_snapshot_id(
        &self,
        for_snapshot_id: Uuid,
    ) -> Result<Vec<Suggestion>, WorkspaceError> {
        self.scan(|s| s.for_snapshot_id == for_snapshot_id)
    }

    fn suggestion_file(&self, id: Uuid) -> PathBuf {
        self.store_dir.join(format!("{id}.json"))
    }
}
