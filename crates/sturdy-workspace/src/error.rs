// error.rs — Error types for the workspace, view and suggestion services.
//
// The taxonomy follows how callers react: not-found and invalid input are
// surfaced immediately, conflicts (a rebasing view, a patch that no longer
// applies) are reported so the client can re-read state, invariant
// violations are bugs.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use sturdy_vcs::VcsError;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// A repository operation failed.
    #[error(transparent)]
    Vcs(VcsError),

    /// A snapshot operation failed.
    #[error(transparent)]
    Snapshot(sturdy_snapshots::SnapshotError),

    /// Diff decoration failed.
    #[error(transparent)]
    Diff(#[from] sturdy_diff::DiffError),

    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize a record.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The view has unresolved conflicts against trunk.
    #[error("view is in rebasing state")]
    Rebasing,

    /// The workspace is archived and does not receive edits.
    #[error("workspace {0} is archived")]
    Archived(Uuid),

    /// Concurrent modification or a patch that no longer applies.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The request itself is wrong (bad hunk id, mismatched codebase, …).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An internal invariant did not hold.
    #[error("invariant violated: {0}")]
    InvariantViolated(String),
}

impl WorkspaceError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        WorkspaceError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<VcsError> for WorkspaceError {
    fn from(err: VcsError) -> Self {
        match err {
            VcsError::RebasingInProgress => WorkspaceError::Rebasing,
            VcsError::PatchFailed { index } => {
                WorkspaceError::Conflict(format!("patch {index} does not apply"))
            }
            other => WorkspaceError::Vcs(other),
        }
    }
}

impl From<sturdy_snapshots::SnapshotError> for WorkspaceError {
    fn from(err: sturdy_snapshots::SnapshotError) -> Self {
        // A snapshot that hit a rebasing view or a failing patch surfaces
        // with the same kind it would have had without the wrapper.
        match err {
            sturdy_snapshots::SnapshotError::Vcs(vcs) => WorkspaceError::from(vcs),
            other => WorkspaceError::Snapshot(other),
        }
    }
}
