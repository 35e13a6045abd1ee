// error.rs — Error types for the snapshotting subsystem.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SnapshotError {
    /// A repository operation failed.
    #[error(transparent)]
    Vcs(#[from] sturdy_vcs::VcsError),

    /// Diff decoration failed.
    #[error(transparent)]
    Diff(#[from] sturdy_diff::DiffError),

    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize a snapshot record.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The requested snapshot does not exist.
    #[error("snapshot not found: {0}")]
    NotFound(Uuid),

    /// The snapshot record exists but its commit cannot be resolved.
    #[error("commit {commit_sha} of snapshot {snapshot_id} is unavailable")]
    CommitUnavailable {
        snapshot_id: Uuid,
        commit_sha: String,
    },

    /// Updating the owning workspace after a snapshot failed.
    #[error("workspace update failed: {0}")]
    WorkspaceUpdate(String),

    /// An internal invariant did not hold.
    #[error("invariant violated: {0}")]
    InvariantViolated(String),
}
