// error.rs — Error types for the repository access layer.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while operating on trunk and view repositories.
#[derive(Debug, Error)]
pub enum VcsError {
    /// A git subcommand exited non-zero.
    #[error("git {args} failed: {stderr}")]
    GitCommand { args: String, stderr: String },

    /// The git binary could not be spawned.
    #[error("failed to run git: {0}")]
    GitSpawn(#[source] std::io::Error),

    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The repository does not exist at the expected path.
    #[error("no repository at {0}")]
    PathNotFound(PathBuf),

    /// Cloning a repository failed.
    #[error("failed to clone {from} into {to}: {stderr}")]
    CloneFailed {
        from: PathBuf,
        to: PathBuf,
        stderr: String,
    },

    /// A patch in a batch did not apply against the working tree.
    #[error("patch {index} does not apply")]
    PatchFailed { index: usize },

    /// The view has an unresolved rebase and the operation did not opt in
    /// to running against it.
    #[error("view is in rebasing state")]
    RebasingInProgress,

    /// The operation context was cancelled or its deadline passed.
    #[error("operation cancelled")]
    Cancelled,
}
