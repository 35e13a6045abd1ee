// provider.rs — Resolves codebases and views to on-disk repositories.
//
// Layout under the repos base path:
//   <base>/<codebaseID>.git           bare trunk repository
//   <base>/<codebaseID>/<viewID>/     view working copies
//
// Temporary views are working copies cloned from trunk into a unique
// `tmp-<uuid>` directory; the returned handle deletes the directory when it
// goes out of scope.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::VcsError;
use crate::git::GitRepository;

/// The advisory lock file inside each view. It lives in `.git` because that
/// is the only part of a view that is not synced to the user's machine.
pub const VIEW_LOCK_FILE: &str = ".git/sturdy.lock";

/// Deterministic path resolution for trunk and view repositories.
#[derive(Debug, Clone)]
pub struct RepoProvider {
    repos_base: PathBuf,
}

impl RepoProvider {
    pub fn new(repos_base: impl Into<PathBuf>) -> Self {
        Self {
            repos_base: repos_base.into(),
        }
    }

    pub fn trunk_path(&self, codebase_id: &str) -> PathBuf {
        self.repos_base.join(format!("{codebase_id}.git"))
    }

    pub fn view_path(&self, codebase_id: &str, view_id: &str) -> PathBuf {
        self.repos_base.join(codebase_id).join(view_id)
    }

    /// Create the bare trunk repository for a codebase, with its root
    /// commit in place.
    pub fn create_trunk(&self, codebase_id: &str) -> Result<GitRepository, VcsError> {
        GitRepository::create_bare_with_root_commit(self.trunk_path(codebase_id))
    }

    pub fn trunk_repo(&self, codebase_id: &str) -> Result<GitRepository, VcsError> {
        GitRepository::open(self.trunk_path(codebase_id))
    }

    pub fn view_repo(&self, codebase_id: &str, view_id: &str) -> Result<GitRepository, VcsError> {
        GitRepository::open(self.view_path(codebase_id, view_id))
    }

    /// Clone trunk into a new view working copy and drop the advisory lock
    /// file in place.
    pub fn create_view_clone(
        &self,
        codebase_id: &str,
        view_id: &str,
    ) -> Result<GitRepository, VcsError> {
        let trunk = self.trunk_repo(codebase_id)?;
        let view = trunk.clone_to(self.view_path(codebase_id, view_id))?;
        touch_lock_file(view.path())?;
        Ok(view)
    }

    /// Allocate an ephemeral working copy cloned from trunk. The handle
    /// removes the directory on drop.
    pub fn temporary_view(
        &self,
        codebase_id: &str,
        purpose: &str,
    ) -> Result<TemporaryView, VcsError> {
        let view_id = format!("tmp-{}", Uuid::new_v4());
        let repo = self.create_view_clone(codebase_id, &view_id)?;
        tracing::debug!(codebase_id, view_id, purpose, "allocated temporary view");
        Ok(TemporaryView {
            path: repo.path().to_path_buf(),
            repo,
            view_id,
        })
    }
}

fn touch_lock_file(view_path: &Path) -> Result<(), VcsError> {
    let lock_path = view_path.join(VIEW_LOCK_FILE);
    std::fs::write(&lock_path, b"").map_err(|source| VcsError::IoError {
        path: lock_path,
        source,
    })
}

/// Scoped handle for an ephemeral working copy.
#[derive(Debug)]
pub struct TemporaryView {
    repo: GitRepository,
    view_id: String,
    path: PathBuf,
}

impl TemporaryView {
    pub fn repo(&self) -> &GitRepository {
        &self.repo
    }

    pub fn view_id(&self) -> &str {
        &self.view_id
    }
}

impl Drop for TemporaryView {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_dir_all(&self.path) {
            tracing::warn!(
                path = %self.path.display(),
                error = %err,
                "failed to remove temporary view"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn paths_are_deterministic() {
        let provider = RepoProvider::new("/repos");
        assert_eq!(
            provider.trunk_path("cb"),
            PathBuf::from("/repos/cb.git")
        );
        assert_eq!(
            provider.view_path("cb", "v1"),
            PathBuf::from("/repos/cb/v1")
        );
    }

    #[test]
    fn missing_repo_is_an_error() {
        let dir = tempdir().unwrap();
        let provider = RepoProvider::new(dir.path());
        assert!(matches!(
            provider.trunk_repo("nope"),
            Err(VcsError::PathNotFound(_))
        ));
    }

    #[test]
    fn view_clone_contains_lock_file() {
        let dir = tempdir().unwrap();
        let provider = RepoProvider::new(dir.path());
        provider.create_trunk("cb").unwrap();
        let view = provider.create_view_clone("cb", "v1").unwrap();

        assert!(view.path().join(VIEW_LOCK_FILE).exists());
    }

    #[test]
    fn temporary_view_is_removed_on_drop() {
        let dir = tempdir().unwrap();
        let provider = RepoProvider::new(dir.path());
        provider.create_trunk("cb").unwrap();

        let path = {
            let tmp = provider.temporary_view("cb", "test").unwrap();
            assert!(tmp.repo().path().exists());
            assert!(tmp.view_id().starts_with("tmp-"));
            tmp.repo().path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
