// executor.rs — Serialized, capability-typed access to repositories.
//
// Callers describe a sequence of steps, each declaring the narrowest
// capability it needs:
//
//   read                 read working tree and .git, no mutation
//   git_read             read git objects only (safe on a bare trunk)
//   git_write            mutate refs/objects
//   file_read_git_write  read the working tree, mutate git
//   write                full working-copy mutation
//
// The executor then runs the whole sequence on one repository handle —
// trunk, a named view, or an ephemeral temporary view — under that
// repository's lock: a write lock if any step mutates, a read lock
// otherwise. Steps run in insertion order; the first failure aborts the
// rest; locks are released on every exit path; the operation context is
// checked between steps.
//
// The error type is generic so services can run their own error enums
// through a chain; `From<VcsError>` covers lock, provider and plumbing
// failures.

use std::ops::Deref;
use std::sync::Arc;

use crate::context::OperationContext;
use crate::error::VcsError;
use crate::git::{CommitAuthor, GitRepository, LogEntry, RebaseOutcome};
use crate::locker::Locker;
use crate::provider::RepoProvider;

/// Read-only capability over a repository.
pub struct RepoReader<'r> {
    repo: &'r GitRepository,
    view_id: Option<&'r str>,
}

impl<'r> RepoReader<'r> {
    /// The view this repository belongs to, if it is a working copy.
    pub fn view_id(&self) -> Option<&str> {
        self.view_id
    }

    pub fn path(&self) -> &std::path::Path {
        self.repo.path()
    }

    pub fn resolve(&self, rev: &str) -> Result<String, VcsError> {
        self.repo.resolve(rev)
    }

    pub fn ref_exists(&self, rev: &str) -> bool {
        self.repo.ref_exists(rev)
    }

    pub fn tree_of_commit(&self, sha: &str) -> Result<String, VcsError> {
        self.repo.tree_of_commit(sha)
    }

    pub fn commit_message(&self, sha: &str) -> Result<String, VcsError> {
        self.repo.commit_message(sha)
    }

    pub fn merge_base(&self, a: &str, b: &str) -> Result<String, VcsError> {
        self.repo.merge_base(a, b)
    }

    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool, VcsError> {
        self.repo.is_ancestor(ancestor, descendant)
    }

    pub fn log(&self, rev: &str, limit: usize) -> Result<Vec<LogEntry>, VcsError> {
        self.repo.log(rev, limit)
    }

    pub fn diff_commits(&self, old: &str, new: &str) -> Result<String, VcsError> {
        self.repo.diff_commits(old, new)
    }

    pub fn can_apply_patch(&self, patch: &[u8]) -> Result<bool, VcsError> {
        self.repo.can_apply_patch(patch)
    }

    pub fn current_branch(&self) -> Result<String, VcsError> {
        self.repo.current_branch()
    }

    pub fn rebase_in_progress(&self) -> bool {
        self.repo.rebase_in_progress()
    }
}

/// Full mutation capability over a repository. Derefs to [`RepoReader`].
pub struct RepoWriter<'r> {
    reader: RepoReader<'r>,
}

impl<'r> Deref for RepoWriter<'r> {
    type Target = RepoReader<'r>;

    fn deref(&self) -> &Self::Target {
        &self.reader
    }
}

impl<'r> RepoWriter<'r> {
    pub fn stage_all(&self) -> Result<(), VcsError> {
        self.reader.repo.stage_all()
    }

    pub fn write_tree(&self) -> Result<String, VcsError> {
        self.reader.repo.write_tree()
    }

    pub fn commit_tree(
        &self,
        tree: &str,
        parents: &[&str],
        message: &str,
        author: &CommitAuthor,
    ) -> Result<String, VcsError> {
        self.reader.repo.commit_tree(tree, parents, message, author)
    }

    pub fn update_ref(&self, name: &str, sha: &str) -> Result<(), VcsError> {
        self.reader.repo.update_ref(name, sha)
    }

    pub fn checkout_branch(&self, branch: &str, sha: &str) -> Result<(), VcsError> {
        self.reader.repo.checkout_branch(branch, sha)
    }

    pub fn reset_hard(&self, sha: &str) -> Result<(), VcsError> {
        self.reader.repo.reset_hard(sha)
    }

    pub fn clean_untracked(&self) -> Result<(), VcsError> {
        self.reader.repo.clean_untracked()
    }

    pub fn fetch_ref(&self, refspec: &str) -> Result<(), VcsError> {
        self.reader.repo.fetch_ref(refspec)
    }

    pub fn push_ref(&self, refspec: &str) -> Result<(), VcsError> {
        self.reader.repo.push_ref(refspec)
    }

    pub fn apply_patches_to_workdir(&self, patches: &[Vec<u8>]) -> Result<(), VcsError> {
        self.reader.repo.apply_patches_to_workdir(patches)
    }

    pub fn remove_patches_from_workdir(&self, patches: &[Vec<u8>]) -> Result<(), VcsError> {
        self.reader.repo.remove_patches_from_workdir(patches)
    }

    pub fn rebase_onto(&self, onto: &str, base: &str) -> Result<RebaseOutcome, VcsError> {
        self.reader.repo.rebase_onto(onto, base)
    }

    pub fn rebase_abort(&self) -> Result<(), VcsError> {
        self.reader.repo.rebase_abort()
    }
}

enum Step<'a, E> {
    Read(Box<dyn FnOnce(&RepoReader<'_>) -> Result<(), E> + 'a>),
    GitRead(Box<dyn FnOnce(&RepoReader<'_>) -> Result<(), E> + 'a>),
    GitWrite(Box<dyn FnOnce(&RepoWriter<'_>) -> Result<(), E> + 'a>),
    FileReadGitWrite(Box<dyn FnOnce(&RepoWriter<'_>) -> Result<(), E> + 'a>),
    Write(Box<dyn FnOnce(&RepoWriter<'_>) -> Result<(), E> + 'a>),
}

impl<'a, E> Step<'a, E> {
    fn mutates(&self) -> bool {
        matches!(
            self,
            Step::GitWrite(_) | Step::FileReadGitWrite(_) | Step::Write(_)
        )
    }
}

/// Shared handle that builds executors over one repository base.
pub struct ExecutorProvider {
    provider: Arc<RepoProvider>,
    locker: Arc<Locker>,
}

impl ExecutorProvider {
    pub fn new(provider: Arc<RepoProvider>) -> Self {
        let locker = Arc::new(Locker::new(Arc::clone(&provider)));
        Self { provider, locker }
    }

    pub fn repo_provider(&self) -> &Arc<RepoProvider> {
        &self.provider
    }

    /// Start building a sequence of steps.
    pub fn executor<'a, E: From<VcsError>>(&self) -> Executor<'a, E> {
        Executor {
            provider: Arc::clone(&self.provider),
            locker: Arc::clone(&self.locker),
            steps: Vec::new(),
            allow_rebasing: false,
        }
    }
}

/// A builder of sequenced, capability-typed repository operations.
pub struct Executor<'a, E = VcsError> {
    provider: Arc<RepoProvider>,
    locker: Arc<Locker>,
    steps: Vec<Step<'a, E>>,
    allow_rebasing: bool,
}

impl<'a, E: From<VcsError>> Executor<'a, E> {
    pub fn read(mut self, f: impl FnOnce(&RepoReader<'_>) -> Result<(), E> + 'a) -> Self {
        self.steps.push(Step::Read(Box::new(f)));
        self
    }

    pub fn git_read(mut self, f: impl FnOnce(&RepoReader<'_>) -> Result<(), E> + 'a) -> Self {
        self.steps.push(Step::GitRead(Box::new(f)));
        self
    }

    pub fn git_write(mut self, f: impl FnOnce(&RepoWriter<'_>) -> Result<(), E> + 'a) -> Self {
        self.steps.push(Step::GitWrite(Box::new(f)));
        self
    }

    pub fn file_read_git_write(
        mut self,
        f: impl FnOnce(&RepoWriter<'_>) -> Result<(), E> + 'a,
    ) -> Self {
        self.steps.push(Step::FileReadGitWrite(Box::new(f)));
        self
    }

    pub fn write(mut self, f: impl FnOnce(&RepoWriter<'_>) -> Result<(), E> + 'a) -> Self {
        self.steps.push(Step::Write(Box::new(f)));
        self
    }

    /// Permit execution against a view with an unresolved rebase.
    pub fn allow_rebasing(mut self) -> Self {
        self.allow_rebasing = true;
        self
    }

    /// Run the steps on the codebase's bare trunk repository.
    pub fn exec_trunk(
        self,
        ctx: &OperationContext,
        codebase_id: &str,
        purpose: &str,
    ) -> Result<(), E> {
        let repo = self.provider.trunk_repo(codebase_id).map_err(E::from)?;
        let lock = self.locker.get(codebase_id, None);
        let _guard = if self.mutates() {
            lock.write()
        } else {
            lock.read()
        }
        .map_err(E::from)?;

        let span = tracing::debug_span!("exec_trunk", codebase_id, purpose);
        let _enter = span.enter();
        self.run(ctx, &repo, None)
    }

    /// Run the steps on a view working copy.
    pub fn exec_view(
        self,
        ctx: &OperationContext,
        codebase_id: &str,
        view_id: &str,
        purpose: &str,
    ) -> Result<(), E> {
        let repo = self
            .provider
            .view_repo(codebase_id, view_id)
            .map_err(E::from)?;
        let lock = self.locker.get(codebase_id, Some(view_id));
        let _guard = if self.mutates() {
            lock.write()
        } else {
            lock.read()
        }
        .map_err(E::from)?;

        if repo.rebase_in_progress() && !self.allow_rebasing {
            return Err(E::from(VcsError::RebasingInProgress));
        }

        let span = tracing::debug_span!("exec_view", codebase_id, view_id, purpose);
        let _enter = span.enter();
        self.run(ctx, &repo, Some(view_id))
    }

    /// Allocate an ephemeral working copy cloned from trunk, run the steps
    /// on it, then delete it.
    pub fn exec_temporary_view(
        self,
        ctx: &OperationContext,
        codebase_id: &str,
        purpose: &str,
    ) -> Result<(), E> {
        let tmp = self
            .provider
            .temporary_view(codebase_id, purpose)
            .map_err(E::from)?;
        let lock = self.locker.get(codebase_id, Some(tmp.view_id()));
        let _guard = if self.mutates() {
            lock.write()
        } else {
            lock.read()
        }
        .map_err(E::from)?;

        let span = tracing::debug_span!("exec_temporary_view", codebase_id, purpose);
        let _enter = span.enter();
        self.run(ctx, tmp.repo(), Some(tmp.view_id()))
    }

    fn mutates(&self) -> bool {
        self.steps.iter().any(Step::mutates)
    }

    fn run(
        self,
        ctx: &OperationContext,
        repo: &GitRepository,
        view_id: Option<&str>,
    ) -> Result<(), E> {
        for step in self.steps {
            ctx.check().map_err(E::from)?;
            match step {
                Step::Read(f) | Step::GitRead(f) => f(&RepoReader { repo, view_id })?,
                Step::GitWrite(f) | Step::FileReadGitWrite(f) | Step::Write(f) => f(&RepoWriter {
                    reader: RepoReader { repo, view_id },
                })?,
            }
        }
        Ok(())
    }
}
