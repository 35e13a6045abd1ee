// git.rs — Git plumbing for trunk and view repositories.
//
// Every repository operation shells out to the `git` binary in the
// repository's directory. The wrapper exposes only the plumbing the rest of
// the system needs: create/clone, refs and commit objects, staging and
// tree/commit creation, hard resets, diffing two commits, and (reverse)
// patch application against a working tree.
//
// Trunk repositories are bare; views are working copies cloned from trunk
// with `origin` pointing back at the bare repository.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::VcsError;

/// The canonical branch of every codebase.
pub const TRUNK_BRANCH: &str = "sturdytrunk";

/// Full ref name of the trunk branch.
pub const TRUNK_REF: &str = "refs/heads/sturdytrunk";

/// Trunk as seen from a view working copy.
pub const ORIGIN_TRUNK_REF: &str = "refs/remotes/origin/sturdytrunk";

/// Subject of the synthetic first commit on every trunk. Filtered out of
/// user-visible logs.
pub const ROOT_COMMIT_MESSAGE: &str = "Root Commit";

/// Identity used for commits the system creates on its own behalf.
#[derive(Debug, Clone)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

impl CommitAuthor {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// The snapshotter's identity.
    pub fn snapshotter() -> Self {
        Self::new("Sturdy Snapshotter", "snapshotter@getsturdy.com")
    }
}

/// One entry of a branch log.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub commit_sha: String,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
}

/// Outcome of rebasing a view's branch onto new trunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebaseOutcome {
    /// The branch now sits on top of the requested commit.
    Completed,
    /// The rebase stopped on conflicts; the working tree holds conflict
    /// markers and the repository stays in rebasing state.
    Conflicted,
}

/// A bare trunk repository or a view working copy on disk.
#[derive(Debug, Clone)]
pub struct GitRepository {
    path: PathBuf,
}

impl GitRepository {
    /// Open an existing repository.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, VcsError> {
        let path = path.into();
        if !path.exists() {
            return Err(VcsError::PathNotFound(path));
        }
        Ok(Self { path })
    }

    /// Create a bare repository with a synthetic root commit on
    /// `sturdytrunk`, so that views always have something to clone.
    pub fn create_bare_with_root_commit(path: impl Into<PathBuf>) -> Result<Self, VcsError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| VcsError::IoError {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        run_git_in(
            path.parent().unwrap_or(Path::new(".")),
            &["init", "--bare", "--quiet", &path.to_string_lossy()],
        )?;

        let repo = Self { path };
        repo.git_cmd(&["symbolic-ref", "HEAD", TRUNK_REF])?;

        let empty_tree = repo.git_cmd_stdin(&["hash-object", "-t", "tree", "-w", "--stdin"], b"")?;
        let root = repo.commit_tree(
            &empty_tree,
            &[],
            ROOT_COMMIT_MESSAGE,
            &CommitAuthor::new("Sturdy", "support@getsturdy.com"),
        )?;
        repo.update_ref(TRUNK_REF, &root)?;
        Ok(repo)
    }

    /// Clone this repository into `target` as a working copy on
    /// `sturdytrunk`, with a committer identity configured so rebases work.
    pub fn clone_to(&self, target: impl Into<PathBuf>) -> Result<GitRepository, VcsError> {
        let target = target.into();
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|source| VcsError::IoError {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let output = Command::new("git")
            .args([
                "clone",
                "--quiet",
                &self.path.to_string_lossy(),
                &target.to_string_lossy(),
            ])
            .output()
            .map_err(VcsError::GitSpawn)?;
        if !output.status.success() {
            return Err(VcsError::CloneFailed {
                from: self.path.clone(),
                to: target,
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        let view = GitRepository { path: target };
        view.git_cmd(&["config", "user.name", "Sturdy"])?;
        view.git_cmd(&["config", "user.email", "support@getsturdy.com"])?;
        Ok(view)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a git command in the repository directory, returning trimmed
    /// stdout.
    fn git_cmd(&self, args: &[&str]) -> Result<String, VcsError> {
        run_git_in(&self.path, args)
    }

    /// Like `git_cmd`, but stdout is returned byte-for-byte. Diff output
    /// must not be trimmed: a trailing context line can be a lone space.
    fn git_cmd_raw(&self, args: &[&str]) -> Result<String, VcsError> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.path)
            .output()
            .map_err(VcsError::GitSpawn)?;
        if !output.status.success() {
            return Err(VcsError::GitCommand {
                args: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run a git command with `input` piped to stdin.
    fn git_cmd_stdin(&self, args: &[&str], input: &[u8]) -> Result<String, VcsError> {
        let mut child = Command::new("git")
            .args(args)
            .current_dir(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(VcsError::GitSpawn)?;

        if let Some(mut stdin) = child.stdin.take() {
            // git may exit before consuming all of its input; the exit
            // status below is what matters then.
            if let Err(err) = stdin.write_all(input) {
                if err.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(VcsError::GitSpawn(err));
                }
            }
        }

        let output = child.wait_with_output().map_err(VcsError::GitSpawn)?;
        if !output.status.success() {
            return Err(VcsError::GitCommand {
                args: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    // --- refs and objects ---

    /// Resolve a ref or revision to a commit sha.
    pub fn resolve(&self, rev: &str) -> Result<String, VcsError> {
        self.git_cmd(&["rev-parse", "--verify", "--quiet", &format!("{rev}^{{commit}}")])
    }

    pub fn ref_exists(&self, rev: &str) -> bool {
        self.resolve(rev).is_ok()
    }

    pub fn update_ref(&self, name: &str, sha: &str) -> Result<(), VcsError> {
        self.git_cmd(&["update-ref", name, sha])?;
        Ok(())
    }

    /// Create a commit object from a tree without touching HEAD or the
    /// working tree.
    pub fn commit_tree(
        &self,
        tree: &str,
        parents: &[&str],
        message: &str,
        author: &CommitAuthor,
    ) -> Result<String, VcsError> {
        let mut args: Vec<&str> = vec!["commit-tree", tree];
        for parent in parents {
            args.push("-p");
            args.push(parent);
        }
        args.push("-m");
        args.push(message);

        let output = Command::new("git")
            .args(&args)
            .current_dir(&self.path)
            .env("GIT_AUTHOR_NAME", &author.name)
            .env("GIT_AUTHOR_EMAIL", &author.email)
            .env("GIT_COMMITTER_NAME", &author.name)
            .env("GIT_COMMITTER_EMAIL", &author.email)
            .output()
            .map_err(VcsError::GitSpawn)?;
        if !output.status.success() {
            return Err(VcsError::GitCommand {
                args: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub fn tree_of_commit(&self, sha: &str) -> Result<String, VcsError> {
        self.git_cmd(&["rev-parse", &format!("{sha}^{{tree}}")])
    }

    pub fn commit_message(&self, sha: &str) -> Result<String, VcsError> {
        self.git_cmd(&["log", "-1", "--format=%B", sha])
    }

    pub fn merge_base(&self, a: &str, b: &str) -> Result<String, VcsError> {
        self.git_cmd(&["merge-base", a, b])
    }

    /// True iff `ancestor` is reachable from `descendant`.
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool, VcsError> {
        let base = self.merge_base(ancestor, descendant)?;
        let ancestor = self.resolve(ancestor)?;
        Ok(base == ancestor)
    }

    /// Log of a branch, newest first.
    pub fn log(&self, rev: &str, limit: usize) -> Result<Vec<LogEntry>, VcsError> {
        let limit = limit.to_string();
        let out = self.git_cmd(&[
            "log",
            "--format=%H%x1f%s%x1f%an%x1f%ae",
            "-n",
            &limit,
            rev,
            "--",
        ])?;
        let mut entries = Vec::new();
        for line in out.lines() {
            let mut parts = line.split('\u{1f}');
            let (Some(sha), Some(message), Some(name), Some(email)) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            entries.push(LogEntry {
                commit_sha: sha.to_string(),
                message: message.to_string(),
                author_name: name.to_string(),
                author_email: email.to_string(),
            });
        }
        Ok(entries)
    }

    // --- working tree ---

    /// Stage every tracked and untracked path, respecting `.gitignore`.
    pub fn stage_all(&self) -> Result<(), VcsError> {
        self.git_cmd(&["add", "-A"])?;
        Ok(())
    }

    /// Write the index as a tree object.
    pub fn write_tree(&self) -> Result<String, VcsError> {
        self.git_cmd(&["write-tree"])
    }

    /// Point `branch` at `sha` and make it the checked-out branch, forcing
    /// the working tree and index to match. Stray local changes are
    /// discarded; callers snapshot first when they matter.
    pub fn checkout_branch(&self, branch: &str, sha: &str) -> Result<(), VcsError> {
        self.git_cmd(&["checkout", "--quiet", "--force", "-B", branch, sha])?;
        Ok(())
    }

    pub fn current_branch(&self) -> Result<String, VcsError> {
        self.git_cmd(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    pub fn reset_hard(&self, sha: &str) -> Result<(), VcsError> {
        self.git_cmd(&["reset", "--hard", "--quiet", sha])?;
        Ok(())
    }

    /// Remove untracked files and directories (ignored files stay).
    pub fn clean_untracked(&self) -> Result<(), VcsError> {
        self.git_cmd(&["clean", "-fdq"])?;
        Ok(())
    }

    // --- remote sync (views only; origin is the trunk) ---

    pub fn fetch_ref(&self, refspec: &str) -> Result<(), VcsError> {
        self.git_cmd(&["fetch", "--quiet", "origin", refspec])?;
        Ok(())
    }

    pub fn push_ref(&self, refspec: &str) -> Result<(), VcsError> {
        self.git_cmd(&["push", "--quiet", "origin", refspec])?;
        Ok(())
    }

    // --- diff and patch ---

    /// Raw unified diff between two commits, with rename detection.
    pub fn diff_commits(&self, old: &str, new: &str) -> Result<String, VcsError> {
        self.git_cmd_raw(&[
            "diff",
            "--no-color",
            "--no-ext-diff",
            "--find-renames",
            old,
            new,
        ])
    }

    /// Dry-run of a single patch against the working tree.
    pub fn can_apply_patch(&self, patch: &[u8]) -> Result<bool, VcsError> {
        match self.git_cmd_stdin(&["apply", "--check", "--whitespace=nowarn", "-"], patch) {
            Ok(_) => Ok(true),
            Err(VcsError::GitCommand { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Apply a batch of patches to the working tree, all or nothing. Each
    /// patch is checked first; the first one that does not apply aborts the
    /// batch and is reported by index. On success the result is staged.
    pub fn apply_patches_to_workdir(&self, patches: &[Vec<u8>]) -> Result<(), VcsError> {
        for (index, patch) in patches.iter().enumerate() {
            if !self.can_apply_patch(patch)? {
                return Err(VcsError::PatchFailed { index });
            }
        }
        for (index, patch) in patches.iter().enumerate() {
            self.git_cmd_stdin(&["apply", "--whitespace=nowarn", "-"], patch)
                .map_err(|err| match err {
                    VcsError::GitCommand { .. } => VcsError::PatchFailed { index },
                    other => other,
                })?;
        }
        self.stage_all()
    }

    /// Reverse-apply a batch of patches, all or nothing.
    pub fn remove_patches_from_workdir(&self, patches: &[Vec<u8>]) -> Result<(), VcsError> {
        for (index, patch) in patches.iter().enumerate() {
            match self.git_cmd_stdin(
                &["apply", "--reverse", "--check", "--whitespace=nowarn", "-"],
                patch,
            ) {
                Ok(_) => {}
                Err(VcsError::GitCommand { .. }) => {
                    return Err(VcsError::PatchFailed { index })
                }
                Err(err) => return Err(err),
            }
        }
        for (index, patch) in patches.iter().enumerate() {
            self.git_cmd_stdin(&["apply", "--reverse", "--whitespace=nowarn", "-"], patch)
                .map_err(|err| match err {
                    VcsError::GitCommand { .. } => VcsError::PatchFailed { index },
                    other => other,
                })?;
        }
        self.stage_all()
    }

    // --- rebasing ---

    /// Replay the commits between `base` and the current branch head on top
    /// of `onto`. On conflict the repository stays mid-rebase with conflict
    /// markers in the working tree.
    pub fn rebase_onto(&self, onto: &str, base: &str) -> Result<RebaseOutcome, VcsError> {
        match self.git_cmd(&["rebase", "--quiet", "--onto", onto, base]) {
            Ok(_) => Ok(RebaseOutcome::Completed),
            Err(VcsError::GitCommand { .. }) if self.rebase_in_progress() => {
                Ok(RebaseOutcome::Conflicted)
            }
            Err(err) => Err(err),
        }
    }

    pub fn rebase_abort(&self) -> Result<(), VcsError> {
        self.git_cmd(&["rebase", "--abort"])?;
        Ok(())
    }

    /// True while a rebase has stopped on conflicts.
    pub fn rebase_in_progress(&self) -> bool {
        let git_dir = self.path.join(".git");
        git_dir.join("rebase-merge").exists() || git_dir.join("rebase-apply").exists()
    }
}

fn run_git_in(dir: &Path, args: &[&str]) -> Result<String, VcsError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(VcsError::GitSpawn)?;
    if !output.status.success() {
        return Err(VcsError::GitCommand {
            args: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_bare_with_root_commit() {
        let dir = tempdir().unwrap();
        let trunk = GitRepository::create_bare_with_root_commit(dir.path().join("repo.git"))
            .unwrap();

        let tip = trunk.resolve(TRUNK_REF).unwrap();
        assert_eq!(trunk.commit_message(&tip).unwrap(), ROOT_COMMIT_MESSAGE);

        let log = trunk.log(TRUNK_REF, 10).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].message, ROOT_COMMIT_MESSAGE);
    }

    #[test]
    fn clone_checks_out_trunk() {
        let dir = tempdir().unwrap();
        let trunk =
            GitRepository::create_bare_with_root_commit(dir.path().join("repo.git")).unwrap();
        let view = trunk.clone_to(dir.path().join("view")).unwrap();

        assert_eq!(view.current_branch().unwrap(), TRUNK_BRANCH);
        assert!(view.ref_exists(ORIGIN_TRUNK_REF));
    }

    #[test]
    fn stage_and_commit_tree_round_trip() {
        let dir = tempdir().unwrap();
        let trunk =
            GitRepository::create_bare_with_root_commit(dir.path().join("repo.git")).unwrap();
        let view = trunk.clone_to(dir.path().join("view")).unwrap();

        std::fs::write(view.path().join("hello.txt"), "hi\n").unwrap();
        view.stage_all().unwrap();
        let tree = view.write_tree().unwrap();

        let parent = view.resolve(ORIGIN_TRUNK_REF).unwrap();
        let commit = view
            .commit_tree(&tree, &[&parent], "message", &CommitAuthor::snapshotter())
            .unwrap();

        assert_eq!(view.tree_of_commit(&commit).unwrap(), tree);
        assert!(view.is_ancestor(&parent, &commit).unwrap());
    }

    #[test]
    fn snapshot_ref_pushes_to_trunk() {
        let dir = tempdir().unwrap();
        let trunk =
            GitRepository::create_bare_with_root_commit(dir.path().join("repo.git")).unwrap();
        let view = trunk.clone_to(dir.path().join("view")).unwrap();

        std::fs::write(view.path().join("a.txt"), "a\n").unwrap();
        view.stage_all().unwrap();
        let tree = view.write_tree().unwrap();
        let parent = view.resolve(ORIGIN_TRUNK_REF).unwrap();
        let commit = view
            .commit_tree(&tree, &[&parent], "snap", &CommitAuthor::snapshotter())
            .unwrap();
        view.update_ref("refs/snapshots/ws-1", &commit).unwrap();
        view.push_ref("+refs/snapshots/ws-1:refs/snapshots/ws-1")
            .unwrap();

        assert_eq!(trunk.resolve("refs/snapshots/ws-1").unwrap(), commit);
    }

    #[test]
    fn apply_and_remove_patches_round_trip() {
        let dir = tempdir().unwrap();
        let trunk =
            GitRepository::create_bare_with_root_commit(dir.path().join("repo.git")).unwrap();
        let view = trunk.clone_to(dir.path().join("view")).unwrap();

        std::fs::write(view.path().join("f.txt"), "one\ntwo\nthree\n").unwrap();
        view.stage_all().unwrap();
        let before_tree = view.write_tree().unwrap();

        let patch = b"--- a/f.txt\n+++ b/f.txt\n@@ -1,3 +1,3 @@\n one\n-two\n+TWO\n three\n"
            .to_vec();

        view.apply_patches_to_workdir(std::slice::from_ref(&patch))
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(view.path().join("f.txt")).unwrap(),
            "one\nTWO\nthree\n"
        );

        view.remove_patches_from_workdir(std::slice::from_ref(&patch))
            .unwrap();
        assert_eq!(view.write_tree().unwrap(), before_tree);
    }

    #[test]
    fn failing_patch_aborts_batch_with_index() {
        let dir = tempdir().unwrap();
        let trunk =
            GitRepository::create_bare_with_root_commit(dir.path().join("repo.git")).unwrap();
        let view = trunk.clone_to(dir.path().join("view")).unwrap();

        std::fs::write(view.path().join("f.txt"), "one\ntwo\n").unwrap();
        view.stage_all().unwrap();

        let good = b"--- a/f.txt\n+++ b/f.txt\n@@ -1,2 +1,2 @@\n-one\n+ONE\n two\n".to_vec();
        let bad = b"--- a/f.txt\n+++ b/f.txt\n@@ -1,2 +1,2 @@\n one\n-nope\n+NOPE\n".to_vec();

        let err = view
            .apply_patches_to_workdir(&[good, bad])
            .unwrap_err();
        assert!(matches!(err, VcsError::PatchFailed { index: 1 }));

        // Nothing applied.
        assert_eq!(
            std::fs::read_to_string(view.path().join("f.txt")).unwrap(),
            "one\ntwo\n"
        );
    }

    #[test]
    fn rebase_conflict_leaves_markers() {
        let dir = tempdir().unwrap();
        let trunk =
            GitRepository::create_bare_with_root_commit(dir.path().join("repo.git")).unwrap();

        // Land a base file on trunk.
        let setup = trunk.clone_to(dir.path().join("setup")).unwrap();
        std::fs::write(setup.path().join("f.txt"), "base\n").unwrap();
        setup.stage_all().unwrap();
        let tree = setup.write_tree().unwrap();
        let root = setup.resolve(ORIGIN_TRUNK_REF).unwrap();
        let base = setup
            .commit_tree(&tree, &[&root], "base", &CommitAuthor::snapshotter())
            .unwrap();
        setup
            .update_ref("refs/heads/work", &base)
            .unwrap();
        setup.push_ref("+refs/heads/work:refs/heads/sturdytrunk").unwrap();

        // Two divergent edits of the same line.
        let view = trunk.clone_to(dir.path().join("view")).unwrap();
        std::fs::write(view.path().join("f.txt"), "mine\n").unwrap();
        view.stage_all().unwrap();
        let my_tree = view.write_tree().unwrap();
        let my_base = view.resolve(ORIGIN_TRUNK_REF).unwrap();
        let mine = view
            .commit_tree(&my_tree, &[&my_base], "mine", &CommitAuthor::snapshotter())
            .unwrap();

        let other = trunk.clone_to(dir.path().join("other")).unwrap();
        std::fs::write(other.path().join("f.txt"), "theirs\n").unwrap();
        other.stage_all().unwrap();
        let their_tree = other.write_tree().unwrap();
        let theirs = other
            .commit_tree(
                &their_tree,
                &[&my_base],
                "theirs",
                &CommitAuthor::snapshotter(),
            )
            .unwrap();
        other.update_ref("refs/heads/tmp", &theirs).unwrap();
        other
            .push_ref("+refs/heads/tmp:refs/heads/sturdytrunk")
            .unwrap();

        view.fetch_ref("+refs/heads/sturdytrunk:refs/remotes/origin/sturdytrunk")
            .unwrap();
        view.checkout_branch("ws", &mine).unwrap();
        let new_tip = view.resolve(ORIGIN_TRUNK_REF).unwrap();

        let outcome = view.rebase_onto(&new_tip, &my_base).unwrap();
        assert_eq!(outcome, RebaseOutcome::Conflicted);
        assert!(view.rebase_in_progress());

        let conflicted = std::fs::read_to_string(view.path().join("f.txt")).unwrap();
        assert!(conflicted.contains("<<<<<<<"));

        view.rebase_abort().unwrap();
        assert!(!view.rebase_in_progress());
    }
}
