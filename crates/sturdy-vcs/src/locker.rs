// locker.rs — Read/write locks keyed by (codebase, view).
//
// Trunk repositories are guarded by in-process RW-mutexes. Views use an
// advisory flock on `<view>/.git/sturdy.lock` so that the out-of-process
// file-sync agent can coordinate with us. A missing lock file (or a view
// whose `.git` is gone) is tolerated: there is nothing to coordinate with,
// so lock operations succeed as no-ops.
//
// Lock ordering: when an operation needs both, trunk is always taken before
// the view. Guards are RAII, so read-release is symmetric with read-acquire
// on every exit path.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use fs2::FileExt;
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{Mutex, RawRwLock, RwLock};

use crate::error::VcsError;
use crate::provider::{RepoProvider, VIEW_LOCK_FILE};

/// Hands out one lock singleton per `(codebase, view)` key for the lifetime
/// of the process.
pub struct Locker {
    provider: Arc<RepoProvider>,
    locks: Mutex<HashMap<String, RepoLock>>,
}

impl Locker {
    pub fn new(provider: Arc<RepoProvider>) -> Self {
        Self {
            provider,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The lock for a codebase's trunk (`view_id` = None) or for one of its
    /// views.
    pub fn get(&self, codebase_id: &str, view_id: Option<&str>) -> RepoLock {
        let key = match view_id {
            None => format!("{codebase_id}/trunk"),
            Some(view_id) => format!("{codebase_id}/{view_id}"),
        };

        let mut locks = self.locks.lock();
        if let Some(lock) = locks.get(&key) {
            return lock.clone();
        }

        let lock = match view_id {
            None => RepoLock::Memory(Arc::new(RwLock::new(()))),
            Some(view_id) => RepoLock::File(
                self.provider
                    .view_path(codebase_id, view_id)
                    .join(VIEW_LOCK_FILE),
            ),
        };
        locks.insert(key, lock.clone());
        lock
    }
}

/// A read/write lock over one repository.
#[derive(Clone)]
pub enum RepoLock {
    /// In-memory RW-mutex (trunk repositories).
    Memory(Arc<RwLock<()>>),
    /// Advisory flock on the view's lock file.
    File(PathBuf),
}

impl RepoLock {
    /// Take the lock shared. Blocks until available.
    pub fn read(&self) -> Result<LockGuard, VcsError> {
        match self {
            RepoLock::Memory(lock) => Ok(LockGuard::MemoryRead(lock.read_arc())),
            RepoLock::File(path) => flock(path, false),
        }
    }

    /// Take the lock exclusive. Blocks until available.
    pub fn write(&self) -> Result<LockGuard, VcsError> {
        match self {
            RepoLock::Memory(lock) => Ok(LockGuard::MemoryWrite(lock.write_arc())),
            RepoLock::File(path) => flock(path, true),
        }
    }
}

fn flock(path: &PathBuf, exclusive: bool) -> Result<LockGuard, VcsError> {
    let file = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(file) => file,
        // Nothing to coordinate with.
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(LockGuard::Null),
        Err(source) => {
            return Err(VcsError::IoError {
                path: path.clone(),
                source,
            })
        }
    };

    let locked = if exclusive {
        file.lock_exclusive()
    } else {
        file.lock_shared()
    };
    locked.map_err(|source| VcsError::IoError {
        path: path.clone(),
        source,
    })?;

    Ok(LockGuard::File(file))
}

/// Releases the underlying lock on drop.
pub enum LockGuard {
    MemoryRead(ArcRwLockReadGuard<RawRwLock, ()>),
    MemoryWrite(ArcRwLockWriteGuard<RawRwLock, ()>),
    File(std::fs::File),
    /// The lock file does not exist; nothing was locked.
    Null,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let LockGuard::File(file) = self {
            // Dropping the descriptor would release the flock anyway, but
            // unlock explicitly so errors are visible.
            if let Err(err) = file.unlock() {
                tracing::warn!(error = %err, "failed to release view lock");
            }
        }
    }
}
