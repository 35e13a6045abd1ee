// worker.rs — Asynchronous snapshotting off the request path.
//
// Request handlers enqueue a SnapshotQueueEntry instead of snapshotting
// inline; a single consumer drains the `snapshot_workspace` queue, which
// preserves per-repository ordering without global serialization.

use std::sync::Arc;
use std::thread::JoinHandle;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sturdy_events::{names, EventError, WorkQueue};
use sturdy_vcs::OperationContext;

use crate::snapshot::Action;
use crate::snapshotter::Snapshotter;

/// One unit of snapshot work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotQueueEntry {
    pub codebase_id: Uuid,
    pub view_id: String,
    pub workspace_id: Uuid,
    pub action: Action,
}

/// Enqueue a snapshot for the worker.
pub fn enqueue(queue: &WorkQueue, entry: &SnapshotQueueEntry) -> Result<(), EventError> {
    queue.publish(names::SNAPSHOT_WORKSPACE, entry)
}

/// The single consumer of the `snapshot_workspace` queue.
pub struct SnapshotterWorker {
    queue: WorkQueue,
    snapshotter: Arc<Snapshotter>,
}

impl SnapshotterWorker {
    pub fn new(queue: WorkQueue, snapshotter: Arc<Snapshotter>) -> Self {
        Self { queue, snapshotter }
    }

    /// Subscribe and start draining on a background thread. The thread
    /// exits when every producer handle to the queue is gone.
    pub fn start(self) -> Result<JoinHandle<()>, EventError> {
        let receiver = self.queue.subscribe(names::SNAPSHOT_WORKSPACE)?;
        let snapshotter = self.snapshotter;

        Ok(std::thread::spawn(move || {
            while let Ok(message) = receiver.recv() {
                match message.decode::<SnapshotQueueEntry>() {
                    Ok(entry) => {
                        let ctx = OperationContext::new();
                        if let Err(err) = snapshotter.snapshot(
                            &ctx,
                            entry.codebase_id,
                            entry.workspace_id,
                            &entry.view_id,
                            entry.action,
                        ) {
                            tracing::error!(
                                workspace_id = %entry.workspace_id,
                                view_id = %entry.view_id,
                                error = %err,
                                "queued snapshot failed"
                            );
                        }
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "malformed snapshot queue entry");
                    }
                }
                message.ack();
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshotter::{SnapshotOptions, WorkspaceHook};
    use crate::store::SnapshotStore;
    use crate::SnapshotError;
    use sturdy_events::EventBus;
    use sturdy_vcs::{ExecutorProvider, RepoProvider};
    use tempfile::tempdir;

    struct NullHook;

    impl WorkspaceHook for NullHook {
        fn snapshot_created(
            &self,
            _workspace_id: Uuid,
            _snapshot_id: Uuid,
            _diffs_count: usize,
        ) -> Result<(), SnapshotError> {
            Ok(())
        }
    }

    #[test]
    fn queued_entry_produces_a_snapshot() {
        let dir = tempdir().unwrap();
        let provider = Arc::new(RepoProvider::new(dir.path().join("repos")));
        let codebase_id = Uuid::new_v4();
        provider.create_trunk(&codebase_id.to_string()).unwrap();
        let view = provider
            .create_view_clone(&codebase_id.to_string(), "v1")
            .unwrap();
        std::fs::write(view.path().join("f.txt"), "x\n").unwrap();

        let executors = Arc::new(ExecutorProvider::new(Arc::clone(&provider)));
        let store = Arc::new(SnapshotStore::new(dir.path().join("snapshots")).unwrap());
        let snapshotter = Arc::new(Snapshotter::new(
            executors,
            Arc::clone(&store),
            Arc::new(NullHook),
            EventBus::new(),
        ));

        // Sync queue: publish returns once the worker has acked.
        let queue = WorkQueue::new().sync();
        let worker = SnapshotterWorker::new(queue.clone(), Arc::clone(&snapshotter));
        let handle = worker.start().unwrap();

        let ws = Uuid::new_v4();
        enqueue(
            &queue,
            &SnapshotQueueEntry {
                codebase_id,
                view_id: "v1".to_string(),
                workspace_id: ws,
                action: Action::Snapshot,
            },
        )
        .unwrap();

        let latest = store.latest_by_workspace(ws).unwrap();
        assert!(latest.is_some());

        drop(queue);
        handle.join().unwrap();
    }

    #[test]
    fn second_worker_cannot_subscribe() {
        let queue = WorkQueue::new();
        let _rx = queue.subscribe(names::SNAPSHOT_WORKSPACE).unwrap();
        assert!(queue.subscribe(names::SNAPSHOT_WORKSPACE).is_err());
    }

    // SnapshotOptions is exercised end-to-end by the workspace services;
    // keep its builder honest here.
    #[test]
    fn snapshot_options_builders() {
        let marked = SnapshotOptions::mark_as_latest();
        let with_parent = SnapshotOptions::unmarked().with_parent_commit("abc");
        let debug = format!("{marked:?} {with_parent:?}");
        assert!(debug.contains("mark_as_latest: true"));
        assert!(debug.contains("abc"));
    }
}
