//! # sturdy-snapshots
//!
//! Continuous backup of workspace working trees.
//!
//! Every meaningful edit in a view is materialized as a commit on
//! `refs/snapshots/<workspaceID>` — never fast-forwarded into trunk, never
//! pruned — so drafts survive view loss, can be time-travelled, and can be
//! diffed between peers.
//!
//! ## Key components
//!
//! - [`Snapshotter`] — creates snapshot commits (idempotent against an
//!   unchanged tree) and checks snapshots back out into views.
//! - [`SnapshotStore`] — one JSON record per snapshot; records chain via
//!   `previous_snapshot_id`.
//! - [`SnapshotterWorker`] — drains the `snapshot_workspace` queue so large
//!   snapshots stay off request paths.

pub mod error;
pub mod snapshot;
pub mod snapshotter;
pub mod store;
pub mod worker;

pub use error::SnapshotError;
pub use snapshot::{commit_message, snapshot_ref, Action, Snapshot};
pub use snapshotter::{SnapshotOptions, Snapshotter, WorkspaceHook};
pub use store::SnapshotStore;
pub use worker::{enqueue, SnapshotQueueEntry, SnapshotterWorker};
