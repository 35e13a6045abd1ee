//! # sturdy-events
//!
//! In-process messaging for Sturdy: a topic-keyed pub/sub [`EventBus`] that
//! fans entity-update events out to live subscribers, and a named
//! [`WorkQueue`] with single-consumer semantics used to move long-running
//! work (large snapshots, CI triggers) off request paths.
//!
//! Delivery is at-least-once within the process. Both carry JSON payloads
//! and have a `sync()` testing mode where publishers await acks.

pub mod bus;
pub mod error;
pub mod queue;

pub use bus::{Delivery, Event, EventBus, EventKind, Subscription, Topic};
pub use error::EventError;
pub use queue::{names, QueueMessage, WorkQueue};
