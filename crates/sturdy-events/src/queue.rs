// queue.rs — Named work queues with single-consumer semantics.
//
// Queues carry JSON-encoded payloads over a bounded channel, so a publish
// into a full queue blocks until the consumer drains. Publishing into a
// queue nobody consumes is a no-op, matching fire-and-forget producers.
// With `sync()` set (test mode) the publisher waits for the consumer to
// ack each message.

use std::collections::HashMap;
use std::sync::mpsc::{channel, sync_channel, Receiver, Sender, SyncSender};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::EventError;

/// Queue names are snake-cased strings.
pub mod names {
    /// Asynchronous snapshotting of a view's working tree.
    pub const SNAPSHOT_WORKSPACE: &str = "snapshot_workspace";
    /// CI build triggers.
    pub const CI_BUILD_ENQUEUE: &str = "ci_build_enqueue";
}

const DEFAULT_CAPACITY: usize = 256;

/// One message popped off a queue.
pub struct QueueMessage {
    payload: Vec<u8>,
    ack: Option<Sender<()>>,
}

impl QueueMessage {
    /// Decode the JSON payload.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, EventError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }

    /// Acknowledge the message. A no-op unless the queue is in sync mode.
    pub fn ack(&self) {
        if let Some(ack) = &self.ack {
            let _ = ack.send(());
        }
    }
}

#[derive(Default)]
struct QueueInner {
    senders: HashMap<String, SyncSender<QueueMessage>>,
}

/// The in-process queue fabric.
#[derive(Clone)]
pub struct WorkQueue {
    inner: Arc<Mutex<QueueInner>>,
    capacity: usize,
    sync: bool,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(QueueInner::default())),
            capacity,
            sync: false,
        }
    }

    /// Testing mode: `publish` waits for the consumer to ack.
    pub fn sync(mut self) -> Self {
        self.sync = true;
        self
    }

    /// Become the single consumer of `name`.
    pub fn subscribe(&self, name: &str) -> Result<Receiver<QueueMessage>, EventError> {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        if inner.senders.contains_key(name) {
            return Err(EventError::AlreadySubscribed(name.to_string()));
        }
        let (sender, receiver) = sync_channel(self.capacity);
        inner.senders.insert(name.to_string(), sender);
        Ok(receiver)
    }

    /// Publish a message onto `name`. Blocks while the queue is full; a
    /// queue with no consumer swallows the message.
    pub fn publish<T: Serialize>(&self, name: &str, message: &T) -> Result<(), EventError> {
        let payload = serde_json::to_vec(message)?;

        let sender = {
            let inner = self.inner.lock().expect("queue lock poisoned");
            match inner.senders.get(name) {
                Some(sender) => sender.clone(),
                None => return Ok(()),
            }
        };

        let (ack_tx, ack_rx) = if self.sync {
            let (tx, rx) = channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        sender
            .send(QueueMessage {
                payload,
                ack: ack_tx,
            })
            .map_err(|_| EventError::Closed(name.to_string()))?;

        if let Some(ack_rx) = ack_rx {
            let _ = ack_rx.recv();
        }
        Ok(())
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}
