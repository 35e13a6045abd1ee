// bus.rs — At-least-once in-process pub/sub keyed by topic.
//
// Topics are scoped to one entity (`codebase:<id>`, `workspace:<id>`,
// `view:<id>`). Publishing is non-blocking; with `sync()` set (test mode)
// the publisher waits for every subscriber to ack its delivery. Per
// subscriber, messages from one publisher arrive in FIFO order. Dropping a
// subscription unsubscribes.

use std::collections::HashMap;
use std::fmt;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What changed. The payload of the enclosing [`Event`] names the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    WorkspaceUpdated,
    WorkspaceUpdatedSnapshot,
    WorkspaceUpdatedSuggestion,
    ViewUpdated,
    ViewStatusUpdated,
    CodebaseUpdated,
    GitHubPrUpdated,
}

/// One message on the bus. The payload is a reference to the entity that
/// changed (an id, JSON-encoded on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub payload: String,
}

impl Event {
    pub fn new(kind: EventKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }
}

/// A topic scopes events to one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Codebase(Uuid),
    Workspace(Uuid),
    View(Uuid),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Codebase(id) => write!(f, "codebase:{id}"),
            Topic::Workspace(id) => write!(f, "workspace:{id}"),
            Topic::View(id) => write!(f, "view:{id}"),
        }
    }
}

/// A delivered event, plus the ack the publisher may be waiting on.
pub struct Delivery {
    pub event: Event,
    ack: Option<Sender<()>>,
}

impl Delivery {
    /// Acknowledge receipt. A no-op unless the bus is in sync mode.
    pub fn ack(&self) {
        if let Some(ack) = &self.ack {
            let _ = ack.send(());
        }
    }
}

struct SubscriberEntry {
    id: u64,
    sender: Sender<Delivery>,
}

#[derive(Default)]
struct BusInner {
    subscribers: HashMap<String, Vec<SubscriberEntry>>,
    next_id: u64,
}

/// The in-process event bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
    sync: bool,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(BusInner::default())),
            sync: false,
        }
    }

    /// Testing mode: `publish` waits for every subscriber to ack.
    pub fn sync(mut self) -> Self {
        self.sync = true;
        self
    }

    /// Subscribe to a topic. The subscription unsubscribes on drop.
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        let (sender, receiver) = channel();
        let mut inner = self.inner.lock().expect("bus lock poisoned");
        inner.next_id += 1;
        let id = inner.next_id;
        inner
            .subscribers
            .entry(topic.to_string())
            .or_default()
            .push(SubscriberEntry { id, sender });
        Subscription {
            bus: Arc::clone(&self.inner),
            topic: topic.to_string(),
            id,
            receiver,
        }
    }

    /// Publish an event to all current subscribers of the topic.
    pub fn publish(&self, topic: Topic, event: Event) {
        let key = topic.to_string();
        let mut acks = Vec::new();
        {
            let mut inner = self.inner.lock().expect("bus lock poisoned");
            let Some(entries) = inner.subscribers.get_mut(&key) else {
                return;
            };
            // Disconnected subscribers are pruned as they are discovered.
            entries.retain(|entry| {
                let ack = if self.sync {
                    let (ack_tx, ack_rx) = channel();
                    acks.push(ack_rx);
                    Some(ack_tx)
                } else {
                    None
                };
                entry
                    .sender
                    .send(Delivery {
                        event: event.clone(),
                        ack,
                    })
                    .is_ok()
            });
        }

        for ack in acks {
            // A subscriber dropped mid-delivery counts as acked.
            let _ = ack.recv();
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A live subscription; receives deliveries until dropped.
pub struct Subscription {
    bus: Arc<Mutex<BusInner>>,
    topic: String,
    id: u64,
    receiver: Receiver<Delivery>,
}

impl Subscription {
    pub fn receiver(&self) -> &Receiver<Delivery> {
        &self.receiver
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.bus.lock() {
            if let Some(entries) = inner.subscribers.get_mut(&self.topic) {
                entries.retain(|entry| entry.id != self.id);
            }
        }
    }
}
