// error.rs — Error types for the event bus and work queues.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    /// Failed to encode or decode a message payload.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The queue already has a consumer; queues are single-consumer.
    #[error("queue {0} already has a consumer")]
    AlreadySubscribed(String),

    /// The consumer went away while a publish was waiting on it.
    #[error("queue {0} is closed")]
    Closed(String),
}
