//! Error types for playback management

use crate::types::{Generation, QueueItemId};
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Backend reported a decode or IO failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Queue is empty
    #[error("Queue is empty")]
    EmptyQueue,

    /// Backend event for a superseded load
    #[error("Stale backend callback from {received} (current {current})")]
    StaleCallback {
        /// Generation carried by the event
        received: Generation,
        /// Generation of the load in flight
        current: Generation,
    },

    /// Queue item is not (or no longer) in the queue
    #[error("Queue item not found: {0}")]
    ItemNotFound(QueueItemId),

    /// Index out of bounds
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    /// Service thread is gone
    #[error("Playback service stopped")]
    ServiceStopped,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
