//! Playback backend capability
//!
//! Decoding and output live behind [`PlaybackBackend`]. The manager owns
//! exactly one backend at a time and swaps it, never shares it.
//!
//! Backends answer asynchronously: preparation, completion and failures are
//! reported through a [`BackendEventSink`], tagged with the [`Generation`] of
//! the load they belong to. Events for anything but the latest load are
//! discarded by the manager.

use crate::error::Result;
use crate::service::ServiceMessage;
use crate::types::{Generation, Track};
use crossbeam_channel::Sender;
use tracing::debug;

/// Platform audio backend
///
/// Implementors must not start audio on their own after `load`; the manager
/// issues `play()` once the track is prepared and autoplay was requested.
pub trait PlaybackBackend: Send {
    /// Start preparing `track`, positioned at `seek_position_ms`
    ///
    /// Completion is reported with [`BackendEvent::Prepared`] carrying
    /// `generation`. An `Err` means the load could not even be started and is
    /// handled like an asynchronous [`BackendEvent::Error`].
    fn load(&mut self, track: &Track, seek_position_ms: u64, generation: Generation) -> Result<()>;

    /// Start or resume audio
    fn play(&mut self);

    /// Pause audio
    fn pause(&mut self);

    /// Seek within the loaded track
    fn seek(&mut self, position_ms: u64);

    /// Elapsed position, if a track is loaded
    fn position(&self) -> Option<u64>;

    /// Track duration, if known
    fn duration(&self) -> Option<u64>;

    /// Whether audio is currently running
    fn is_playing(&self) -> bool;

    /// Name used in logs
    fn name(&self) -> &str {
        "backend"
    }
}

/// Asynchronous report from a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    /// Track is ready to play
    Prepared,

    /// Track played to its end
    Completed,

    /// Decode or IO failure
    Error(String),

    /// Backend started or stopped audio on its own (e.g. device lost)
    PlaystateChanged(bool),
}

/// Backend event tagged with its load generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendNotification {
    pub generation: Generation,
    pub event: BackendEvent,
}

impl BackendNotification {
    pub fn new(generation: Generation, event: BackendEvent) -> Self {
        Self { generation, event }
    }
}

/// Handle a backend uses to report events to the playback service
///
/// Cheap to clone; safe to use from any thread, including from inside the
/// backend's own `load()`.
#[derive(Debug, Clone)]
pub struct BackendEventSink {
    tx: Sender<ServiceMessage>,
}

impl BackendEventSink {
    pub(crate) fn new(tx: Sender<ServiceMessage>) -> Self {
        Self { tx }
    }

    /// Deliver an event
    ///
    /// Returns false if the service has stopped.
    pub fn send(&self, generation: Generation, event: BackendEvent) -> bool {
        let delivered = self
            .tx
            .send(ServiceMessage::Backend(BackendNotification::new(
                generation, event,
            )))
            .is_ok();
        if !delivered {
            debug!(%generation, "backend event dropped, service stopped");
        }
        delivered
    }

    pub fn prepared(&self, generation: Generation) -> bool {
        self.send(generation, BackendEvent::Prepared)
    }

    pub fn completed(&self, generation: Generation) -> bool {
        self.send(generation, BackendEvent::Completed)
    }

    pub fn error(&self, generation: Generation, cause: impl Into<String>) -> bool {
        self.send(generation, BackendEvent::Error(cause.into()))
    }

    pub fn playstate_changed(&self, generation: Generation, is_playing: bool) -> bool {
        self.send(generation, BackendEvent::PlaystateChanged(is_playing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn sink_tags_events_with_generation() {
        let (tx, rx) = unbounded();
        let sink = BackendEventSink::new(tx);

        assert!(sink.error(Generation::new(3), "corrupt frame"));

        match rx.try_recv() {
            Ok(ServiceMessage::Backend(notification)) => {
                assert_eq!(notification.generation, Generation::new(3));
                assert_eq!(
                    notification.event,
                    BackendEvent::Error("corrupt frame".to_string())
                );
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn sink_reports_stopped_service() {
        let (tx, rx) = unbounded();
        let sink = BackendEventSink::new(tx);
        drop(rx);

        assert!(!sink.prepared(Generation::new(1)));
    }
}
