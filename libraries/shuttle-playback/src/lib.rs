//! Shuttle - Playback Core
//!
//! Platform-agnostic playback orchestration for a local audio player.
//!
//! This crate provides:
//! - Playback queue with stable item ids, shuffle and repeat (Off, One, All)
//! - Playback state machine (Idle, Loading, Playing, Paused, Completed, Error)
//! - Load generations that discard stale backend callbacks
//! - Progress polling while playing (100 ms by default)
//! - Observer fan-out for state, progress and queue changes
//! - Transport surface bridge (media keys, lock screen)
//! - Single-writer service thread fed by a command channel
//!
//! # Architecture
//!
//! `shuttle-playback` knows nothing about decoding or audio output:
//! - Audio is produced by a [`PlaybackBackend`] supplied by the host
//! - Backend callbacks arrive through a [`BackendEventSink`]
//! - All state is owned by one [`PlaybackManager`], driven either directly or
//!   through a [`PlaybackService`] thread
//!
//! # Example: Driving the manager directly
//!
//! ```rust
//! use shuttle_playback::{
//!     BackendEvent, BackendNotification, Generation, PlaybackBackend, PlaybackConfig,
//!     PlaybackManager, PlaybackState, Result, Track,
//! };
//!
//! struct SilentBackend {
//!     playing: bool,
//! }
//!
//! impl PlaybackBackend for SilentBackend {
//!     fn load(&mut self, _track: &Track, _seek_ms: u64, _generation: Generation) -> Result<()> {
//!         Ok(())
//!     }
//!     fn play(&mut self) {
//!         self.playing = true;
//!     }
//!     fn pause(&mut self) {
//!         self.playing = false;
//!     }
//!     fn seek(&mut self, _position_ms: u64) {}
//!     fn position(&self) -> Option<u64> {
//!         Some(0)
//!     }
//!     fn duration(&self) -> Option<u64> {
//!         Some(180_000)
//!     }
//!     fn is_playing(&self) -> bool {
//!         self.playing
//!     }
//! }
//!
//! let mut manager = PlaybackManager::with_backend(
//!     PlaybackConfig::default(),
//!     Box::new(SilentBackend { playing: false }),
//! );
//!
//! let tracks = vec![
//!     Track::new("track1", "/music/one.flac"),
//!     Track::new("track2", "/music/two.flac"),
//! ];
//! manager.load(tracks, 0, 0, true);
//! assert_eq!(manager.state(), &PlaybackState::Loading);
//!
//! // The backend reports back with the generation it was loaded with
//! let generation = manager.generation();
//! manager
//!     .handle_backend_event(BackendNotification::new(generation, BackendEvent::Prepared))
//!     .unwrap();
//! assert_eq!(manager.state(), &PlaybackState::Playing);
//! ```
//!
//! # Example: Running as a service
//!
//! ```rust,no_run
//! use shuttle_playback::{PlaybackConfig, PlaybackManager, PlaybackService};
//! # use shuttle_playback::{Generation, PlaybackBackend, Result, Track};
//! # struct MyBackend;
//! # impl PlaybackBackend for MyBackend {
//! #     fn load(&mut self, _: &Track, _: u64, _: Generation) -> Result<()> { Ok(()) }
//! #     fn play(&mut self) {}
//! #     fn pause(&mut self) {}
//! #     fn seek(&mut self, _: u64) {}
//! #     fn position(&self) -> Option<u64> { None }
//! #     fn duration(&self) -> Option<u64> { None }
//! #     fn is_playing(&self) -> bool { false }
//! # }
//!
//! let service = PlaybackService::new();
//! let _sink = service.backend_sink(); // hand this to the backend
//!
//! let manager = PlaybackManager::with_backend(PlaybackConfig::default(), Box::new(MyBackend));
//! let thread = service.spawn(manager)?;
//!
//! let handle = thread.handle();
//! handle.play()?;
//! println!("{:?}", handle.status()?.state);
//!
//! thread.shutdown()?;
//! # Ok::<(), shuttle_playback::PlaybackError>(())
//! ```

mod backend;
mod clock;
mod error;
mod manager;
mod observer;
mod progress;
mod queue;
mod service;
mod shuffle;
mod transport;
pub mod types;

// Public exports
pub use backend::{BackendEvent, BackendEventSink, BackendNotification, PlaybackBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{PlaybackError, Result};
pub use manager::{PlaybackManager, PlaybackStatus};
pub use observer::{ObserverList, PlaybackObserver, ProgressObserver, QueueWatcher};
pub use progress::ProgressMonitor;
pub use queue::Queue;
pub use service::{PlaybackCommand, PlaybackHandle, PlaybackService, ServiceThread};
pub use transport::{NoTransport, TransportCommand, TransportControls};
pub use types::{
    Generation, PlaybackConfig, PlaybackState, ProgressSnapshot, QueueItem, QueueItemId,
    RepeatMode, Track, TrackId,
};
