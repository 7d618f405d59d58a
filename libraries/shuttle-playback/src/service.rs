//! Single-writer playback service
//!
//! Runs a [`PlaybackManager`] on its own thread. Everything that wants to
//! touch playback from elsewhere (UI, transport surface, backend callbacks)
//! goes through one FIFO channel:
//!
//! ```text
//! PlaybackHandle ──┐
//!                  ├──► channel ──► service thread ──► PlaybackManager
//! BackendEventSink ┘                    │
//!                                       └── recv_timeout(next progress tick)
//! ```
//!
//! Messages are applied one at a time, so a backend event that arrives while
//! a command is being handled is applied after it, and an observer
//! registered from inside a notification only sees later notifications.

use crate::{
    backend::{BackendEventSink, BackendNotification, PlaybackBackend},
    error::{PlaybackError, Result},
    manager::{PlaybackManager, PlaybackStatus},
    observer::{PlaybackObserver, ProgressObserver, QueueWatcher},
    transport::TransportCommand,
    types::{QueueItemId, RepeatMode, Track},
};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace};

/// Commands accepted by the playback service
pub enum PlaybackCommand {
    Load {
        tracks: Vec<Track>,
        queue_position: usize,
        seek_position_ms: i64,
        autoplay: bool,
    },
    Play,
    Pause,
    TogglePlayback,
    SkipToNext,
    SkipToPrev {
        force: bool,
    },
    SkipToItem(QueueItemId),
    Seek(i64),
    Transport(TransportCommand),

    AddToQueue {
        tracks: Vec<Track>,
        at: Option<usize>,
    },
    RemoveFromQueue(Vec<QueueItemId>),
    MoveQueueItem {
        from: usize,
        to: usize,
    },
    ClearQueue,
    SetShuffle(bool),
    SetRepeatMode(RepeatMode),

    AddObserver(Arc<dyn PlaybackObserver>),
    RemoveObserver(Arc<dyn PlaybackObserver>),
    AddProgressObserver(Arc<dyn ProgressObserver>),
    RemoveProgressObserver(Arc<dyn ProgressObserver>),
    AddQueueWatcher(Arc<dyn QueueWatcher>),
    RemoveQueueWatcher(Arc<dyn QueueWatcher>),

    ReplaceBackend(Box<dyn PlaybackBackend>),

    /// Reply with a status snapshot
    Status(Sender<PlaybackStatus>),

    /// Stop the service loop
    Shutdown,
}

impl fmt::Debug for PlaybackCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load {
                tracks,
                queue_position,
                seek_position_ms,
                autoplay,
            } => f
                .debug_struct("Load")
                .field("tracks", &tracks.len())
                .field("queue_position", queue_position)
                .field("seek_position_ms", seek_position_ms)
                .field("autoplay", autoplay)
                .finish(),
            Self::Play => f.write_str("Play"),
            Self::Pause => f.write_str("Pause"),
            Self::TogglePlayback => f.write_str("TogglePlayback"),
            Self::SkipToNext => f.write_str("SkipToNext"),
            Self::SkipToPrev { force } => f.debug_struct("SkipToPrev").field("force", force).finish(),
            Self::SkipToItem(id) => f.debug_tuple("SkipToItem").field(id).finish(),
            Self::Seek(position) => f.debug_tuple("Seek").field(position).finish(),
            Self::Transport(command) => f.debug_tuple("Transport").field(command).finish(),
            Self::AddToQueue { tracks, at } => f
                .debug_struct("AddToQueue")
                .field("tracks", &tracks.len())
                .field("at", at)
                .finish(),
            Self::RemoveFromQueue(ids) => f.debug_tuple("RemoveFromQueue").field(ids).finish(),
            Self::MoveQueueItem { from, to } => f
                .debug_struct("MoveQueueItem")
                .field("from", from)
                .field("to", to)
                .finish(),
            Self::ClearQueue => f.write_str("ClearQueue"),
            Self::SetShuffle(enabled) => f.debug_tuple("SetShuffle").field(enabled).finish(),
            Self::SetRepeatMode(mode) => f.debug_tuple("SetRepeatMode").field(mode).finish(),
            Self::AddObserver(_) => f.write_str("AddObserver"),
            Self::RemoveObserver(_) => f.write_str("RemoveObserver"),
            Self::AddProgressObserver(_) => f.write_str("AddProgressObserver"),
            Self::RemoveProgressObserver(_) => f.write_str("RemoveProgressObserver"),
            Self::AddQueueWatcher(_) => f.write_str("AddQueueWatcher"),
            Self::RemoveQueueWatcher(_) => f.write_str("RemoveQueueWatcher"),
            Self::ReplaceBackend(backend) => {
                f.debug_tuple("ReplaceBackend").field(&backend.name()).finish()
            }
            Self::Status(_) => f.write_str("Status"),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Everything the service loop receives
#[derive(Debug)]
pub(crate) enum ServiceMessage {
    Command(PlaybackCommand),
    Backend(BackendNotification),
}

/// Channel endpoints for a playback service that has not started yet
///
/// Create it first, hand [`Self::backend_sink`] to the backend, build the
/// manager, then [`Self::spawn`] it.
pub struct PlaybackService {
    tx: Sender<ServiceMessage>,
    rx: Receiver<ServiceMessage>,
}

impl PlaybackService {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Sink for backend events
    pub fn backend_sink(&self) -> BackendEventSink {
        BackendEventSink::new(self.tx.clone())
    }

    /// Command handle
    pub fn handle(&self) -> PlaybackHandle {
        PlaybackHandle {
            tx: self.tx.clone(),
        }
    }

    /// Run the service loop on a dedicated thread
    pub fn spawn(self, manager: PlaybackManager) -> Result<ServiceThread> {
        let handle = self.handle();
        let rx = self.rx;
        let join = thread::Builder::new()
            .name("playback".to_string())
            .spawn(move || run_loop(&rx, manager))?;

        Ok(ServiceThread { handle, join })
    }

    /// Run the service loop on the current thread until shutdown
    pub fn run(self, manager: PlaybackManager) -> PlaybackManager {
        let Self { tx, rx } = self;
        drop(tx);
        run_loop(&rx, manager)
    }
}

impl Default for PlaybackService {
    fn default() -> Self {
        Self::new()
    }
}

/// Running service thread
pub struct ServiceThread {
    handle: PlaybackHandle,
    join: JoinHandle<PlaybackManager>,
}

impl ServiceThread {
    pub fn handle(&self) -> PlaybackHandle {
        self.handle.clone()
    }

    /// Stop the loop and get the manager back
    pub fn shutdown(self) -> Result<PlaybackManager> {
        // The loop may already be gone; join reports that below
        let _ = self.handle.shutdown();
        self.join.join().map_err(|_| PlaybackError::ServiceStopped)
    }
}

/// Cloneable, thread-safe entry point to the playback service
///
/// Every method only enqueues; none waits for the command to be applied
/// except [`Self::status`]. Do not call `status` from inside an observer
/// callback: observers run on the service thread.
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    tx: Sender<ServiceMessage>,
}

impl PlaybackHandle {
    /// Enqueue a raw command
    pub fn send(&self, command: PlaybackCommand) -> Result<()> {
        self.tx
            .send(ServiceMessage::Command(command))
            .map_err(|_| PlaybackError::ServiceStopped)
    }

    pub fn load(
        &self,
        tracks: Vec<Track>,
        queue_position: usize,
        seek_position_ms: i64,
        autoplay: bool,
    ) -> Result<()> {
        self.send(PlaybackCommand::Load {
            tracks,
            queue_position,
            seek_position_ms,
            autoplay,
        })
    }

    pub fn play(&self) -> Result<()> {
        self.send(PlaybackCommand::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(PlaybackCommand::Pause)
    }

    pub fn toggle_playback(&self) -> Result<()> {
        self.send(PlaybackCommand::TogglePlayback)
    }

    pub fn skip_to_next(&self) -> Result<()> {
        self.send(PlaybackCommand::SkipToNext)
    }

    pub fn skip_to_prev(&self, force: bool) -> Result<()> {
        self.send(PlaybackCommand::SkipToPrev { force })
    }

    pub fn skip_to_item(&self, id: QueueItemId) -> Result<()> {
        self.send(PlaybackCommand::SkipToItem(id))
    }

    pub fn seek(&self, position_ms: i64) -> Result<()> {
        self.send(PlaybackCommand::Seek(position_ms))
    }

    /// Forward a command from the transport surface
    pub fn transport(&self, command: TransportCommand) -> Result<()> {
        self.send(PlaybackCommand::Transport(command))
    }

    pub fn add_to_queue(&self, tracks: Vec<Track>, at: Option<usize>) -> Result<()> {
        self.send(PlaybackCommand::AddToQueue { tracks, at })
    }

    pub fn remove_from_queue(&self, ids: Vec<QueueItemId>) -> Result<()> {
        self.send(PlaybackCommand::RemoveFromQueue(ids))
    }

    pub fn move_queue_item(&self, from: usize, to: usize) -> Result<()> {
        self.send(PlaybackCommand::MoveQueueItem { from, to })
    }

    pub fn clear_queue(&self) -> Result<()> {
        self.send(PlaybackCommand::ClearQueue)
    }

    pub fn set_shuffle(&self, enabled: bool) -> Result<()> {
        self.send(PlaybackCommand::SetShuffle(enabled))
    }

    pub fn set_repeat_mode(&self, mode: RepeatMode) -> Result<()> {
        self.send(PlaybackCommand::SetRepeatMode(mode))
    }

    pub fn add_observer(&self, observer: Arc<dyn PlaybackObserver>) -> Result<()> {
        self.send(PlaybackCommand::AddObserver(observer))
    }

    pub fn remove_observer(&self, observer: Arc<dyn PlaybackObserver>) -> Result<()> {
        self.send(PlaybackCommand::RemoveObserver(observer))
    }

    pub fn add_progress_observer(&self, observer: Arc<dyn ProgressObserver>) -> Result<()> {
        self.send(PlaybackCommand::AddProgressObserver(observer))
    }

    pub fn remove_progress_observer(&self, observer: Arc<dyn ProgressObserver>) -> Result<()> {
        self.send(PlaybackCommand::RemoveProgressObserver(observer))
    }

    pub fn add_queue_watcher(&self, watcher: Arc<dyn QueueWatcher>) -> Result<()> {
        self.send(PlaybackCommand::AddQueueWatcher(watcher))
    }

    pub fn remove_queue_watcher(&self, watcher: Arc<dyn QueueWatcher>) -> Result<()> {
        self.send(PlaybackCommand::RemoveQueueWatcher(watcher))
    }

    pub fn replace_backend(&self, backend: Box<dyn PlaybackBackend>) -> Result<()> {
        self.send(PlaybackCommand::ReplaceBackend(backend))
    }

    /// Current status, after every previously sent message has been applied
    pub fn status(&self) -> Result<PlaybackStatus> {
        let (reply_tx, reply_rx) = bounded(1);
        self.send(PlaybackCommand::Status(reply_tx))?;
        reply_rx.recv().map_err(|_| PlaybackError::ServiceStopped)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(PlaybackCommand::Shutdown)
    }
}

fn run_loop(rx: &Receiver<ServiceMessage>, mut manager: PlaybackManager) -> PlaybackManager {
    info!("playback service started");

    loop {
        let message = match manager.time_until_next_tick() {
            Some(timeout) => match rx.recv_timeout(timeout) {
                Ok(message) => Some(message),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(message) => Some(message),
                Err(_) => break,
            },
        };

        if let Some(message) = message {
            if dispatch(&mut manager, message).is_break() {
                break;
            }
        }

        manager.poll_timers();
    }

    info!("playback service stopped");
    manager
}

fn dispatch(manager: &mut PlaybackManager, message: ServiceMessage) -> ControlFlow<()> {
    let command = match message {
        ServiceMessage::Backend(notification) => {
            match manager.handle_backend_event(notification) {
                Err(PlaybackError::StaleCallback { received, current }) => {
                    trace!(%received, %current, "discarding stale backend event");
                }
                Err(err) => debug!(%err, "backend event not applied"),
                Ok(()) => {}
            }
            return ControlFlow::Continue(());
        }
        ServiceMessage::Command(command) => command,
    };

    trace!(?command, "playback command");
    let result = match command {
        PlaybackCommand::Load {
            tracks,
            queue_position,
            seek_position_ms,
            autoplay,
        } => {
            manager.load(tracks, queue_position, seek_position_ms, autoplay);
            Ok(())
        }
        PlaybackCommand::Play => manager.play(),
        PlaybackCommand::Pause => {
            manager.pause();
            Ok(())
        }
        PlaybackCommand::TogglePlayback => manager.toggle_playback(),
        PlaybackCommand::SkipToNext => manager.skip_to_next(),
        PlaybackCommand::SkipToPrev { force } => manager.skip_to_prev(force),
        PlaybackCommand::SkipToItem(id) => manager.skip_to_item(id),
        PlaybackCommand::Seek(position_ms) => {
            manager.seek(position_ms);
            Ok(())
        }
        PlaybackCommand::Transport(command) => manager.handle_transport(command),
        PlaybackCommand::AddToQueue { tracks, at } => {
            manager.add_to_queue(tracks, at);
            Ok(())
        }
        PlaybackCommand::RemoveFromQueue(ids) => {
            manager.remove_from_queue(&ids);
            Ok(())
        }
        PlaybackCommand::MoveQueueItem { from, to } => manager.move_queue_item(from, to),
        PlaybackCommand::ClearQueue => {
            manager.clear_queue();
            Ok(())
        }
        PlaybackCommand::SetShuffle(enabled) => {
            manager.set_shuffle(enabled);
            Ok(())
        }
        PlaybackCommand::SetRepeatMode(mode) => {
            manager.set_repeat_mode(mode);
            Ok(())
        }
        PlaybackCommand::AddObserver(observer) => {
            manager.add_observer(observer);
            Ok(())
        }
        PlaybackCommand::RemoveObserver(observer) => {
            manager.remove_observer(&observer);
            Ok(())
        }
        PlaybackCommand::AddProgressObserver(observer) => {
            manager.add_progress_observer(observer);
            Ok(())
        }
        PlaybackCommand::RemoveProgressObserver(observer) => {
            manager.remove_progress_observer(&observer);
            Ok(())
        }
        PlaybackCommand::AddQueueWatcher(watcher) => {
            manager.add_queue_watcher(watcher);
            Ok(())
        }
        PlaybackCommand::RemoveQueueWatcher(watcher) => {
            manager.remove_queue_watcher(&watcher);
            Ok(())
        }
        PlaybackCommand::ReplaceBackend(backend) => {
            // Dropped on this thread once paused
            drop(manager.replace_backend(backend));
            Ok(())
        }
        PlaybackCommand::Status(reply) => {
            // Caller may have given up waiting
            let _ = reply.send(manager.status());
            Ok(())
        }
        PlaybackCommand::Shutdown => return ControlFlow::Break(()),
    };

    if let Err(err) = result {
        debug!(%err, "command had no effect");
    }
    ControlFlow::Continue(())
}
