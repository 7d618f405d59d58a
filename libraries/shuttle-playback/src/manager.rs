//! Playback manager - core orchestration
//!
//! Owns the queue, the active backend and the playback state machine:
//!
//! ```text
//!            load / skip / completed
//!   Idle ─────────────► Loading ──prepared──► Playing ◄──play/pause──► Paused
//!    ▲                     │                     │
//!    │                  error                completed
//!    │                     ▼                     ▼
//!    └──queue exhausted── Error ──advance──► Loading ◄── Completed
//! ```
//!
//! Every method runs synchronously on the caller's context; the manager is
//! the single writer of queue and state. Use [`crate::PlaybackService`] to
//! reach it from other threads.

use crate::{
    backend::{BackendEvent, BackendNotification, PlaybackBackend},
    clock::{Clock, SystemClock},
    error::{PlaybackError, Result},
    observer::{ObserverList, PlaybackObserver, ProgressObserver, QueueWatcher},
    progress::ProgressMonitor,
    queue::Queue,
    transport::{NoTransport, TransportCommand, TransportControls},
    types::{
        Generation, PlaybackConfig, PlaybackState, ProgressSnapshot, QueueItem, QueueItemId,
        RepeatMode, Track,
    },
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Point-in-time view of the manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub current: Option<QueueItem>,
    pub current_index: Option<usize>,
    pub progress: ProgressSnapshot,
    pub queue_len: usize,
    pub repeat: RepeatMode,
    pub shuffle: bool,
    pub generation: Generation,
}

/// Central playback management
///
/// Orchestrates:
/// - Queue sequencing (shuffle, repeat)
/// - Backend commands and load generations
/// - State fan-out to playback observers
/// - Progress polling while playing
/// - Transport surface activity
pub struct PlaybackManager {
    config: PlaybackConfig,

    // State
    state: PlaybackState,
    queue: Queue,

    // Backend
    backend: Box<dyn PlaybackBackend>,
    generation: Generation,
    /// Whether the load in flight should start playing once prepared
    autoplay: bool,
    /// Backend failures in a row without a successful prepare
    consecutive_failures: usize,

    // Transport surface
    transport: Box<dyn TransportControls>,
    transport_active: bool,

    // Progress
    clock: Arc<dyn Clock>,
    monitor: ProgressMonitor,
    /// Lowest position the next emitted snapshot may report
    progress_floor: u64,

    // Observers
    observers: ObserverList<dyn PlaybackObserver>,
    progress_observers: ObserverList<dyn ProgressObserver>,
}

impl PlaybackManager {
    /// Create a manager around a queue and the initial backend
    pub fn new(config: PlaybackConfig, queue: Queue, backend: Box<dyn PlaybackBackend>) -> Self {
        let monitor = ProgressMonitor::new(config.progress_interval());
        Self {
            config,
            state: PlaybackState::Idle,
            queue,
            backend,
            generation: Generation::default(),
            autoplay: false,
            consecutive_failures: 0,
            transport: Box::new(NoTransport),
            transport_active: false,
            clock: Arc::new(SystemClock),
            monitor,
            progress_floor: 0,
            observers: ObserverList::new(),
            progress_observers: ObserverList::new(),
        }
    }

    /// Create a manager with an empty queue built from `config`
    pub fn with_backend(config: PlaybackConfig, backend: Box<dyn PlaybackBackend>) -> Self {
        let queue = Queue::from_config(&config);
        Self::new(config, queue, backend)
    }

    /// Attach the host's transport surface
    pub fn with_transport(mut self, transport: Box<dyn TransportControls>) -> Self {
        self.transport = transport;
        self.transport_active = false;
        self
    }

    /// Replace the time source (virtual clock in tests)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    // ===== Playback Control =====

    /// Replace the queue and start loading `queue_position`
    ///
    /// `seek_position_ms` is clamped to 0. An empty track list leaves the
    /// manager Idle.
    pub fn load(
        &mut self,
        tracks: Vec<Track>,
        queue_position: usize,
        seek_position_ms: i64,
        autoplay: bool,
    ) {
        debug!(
            tracks = tracks.len(),
            queue_position, seek_position_ms, autoplay, "load"
        );
        self.queue.set(tracks, queue_position);
        self.consecutive_failures = 0;

        if self.queue.is_empty() {
            self.settle_idle();
            return;
        }

        self.load_current(clamp_position(seek_position_ms), autoplay);
    }

    /// Start or resume playback
    pub fn play(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Playing => Ok(()),
            PlaybackState::Paused => {
                self.backend.play();
                self.transition(PlaybackState::Playing);
                Ok(())
            }
            PlaybackState::Loading => {
                // Applied when the prepare arrives
                self.autoplay = true;
                Ok(())
            }
            PlaybackState::Idle | PlaybackState::Completed | PlaybackState::Error(_) => {
                if self.queue.is_empty() {
                    return Err(PlaybackError::EmptyQueue);
                }
                self.load_current(0, true);
                Ok(())
            }
        }
    }

    /// Pause playback
    pub fn pause(&mut self) {
        match self.state {
            PlaybackState::Playing => {
                self.backend.pause();
                self.transition(PlaybackState::Paused);
            }
            PlaybackState::Loading => self.autoplay = false,
            _ => {}
        }
    }

    /// Pause if playing, otherwise play
    pub fn toggle_playback(&mut self) -> Result<()> {
        if self.state.is_playing() {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    /// Skip to the next queue item, past a repeat-one pin
    ///
    /// Keeps the current play/pause intent. At the end of a non-repeating
    /// queue this is a no-op.
    pub fn skip_to_next(&mut self) -> Result<()> {
        if self.queue.is_empty() {
            return Err(PlaybackError::EmptyQueue);
        }

        let autoplay = self.wants_playback();
        if self.queue.next(true).is_some() {
            self.load_current(0, autoplay);
        } else {
            debug!("skip to next: end of queue");
        }
        Ok(())
    }

    /// Go to the previous item, or restart the current one
    ///
    /// Navigates back when `force` is set or less than the restart threshold
    /// has elapsed; otherwise seeks the current track to 0. With nothing
    /// before the current item the track restarts.
    pub fn skip_to_prev(&mut self, force: bool) -> Result<()> {
        if self.queue.is_empty() {
            return Err(PlaybackError::EmptyQueue);
        }

        let elapsed = self.backend.position().unwrap_or(0);
        if force || elapsed < self.config.restart_threshold_ms {
            let autoplay = self.wants_playback();
            if self.queue.previous().is_some() {
                self.load_current(0, autoplay);
                return Ok(());
            }
        }

        self.seek(0);
        Ok(())
    }

    /// Make queue item `id` current and play it
    pub fn skip_to_item(&mut self, id: QueueItemId) -> Result<()> {
        self.queue.set_current(id)?;
        self.load_current(0, true);
        Ok(())
    }

    /// Seek within the current track
    ///
    /// The position is clamped to `[0, duration]`. One progress snapshot is
    /// emitted immediately.
    pub fn seek(&mut self, position_ms: i64) {
        if self.queue.is_empty() {
            return;
        }

        let mut target = clamp_position(position_ms);
        if let Some(duration) = self.backend.duration() {
            target = target.min(duration);
        }

        debug!(position_ms = target, "seek");
        self.backend.seek(target);
        self.progress_floor = target;
        self.emit_progress();
    }

    /// Apply a command from the transport surface
    pub fn handle_transport(&mut self, command: TransportCommand) -> Result<()> {
        debug!(?command, "transport command");
        match command {
            TransportCommand::Play => self.play(),
            TransportCommand::Pause => {
                self.pause();
                Ok(())
            }
            TransportCommand::TogglePlayback => self.toggle_playback(),
            TransportCommand::SkipNext => self.skip_to_next(),
            TransportCommand::SkipPrevious => self.skip_to_prev(false),
            TransportCommand::Seek(position_ms) => {
                self.seek(position_ms);
                Ok(())
            }
        }
    }

    // ===== Backend =====

    /// Apply an asynchronous backend event
    ///
    /// Events from a superseded load return [`PlaybackError::StaleCallback`]
    /// without touching any state.
    pub fn handle_backend_event(&mut self, notification: BackendNotification) -> Result<()> {
        if notification.generation != self.generation {
            return Err(PlaybackError::StaleCallback {
                received: notification.generation,
                current: self.generation,
            });
        }

        match notification.event {
            BackendEvent::Prepared => self.on_prepared(),
            BackendEvent::Completed => self.on_completed(),
            BackendEvent::Error(cause) => {
                let autoplay = self.wants_playback();
                if self.fail_current(cause) {
                    self.load_current(0, autoplay);
                }
            }
            BackendEvent::PlaystateChanged(is_playing) => self.on_backend_playstate(is_playing),
        }
        Ok(())
    }

    /// Swap the active backend
    ///
    /// The old backend is paused and returned; its pending events become
    /// stale. The current item is reloaded on the new backend at the old
    /// position, playing only if it was playing before.
    pub fn replace_backend(
        &mut self,
        backend: Box<dyn PlaybackBackend>,
    ) -> Box<dyn PlaybackBackend> {
        let resume = self.wants_playback();
        let position = self.backend.position().unwrap_or(0);
        let reload = !matches!(self.state, PlaybackState::Idle) && !self.queue.is_empty();

        self.backend.pause();
        let old = std::mem::replace(&mut self.backend, backend);
        info!(from = old.name(), to = self.backend.name(), "backend replaced");

        if reload {
            self.load_current(position, resume);
        } else {
            self.generation = self.generation.next();
        }
        old
    }

    fn on_prepared(&mut self) {
        if self.state != PlaybackState::Loading {
            warn!(state = %self.state, "prepared outside of loading, ignoring");
            return;
        }

        self.consecutive_failures = 0;
        for observer in self.observers.snapshot() {
            observer.on_playback_prepared();
        }

        if self.autoplay {
            self.backend.play();
            self.transition(PlaybackState::Playing);
        } else {
            self.transition(PlaybackState::Paused);
        }
        self.emit_progress();
    }

    fn on_completed(&mut self) {
        if !matches!(self.state, PlaybackState::Playing | PlaybackState::Paused) {
            warn!(state = %self.state, "completion outside of playback, ignoring");
            return;
        }

        let autoplay = self.wants_playback();
        let finished = self.queue.current_item().map(|item| item.track.clone());
        self.transition(PlaybackState::Completed);
        for observer in self.observers.snapshot() {
            observer.on_playback_complete(finished.as_ref());
        }

        if self.queue.next(false).is_some() {
            self.load_current(0, autoplay);
        } else {
            info!("queue finished");
            self.settle_idle();
        }
    }

    fn on_backend_playstate(&mut self, is_playing: bool) {
        if is_playing && self.state == PlaybackState::Paused {
            self.transition(PlaybackState::Playing);
        } else if !is_playing && self.state == PlaybackState::Playing {
            self.transition(PlaybackState::Paused);
        }
    }

    /// Record a failure of the current item and pick the next one
    ///
    /// Returns true if a next item became current and should be loaded.
    fn fail_current(&mut self, cause: String) -> bool {
        warn!(generation = %self.generation, %cause, "backend error");
        self.consecutive_failures += 1;
        self.transition(PlaybackState::Error(cause));

        if self.consecutive_failures >= self.queue.len() {
            info!(
                failures = self.consecutive_failures,
                "every queue item failed, giving up"
            );
            self.settle_idle();
            return false;
        }

        if self.queue.next(true).is_some() {
            true
        } else {
            self.settle_idle();
            false
        }
    }

    /// Load the current queue item on the backend
    ///
    /// Loads that fail synchronously are handled like backend errors and
    /// advance the queue.
    fn load_current(&mut self, seek_position_ms: u64, autoplay: bool) {
        let mut seek_position_ms = seek_position_ms;
        loop {
            let Some(track) = self.queue.current_item().map(|item| item.track.clone()) else {
                self.settle_idle();
                return;
            };

            self.generation = self.generation.next();
            self.autoplay = autoplay;
            self.progress_floor = seek_position_ms;
            info!(
                generation = %self.generation,
                track = %track.id,
                seek_position_ms,
                autoplay,
                "loading track"
            );
            self.transition(PlaybackState::Loading);

            match self
                .backend
                .load(&track, seek_position_ms, self.generation)
            {
                Ok(()) => return,
                Err(err) => {
                    if !self.fail_current(err.to_string()) {
                        return;
                    }
                    seek_position_ms = 0;
                }
            }
        }
    }

    /// Go Idle and abandon the load in flight
    ///
    /// Events still pending for that load become stale.
    fn settle_idle(&mut self) {
        self.generation = self.generation.next();
        if self.backend.is_playing() {
            self.backend.pause();
        }
        self.transition(PlaybackState::Idle);
    }

    fn wants_playback(&self) -> bool {
        match self.state {
            PlaybackState::Playing => true,
            PlaybackState::Loading => self.autoplay,
            _ => false,
        }
    }

    // ===== State fan-out =====

    fn transition(&mut self, state: PlaybackState) {
        if self.state == state {
            return;
        }

        let was_playing = self.state.is_playing();
        debug!(from = %self.state, to = %state, "playback state changed");
        self.state = state;

        for observer in self.observers.snapshot() {
            observer.on_state_changed(&self.state);
        }

        let is_playing = self.state.is_playing();
        if was_playing != is_playing {
            for observer in self.observers.snapshot() {
                observer.on_playstate_changed(is_playing);
            }
        }

        self.sync_transport();
        self.update_monitor();
    }

    /// Keep the transport surface active iff playing
    ///
    /// Transient states (Loading, Completed, Error) leave it as it is.
    fn sync_transport(&mut self) {
        let active = match self.state {
            PlaybackState::Playing => true,
            PlaybackState::Paused | PlaybackState::Idle => false,
            PlaybackState::Loading | PlaybackState::Completed | PlaybackState::Error(_) => return,
        };

        if active != self.transport_active {
            self.transport_active = active;
            self.transport.set_active(active);
        }
    }

    // ===== Progress =====

    /// Run the progress monitor if it is due
    ///
    /// Called by the owning loop after every message and whenever
    /// [`Self::time_until_next_tick`] elapses.
    pub fn poll_timers(&mut self) {
        if self.monitor.poll(self.clock.now()) {
            self.emit_progress();
        }
    }

    /// Time until the progress monitor needs polling, `None` while stopped
    pub fn time_until_next_tick(&self) -> Option<Duration> {
        self.monitor.time_until_due(self.clock.now())
    }

    /// The monitor runs iff playing with at least one progress observer
    fn update_monitor(&mut self) {
        if self.state.is_playing() && !self.progress_observers.is_empty() {
            self.monitor.start(self.clock.now());
        } else {
            self.monitor.stop();
        }
    }

    fn emit_progress(&mut self) {
        let raw = self.progress();
        let position_ms = raw.position_ms.max(self.progress_floor);
        self.progress_floor = position_ms;

        for observer in self.progress_observers.snapshot() {
            observer.on_progress_changed(position_ms, raw.duration_ms);
        }
    }

    // ===== Observers =====

    /// Register a playback-state observer
    pub fn add_observer(&mut self, observer: Arc<dyn PlaybackObserver>) -> bool {
        self.observers.add(observer)
    }

    pub fn remove_observer(&mut self, observer: &Arc<dyn PlaybackObserver>) -> bool {
        self.observers.remove(observer)
    }

    /// Register a progress observer (may start the progress monitor)
    pub fn add_progress_observer(&mut self, observer: Arc<dyn ProgressObserver>) -> bool {
        let added = self.progress_observers.add(observer);
        self.update_monitor();
        added
    }

    /// Unregister a progress observer (may stop the progress monitor)
    pub fn remove_progress_observer(&mut self, observer: &Arc<dyn ProgressObserver>) -> bool {
        let removed = self.progress_observers.remove(observer);
        self.update_monitor();
        removed
    }

    pub fn add_queue_watcher(&mut self, watcher: Arc<dyn QueueWatcher>) -> bool {
        self.queue.add_watcher(watcher)
    }

    pub fn remove_queue_watcher(&mut self, watcher: &Arc<dyn QueueWatcher>) -> bool {
        self.queue.remove_watcher(watcher)
    }

    // ===== Queue Management =====

    /// Insert tracks at ordinal index `at`, or append when `None`
    ///
    /// Never starts playback on its own.
    pub fn add_to_queue(&mut self, tracks: Vec<Track>, at: Option<usize>) -> Vec<QueueItemId> {
        match at {
            Some(at) => self.queue.insert(tracks, at),
            None => self.queue.append(tracks),
        }
    }

    /// Remove queue items by id
    ///
    /// Removing the current item loads its successor, keeping the play/pause
    /// intent; removing everything settles in Idle.
    pub fn remove_from_queue(&mut self, ids: &[QueueItemId]) -> usize {
        let before = self.queue.current_item().map(|item| item.id);
        let removed = self.queue.remove(ids);
        let after = self.queue.current_item().map(|item| item.id);

        if removed > 0 && before != after && self.state != PlaybackState::Idle {
            if after.is_some() {
                let autoplay = self.wants_playback();
                self.load_current(0, autoplay);
            } else {
                self.settle_idle();
            }
        }
        removed
    }

    /// Move a queue item in ordinal order
    pub fn move_queue_item(&mut self, from: usize, to: usize) -> Result<()> {
        self.queue.move_item(from, to)
    }

    /// Empty the queue and stop
    pub fn clear_queue(&mut self) {
        self.queue.clear();
        self.settle_idle();
    }

    pub fn set_shuffle(&mut self, enabled: bool) {
        self.queue.set_shuffle(enabled);
    }

    pub fn is_shuffled(&self) -> bool {
        self.queue.is_shuffled()
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.queue.set_repeat_mode(mode);
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.queue.repeat_mode()
    }

    // ===== State Queries =====

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    /// Elapsed position reported by the backend
    pub fn position(&self) -> Option<u64> {
        self.backend.position()
    }

    /// Duration reported by the backend
    pub fn duration(&self) -> Option<u64> {
        self.backend.duration()
    }

    /// Fresh progress reading; missing values read as 0
    pub fn progress(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            position_ms: self.backend.position().unwrap_or(0),
            duration_ms: self.backend.duration().unwrap_or(0),
        }
    }

    pub fn current_item(&self) -> Option<&QueueItem> {
        self.queue.current_item()
    }

    /// Queue items in playback order
    pub fn queue_items(&self) -> Vec<&QueueItem> {
        self.queue.items_in_order()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Generation of the most recent load
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_monitoring_progress(&self) -> bool {
        self.monitor.is_running()
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Snapshot of everything a UI needs
    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            state: self.state.clone(),
            current: self.queue.current_item().cloned(),
            current_index: self.queue.current_index(),
            progress: self.progress(),
            queue_len: self.queue.len(),
            repeat: self.queue.repeat_mode(),
            shuffle: self.queue.is_shuffled(),
            generation: self.generation,
        }
    }
}

fn clamp_position(position_ms: i64) -> u64 {
    u64::try_from(position_ms).unwrap_or(0)
}
