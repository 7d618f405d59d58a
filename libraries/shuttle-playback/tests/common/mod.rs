//! Shared test infrastructure: mock backend, recording observers

use shuttle_playback::{
    BackendEvent, BackendEventSink, BackendNotification, Generation, PlaybackBackend,
    PlaybackError, PlaybackManager, PlaybackObserver, PlaybackState, ProgressObserver,
    QueueWatcher, Result, Track, TransportControls,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

static INIT: Once = Once::new();

/// Route tracing output through the test harness
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

pub const TRACK_DURATION_MS: u64 = 180_000;

pub fn create_test_track(id: &str) -> Track {
    let mut track = Track::new(id, format!("/music/{}.flac", id));
    track.title = format!("Track {}", id);
    track.artist = "Test Artist".to_string();
    track
}

pub fn create_tracks(ids: &[&str]) -> Vec<Track> {
    ids.iter().map(|id| create_test_track(id)).collect()
}

// ============================================================================
// Mock backend
// ============================================================================

/// Everything the mock backend was asked to do
#[derive(Debug, Default)]
pub struct BackendLog {
    /// (track id, seek position, generation) per load attempt
    pub loads: Vec<(String, u64, Generation)>,
    pub plays: usize,
    pub pauses: usize,
    pub seeks: Vec<u64>,
    pub playing: bool,
    pub position: Option<u64>,
    pub duration: Option<u64>,
    /// Track ids whose load fails synchronously
    pub failing: HashSet<String>,
}

impl BackendLog {
    pub fn loaded_ids(&self) -> Vec<String> {
        self.loads.iter().map(|(id, _, _)| id.clone()).collect()
    }
}

/// Backend that records calls and optionally reports `Prepared` right away
pub struct MockBackend {
    name: String,
    log: Arc<Mutex<BackendLog>>,
    sink: Option<BackendEventSink>,
}

impl MockBackend {
    pub fn new(name: &str) -> (Self, Arc<Mutex<BackendLog>>) {
        let log = Arc::new(Mutex::new(BackendLog::default()));
        let backend = Self {
            name: name.to_string(),
            log: log.clone(),
            sink: None,
        };
        (backend, log)
    }

    /// Report `Prepared` through `sink` from inside every successful load
    pub fn auto_prepare(mut self, sink: BackendEventSink) -> Self {
        self.sink = Some(sink);
        self
    }
}

impl PlaybackBackend for MockBackend {
    fn load(&mut self, track: &Track, seek_position_ms: u64, generation: Generation) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        log.loads
            .push((track.id.as_str().to_string(), seek_position_ms, generation));
        log.playing = false;

        if log.failing.contains(track.id.as_str()) {
            return Err(PlaybackError::Backend(format!(
                "cannot open {}",
                track.path.display()
            )));
        }

        log.position = Some(seek_position_ms);
        log.duration = Some(TRACK_DURATION_MS);
        drop(log);

        if let Some(sink) = &self.sink {
            sink.prepared(generation);
        }
        Ok(())
    }

    fn play(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.plays += 1;
        log.playing = true;
    }

    fn pause(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.pauses += 1;
        log.playing = false;
    }

    fn seek(&mut self, position_ms: u64) {
        let mut log = self.log.lock().unwrap();
        log.seeks.push(position_ms);
        log.position = Some(position_ms);
    }

    fn position(&self) -> Option<u64> {
        self.log.lock().unwrap().position
    }

    fn duration(&self) -> Option<u64> {
        self.log.lock().unwrap().duration
    }

    fn is_playing(&self) -> bool {
        self.log.lock().unwrap().playing
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Backend event helpers (direct manager use)
// ============================================================================

pub fn send_event(manager: &mut PlaybackManager, event: BackendEvent) {
    let generation = manager.generation();
    manager
        .handle_backend_event(BackendNotification::new(generation, event))
        .unwrap();
}

pub fn prepare(manager: &mut PlaybackManager) {
    send_event(manager, BackendEvent::Prepared);
}

pub fn complete(manager: &mut PlaybackManager) {
    send_event(manager, BackendEvent::Completed);
}

pub fn fail(manager: &mut PlaybackManager, cause: &str) {
    send_event(manager, BackendEvent::Error(cause.to_string()));
}

pub fn current_id(manager: &PlaybackManager) -> Option<String> {
    manager
        .current_item()
        .map(|item| item.track.id.as_str().to_string())
}

// ============================================================================
// Observers
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    State(PlaybackState),
    Playstate(bool),
    Prepared,
    Complete(Option<String>),
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn states(&self) -> Vec<PlaybackState> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::State(state) => Some(state),
                _ => None,
            })
            .collect()
    }

    pub fn completed_tracks(&self) -> Vec<Option<String>> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Complete(track) => Some(track),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl PlaybackObserver for RecordingObserver {
    fn on_state_changed(&self, state: &PlaybackState) {
        self.record(Event::State(state.clone()));
    }

    fn on_playstate_changed(&self, is_playing: bool) {
        self.record(Event::Playstate(is_playing));
    }

    fn on_playback_prepared(&self) {
        self.record(Event::Prepared);
    }

    fn on_playback_complete(&self, track: Option<&Track>) {
        self.record(Event::Complete(
            track.map(|track| track.id.as_str().to_string()),
        ));
    }
}

#[derive(Default)]
pub struct RecordingProgress {
    ticks: Mutex<Vec<(u64, u64)>>,
}

impl RecordingProgress {
    pub fn ticks(&self) -> Vec<(u64, u64)> {
        self.ticks.lock().unwrap().clone()
    }

    pub fn positions(&self) -> Vec<u64> {
        self.ticks().into_iter().map(|(position, _)| position).collect()
    }

    pub fn count(&self) -> usize {
        self.ticks.lock().unwrap().len()
    }
}

impl ProgressObserver for RecordingProgress {
    fn on_progress_changed(&self, position_ms: u64, total_ms: u64) {
        self.ticks.lock().unwrap().push((position_ms, total_ms));
    }
}

#[derive(Default)]
pub struct CountingWatcher {
    count: AtomicUsize,
}

impl CountingWatcher {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl QueueWatcher for CountingWatcher {
    fn on_queue_changed(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Transport surface that records every `set_active` call
pub struct RecordingTransport {
    calls: Arc<Mutex<Vec<bool>>>,
}

impl RecordingTransport {
    pub fn new() -> (Self, Arc<Mutex<Vec<bool>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl TransportControls for RecordingTransport {
    fn set_active(&mut self, active: bool) {
        self.calls.lock().unwrap().push(active);
    }
}
