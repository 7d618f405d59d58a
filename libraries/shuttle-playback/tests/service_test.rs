//! Tests for the playback service thread
//!
//! Commands and backend events share one FIFO channel. A status request
//! doubles as a barrier: its reply is sent only after everything queued
//! before it has been applied.

mod common;

use common::*;
use shuttle_playback::{
    PlaybackConfig, PlaybackError, PlaybackHandle, PlaybackManager, PlaybackObserver,
    PlaybackService, PlaybackState, PlaybackStatus, RepeatMode, ServiceThread, TransportCommand,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn spawn_service() -> (ServiceThread, Arc<Mutex<BackendLog>>) {
    init_tracing();
    let service = PlaybackService::new();
    let (backend, log) = MockBackend::new("mock");
    let backend = backend.auto_prepare(service.backend_sink());
    let manager = PlaybackManager::with_backend(PlaybackConfig::default(), Box::new(backend));
    let thread = service.spawn(manager).unwrap();
    (thread, log)
}

/// Status after everything queued so far, including events those
/// messages produced, has been applied
fn settled_status(handle: &PlaybackHandle) -> PlaybackStatus {
    handle.status().unwrap();
    handle.status().unwrap()
}

#[test]
fn load_through_service_reaches_playing() {
    let (thread, log) = spawn_service();
    let handle = thread.handle();

    handle
        .load(create_tracks(&["a", "b"]), 0, 0, true)
        .unwrap();
    let status = settled_status(&handle);

    assert_eq!(status.state, PlaybackState::Playing);
    assert_eq!(status.queue_len, 2);
    assert_eq!(
        status.current.map(|item| item.track.id.as_str().to_string()),
        Some("a".to_string())
    );
    assert!(log.lock().unwrap().playing);

    thread.shutdown().unwrap();
}

#[test]
fn commands_apply_in_send_order() {
    let (thread, log) = spawn_service();
    let handle = thread.handle();

    handle
        .load(create_tracks(&["a", "b", "c"]), 0, 0, true)
        .unwrap();
    handle.set_repeat_mode(RepeatMode::All).unwrap();
    handle.skip_to_next().unwrap();
    handle.skip_to_next().unwrap();
    handle.skip_to_next().unwrap();
    let status = settled_status(&handle);

    assert_eq!(status.repeat, RepeatMode::All);
    assert_eq!(status.current_index, Some(0));
    assert_eq!(log.lock().unwrap().loaded_ids(), vec!["a", "b", "c", "a"]);

    thread.shutdown().unwrap();
}

#[test]
fn pause_and_transport_commands() {
    let (thread, log) = spawn_service();
    let handle = thread.handle();

    handle.load(create_tracks(&["a", "b"]), 0, 0, true).unwrap();
    settled_status(&handle);

    handle.pause().unwrap();
    assert_eq!(handle.status().unwrap().state, PlaybackState::Paused);

    handle.transport(TransportCommand::TogglePlayback).unwrap();
    assert_eq!(handle.status().unwrap().state, PlaybackState::Playing);

    handle.transport(TransportCommand::Seek(30_000)).unwrap();
    handle.status().unwrap();
    assert_eq!(log.lock().unwrap().seeks, vec![30_000]);

    thread.shutdown().unwrap();
}

#[test]
fn stale_events_from_service_sink_are_ignored() {
    init_tracing();
    let service = PlaybackService::new();
    let sink = service.backend_sink();
    let (backend, log) = MockBackend::new("mock");
    let backend = backend.auto_prepare(sink.clone());
    let manager = PlaybackManager::with_backend(PlaybackConfig::default(), Box::new(backend));
    let thread = service.spawn(manager).unwrap();
    let handle = thread.handle();

    handle.load(create_tracks(&["a"]), 0, 0, true).unwrap();
    let first = settled_status(&handle).generation;

    handle.load(create_tracks(&["b", "c"]), 0, 0, true).unwrap();
    let before = settled_status(&handle);
    assert_ne!(before.generation, first);

    // Late reports for the superseded load
    assert!(sink.completed(first));
    assert!(sink.error(first, "late decode error"));
    let after = handle.status().unwrap();

    assert_eq!(after, before);
    assert_eq!(log.lock().unwrap().loaded_ids(), vec!["a", "b"]);

    thread.shutdown().unwrap();
}

#[test]
fn completion_events_advance_queue() {
    let service = PlaybackService::new();
    let sink = service.backend_sink();
    let (backend, _) = MockBackend::new("mock");
    let backend = backend.auto_prepare(sink.clone());
    let manager = PlaybackManager::with_backend(PlaybackConfig::default(), Box::new(backend));
    let thread = service.spawn(manager).unwrap();
    let handle = thread.handle();

    let observer = Arc::new(RecordingObserver::default());
    handle.add_observer(observer.clone()).unwrap();
    handle.load(create_tracks(&["a", "b"]), 0, 0, true).unwrap();

    for _ in 0..2 {
        let generation = settled_status(&handle).generation;
        sink.completed(generation);
    }
    let status = settled_status(&handle);

    assert_eq!(status.state, PlaybackState::Idle);
    assert_eq!(
        observer.completed_tracks(),
        vec![Some("a".to_string()), Some("b".to_string())]
    );

    thread.shutdown().unwrap();
}

/// Registers `late` the first time it hears about any state change
struct RegisteringObserver {
    handle: PlaybackHandle,
    late: Arc<RecordingObserver>,
    registered: AtomicBool,
}

impl PlaybackObserver for RegisteringObserver {
    fn on_state_changed(&self, _state: &PlaybackState) {
        if !self.registered.swap(true, Ordering::SeqCst) {
            self.handle.add_observer(self.late.clone()).unwrap();
        }
    }
}

#[test]
fn observer_added_during_notification_misses_it() {
    let (thread, _) = spawn_service();
    let handle = thread.handle();
    let late = Arc::new(RecordingObserver::default());

    handle
        .add_observer(Arc::new(RegisteringObserver {
            handle: handle.clone(),
            late: late.clone(),
            registered: AtomicBool::new(false),
        }))
        .unwrap();
    handle.load(create_tracks(&["a"]), 0, 0, true).unwrap();
    settled_status(&handle);

    let states = late.states();
    assert!(!states.contains(&PlaybackState::Loading));
    assert_eq!(states, vec![PlaybackState::Playing]);

    thread.shutdown().unwrap();
}

#[test]
fn progress_ticks_while_playing() {
    let (thread, log) = spawn_service();
    let handle = thread.handle();
    let progress = Arc::new(RecordingProgress::default());

    handle.add_progress_observer(progress.clone()).unwrap();
    handle.load(create_tracks(&["a"]), 0, 0, true).unwrap();
    settled_status(&handle);
    log.lock().unwrap().position = Some(3_000);

    let deadline = Instant::now() + Duration::from_secs(5);
    while progress.count() < 4 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(progress.count() >= 4);

    let positions = progress.positions();
    assert!(positions.windows(2).all(|pair| pair[0] <= pair[1]));

    handle.pause().unwrap();
    handle.status().unwrap();
    let paused_at = progress.count();
    std::thread::sleep(Duration::from_millis(250));
    assert_eq!(progress.count(), paused_at);

    thread.shutdown().unwrap();
}

#[test]
fn shutdown_returns_manager() {
    let (thread, _) = spawn_service();
    let handle = thread.handle();
    handle
        .add_to_queue(create_tracks(&["a", "b", "c"]), None)
        .unwrap();

    let manager = thread.shutdown().unwrap();
    assert_eq!(manager.queue_len(), 3);
    assert_eq!(manager.state(), &PlaybackState::Idle);

    assert!(matches!(handle.play(), Err(PlaybackError::ServiceStopped)));
    assert!(matches!(handle.status(), Err(PlaybackError::ServiceStopped)));
}

#[test]
fn run_on_current_thread_until_shutdown() {
    let service = PlaybackService::new();
    let (backend, log) = MockBackend::new("mock");
    let manager = PlaybackManager::with_backend(PlaybackConfig::default(), Box::new(backend));
    let handle = service.handle();

    handle.load(create_tracks(&["a"]), 0, 1_500, false).unwrap();
    handle.shutdown().unwrap();

    let manager = service.run(manager);
    assert_eq!(manager.state(), &PlaybackState::Loading);
    assert_eq!(log.lock().unwrap().loads[0].1, 1_500);
}
