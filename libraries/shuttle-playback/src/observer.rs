//! Observer traits and registration lists
//!
//! Three independent channels:
//! - [`PlaybackObserver`]: state transitions (low frequency)
//! - [`ProgressObserver`]: position ticks while playing (high frequency)
//! - [`QueueWatcher`]: queue contents or position changed
//!
//! Observers are called synchronously, in registration order, on the thread
//! that owns the manager. They must not block.

use crate::types::{PlaybackState, Track};
use std::fmt;
use std::sync::Arc;

/// Receives playback state transitions
///
/// All methods default to no-ops so implementors pick what they need.
pub trait PlaybackObserver: Send + Sync {
    /// Called once for every state transition
    fn on_state_changed(&self, _state: &PlaybackState) {}

    /// Called when the playing flag flips
    fn on_playstate_changed(&self, _is_playing: bool) {}

    /// Called when the backend finished preparing the current track
    fn on_playback_prepared(&self) {}

    /// Called when a track played to its end
    fn on_playback_complete(&self, _track: Option<&Track>) {}
}

/// Receives progress ticks
pub trait ProgressObserver: Send + Sync {
    /// Current position and total duration, in milliseconds
    fn on_progress_changed(&self, position_ms: u64, total_ms: u64);
}

/// Receives "queue changed" notifications
pub trait QueueWatcher: Send + Sync {
    /// Queue contents or current position changed
    fn on_queue_changed(&self);
}

/// Ordered, duplicate-free list of observers
///
/// Notification goes through [`ObserverList::snapshot`]: the list is copied
/// before iterating, so observers added or removed while a notification is
/// being delivered only affect later notifications.
pub struct ObserverList<T: ?Sized> {
    observers: Vec<Arc<T>>,
}

impl<T: ?Sized> ObserverList<T> {
    /// Create an empty list
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    /// Append an observer
    ///
    /// Returns false if the same `Arc` is already registered.
    pub fn add(&mut self, observer: Arc<T>) -> bool {
        if self.contains(&observer) {
            return false;
        }
        self.observers.push(observer);
        true
    }

    /// Remove an observer by pointer identity
    ///
    /// Returns false if it was not registered.
    pub fn remove(&mut self, observer: &Arc<T>) -> bool {
        let before = self.observers.len();
        self.observers.retain(|o| !same_object(o, observer));
        self.observers.len() != before
    }

    /// Whether this exact `Arc` is registered
    pub fn contains(&self, observer: &Arc<T>) -> bool {
        self.observers.iter().any(|o| same_object(o, observer))
    }

    /// Copy of the current registrations, in registration order
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.observers.clone()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn clear(&mut self) {
        self.observers.clear();
    }
}

// Compare data pointers only; vtable pointers for the same type may differ
// between codegen units.
fn same_object<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a).cast::<()>(),
        Arc::as_ptr(b).cast::<()>(),
    )
}

impl<T: ?Sized> Default for ObserverList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Clone for ObserverList<T> {
    fn clone(&self) -> Self {
        Self {
            observers: self.observers.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for ObserverList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverList")
            .field("len", &self.observers.len())
            .finish()
    }
}
