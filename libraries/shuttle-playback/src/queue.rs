//! Playback queue
//!
//! Holds the tracks in ordinal (insertion) order plus a separate playback
//! order used for next/previous:
//!
//! ```text
//! items (ordinal):   [A] [B] [C] [D] [E]
//! order (shuffled):   2   0   3   1   4      -> C A D B E
//! position:                   ^              -> current = D
//! ```
//!
//! With shuffle off the playback order is the identity. With shuffle on it is
//! regenerated whenever the item set changes, but the current item always
//! keeps its slot.
//!
//! Every mutation that changes contents or position notifies the registered
//! [`QueueWatcher`]s.

use crate::error::{PlaybackError, Result};
use crate::observer::{ObserverList, QueueWatcher};
use crate::shuffle::{anchored_permutation, ordinal_order, Anchor};
use crate::types::{PlaybackConfig, QueueItem, QueueItemId, RepeatMode, Track};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::trace;

/// Ordered track sequence with shuffle and repeat
#[derive(Debug)]
pub struct Queue {
    /// Items in ordinal order
    items: Vec<QueueItem>,

    /// Playback order: indices into `items`
    order: Vec<usize>,

    /// Current slot in `order`; `None` iff the queue is empty
    position: Option<usize>,

    shuffle: bool,
    repeat: RepeatMode,

    /// Next queue item id to hand out
    next_id: u64,

    rng: StdRng,
    watchers: ObserverList<dyn QueueWatcher>,
}

impl Queue {
    /// Create new empty queue
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Create an empty queue with a deterministic shuffle
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    /// Create an empty queue using the initial modes from `config`
    pub fn from_config(config: &PlaybackConfig) -> Self {
        let mut queue = match config.shuffle_seed {
            Some(seed) => Self::with_seed(seed),
            None => Self::new(),
        };
        queue.shuffle = config.shuffle;
        queue.repeat = config.repeat;
        queue
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            items: Vec::new(),
            order: Vec::new(),
            position: None,
            shuffle: false,
            repeat: RepeatMode::Off,
            next_id: 0,
            rng,
            watchers: ObserverList::new(),
        }
    }

    // ===== Watchers =====

    /// Register a queue watcher
    pub fn add_watcher(&mut self, watcher: Arc<dyn QueueWatcher>) -> bool {
        self.watchers.add(watcher)
    }

    /// Unregister a queue watcher
    pub fn remove_watcher(&mut self, watcher: &Arc<dyn QueueWatcher>) -> bool {
        self.watchers.remove(watcher)
    }

    fn notify_changed(&self) {
        trace!(len = self.items.len(), position = ?self.position, "queue changed");
        for watcher in self.watchers.snapshot() {
            watcher.on_queue_changed();
        }
    }

    // ===== Contents =====

    /// Replace the queue wholesale
    ///
    /// `start_index` is an index into `tracks` and is clamped to bounds. With
    /// shuffle on, the start item is placed first in the new playback order.
    pub fn set(&mut self, tracks: Vec<Track>, start_index: usize) {
        self.items = tracks.into_iter().map(|track| self.wrap(track)).collect();

        let current = self
            .items
            .get(start_index.min(self.items.len().saturating_sub(1)))
            .map(|item| item.id);
        let slot = if self.shuffle { 0 } else { start_index };
        self.rebuild_order(current, slot);
        self.notify_changed();
    }

    /// Insert tracks before ordinal index `at` (clamped to the end)
    ///
    /// Returns the ids assigned to the new items. Inserting into an empty
    /// queue makes the first playback-order item current.
    pub fn insert(&mut self, tracks: Vec<Track>, at: usize) -> Vec<QueueItemId> {
        if tracks.is_empty() {
            return Vec::new();
        }

        let current = self.current_item().map(|item| item.id);
        let slot = self.position.unwrap_or(0);

        let at = at.min(self.items.len());
        let new_items: Vec<QueueItem> = tracks.into_iter().map(|track| self.wrap(track)).collect();
        let ids = new_items.iter().map(|item| item.id).collect();
        self.items.splice(at..at, new_items);

        self.rebuild_order(current, slot);
        self.notify_changed();
        ids
    }

    /// Append tracks at the end of the ordinal order
    pub fn append(&mut self, tracks: Vec<Track>) -> Vec<QueueItemId> {
        self.insert(tracks, self.items.len())
    }

    /// Remove items by id; unknown ids are ignored
    ///
    /// If the current item is removed, the item that followed it in playback
    /// order becomes current (or the new last item if it was at the end).
    /// Returns the number of items removed.
    pub fn remove(&mut self, ids: &[QueueItemId]) -> usize {
        let doomed: HashSet<QueueItemId> = ids.iter().copied().collect();
        let before = self.items.len();
        let current = self.current_item().map(|item| item.id);
        let slot = self.position.unwrap_or(0);

        let removed_before_slot = self.order[..slot.min(self.order.len())]
            .iter()
            .filter(|&&i| doomed.contains(&self.items[i].id))
            .count();
        let survivors: Vec<QueueItemId> = self
            .order
            .iter()
            .map(|&i| self.items[i].id)
            .filter(|id| !doomed.contains(id))
            .collect();

        self.items.retain(|item| !doomed.contains(&item.id));
        let removed = before - self.items.len();
        if removed == 0 {
            return 0;
        }

        let slot = slot - removed_before_slot;
        let anchor = match current {
            Some(id) if !doomed.contains(&id) => Some(id),
            _ => survivors
                .get(slot.min(survivors.len().saturating_sub(1)))
                .copied(),
        };

        self.rebuild_order(anchor, slot);
        self.notify_changed();
        removed
    }

    /// Remove everything
    pub fn clear(&mut self) {
        if self.items.is_empty() {
            return;
        }
        self.items.clear();
        self.order.clear();
        self.position = None;
        self.notify_changed();
    }

    /// Move the item at ordinal index `from` to ordinal index `to`
    ///
    /// The current item stays current. With shuffle on the playback order is
    /// left as it was.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.items.len();
        if from >= len {
            return Err(PlaybackError::IndexOutOfBounds(from));
        }
        if to >= len {
            return Err(PlaybackError::IndexOutOfBounds(to));
        }
        if from == to {
            return Ok(());
        }

        let playback_ids: Vec<QueueItemId> = self.order.iter().map(|&i| self.items[i].id).collect();
        let current = self.current_item().map(|item| item.id);

        let item = self.items.remove(from);
        self.items.insert(to, item);

        if self.shuffle {
            self.order = playback_ids
                .iter()
                .filter_map(|&id| self.index_of(id))
                .collect();
        } else {
            self.order = ordinal_order(len);
            self.position = current.and_then(|id| self.index_of(id));
        }

        self.notify_changed();
        Ok(())
    }

    // ===== Navigation =====

    /// Currently selected item
    pub fn current_item(&self) -> Option<&QueueItem> {
        self.position.map(|slot| &self.items[self.order[slot]])
    }

    /// Current slot in playback order
    pub fn current_index(&self) -> Option<usize> {
        self.position
    }

    /// Advance to the next item per repeat mode
    ///
    /// `ignore_repeat_one` moves past a repeat=one pin (explicit skip); with
    /// it set, repeat=one wraps like repeat=all. Returns `None`, leaving the
    /// position unchanged, when there is no next item.
    pub fn next(&mut self, ignore_repeat_one: bool) -> Option<&QueueItem> {
        let slot = self.position?;
        let len = self.order.len();

        let target = match self.repeat {
            RepeatMode::One if !ignore_repeat_one => Some(slot),
            RepeatMode::Off => (slot + 1 < len).then_some(slot + 1),
            RepeatMode::One | RepeatMode::All => Some((slot + 1) % len),
        }?;

        self.move_to(target);
        self.current_item()
    }

    /// Step back to the previous item per repeat mode
    ///
    /// Repeat=one always stays on the current item.
    pub fn previous(&mut self) -> Option<&QueueItem> {
        let slot = self.position?;
        let len = self.order.len();

        let target = match self.repeat {
            RepeatMode::One => Some(slot),
            RepeatMode::Off => slot.checked_sub(1),
            RepeatMode::All => Some((slot + len - 1) % len),
        }?;

        self.move_to(target);
        self.current_item()
    }

    /// Make the item with `id` current
    pub fn set_current(&mut self, id: QueueItemId) -> Result<&QueueItem> {
        let index = self.index_of(id).ok_or(PlaybackError::ItemNotFound(id))?;
        let slot = self
            .order
            .iter()
            .position(|&i| i == index)
            .ok_or(PlaybackError::ItemNotFound(id))?;

        self.move_to(slot);
        self.current_item().ok_or(PlaybackError::ItemNotFound(id))
    }

    fn move_to(&mut self, slot: usize) {
        if self.position != Some(slot) {
            self.position = Some(slot);
            self.notify_changed();
        }
    }

    // ===== Modes =====

    /// Enable or disable shuffle
    ///
    /// The current item never changes. Turning shuffle off restores ordinal
    /// order.
    pub fn set_shuffle(&mut self, enabled: bool) {
        if self.shuffle == enabled {
            return;
        }
        self.shuffle = enabled;

        let current = self.current_item().map(|item| item.id);
        let slot = self.position.unwrap_or(0);
        self.rebuild_order(current, slot);
        self.notify_changed();
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffle
    }

    /// Set repeat mode
    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        if self.repeat != mode {
            self.repeat = mode;
            self.notify_changed();
        }
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat
    }

    // ===== Queries =====

    /// Items in playback order
    pub fn items_in_order(&self) -> Vec<&QueueItem> {
        self.order.iter().map(|&i| &self.items[i]).collect()
    }

    /// Items in ordinal order
    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    /// Look up an item by id
    pub fn get(&self, id: QueueItemId) -> Option<&QueueItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    // ===== Internals =====

    fn wrap(&mut self, track: Track) -> QueueItem {
        let id = QueueItemId::new(self.next_id);
        self.next_id += 1;
        QueueItem { id, track }
    }

    fn index_of(&self, id: QueueItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    /// Recompute the playback order after the item set changed
    ///
    /// `current` is the item that must stay current; `slot` is where it sits in
    /// the playback order (only meaningful with shuffle on).
    fn rebuild_order(&mut self, current: Option<QueueItemId>, slot: usize) {
        let len = self.items.len();
        if len == 0 {
            self.order.clear();
            self.position = None;
            return;
        }

        let current_index = current.and_then(|id| self.index_of(id));

        if self.shuffle {
            let anchor = current_index.map(|item| Anchor {
                item,
                position: slot,
            });
            self.order = anchored_permutation(len, anchor, &mut self.rng);
            self.position = Some(match current_index {
                Some(_) => slot.min(len - 1),
                None => 0,
            });
        } else {
            self.order = ordinal_order(len);
            self.position = Some(current_index.unwrap_or(0));
        }
    }
}

impl Default for Queue {
    fn default() -> Self {
        Self::new()
    }
}
