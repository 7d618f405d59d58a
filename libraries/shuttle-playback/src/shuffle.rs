//! Shuffle permutation generation
//!
//! The queue never reorders its items when shuffling; it keeps a separate
//! playback order (a permutation of item indices). The currently playing item
//! is the anchor: it keeps its slot in the playback order and everything else
//! is shuffled around it with Fisher-Yates.

use rand::seq::SliceRandom;
use rand::Rng;

/// Item that must not move when the permutation is regenerated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Anchor {
    /// Index of the item in ordinal order
    pub item: usize,

    /// Slot the item must occupy in the playback order
    pub position: usize,
}

/// Build a playback order for `len` items
///
/// Without an anchor this is a uniform random permutation. With one, the
/// anchor item lands at `min(anchor.position, len - 1)`.
pub(crate) fn anchored_permutation<R: Rng + ?Sized>(
    len: usize,
    anchor: Option<Anchor>,
    rng: &mut R,
) -> Vec<usize> {
    let anchor = anchor.filter(|a| a.item < len);

    let mut order: Vec<usize> = (0..len)
        .filter(|&i| anchor.map_or(true, |a| a.item != i))
        .collect();
    order.shuffle(rng);

    if let Some(anchor) = anchor {
        let slot = anchor.position.min(order.len());
        order.insert(slot, anchor.item);
    }

    order
}

/// Identity order, used when shuffle is off
pub(crate) fn ordinal_order(len: usize) -> Vec<usize> {
    (0..len).collect()
}
