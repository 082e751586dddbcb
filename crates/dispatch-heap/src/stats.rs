//! Lifetime counters for a heap.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time view of a heap's counters.
///
/// Fields are read one by one, so a snapshot taken while producers and
/// consumers are active is not consistent across fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HeapStats {
    /// Items currently resident.
    pub len: u64,
    /// Configured capacity ceiling.
    pub max_len: u64,
    /// Items accepted by `insert`.
    pub inserted: u64,
    /// Items delivered to a consumer over the hand-off channel.
    pub extracted: u64,
    /// Items evicted by `remove`.
    pub removed: u64,
    /// Inserts that had to wait for a full drain first.
    pub overflow_drains: u64,
    /// Parked items put back into the heap, either displaced by a smaller
    /// arrival or still undelivered when the heap stopped.
    pub requeued: u64,
    /// Whether `stop` has been called.
    pub stopped: bool,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) inserted: AtomicU64,
    pub(crate) extracted: AtomicU64,
    pub(crate) removed: AtomicU64,
    pub(crate) overflow_drains: AtomicU64,
    pub(crate) requeued: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, len: u64, max_len: u64, stopped: bool) -> HeapStats {
        HeapStats {
            len,
            max_len,
            inserted: self.inserted.load(Ordering::Relaxed),
            extracted: self.extracted.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            overflow_drains: self.overflow_drains.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            stopped,
        }
    }
}
