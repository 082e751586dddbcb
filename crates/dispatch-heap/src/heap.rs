//! PriorityHeap - bounded min-heap with a background hand-off pump.
//!
//! Concurrency layout:
//! - One `Mutex` guards the heap vector, the ID index and the range buffer,
//!   so heap order and membership always change together
//! - Two `Condvar`s on that mutex: `available` wakes the pump when the heap
//!   becomes non-empty, `drained` wakes inserters waiting out an overflow
//! - An `AtomicU64` mirrors the length for lock-free `len()`; it is only
//!   written while the mutex is held
//! - A zero-capacity crossbeam channel carries extracted items to consumers;
//!   the pump thread owns its only `Sender` and parks one popped item on it

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Select, SendError, Sender};
use dispatch_models::Item;
use tracing::{debug, info, trace, warn};

use crate::config::HeapConfig;
use crate::error::{HeapError, Result};
use crate::ranges::{splice_out, IndexRanges};
use crate::stats::{Counters, HeapStats};

/// Returned by [`PriorityHeap::peek_priority`] when the heap is empty.
///
/// Valid priorities are expected to be non-negative; use
/// [`PriorityHeap::try_peek_priority`] when they are not.
pub const EMPTY_PRIORITY: i64 = -1;

/// Heap storage. Every method expects the caller to hold the mutex.
struct HeapState<T> {
    /// Implicit binary tree: children of `k` live at `2k + 1` and `2k + 2`.
    items: Vec<T>,
    /// IDs of every item in `items`.
    exists: HashSet<String>,
    /// Scratch buffer reused by `remove_group`.
    ranges: IndexRanges,
    stopped: bool,
}

impl<T: Item> HeapState<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            exists: HashSet::with_capacity(capacity),
            ranges: IndexRanges::new(),
            stopped: false,
        }
    }

    fn push(&mut self, item: T) {
        self.exists.insert(item.id().to_owned());
        self.items.push(item);
        self.sift_up(self.items.len() - 1);
    }

    fn pop_min(&mut self) -> Option<T> {
        if self.items.is_empty() {
            return None;
        }
        let last = self.items.len() - 1;
        self.items.swap(0, last);
        let item = self.items.pop()?;
        self.sift_down(0);
        self.exists.remove(item.id());
        Some(item)
    }

    /// Removes every item tagged `group_id`, then rebuilds heap order over
    /// the survivors.
    fn remove_group(&mut self, group_id: &str) -> Vec<T> {
        for (index, item) in self.items.iter().enumerate() {
            if item.group_id() == group_id {
                self.exists.remove(item.id());
                self.ranges.push(index);
            }
        }
        if self.ranges.is_empty() {
            return Vec::new();
        }

        let removed = splice_out(&mut self.items, &self.ranges);
        self.ranges.clear();
        self.heapify();
        removed
    }

    /// Equal priorities never swap.
    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if self.items[index].priority() < self.items[parent].priority() {
                self.items.swap(index, parent);
                index = parent;
            } else {
                break;
            }
        }
    }

    /// On equal children the left one is taken.
    fn sift_down(&mut self, mut index: usize) {
        let len = self.items.len();
        loop {
            let left = 2 * index + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let mut child = left;
            if right < len && self.items[right].priority() < self.items[left].priority() {
                child = right;
            }

            if self.items[child].priority() < self.items[index].priority() {
                self.items.swap(index, child);
                index = child;
            } else {
                break;
            }
        }
    }

    fn heapify(&mut self) {
        for index in (0..self.items.len() / 2).rev() {
            self.sift_down(index);
        }
    }

    #[cfg(test)]
    fn is_heap(&self) -> bool {
        (1..self.items.len())
            .all(|k| self.items[k].priority() >= self.items[(k - 1) / 2].priority())
    }
}

/// State shared between the handle and the pump thread.
struct Shared<T> {
    state: Mutex<HeapState<T>>,
    available: Condvar,
    drained: Condvar,
    len: AtomicU64,
    max_len: u64,
    counters: Counters,
}

impl<T: Item> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, HeapState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mirrors the vector length into the atomic. Call with the lock held.
    fn publish_len(&self, state: &HeapState<T>) {
        self.len.store(state.items.len() as u64, Ordering::Release);
        if state.items.is_empty() {
            self.drained.notify_all();
        }
    }

    /// Exchanges `held` for the resident minimum when that is strictly
    /// smaller, so a hand-off always carries the current minimum.
    fn take_smaller(&self, held: T) -> T {
        let mut state = self.lock();
        let smaller = state
            .items
            .first()
            .is_some_and(|front| front.priority() < held.priority());
        if !smaller {
            return held;
        }
        let Some(min) = state.pop_min() else {
            return held;
        };

        trace!(id = held.id(), by = min.id(), "held item displaced, requeueing");
        state.push(held);
        self.publish_len(&state);
        Counters::bump(&self.counters.requeued, 1);
        min
    }

    fn requeue(&self, item: T) {
        let mut state = self.lock();
        trace!(id = item.id(), "requeueing undelivered item");
        state.push(item);
        self.publish_len(&state);
        Counters::bump(&self.counters.requeued, 1);
    }
}

/// Background extractor: pops the minimum, then offers it on the hand-off
/// channel until a consumer takes it or stop fires.
struct Pump<T> {
    shared: Arc<Shared<T>>,
    handoff: Sender<T>,
    stop: Receiver<()>,
}

impl<T: Item> Pump<T> {
    fn run(self) {
        info!("extraction pump started");

        while let Some(item) = self.next_item() {
            if !self.hand_off(item) {
                break;
            }
        }

        // Dropping `self` drops the only sender, which closes the channel.
        info!("extraction pump stopping, closing hand-off channel");
    }

    /// Blocks while the heap is empty, then pops the minimum. Returns `None`
    /// once stopped.
    fn next_item(&self) -> Option<T> {
        let state = self.shared.lock();
        let mut state = self
            .shared
            .available
            .wait_while(state, |s| s.items.is_empty() && !s.stopped)
            .unwrap_or_else(PoisonError::into_inner);
        if state.stopped {
            return None;
        }

        let item = state.pop_min()?;
        self.shared.publish_len(&state);
        Some(item)
    }

    /// Parks on the send until a consumer (blocking or polling) takes the
    /// item, or the stop channel closes. Returns false when the pump should
    /// exit; an undelivered item goes back into the heap.
    fn hand_off(&self, item: T) -> bool {
        let mut select = Select::new();
        let send = select.send(&self.handoff);
        select.recv(&self.stop);

        let oper = select.select();
        if oper.index() != send {
            let _ = oper.recv(&self.stop);
            self.shared.requeue(item);
            return false;
        }

        let item = self.shared.take_smaller(item);
        match oper.send(&self.handoff, item) {
            Ok(()) => {
                Counters::bump(&self.shared.counters.extracted, 1);
                true
            }
            Err(SendError(item)) => {
                self.shared.requeue(item);
                false
            }
        }
    }
}

/// Thread-safe, bounded min-heap of [`Item`]s.
///
/// Lower `priority()` values come out first. Items are consumed through
/// [`extract_min_channel`](Self::extract_min_channel), which is fed by a
/// pump thread started in the constructor and stopped by
/// [`stop`](Self::stop), [`shutdown`](Self::shutdown) or drop.
///
/// # Capacity
///
/// `max_len` is a soft ceiling. An insert that finds `max_len` or more
/// items resident first waits until consumers have drained the heap to
/// empty, then inserts. Inserts are never rejected.
///
/// # Preconditions
///
/// - IDs must be unique among resident items.
/// - An item's ID, priority and group must not change while it is queued.
/// - After `stop`, nothing extracts any more; the heap only grows.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::thread;
/// use std::time::Duration;
///
/// use crossbeam_channel::{after, select};
/// use dispatch_heap::PriorityHeap;
/// use dispatch_models::Job;
///
/// let heap = Arc::new(PriorityHeap::with_max_len(100).unwrap());
///
/// let producer = Arc::clone(&heap);
/// thread::spawn(move || {
///     for priority in [30, 10, 20] {
///         producer.insert(Job::new("tenant-a", priority));
///     }
/// });
///
/// let jobs = heap.extract_min_channel();
/// let deadline = after(Duration::from_secs(1));
/// loop {
///     select! {
///         recv(jobs) -> job => match job {
///             Ok(job) => println!("running {} (priority {})", job.id, job.priority),
///             Err(_) => break, // heap stopped
///         },
///         recv(deadline) -> _ => break,
///     }
/// }
/// ```
pub struct PriorityHeap<T: Item + Send + 'static> {
    shared: Arc<Shared<T>>,
    handoff: Receiver<T>,
    stop_tx: Mutex<Option<Sender<()>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Item + Send + 'static> PriorityHeap<T> {
    /// Creates an empty heap and starts its pump thread.
    pub fn new(config: HeapConfig) -> Result<Self> {
        let capacity = config.initial_capacity();
        let shared = Arc::new(Shared {
            state: Mutex::new(HeapState::with_capacity(capacity)),
            available: Condvar::new(),
            drained: Condvar::new(),
            len: AtomicU64::new(0),
            max_len: config.max_len,
            counters: Counters::default(),
        });

        let (handoff_tx, handoff_rx) = crossbeam_channel::bounded(0);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(0);
        let pump = Pump {
            shared: Arc::clone(&shared),
            handoff: handoff_tx,
            stop: stop_rx,
        };

        let handle = thread::Builder::new()
            .name(config.pump_thread_name.clone())
            .spawn(move || pump.run())?;

        debug!(
            max_len = config.max_len,
            preallocated = capacity,
            thread = %config.pump_thread_name,
            "priority heap created"
        );

        Ok(Self {
            shared,
            handoff: handoff_rx,
            stop_tx: Mutex::new(Some(stop_tx)),
            pump: Mutex::new(Some(handle)),
        })
    }

    /// Creates a heap with default settings and the given capacity ceiling.
    pub fn with_max_len(max_len: u64) -> Result<Self> {
        Self::new(HeapConfig::new().with_max_len(max_len))
    }

    /// Adds an item.
    ///
    /// If `max_len` or more items are resident, first wakes the pump and
    /// blocks until the heap has been drained to empty (or stopped). The
    /// item is always inserted.
    pub fn insert(&self, item: T) {
        let shared = &*self.shared;
        let mut state = shared.lock();

        let resident = state.items.len() as u64;
        if resident > 0 && resident >= shared.max_len {
            Counters::bump(&shared.counters.overflow_drains, 1);
            debug!(resident, max_len = shared.max_len, "heap full, draining before insert");

            shared.available.notify_one();
            state = shared
                .drained
                .wait_while(state, |s| !s.items.is_empty() && !s.stopped)
                .unwrap_or_else(PoisonError::into_inner);

            if !state.items.is_empty() {
                warn!(
                    resident = state.items.len(),
                    "heap stopped during overflow drain, inserting anyway"
                );
            }
        }

        trace!(id = item.id(), priority = item.priority(), "insert");
        state.push(item);
        shared.publish_len(&state);
        Counters::bump(&shared.counters.inserted, 1);
        drop(state);

        shared.available.notify_one();
    }

    /// Whether an item with this ID is resident.
    pub fn exists(&self, id: &str) -> bool {
        self.shared.lock().exists.contains(id)
    }

    /// Priority of the current minimum, or [`EMPTY_PRIORITY`] when empty.
    pub fn peek_priority(&self) -> i64 {
        self.try_peek_priority().unwrap_or(EMPTY_PRIORITY)
    }

    /// Priority of the current minimum, if any.
    pub fn try_peek_priority(&self) -> Option<i64> {
        self.shared.lock().items.first().map(Item::priority)
    }

    /// Number of resident items, read without taking the lock.
    ///
    /// May lag an in-flight insert or remove, but is always a value the heap
    /// actually had.
    pub fn len(&self) -> u64 {
        self.shared.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_len(&self) -> u64 {
        self.shared.max_len
    }

    /// Evicts every item tagged `group_id` and returns them in storage
    /// order. Returns an empty vector when nothing matches.
    pub fn remove(&self, group_id: &str) -> Vec<T> {
        let mut state = self.shared.lock();
        let removed = state.remove_group(group_id);
        if removed.is_empty() {
            return removed;
        }

        self.shared.publish_len(&state);
        Counters::bump(&self.shared.counters.removed, removed.len() as u64);
        debug!(
            group_id,
            removed = removed.len(),
            remaining = state.items.len(),
            "evicted group"
        );
        removed
    }

    /// Receiving side of the hand-off channel.
    ///
    /// The pump keeps one popped item parked on the channel, so blocking
    /// receives, `try_recv` and `select!` with a `default` arm all work. The
    /// parked item is not resident: `len`, `exists` and `remove` do not see
    /// it. When a smaller item arrives while one is parked, the smaller one
    /// is handed over first and the parked one goes back into the heap.
    ///
    /// Each item is delivered to exactly one receiver. Once the heap is
    /// stopped the channel is closed, and `recv` returns an error instead of
    /// blocking; treat that as shutdown, not as "empty".
    pub fn extract_min_channel(&self) -> Receiver<T> {
        self.handoff.clone()
    }

    /// Signals the pump to exit and close the hand-off channel.
    ///
    /// Idempotent and asynchronous: the pump notices on its next wait. Items
    /// still resident stay in the heap, and a parked item is put back.
    pub fn stop(&self) {
        let Some(stop_tx) = self
            .stop_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };

        self.shared.lock().stopped = true;
        self.shared.available.notify_all();
        self.shared.drained.notify_all();
        drop(stop_tx);

        debug!(resident = self.len(), "stop requested");
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.lock().stopped
    }

    /// Stops the pump and waits for its thread to exit.
    ///
    /// Only the first call joins; later calls return `Ok(())`.
    pub fn shutdown(&self) -> Result<()> {
        self.stop();

        let handle = self
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            debug!("waiting for pump to stop");
            handle.join().map_err(|_| HeapError::PumpPanicked)?;
            info!("priority heap shut down");
        }

        Ok(())
    }

    pub fn stats(&self) -> HeapStats {
        let stopped = self.is_stopped();
        self.shared
            .counters
            .snapshot(self.len(), self.shared.max_len, stopped)
    }
}

impl<T: Item + Send + 'static> Drop for PriorityHeap<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::RecvTimeoutError;
    use dispatch_models::Job;
    use std::time::{Duration, Instant};

    const WAIT: Duration = Duration::from_secs(5);

    fn job(id: &str, group: &str, priority: i64) -> Job {
        Job::new(group, priority).with_id(id)
    }

    /// Deterministic pseudo-random priorities.
    fn priorities(count: usize, seed: u64) -> Vec<i64> {
        let mut x = seed;
        (0..count)
            .map(|_| {
                x = x.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((x >> 33) % 1000) as i64
            })
            .collect()
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + WAIT;
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Inserts `item` and waits for the pump to park it on the channel, so
    /// later inserts stay resident until a consumer shows up.
    fn park(heap: &PriorityHeap<Job>, item: Job) {
        heap.insert(item);
        wait_until(|| heap.is_empty());
    }

    fn state_with(priorities: &[i64], groups: &[&str]) -> HeapState<Job> {
        let mut state = HeapState::with_capacity(priorities.len());
        for (i, (&p, g)) in priorities.iter().zip(groups.iter().cycle()).enumerate() {
            state.push(job(&format!("j{i}"), g, p));
        }
        state
    }

    #[test]
    fn test_push_keeps_heap_order() {
        let prios = priorities(200, 7);
        let state = state_with(&prios, &["g"]);

        assert!(state.is_heap());
        assert_eq!(state.items.len(), 200);
        assert_eq!(state.exists.len(), 200);
        assert_eq!(state.items[0].priority, *prios.iter().min().unwrap());
    }

    #[test]
    fn test_pop_min_yields_sorted_order() {
        let mut prios = priorities(100, 11);
        let mut state = state_with(&prios, &["g"]);

        let mut popped = Vec::new();
        while let Some(item) = state.pop_min() {
            assert!(state.is_heap());
            assert!(!state.exists.contains(item.id.as_str()));
            popped.push(item.priority);
        }

        prios.sort_unstable();
        assert_eq!(popped, prios);
        assert!(state.exists.is_empty());
    }

    #[test]
    fn test_equal_priorities_do_not_swap_on_insert() {
        let mut state = HeapState::with_capacity(3);
        state.push(job("first", "g", 4));
        state.push(job("second", "g", 4));
        state.push(job("third", "g", 4));

        let order: Vec<&str> = state.items.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_sift_down_prefers_left_child_on_tie() {
        let mut state = HeapState::with_capacity(4);
        state.push(job("root", "g", 1));
        state.push(job("left", "g", 5));
        state.push(job("right", "g", 5));

        assert_eq!(state.pop_min().unwrap().id.as_str(), "root");
        assert_eq!(state.items[0].id.as_str(), "left");
    }

    #[test]
    fn test_remove_group_restores_heap_order() {
        // Splicing out j0 and j2 alone would leave 9 at the root above 3.
        let mut state = state_with(&[1, 9, 2, 10, 11, 3, 4], &["a", "b", "a", "b", "b", "b", "b"]);
        assert!(state.is_heap());

        let removed = state.remove_group("a");

        assert_eq!(removed.len(), 2);
        assert!(state.is_heap());
        assert_eq!(state.items[0].priority, 3);
        assert!(state.ranges.is_empty());
        assert!(!state.exists.contains("j0"));
        assert!(!state.exists.contains("j2"));
    }

    #[test]
    fn test_remove_group_on_random_heap() {
        let groups = ["a", "b", "c", "a", "a", "d", "b"];
        let prios = priorities(300, 3);
        let mut state = state_with(&prios, &groups);

        let removed = state.remove_group("a");
        assert!(removed.iter().all(|j| j.group_id.as_str() == "a"));
        assert!(state.items.iter().all(|j| j.group_id.as_str() != "a"));
        assert!(state.is_heap());
        assert_eq!(state.exists.len(), state.items.len());

        let mut last = i64::MIN;
        while let Some(item) = state.pop_min() {
            assert!(item.priority >= last);
            last = item.priority;
        }
    }

    #[test]
    fn test_remove_group_without_match() {
        let mut state = state_with(&[3, 1, 2], &["a"]);
        assert!(state.remove_group("zzz").is_empty());
        assert_eq!(state.items.len(), 3);
    }

    #[test]
    fn test_extraction_in_priority_order() {
        let heap = PriorityHeap::with_max_len(100).unwrap();
        for (i, p) in [5, 3, 9, 1, 7].into_iter().enumerate() {
            heap.insert(job(&format!("j{i}"), "g", p));
        }

        let rx = heap.extract_min_channel();
        let got: Vec<i64> = (0..5)
            .map(|_| rx.recv_timeout(WAIT).unwrap().priority)
            .collect();

        assert_eq!(got, vec![1, 3, 5, 7, 9]);
        assert!(heap.is_empty());
        wait_until(|| heap.stats().extracted == 5);
    }

    #[test]
    fn test_exists_tracks_insert_and_extract() {
        let heap = PriorityHeap::with_max_len(10).unwrap();
        assert!(!heap.exists("a"));

        park(&heap, job("parked", "g", 0));
        assert!(!heap.exists("parked"));

        heap.insert(job("a", "g", 1));
        assert!(heap.exists("a"));

        let rx = heap.extract_min_channel();
        assert_eq!(rx.recv_timeout(WAIT).unwrap().id.as_str(), "parked");
        assert_eq!(rx.recv_timeout(WAIT).unwrap().id.as_str(), "a");
        assert!(!heap.exists("a"));
    }

    #[test]
    fn test_peek_priority() {
        let heap = PriorityHeap::with_max_len(10).unwrap();
        assert_eq!(heap.peek_priority(), EMPTY_PRIORITY);
        assert_eq!(heap.try_peek_priority(), None);

        park(&heap, job("parked", "g", 1));
        assert_eq!(heap.peek_priority(), EMPTY_PRIORITY);

        heap.insert(job("a", "g", 8));
        heap.insert(job("b", "g", 2));

        assert_eq!(heap.peek_priority(), 2);
        assert_eq!(heap.try_peek_priority(), Some(2));
        assert_eq!(heap.len(), 2);
    }

    #[test]
    fn test_smaller_arrival_displaces_parked_item() {
        let heap = PriorityHeap::with_max_len(10).unwrap();
        park(&heap, job("slow", "g", 8));

        heap.insert(job("fast", "g", 2));
        assert_eq!(heap.len(), 1);

        let rx = heap.extract_min_channel();
        assert_eq!(rx.recv_timeout(WAIT).unwrap().id.as_str(), "fast");
        assert_eq!(heap.stats().requeued, 1);

        // "slow" went back into the heap and the pump parked it again.
        wait_until(|| heap.is_empty());
        assert!(!heap.exists("fast"));
        assert!(!heap.exists("slow"));

        assert_eq!(rx.recv_timeout(WAIT).unwrap().id.as_str(), "slow");
        wait_until(|| heap.stats().extracted == 2);
        assert_eq!(heap.stats().inserted, 2);
    }

    #[test]
    fn test_equal_priority_arrival_does_not_displace() {
        let heap = PriorityHeap::with_max_len(10).unwrap();
        park(&heap, job("first", "g", 5));
        heap.insert(job("second", "g", 5));

        let rx = heap.extract_min_channel();
        assert_eq!(rx.recv_timeout(WAIT).unwrap().id.as_str(), "first");
        assert_eq!(heap.stats().requeued, 0);
    }

    #[test]
    fn test_stop_puts_parked_item_back() {
        let heap = PriorityHeap::with_max_len(10).unwrap();
        park(&heap, job("parked", "g", 3));
        assert!(!heap.exists("parked"));

        heap.shutdown().unwrap();

        assert_eq!(heap.len(), 1);
        assert!(heap.exists("parked"));
        assert_eq!(heap.peek_priority(), 3);

        let stats = heap.stats();
        assert_eq!(stats.requeued, 1);
        assert_eq!(stats.extracted, 0);
        assert_eq!(stats.inserted, 1);
    }

    #[test]
    fn test_remove_by_group() {
        let heap = PriorityHeap::with_max_len(10).unwrap();
        park(&heap, job("p1", "P", 0));
        heap.insert(job("a1", "A", 5));
        heap.insert(job("b1", "B", 4));
        heap.insert(job("a2", "A", 1));
        heap.insert(job("c1", "C", 3));
        heap.insert(job("a3", "A", 2));

        let removed = heap.remove("A");

        let mut ids: Vec<&str> = removed.iter().map(|j| j.id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["a1", "a2", "a3"]);
        assert_eq!(heap.len(), 2);
        assert!(!heap.exists("a1") && !heap.exists("a2") && !heap.exists("a3"));
        assert!(heap.exists("b1") && heap.exists("c1"));
        assert_eq!(heap.peek_priority(), 3);

        let rx = heap.extract_min_channel();
        assert_eq!(rx.recv_timeout(WAIT).unwrap().id.as_str(), "p1");
        assert_eq!(rx.recv_timeout(WAIT).unwrap().id.as_str(), "c1");
        assert_eq!(rx.recv_timeout(WAIT).unwrap().id.as_str(), "b1");
        assert_eq!(heap.stats().removed, 3);
    }

    #[test]
    fn test_remove_unknown_group_is_empty() {
        let heap = PriorityHeap::with_max_len(10).unwrap();
        park(&heap, job("p1", "P", 0));
        heap.insert(job("a", "A", 1));

        assert!(heap.remove("nope").is_empty());
        assert_eq!(heap.len(), 1);
        assert_eq!(heap.stats().removed, 0);
    }

    #[test]
    fn test_overflow_drains_before_insert() {
        let heap = Arc::new(PriorityHeap::with_max_len(3).unwrap());
        park(&heap, job("parked", "g", 0));
        for (i, p) in [30, 10, 20].into_iter().enumerate() {
            heap.insert(job(&format!("j{i}"), "g", p));
        }
        assert_eq!(heap.len(), 3);
        assert_eq!(heap.stats().overflow_drains, 0);

        let inserter = {
            let heap = Arc::clone(&heap);
            thread::spawn(move || heap.insert(job("late", "g", 5)))
        };
        wait_until(|| heap.stats().overflow_drains == 1);
        assert!(!heap.exists("late"));

        let rx = heap.extract_min_channel();
        let drained: Vec<i64> = (0..3)
            .map(|_| rx.recv_timeout(WAIT).unwrap().priority)
            .collect();
        assert_eq!(drained, vec![0, 10, 20]);

        // The pump popping 30 empties the heap and lets the insert through.
        inserter.join().unwrap();
        assert_eq!(heap.len(), 1);
        assert!(heap.exists("late"));

        assert_eq!(rx.recv_timeout(WAIT).unwrap().priority, 5);
        assert_eq!(rx.recv_timeout(WAIT).unwrap().priority, 30);
    }

    #[test]
    fn test_zero_capacity_drains_every_insert() {
        let heap = Arc::new(PriorityHeap::with_max_len(0).unwrap());
        park(&heap, job("first", "g", 1));
        heap.insert(job("second", "g", 2));
        assert_eq!(heap.stats().overflow_drains, 0);

        let inserter = {
            let heap = Arc::clone(&heap);
            thread::spawn(move || heap.insert(job("third", "g", 3)))
        };
        wait_until(|| heap.stats().overflow_drains == 1);

        let rx = heap.extract_min_channel();
        assert_eq!(rx.recv_timeout(WAIT).unwrap().id.as_str(), "first");
        inserter.join().unwrap();

        assert_eq!(heap.len(), 1);
        assert!(heap.exists("third"));
    }

    #[test]
    fn test_remove_completes_overflow_drain() {
        let heap = Arc::new(PriorityHeap::with_max_len(2).unwrap());
        park(&heap, job("p1", "P", 0));
        heap.insert(job("a1", "A", 1));
        heap.insert(job("a2", "A", 2));

        let inserter = {
            let heap = Arc::clone(&heap);
            thread::spawn(move || heap.insert(job("b1", "B", 3)))
        };
        wait_until(|| heap.stats().overflow_drains == 1);

        assert_eq!(heap.remove("A").len(), 2);
        inserter.join().unwrap();

        assert_eq!(heap.len(), 1);
        assert!(heap.exists("b1"));
    }

    #[test]
    fn test_stop_closes_channel_when_idle() {
        let heap: PriorityHeap<Job> = PriorityHeap::with_max_len(10).unwrap();
        let rx = heap.extract_min_channel();

        heap.stop();

        assert_eq!(rx.recv_timeout(WAIT).unwrap_err(), RecvTimeoutError::Disconnected);
        assert!(heap.is_stopped());
    }

    #[test]
    fn test_stop_with_pending_items_eventually_closes() {
        let heap = PriorityHeap::with_max_len(10).unwrap();
        for i in 0..3 {
            heap.insert(job(&format!("j{i}"), "g", i));
        }
        let rx = heap.extract_min_channel();

        heap.stop();

        let mut delivered = 0;
        loop {
            match rx.recv_timeout(WAIT) {
                Ok(_) => delivered += 1,
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => panic!("channel never closed"),
            }
        }
        assert!(delivered <= 3);
        assert_eq!(heap.len(), 3 - delivered);
    }

    #[test]
    fn test_stop_releases_blocked_inserter() {
        let heap = Arc::new(PriorityHeap::with_max_len(1).unwrap());
        park(&heap, job("p", "g", 0));
        heap.insert(job("a", "g", 1));

        let inserter = {
            let heap = Arc::clone(&heap);
            thread::spawn(move || heap.insert(job("b", "g", 2)))
        };
        wait_until(|| heap.stats().overflow_drains == 1);

        heap.shutdown().unwrap();
        inserter.join().unwrap();

        assert_eq!(heap.len(), 3);
        assert!(heap.exists("p") && heap.exists("a") && heap.exists("b"));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let heap: PriorityHeap<Job> = PriorityHeap::with_max_len(10).unwrap();

        heap.shutdown().unwrap();
        heap.shutdown().unwrap();
        heap.stop();

        assert!(heap.stats().stopped);
    }

    #[test]
    fn test_drop_closes_channel() {
        let heap: PriorityHeap<Job> = PriorityHeap::with_max_len(10).unwrap();
        let rx = heap.extract_min_channel();

        drop(heap);

        assert_eq!(rx.recv_timeout(WAIT).unwrap_err(), RecvTimeoutError::Disconnected);
    }

    #[test]
    fn test_pump_thread_is_named() {
        let config = HeapConfig::new().with_pump_thread_name("custom-pump");
        let heap: PriorityHeap<Job> = PriorityHeap::new(config).unwrap();

        let name = heap
            .pump
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|h| h.thread().name().map(str::to_owned));
        assert_eq!(name.as_deref(), Some("custom-pump"));
    }
}
