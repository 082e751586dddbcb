//! Bounded, thread-safe min-heap for pending work.
//!
//! This crate provides the `PriorityHeap` used by a dispatcher as its single
//! point of ordering and backpressure:
//! - Min-heap ordering on `Item::priority` behind one `Mutex`
//! - O(1) membership checks by item ID
//! - A background pump that hands the current minimum to consumers over a
//!   rendezvous channel, so consumers can `select!` on it
//! - Bulk eviction by group tag, deleting contiguous runs in one splice
//! - A soft capacity: overflowing inserts wait for a full drain instead of
//!   being rejected
//!
//! # Example
//!
//! ```no_run
//! use dispatch_heap::{HeapConfig, PriorityHeap};
//! use dispatch_models::Job;
//!
//! let heap = PriorityHeap::new(HeapConfig::new().with_max_len(1024)).unwrap();
//!
//! heap.insert(Job::new("tenant-a", 20));
//! heap.insert(Job::new("tenant-b", 10));
//!
//! let rx = heap.extract_min_channel();
//! let first = rx.recv().unwrap();
//! assert_eq!(first.priority, 10);
//!
//! // Tenant A cancelled: evict everything it still has queued.
//! let evicted = heap.remove("tenant-a");
//! println!("evicted {} jobs", evicted.len());
//!
//! heap.shutdown().unwrap();
//! ```

pub mod config;
pub mod error;
pub mod heap;
pub mod ranges;
pub mod stats;

pub use config::HeapConfig;
pub use dispatch_models::Item;
pub use error::{HeapError, Result};
pub use heap::{PriorityHeap, EMPTY_PRIORITY};
pub use ranges::IndexRanges;
pub use stats::HeapStats;
