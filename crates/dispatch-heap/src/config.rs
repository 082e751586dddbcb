//! Heap configuration.
//!
//! # Environment Variables
//!
//! - `DISPATCH_HEAP_MAX_LEN`: capacity ceiling
//! - `DISPATCH_HEAP_PREALLOCATE`: initial reservation for the backing storage
//! - `DISPATCH_HEAP_PUMP_THREAD`: name of the pump thread

use serde::{Deserialize, Serialize};

use crate::error::{HeapError, Result};

/// Environment variable for the capacity ceiling.
pub const MAX_LEN_ENV: &str = "DISPATCH_HEAP_MAX_LEN";

/// Environment variable for the initial reservation.
pub const PREALLOCATE_ENV: &str = "DISPATCH_HEAP_PREALLOCATE";

/// Environment variable for the pump thread name.
pub const PUMP_THREAD_ENV: &str = "DISPATCH_HEAP_PUMP_THREAD";

const DEFAULT_MAX_LEN: u64 = 10_000;
const DEFAULT_PREALLOCATE: usize = 1_000;
const DEFAULT_PUMP_THREAD: &str = "dispatch-heap-pump";

/// Configuration for a `PriorityHeap`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeapConfig {
    /// Resident count at which an insert first drains the heap.
    pub max_len: u64,
    /// Slots reserved up front for items and their IDs.
    pub preallocate: usize,
    /// Name given to the pump thread.
    pub pump_thread_name: String,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            max_len: DEFAULT_MAX_LEN,
            preallocate: DEFAULT_PREALLOCATE,
            pump_thread_name: DEFAULT_PUMP_THREAD.to_string(),
        }
    }
}

impl HeapConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with the `DISPATCH_HEAP_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup(MAX_LEN_ENV) {
            config.max_len = parse_var(MAX_LEN_ENV, &raw)?;
        }
        if let Some(raw) = lookup(PREALLOCATE_ENV) {
            config.preallocate = parse_var(PREALLOCATE_ENV, &raw)?;
        }
        if let Some(name) = lookup(PUMP_THREAD_ENV) {
            let name = name.trim();
            if name.is_empty() {
                return Err(HeapError::InvalidConfig(format!("{PUMP_THREAD_ENV} is empty")));
            }
            config.pump_thread_name = name.to_string();
        }

        Ok(config)
    }

    /// Sets the capacity ceiling.
    pub fn with_max_len(mut self, max_len: u64) -> Self {
        self.max_len = max_len;
        self
    }

    /// Sets the initial reservation.
    pub fn with_preallocate(mut self, preallocate: usize) -> Self {
        self.preallocate = preallocate;
        self
    }

    /// Sets the pump thread name.
    pub fn with_pump_thread_name(mut self, name: impl Into<String>) -> Self {
        self.pump_thread_name = name.into();
        self
    }

    /// Reservation actually used: never more than one overflow's worth.
    pub(crate) fn initial_capacity(&self) -> usize {
        let ceiling = usize::try_from(self.max_len.saturating_add(1)).unwrap_or(usize::MAX);
        self.preallocate.min(ceiling)
    }
}

fn parse_var<N: std::str::FromStr>(key: &str, raw: &str) -> Result<N>
where
    N::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| HeapError::InvalidConfig(format!("{key}={raw:?}: {e}")))
}
