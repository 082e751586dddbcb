//! Load driver for the dispatch heap.
//!
//! Runs producers, consumers and a periodic group evictor against a single
//! `PriorityHeap`, then shuts it down and reports what happened.

pub mod cli;
pub mod error;
pub mod soak;

pub use error::{Result, SoakError};
pub use soak::{SoakPlan, SoakReport};
