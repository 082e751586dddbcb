//! Core data models for the dispatch heap.
//!
//! This crate provides the [`Item`] contract the heap orders and evicts by,
//! plus a ready-made [`Job`] type for dispatchers that have no item type of
//! their own.

pub mod ids;
pub mod item;
pub mod job;

// Re-export main types
pub use ids::{GroupId, JobId};
pub use item::Item;
pub use job::Job;
