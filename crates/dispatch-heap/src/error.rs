//! Error types for heap construction and teardown.
//!
//! Queue operations themselves are total and never return these.

use thiserror::Error;

/// Errors that can occur while building or shutting down a heap.
#[derive(Error, Debug)]
pub enum HeapError {
    /// A configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The pump thread could not be started.
    #[error("failed to spawn pump thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The pump thread panicked before it could be joined.
    #[error("pump thread panicked")]
    PumpPanicked,
}

/// Result type alias for heap operations.
pub type Result<T> = std::result::Result<T, HeapError>;
