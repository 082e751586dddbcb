//! Error types for soak runs.

use dispatch_heap::HeapError;
use thiserror::Error;

/// Errors that can end a soak run.
#[derive(Error, Debug)]
pub enum SoakError {
    /// Heap construction or shutdown failed.
    #[error("heap error: {0}")]
    Heap(#[from] HeapError),

    /// Not every produced job was accounted for before the deadline.
    #[error("deadline reached with {settled} of {produced} jobs settled")]
    Deadline { settled: u64, produced: u64 },

    /// A worker thread panicked.
    #[error("{0} thread panicked")]
    WorkerPanicked(&'static str),

    /// Stats could not be rendered.
    #[error("failed to render report: {0}")]
    Report(#[from] serde_json::Error),
}

/// Result type alias for soak runs.
pub type Result<T> = std::result::Result<T, SoakError>;
