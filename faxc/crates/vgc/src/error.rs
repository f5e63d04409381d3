//! Error Module - vgc Error Types
//!
//! Defines all error types used by the heap, allocator and collector.

use thiserror::Error;

/// Main error type for all heap/collector operations.
#[derive(Debug, Error)]
pub enum GcError {
    #[error("heap exhausted: requested {requested} bytes, {available} available after collection")]
    HeapExhausted { requested: usize, available: usize },

    #[error("heap initialization failed: {0}")]
    HeapInitialization(String),

    #[error("root set is full: at most {max} roots may be registered at once")]
    RootSetFull { max: usize },

    #[error("attempted to unregister a root that was never registered: {address:#x}")]
    UnknownRoot { address: usize },

    #[error("invalid heap configuration: {0}")]
    Configuration(String),

    #[error("virtual memory operation failed: {0}")]
    VirtualMemory(String),
}

impl GcError {
    /// Whether a caller can retry the operation (e.g. after forcing a collection).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GcError::HeapExhausted { .. })
    }
}

/// Result type alias for heap/collector operations.
pub type Result<T> = std::result::Result<T, GcError>;
