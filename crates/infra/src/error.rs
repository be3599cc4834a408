//! Storage-level error shared by every store implementation.

use thiserror::Error;

/// Failure reported by a store (in-memory or Postgres).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A referenced row is absent where the operation requires it.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint rejected the write.
    #[error("unique violation on {constraint}")]
    UniqueViolation { constraint: String },

    /// Conditional writes kept losing to concurrent writers.
    #[error("write contention: {0}")]
    Contention(String),

    /// Anything else (I/O, pool, decode).
    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}
