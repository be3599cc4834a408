//! Domain error model.

use thiserror::Error;

use crate::job::JobState;

/// Domain-level error.
///
/// Keep this focused on deterministic validation failures. Lifecycle moves fail
/// with [`TransitionError`]; infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}

/// An attempted `(from, to)` job state change that the machine does not allow.
///
/// Never retried: it means the caller is out of step with the job lifecycle.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("invalid_transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: JobState,
    pub to: JobState,
}
