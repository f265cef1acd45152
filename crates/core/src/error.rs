//! Error types shared across the workspace.
//!
//! Every failure is returned as a value; the store never aborts the process
//! on a recoverable error.

use thiserror::Error;

/// Result alias used throughout tracebase.
pub type TraceResult<T> = Result<T, TraceError>;

/// Errors surfaced by the store, planner, pruner, and coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    /// Insert received an event id that is already present. Recoverable;
    /// the caller may regenerate the id or ignore the event.
    #[error("duplicate event id: {event_id}")]
    DuplicateId { event_id: String },

    /// Insert could not proceed even after a prune attempt.
    #[error("capacity exceeded: configured limit is {limit} events")]
    CapacityExceeded { limit: usize },

    /// Lookup or delete on an absent event id.
    #[error("event not found: {event_id}")]
    NotFound { event_id: String },

    /// The query filter is incoherent or contains an unrecognized key.
    #[error("invalid filter: {reason}")]
    InvalidFilter { reason: String },

    /// Start-up configuration failed validation.
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },

    /// Query exceeded its deadline; no partial results are returned.
    #[error("query timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// Invariant violation detected at runtime.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl TraceError {
    pub fn duplicate_id(event_id: impl Into<String>) -> Self {
        TraceError::DuplicateId {
            event_id: event_id.into(),
        }
    }

    pub fn capacity_exceeded(limit: usize) -> Self {
        TraceError::CapacityExceeded { limit }
    }

    pub fn not_found(event_id: impl Into<String>) -> Self {
        TraceError::NotFound {
            event_id: event_id.into(),
        }
    }

    pub fn invalid_filter(reason: impl Into<String>) -> Self {
        TraceError::InvalidFilter {
            reason: reason.into(),
        }
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        TraceError::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub fn timeout(elapsed_ms: u64) -> Self {
        TraceError::Timeout { elapsed_ms }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        TraceError::Internal {
            message: message.into(),
        }
    }
}
