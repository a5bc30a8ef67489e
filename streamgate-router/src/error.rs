//! Error types for streamgate-router.

use thiserror::Error;

/// Failure of a fire-and-forget dispatch. Never retried here; the calling
/// runtime's retry policy owns that.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("target rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("function error: {0}")]
    Function(String),
}

/// Failure of the identity-mapping read. Every variant is tolerated by the
/// router; they differ only in how they are logged.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("identity mapping not found")]
    NotFound,

    #[error("identity lookup timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed lookup response: {0}")]
    InvalidResponse(String),
}

/// All errors surfaced by the router.
#[derive(Debug, Error)]
pub enum RouterError {
    /// A dispatch failed while routing a record.
    #[error("dispatch of '{action}' failed for event {event_id}: {source}")]
    Dispatch {
        action: &'static str,
        event_id: String,
        #[source]
        source: DispatchError,
    },

    /// One or more records of a batch could not be routed.
    #[error("{failed} of {total} records failed to route")]
    BatchFailed { failed: usize, total: usize },

    /// A routing task panicked or was cancelled.
    #[error("routing task join failure: {0}")]
    Join(String),
}
