//! Error types for the coordination core.

use thiserror::Error;

use crate::api::ApiError;

/// Errors surfaced by core components.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A retryable API call failed on every attempt.
    #[error("gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: ApiError,
    },

    /// An AI edit request was issued while another is still in flight.
    #[error("an AI edit is already in flight for this session")]
    EditInFlight,

    /// The local buffer cannot be edited until the pending proposal is
    /// applied or reverted.
    #[error("a proposal is pending review")]
    ReviewPending,

    /// Selection lock requested with no selection captured.
    #[error("no selection to lock")]
    SelectionMissing,

    /// A job result payload did not match the shape its task implies.
    #[error("malformed job result: {0}")]
    MalformedResult(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
