//! Chat relay error types.

use thiserror::Error;

use crate::upstream::UpstreamError;

/// Result type for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;

/// Errors surfaced to the caller of a chat turn.
///
/// Storage failures never appear here: they are absorbed by the service.
#[derive(Debug, Error)]
pub enum ChatError {
    /// A required parameter is missing or unusable.
    #[error("{0}")]
    InvalidRequest(String),

    /// The completion API failed; history was left untouched.
    #[error("upstream failure: {0}")]
    Upstream(#[from] UpstreamError),
}
