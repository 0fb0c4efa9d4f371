//! Upstream client error types.

use thiserror::Error;

/// Result type for upstream operations.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// Errors that can occur while contacting the chat completion API.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Upstream answered with a non-success status.
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Failed to parse response.
    #[error("failed to parse response: {0}")]
    ParseError(String),

    /// Response parsed but carried no reply text.
    #[error("upstream returned no message")]
    EmptyReply,

    /// Client could not be configured.
    #[error("invalid upstream configuration: {0}")]
    Config(String),
}
