//! Browser control error types.

use thiserror::Error;

/// Result type for browser operations.
pub type BrowserResult<T> = Result<T, BrowserError>;

/// Errors that can occur while driving a browser session.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// The browser daemon could not be started.
    #[error("failed to launch browser: {0}")]
    Launch(String),

    /// Connecting to the daemon socket failed.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// IO error on an established connection.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The daemon answered with something unparsable.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The daemon rejected a command.
    #[error("{action} failed: {message}")]
    Command { action: String, message: String },

    /// A command did not answer in time.
    #[error("{0} timed out")]
    Timeout(String),
}
