//! History storage error types.

use thiserror::Error;

/// Result type for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Errors that can occur while reading or writing a history.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// User id cannot be mapped onto a storage key.
    #[error("invalid user id: {0:?}")]
    InvalidUserId(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored content is not a valid history.
    #[error("corrupt history: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HistoryError::InvalidUserId("../x".to_string());
        assert_eq!(err.to_string(), "invalid user id: \"../x\"");
    }
}
