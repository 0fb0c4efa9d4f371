//! History trait and entry types.

use async_trait::async_trait;
use log::warn;
use serde::{Deserialize, Serialize};

use super::{HistoryError, HistoryResult};

/// Speaker of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One role-tagged turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub role: Role,
    pub content: String,
}

impl Entry {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Durable per-user conversation log.
///
/// Appends are read-modify-write and are not serialized across callers:
/// two concurrent appends for the same user id may race and one of them
/// can be lost. Implementations with stronger guarantees can be swapped in
/// without touching callers.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Load the stored history, surfacing storage failures.
    ///
    /// An absent history is `Ok(vec![])`, never an error.
    async fn try_load(&self, user_id: &str) -> HistoryResult<Vec<Entry>>;

    /// Append entries in order after the existing history.
    async fn append(&self, user_id: &str, entries: &[Entry]) -> HistoryResult<()>;

    /// Delete the whole history. Clearing an absent history succeeds.
    async fn clear(&self, user_id: &str) -> HistoryResult<()>;

    /// Load the stored history, treating any failure as an empty history.
    async fn load(&self, user_id: &str) -> Vec<Entry> {
        match self.try_load(user_id).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Failed to load history for {:?}: {}", user_id, err);
                Vec::new()
            }
        }
    }
}

/// Check that a user id can be used as a storage key.
///
/// Ids are opaque, but they end up inside a file name, so separators,
/// parent references and control characters are refused.
pub fn validate_user_id(user_id: &str) -> HistoryResult<()> {
    let invalid = user_id.is_empty()
        || user_id.len() > 200
        || user_id == "."
        || user_id.contains("..")
        || user_id
            .chars()
            .any(|c| c.is_control() || matches!(c, '/' | '\\' | ':' | '\0'));

    if invalid {
        return Err(HistoryError::InvalidUserId(user_id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_serializes_lowercase_role() {
        let json = serde_json::to_string(&Entry::assistant("Hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"Hi"}"#);
    }

    #[test]
    fn test_entry_rejects_unknown_role() {
        let parsed = serde_json::from_str::<Entry>(r#"{"role":"tool","content":"x"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_validate_user_id() {
        assert!(validate_user_id("42").is_ok());
        assert!(validate_user_id("user-abc_01").is_ok());
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id("../etc/passwd").is_err());
        assert!(validate_user_id("a/b").is_err());
        assert!(validate_user_id("a\\b").is_err());
        assert!(validate_user_id("a\nb").is_err());
        assert!(validate_user_id(&"x".repeat(201)).is_err());
    }
}
