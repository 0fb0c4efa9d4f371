//! In-process history store.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{Entry, HistoryResult, HistoryStore, validate_user_id};

/// History store keeping every conversation in memory.
///
/// Appends hold the write lock for the whole read-modify-write, so unlike
/// the file store concurrent appends for one id never lose entries.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    histories: RwLock<HashMap<String, Vec<Entry>>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn try_load(&self, user_id: &str) -> HistoryResult<Vec<Entry>> {
        validate_user_id(user_id)?;
        Ok(self
            .histories
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn append(&self, user_id: &str, entries: &[Entry]) -> HistoryResult<()> {
        validate_user_id(user_id)?;
        self.histories
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .extend_from_slice(entries);
        Ok(())
    }

    async fn clear(&self, user_id: &str) -> HistoryResult<()> {
        validate_user_id(user_id)?;
        self.histories.write().await.remove(user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_append_load_clear() {
        let store = MemoryHistoryStore::new();
        assert!(store.load("u").await.is_empty());

        store.append("u", &[Entry::user("a")]).await.unwrap();
        store.append("u", &[Entry::assistant("b")]).await.unwrap();
        assert_eq!(
            store.load("u").await,
            vec![Entry::user("a"), Entry::assistant("b")]
        );

        store.clear("u").await.unwrap();
        store.clear("u").await.unwrap();
        assert!(store.load("u").await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_appends_keep_every_entry() {
        let store = Arc::new(MemoryHistoryStore::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append("same", &[Entry::user(format!("m{i}"))])
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.load("same").await.len(), 16);
    }
}
