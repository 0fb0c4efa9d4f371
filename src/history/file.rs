//! File-backed history store: one JSON array per user id.

use async_trait::async_trait;
use log::debug;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::{Entry, HistoryResult, HistoryStore, validate_user_id};

/// History store keeping `<dir>/memory_<id>.json` files.
///
/// Appends are an unlocked read-modify-write of the whole file: two
/// concurrent appends for the same id can lose one of them.
#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    /// Directory holding the history files. Created on first write.
    dir: PathBuf,
}

impl FileHistoryStore {
    /// Create a new store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the history file for a user id.
    pub fn path_for(&self, user_id: &str) -> HistoryResult<PathBuf> {
        validate_user_id(user_id)?;
        Ok(self.dir.join(format!("memory_{user_id}.json")))
    }

    async fn ensure_dir(&self) -> HistoryResult<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn try_load(&self, user_id: &str) -> HistoryResult<Vec<Entry>> {
        let path = self.path_for(user_id)?;
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn append(&self, user_id: &str, entries: &[Entry]) -> HistoryResult<()> {
        let path = self.path_for(user_id)?;
        self.ensure_dir().await?;

        // A corrupt file is replaced by the appended entries.
        let mut history = self.load(user_id).await;
        history.extend_from_slice(entries);

        let body = serde_json::to_vec_pretty(&history)?;
        fs::write(&path, &body).await?;
        debug!(
            "Appended {} entries to {} ({} total)",
            entries.len(),
            path.display(),
            history.len()
        );
        Ok(())
    }

    async fn clear(&self, user_id: &str) -> HistoryResult<()> {
        let path = self.path_for(user_id)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
