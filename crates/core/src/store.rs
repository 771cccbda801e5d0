//! Chat persistence.
//!
//! [`ChatStore`] abstracts where conversations live. [`FsChatStore`] writes
//! one pretty-printed JSON file per chat under a directory;
//! [`MemoryChatStore`] backs tests and delegation scratch chats.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StoreError;
use crate::message::ChatState;

/// Persistence interface for chat state.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Load a chat by id. `Ok(None)` when it has never been saved.
    async fn load(&self, id: &str) -> Result<Option<ChatState>, StoreError>;

    /// Persist the full chat state, replacing any previous version.
    async fn save(&self, state: &ChatState) -> Result<(), StoreError>;

    /// Delete a chat. Deleting a missing chat is not an error.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Ids of all stored chats, unordered.
    async fn list_ids(&self) -> Result<Vec<String>, StoreError>;
}

/// Filesystem-backed store: `{dir}/{chat_id}.json`.
pub struct FsChatStore {
    dir: PathBuf,
}

impl FsChatStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

#[async_trait]
impl ChatStore for FsChatStore {
    async fn load(&self, id: &str) -> Result<Option<ChatState>, StoreError> {
        let path = self.path_for(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(e)),
        };
        let state = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Corrupt(format!("{}: {e}", path.display())))?;
        Ok(Some(state))
    }

    async fn save(&self, state: &ChatState) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(&state.id);
        let json = serde_json::to_vec_pretty(state)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        // Write-then-rename so a crash never leaves a truncated chat file.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(chat_id = %state.id, messages = state.messages.len(), "Saved chat");
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn list_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(StoreError::Io(e)),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        Ok(ids)
    }
}

impl std::fmt::Debug for FsChatStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsChatStore")
            .field("dir", &self.dir)
            .finish()
    }
}

/// In-memory store for tests and throwaway chats.
#[derive(Default)]
pub struct MemoryChatStore {
    chats: Mutex<HashMap<String, ChatState>>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience for sharing a store across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn load(&self, id: &str) -> Result<Option<ChatState>, StoreError> {
        Ok(self.chats.lock().await.get(id).cloned())
    }

    async fn save(&self, state: &ChatState) -> Result<(), StoreError> {
        self.chats
            .lock()
            .await
            .insert(state.id.clone(), state.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.chats.lock().await.remove(id);
        Ok(())
    }

    async fn list_ids(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.chats.lock().await.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[tokio::test]
    async fn fs_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsChatStore::new(dir.path());

        let mut state = ChatState::with_assistant("chat-1", "Helper");
        state.push(Message::user("hello"));
        store.save(&state).await.unwrap();

        let loaded = store.load("chat-1").await.unwrap().unwrap();
        assert_eq!(loaded.id, "chat-1");
        assert_eq!(loaded.assistant.as_deref(), Some("Helper"));
        assert_eq!(loaded.messages.len(), 1);
    }

    #[tokio::test]
    async fn fs_store_missing_chat_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsChatStore::new(dir.path());
        assert!(store.load("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fs_store_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("bad.json"), b"{not json")
            .await
            .unwrap();
        let store = FsChatStore::new(dir.path());
        assert!(matches!(
            store.load("bad").await,
            Err(StoreError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn fs_store_list_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsChatStore::new(dir.path());
        store.save(&ChatState::with_assistant("a", "H")).await.unwrap();
        store.save(&ChatState::with_assistant("b", "H")).await.unwrap();

        let mut ids = store.list_ids().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);

        store.delete("a").await.unwrap();
        assert_eq!(store.list_ids().await.unwrap(), vec!["b"]);

        // Deleting twice is fine.
        store.delete("a").await.unwrap();
    }

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryChatStore::new();
        let state = ChatState::with_assistant("m1", "Helper");
        store.save(&state).await.unwrap();
        assert!(store.load("m1").await.unwrap().is_some());
        store.delete("m1").await.unwrap();
        assert!(store.load("m1").await.unwrap().is_none());
    }
}
