//! Bookmark/checkpoint persistence for sync state.
//!
//! The tap writes its state (per-stream bookmarks plus the
//! currently-syncing marker) through a `CheckpointStore` after every
//! meaningful transition. State is write-mostly during a run: it is read
//! once at startup and never read back mid-sync.

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

mod errors;
mod file_store;
mod mem_store;

pub use errors::{CheckpointError, CheckpointResult};
pub use file_store::FileCheckpointStore;
pub use mem_store::MemCheckpointStore;

/// Checkpoint storage backend, keyed by tap identifier.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Get raw checkpoint bytes for a key.
    async fn get_raw(&self, key: &str) -> CheckpointResult<Option<Vec<u8>>>;

    /// Store raw checkpoint bytes for a key.
    async fn put_raw(&self, key: &str, bytes: &[u8]) -> CheckpointResult<()>;

    /// Delete a checkpoint, returning whether it existed.
    async fn delete(&self, key: &str) -> CheckpointResult<bool>;

    /// List all stored keys.
    async fn list(&self) -> CheckpointResult<Vec<String>>;
}

/// Typed get/put on top of any `CheckpointStore`.
#[async_trait]
pub trait CheckpointStoreExt: CheckpointStore {
    async fn get<T>(&self, key: &str) -> CheckpointResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get_raw(key).await? {
            Some(buf) => Ok(Some(serde_json::from_slice(&buf)?)),
            None => Ok(None),
        }
    }

    async fn put<T>(&self, key: &str, checkpoint: &T) -> CheckpointResult<()>
    where
        T: Serialize + Sync,
    {
        let buf = serde_json::to_vec(checkpoint)?;
        self.put_raw(key, &buf).await
    }
}

impl<T: CheckpointStore + ?Sized> CheckpointStoreExt for T {}
