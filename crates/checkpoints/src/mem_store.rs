use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CheckpointResult, CheckpointStore};

/// In-memory store, used by tests and dry runs.
#[derive(Default)]
pub struct MemCheckpointStore {
    map: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemCheckpointStore {
    async fn get_raw(&self, key: &str) -> CheckpointResult<Option<Vec<u8>>> {
        Ok(self.map.read().await.get(key).cloned())
    }

    async fn put_raw(&self, key: &str, bytes: &[u8]) -> CheckpointResult<()> {
        self.map.write().await.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> CheckpointResult<bool> {
        Ok(self.map.write().await.remove(key).is_some())
    }

    async fn list(&self) -> CheckpointResult<Vec<String>> {
        Ok(self.map.read().await.keys().cloned().collect())
    }
}
