use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{CheckpointResult, CheckpointStore};

/// Single-file JSON store. Writes go through a temp file and an atomic
/// rename so a crash mid-write never truncates existing state.
pub struct FileCheckpointStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileCheckpointStore {
    pub fn new<P: AsRef<Path>>(path: P) -> CheckpointResult<Self> {
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            guard: Mutex::new(()),
        })
    }

    async fn load(&self) -> CheckpointResult<HashMap<String, Vec<u8>>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(HashMap::new());
        }
        let bytes = tokio::fs::read(&self.path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn save(&self, map: &HashMap<String, Vec<u8>>) -> CheckpointResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec_pretty(map)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn get_raw(&self, key: &str) -> CheckpointResult<Option<Vec<u8>>> {
        let _g = self.guard.lock().await;
        let mut map = self.load().await?;
        Ok(map.remove(key))
    }

    async fn put_raw(&self, key: &str, bytes: &[u8]) -> CheckpointResult<()> {
        let _g = self.guard.lock().await;
        let mut map = self.load().await?;
        map.insert(key.to_string(), bytes.to_vec());
        self.save(&map).await
    }

    async fn delete(&self, key: &str) -> CheckpointResult<bool> {
        let _g = self.guard.lock().await;
        let mut map = self.load().await?;
        let existed = map.remove(key).is_some();
        if existed {
            self.save(&map).await?;
        }
        Ok(existed)
    }

    async fn list(&self) -> CheckpointResult<Vec<String>> {
        let _g = self.guard.lock().await;
        let map = self.load().await?;
        Ok(map.keys().cloned().collect())
    }
}
