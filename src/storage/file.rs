//! File-backed result cache with a byte-size bound
//!
//! The whole ordered map is serialized as one JSON object and written through
//! a sibling `.tmp` file followed by a rename, so readers never observe a
//! half-written file. After every write the on-disk size is checked against
//! the limit and the oldest entries are dropped one at a time (re-writing after
//! each drop) until the file fits or the map is empty.

use super::CacheStore;
use crate::error::{MathRpcError, Result};
use crate::types::OpValue;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct FileCacheStore {
    entries: IndexMap<String, OpValue>,
    path: PathBuf,
    limit_bytes: u64,
}

impl FileCacheStore {
    /// Create an empty store bound to `path` without touching the disk
    pub fn new(path: impl Into<PathBuf>, limit_bytes: u64) -> Self {
        Self {
            entries: IndexMap::new(),
            path: path.into(),
            limit_bytes,
        }
    }

    /// Load the store from `path`.
    ///
    /// A missing, unreadable or corrupt file yields an empty store; this never fails.
    pub async fn load(path: impl Into<PathBuf>, limit_bytes: u64) -> Self {
        let mut store = Self::new(path, limit_bytes);

        match tokio::fs::read(&store.path).await {
            Ok(bytes) => match serde_json::from_slice::<IndexMap<String, OpValue>>(&bytes) {
                Ok(entries) => {
                    info!(
                        "Loaded {} cached results from {}",
                        entries.len(),
                        store.path.display()
                    );
                    store.entries = entries;
                }
                Err(e) => {
                    warn!(
                        "Cache file {} is corrupt, starting empty: {}",
                        store.path.display(),
                        e
                    );
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cache file at {}, starting empty", store.path.display());
            }
            Err(e) => {
                warn!(
                    "Failed to read cache file {}, starting empty: {}",
                    store.path.display(),
                    e
                );
            }
        }

        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn limit_bytes(&self) -> u64 {
        self.limit_bytes
    }

    /// Keys from oldest to newest
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Serialize, write to the temp file, rename over the target. Returns the size on disk.
    async fn write_atomic(&self) -> Result<u64> {
        let data = serde_json::to_vec(&self.entries)?;
        let temp_path = self.temp_path();

        tokio::fs::write(&temp_path, &data).await.map_err(|e| {
            MathRpcError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write cache file {}: {}", temp_path.display(), e),
            ))
        })?;

        tokio::fs::rename(&temp_path, &self.path).await.map_err(|e| {
            MathRpcError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to replace cache file {}: {}", self.path.display(), e),
            ))
        })?;

        let metadata = tokio::fs::metadata(&self.path).await?;
        Ok(metadata.len())
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    fn get(&self, key: &str) -> Option<OpValue> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: String, value: OpValue) {
        self.entries.insert(key, value);
    }

    async fn persist(&mut self) -> Result<()> {
        let mut size = self.write_atomic().await?;

        while size > self.limit_bytes && !self.entries.is_empty() {
            if let Some((evicted, _)) = self.entries.shift_remove_index(0) {
                debug!("Evicted cache entry {}", evicted);
            }
            size = self.write_atomic().await?;
        }

        debug!(
            "Persisted {} cache entries ({} of {} bytes)",
            self.entries.len(),
            size,
            self.limit_bytes
        );
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileCacheStore::load(dir.path().join("absent.json"), 1024).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{ this is not valid json").unwrap();

        let store = FileCacheStore::load(&path, 1024).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_overwrite_keeps_position() {
        let dir = TempDir::new().unwrap();
        let mut store = FileCacheStore::new(dir.path().join("cache.json"), 1024);

        store.put("a".into(), OpValue::Number(1.0));
        store.put("b".into(), OpValue::Number(2.0));
        store.put("a".into(), OpValue::Number(3.0));

        assert_eq!(store.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(store.get("a"), Some(OpValue::Number(3.0)));
    }

    #[tokio::test]
    async fn test_persist_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let mut store = FileCacheStore::new(&path, 1024);

        store.put("soma:[1,2]".into(), OpValue::Number(3.0));
        store.persist().await.unwrap();

        assert!(path.exists());
        assert!(!dir.path().join("cache.json.tmp").exists());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), r#"{"soma:[1,2]":3}"#);
    }

    #[tokio::test]
    async fn test_single_oversized_entry_empties_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let mut store = FileCacheStore::new(&path, 16);

        store.put("k".into(), OpValue::Text("x".repeat(64)));
        store.persist().await.unwrap();

        assert!(store.is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_memory_entry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing-dir").join("cache.json");
        let mut store = FileCacheStore::new(&path, 1024);

        store.put("k".into(), OpValue::Number(1.0));
        assert!(store.persist().await.is_err());
        assert_eq!(store.get("k"), Some(OpValue::Number(1.0)));
    }
}
