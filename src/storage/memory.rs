//! In-memory result cache
//!
//! Unbounded and never written anywhere. Backs the client stub's per-process
//! memoization and lets the server run without a cache file in tests.

use super::CacheStore;
use crate::error::Result;
use crate::types::OpValue;
use async_trait::async_trait;
use indexmap::IndexMap;

#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: IndexMap<String, OpValue>,
    persist_calls: usize,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `persist` was requested
    pub fn persist_calls(&self) -> usize {
        self.persist_calls
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> Option<OpValue> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: String, value: OpValue) {
        self.entries.insert(key, value);
    }

    async fn persist(&mut self) -> Result<()> {
        self.persist_calls += 1;
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
