//! Result cache storage
//!
//! Provides the abstraction the RPC server memoizes results through, with a
//! size-bounded file-backed implementation and an in-memory one.

pub mod file;
pub mod memory;

pub use file::FileCacheStore;
pub use memory::MemoryCacheStore;

use crate::error::Result;
use crate::types::OpValue;
use async_trait::async_trait;

/// Insertion-ordered key/value cache of computed results
///
/// New keys are appended at the newest end. Overwriting an existing key keeps
/// its position; there is no promotion on read.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up a cached result
    fn get(&self, key: &str) -> Option<OpValue>;

    /// Insert or overwrite a result
    fn put(&mut self, key: String, value: OpValue);

    /// Write the current contents to durable storage, evicting as needed
    async fn persist(&mut self) -> Result<()>;

    /// Number of cached entries
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
