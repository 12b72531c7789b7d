//! Cache generations and the current-generation pointer

use parking_lot::RwLock;
use std::sync::Arc;

use crate::error::CacheResult;
use crate::request::{FetchResponse, RequestKey};
use crate::storage::{CacheStorage, MemoryCacheStorage};

/// Registry of cache generations on top of a [`CacheStorage`].
///
/// The current generation only changes through [`GenerationRegistry::publish`],
/// which the controller calls once activation has removed every other
/// generation. Readers never observe a half-populated or half-deleted
/// generation through [`GenerationRegistry::lookup`].
pub struct GenerationRegistry {
    storage: Arc<dyn CacheStorage>,
    current: RwLock<Option<String>>,
}

impl GenerationRegistry {
    /// Create a registry over `storage` with no current generation
    pub fn new(storage: Arc<dyn CacheStorage>) -> Self {
        Self {
            storage,
            current: RwLock::new(None),
        }
    }

    /// Registry backed by a fresh in-memory storage
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCacheStorage::new()))
    }

    /// The underlying storage
    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    /// Name of the current generation
    pub fn current(&self) -> Option<String> {
        self.current.read().clone()
    }

    /// Whether `version_id` is the current generation
    pub fn is_current(&self, version_id: &str) -> bool {
        self.current.read().as_deref() == Some(version_id)
    }

    pub(crate) fn publish(&self, version_id: &str) {
        let previous = self.current.write().replace(version_id.to_string());
        match previous {
            Some(prev) if prev != version_id => {
                log::info!("Cache generation {} superseded by {}", prev, version_id)
            }
            Some(_) => {}
            None => log::info!("Cache generation {} is now current", version_id),
        }
    }

    /// Exact-key lookup in the current generation
    pub async fn lookup(&self, key: &RequestKey) -> CacheResult<Option<FetchResponse>> {
        let Some(current) = self.current() else {
            return Ok(None);
        };
        self.storage.get(&current, key).await
    }

    /// Delete every generation except `keep`. Returns the deleted names.
    ///
    /// All deletions have completed when this returns `Ok`.
    pub async fn retain_only(&self, keep: &str) -> CacheResult<Vec<String>> {
        let mut deleted = Vec::new();
        for name in self.storage.keys().await? {
            if name == keep {
                continue;
            }
            if self.storage.delete(&name).await? {
                log::debug!("Deleted stale cache generation {}", name);
                deleted.push(name);
            }
        }
        Ok(deleted)
    }
}

impl std::fmt::Debug for GenerationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationRegistry")
            .field("current", &self.current())
            .finish()
    }
}
