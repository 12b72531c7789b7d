//! Named cache stores
//!
//! A [`CacheStorage`] holds any number of named caches, each mapping a
//! [`RequestKey`] to a stored [`FetchResponse`]. The controller keeps one
//! cache per generation, named after the generation's version identifier.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CacheError, CacheResult};
use crate::request::{FetchResponse, RequestKey};

/// Storage backend for named caches.
///
/// `put` never creates a cache: writing into a cache that was deleted in the
/// meantime fails with [`CacheError::CacheNotFound`] instead of resurrecting it.
#[async_trait]
pub trait CacheStorage: Send + Sync + 'static {
    /// Open a cache, creating it if it doesn't exist
    async fn open(&self, name: &str) -> CacheResult<()>;

    /// Check if a cache exists
    async fn has(&self, name: &str) -> CacheResult<bool>;

    /// Delete a cache and all its entries. Returns whether it existed.
    async fn delete(&self, name: &str) -> CacheResult<bool>;

    /// Names of all caches
    async fn keys(&self) -> CacheResult<Vec<String>>;

    /// Exact-key lookup in one cache
    async fn get(&self, name: &str, key: &RequestKey) -> CacheResult<Option<FetchResponse>>;

    /// Store a response, replacing any previous entry for the key
    async fn put(&self, name: &str, key: RequestKey, response: FetchResponse) -> CacheResult<()>;

    /// Store several responses in one go
    async fn put_all(&self, name: &str, entries: Vec<(RequestKey, FetchResponse)>) -> CacheResult<()> {
        for (key, response) in entries {
            self.put(name, key, response).await?;
        }
        Ok(())
    }

    /// Remove one entry. Returns whether it existed.
    async fn delete_entry(&self, name: &str, key: &RequestKey) -> CacheResult<bool>;

    /// Keys stored in one cache
    async fn entries(&self, name: &str) -> CacheResult<Vec<RequestKey>>;
}

/// The caches themselves, shared by the storage backends
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct CacheMap {
    caches: BTreeMap<String, BTreeMap<RequestKey, FetchResponse>>,
}

impl CacheMap {
    pub(crate) fn open(&mut self, name: &str) -> CacheResult<bool> {
        if name.is_empty() {
            return Err(CacheError::EmptyName);
        }
        if self.caches.contains_key(name) {
            return Ok(false);
        }
        self.caches.insert(name.to_string(), BTreeMap::new());
        Ok(true)
    }

    pub(crate) fn has(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    pub(crate) fn delete(&mut self, name: &str) -> bool {
        self.caches.remove(name).is_some()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.caches.keys().cloned().collect()
    }

    pub(crate) fn get(&self, name: &str, key: &RequestKey) -> Option<FetchResponse> {
        self.caches.get(name).and_then(|c| c.get(key)).cloned()
    }

    pub(crate) fn put(&mut self, name: &str, key: RequestKey, response: FetchResponse) -> CacheResult<()> {
        if response.status == 206 {
            return Err(CacheError::PartialResponse);
        }
        let cache = self
            .caches
            .get_mut(name)
            .ok_or_else(|| CacheError::CacheNotFound(name.to_string()))?;
        cache.insert(key, response);
        Ok(())
    }

    /// All-or-nothing insert of several entries
    pub(crate) fn put_all(&mut self, name: &str, entries: Vec<(RequestKey, FetchResponse)>) -> CacheResult<()> {
        if entries.iter().any(|(_, r)| r.status == 206) {
            return Err(CacheError::PartialResponse);
        }
        let cache = self
            .caches
            .get_mut(name)
            .ok_or_else(|| CacheError::CacheNotFound(name.to_string()))?;
        cache.extend(entries);
        Ok(())
    }

    pub(crate) fn delete_entry(&mut self, name: &str, key: &RequestKey) -> CacheResult<bool> {
        let cache = self
            .caches
            .get_mut(name)
            .ok_or_else(|| CacheError::CacheNotFound(name.to_string()))?;
        Ok(cache.remove(key).is_some())
    }

    pub(crate) fn entries(&self, name: &str) -> CacheResult<Vec<RequestKey>> {
        self.caches
            .get(name)
            .map(|c| c.keys().cloned().collect())
            .ok_or_else(|| CacheError::CacheNotFound(name.to_string()))
    }

    pub(crate) fn to_snapshot(&self) -> Snapshot {
        let caches = self
            .caches
            .iter()
            .map(|(name, entries)| {
                let entries = entries
                    .iter()
                    .map(|(key, response)| StoredEntry {
                        key: key.clone(),
                        response: response.clone(),
                    })
                    .collect();
                (name.clone(), entries)
            })
            .collect();
        Snapshot { caches }
    }

    pub(crate) fn from_snapshot(snapshot: Snapshot) -> Self {
        let caches = snapshot
            .caches
            .into_iter()
            .map(|(name, entries)| {
                let entries = entries.into_iter().map(|e| (e.key, e.response)).collect();
                (name, entries)
            })
            .collect();
        Self { caches }
    }
}

/// On-disk form of a [`CacheMap`]
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    caches: BTreeMap<String, Vec<StoredEntry>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: RequestKey,
    response: FetchResponse,
}

/// In-process cache storage. Cache names are listed in sorted order.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    inner: RwLock<CacheMap>,
}

impl MemoryCacheStorage {
    /// Create an empty storage
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> CacheResult<()> {
        self.inner.write().open(name).map(|_| ())
    }

    async fn has(&self, name: &str) -> CacheResult<bool> {
        Ok(self.inner.read().has(name))
    }

    async fn delete(&self, name: &str) -> CacheResult<bool> {
        Ok(self.inner.write().delete(name))
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        Ok(self.inner.read().names())
    }

    async fn get(&self, name: &str, key: &RequestKey) -> CacheResult<Option<FetchResponse>> {
        Ok(self.inner.read().get(name, key))
    }

    async fn put(&self, name: &str, key: RequestKey, response: FetchResponse) -> CacheResult<()> {
        self.inner.write().put(name, key, response)
    }

    async fn put_all(&self, name: &str, entries: Vec<(RequestKey, FetchResponse)>) -> CacheResult<()> {
        self.inner.write().put_all(name, entries)
    }

    async fn delete_entry(&self, name: &str, key: &RequestKey) -> CacheResult<bool> {
        self.inner.write().delete_entry(name, key)
    }

    async fn entries(&self, name: &str) -> CacheResult<Vec<RequestKey>> {
        self.inner.read().entries(name)
    }
}
