//! Cache storage persisted as a JSON snapshot in a directory.
//!
//! Every mutation rewrites the snapshot through a temporary file followed by a
//! rename, so a crash never leaves a half-written snapshot behind.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::error::CacheResult;
use crate::request::{FetchResponse, RequestKey};
use crate::storage::{CacheMap, CacheStorage, Snapshot};

const SNAPSHOT_FILE: &str = "cache_storage.json";

/// Cache storage that survives process restarts
#[derive(Debug)]
pub struct FileCacheStorage {
    path: PathBuf,
    inner: Mutex<CacheMap>,
}

impl FileCacheStorage {
    /// Open the storage in `dir`, creating the directory if needed and
    /// loading any existing snapshot.
    pub async fn open_dir(dir: impl AsRef<Path>) -> CacheResult<Self> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(SNAPSHOT_FILE);

        let map = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
                CacheMap::from_snapshot(snapshot)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => CacheMap::default(),
            Err(err) => return Err(err.into()),
        };
        log::debug!("Loaded cache storage from {}", path.display());

        Ok(Self {
            path,
            inner: Mutex::new(map),
        })
    }

    /// Location of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, map: &CacheMap) -> CacheResult<()> {
        let bytes = serde_json::to_vec(&map.to_snapshot())?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Apply `f` to a copy of the map and commit it only once it is on disk
    async fn mutate<T>(&self, f: impl FnOnce(&mut CacheMap) -> CacheResult<T> + Send) -> CacheResult<T> {
        let mut guard = self.inner.lock().await;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        if next != *guard {
            self.persist(&next).await?;
            *guard = next;
        }
        Ok(out)
    }
}

#[async_trait]
impl CacheStorage for FileCacheStorage {
    async fn open(&self, name: &str) -> CacheResult<()> {
        self.mutate(|map| map.open(name)).await.map(|_| ())
    }

    async fn has(&self, name: &str) -> CacheResult<bool> {
        Ok(self.inner.lock().await.has(name))
    }

    async fn delete(&self, name: &str) -> CacheResult<bool> {
        self.mutate(|map| Ok(map.delete(name))).await
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        Ok(self.inner.lock().await.names())
    }

    async fn get(&self, name: &str, key: &RequestKey) -> CacheResult<Option<FetchResponse>> {
        Ok(self.inner.lock().await.get(name, key))
    }

    async fn put(&self, name: &str, key: RequestKey, response: FetchResponse) -> CacheResult<()> {
        self.mutate(|map| map.put(name, key, response)).await
    }

    async fn put_all(&self, name: &str, entries: Vec<(RequestKey, FetchResponse)>) -> CacheResult<()> {
        self.mutate(|map| map.put_all(name, entries)).await
    }

    async fn delete_entry(&self, name: &str, key: &RequestKey) -> CacheResult<bool> {
        self.mutate(|map| map.delete_entry(name, key)).await
    }

    async fn entries(&self, name: &str) -> CacheResult<Vec<RequestKey>> {
        self.inner.lock().await.entries(name)
    }
}
