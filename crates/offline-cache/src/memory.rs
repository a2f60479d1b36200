//! In-memory cache backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use offline_core::ResponseRecord;
use tokio::sync::RwLock;

use crate::key::RequestKey;
use crate::store::{CacheHandle, CacheResult, CacheStore};

/// A single in-memory cache.
#[derive(Debug)]
pub struct MemoryCache {
    name: String,
    entries: RwLock<BTreeMap<RequestKey, ResponseRecord>>,
}

impl MemoryCache {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache has no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheHandle for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn match_request(&self, key: &RequestKey) -> CacheResult<Option<ResponseRecord>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &RequestKey, response: &ResponseRecord) -> CacheResult<()> {
        self.entries
            .write()
            .await
            .insert(key.clone(), response.clone());
        Ok(())
    }

    async fn delete(&self, key: &RequestKey) -> CacheResult<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn keys(&self) -> CacheResult<Vec<RequestKey>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}

/// In-memory cache store. Cache names are listed in creation order.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    caches: RwLock<Vec<Arc<MemoryCache>>>,
}

impl MemoryCacheStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an existing cache without creating it.
    pub async fn get(&self, name: &str) -> Option<Arc<MemoryCache>> {
        self.caches
            .read()
            .await
            .iter()
            .find(|c| c.name == name)
            .cloned()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn open(&self, name: &str) -> CacheResult<Arc<dyn CacheHandle>> {
        let mut caches = self.caches.write().await;
        if let Some(existing) = caches.iter().find(|c| c.name == name) {
            return Ok(existing.clone());
        }

        let cache = Arc::new(MemoryCache::new(name));
        caches.push(cache.clone());
        Ok(cache)
    }

    async fn has(&self, name: &str) -> CacheResult<bool> {
        Ok(self.caches.read().await.iter().any(|c| c.name == name))
    }

    async fn delete(&self, name: &str) -> CacheResult<bool> {
        let mut caches = self.caches.write().await;
        let before = caches.len();
        caches.retain(|c| c.name != name);
        Ok(caches.len() != before)
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        Ok(self
            .caches
            .read()
            .await
            .iter()
            .map(|c| c.name.clone())
            .collect())
    }
}
