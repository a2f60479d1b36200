//! Named cache store capability.

use std::sync::Arc;

use async_trait::async_trait;
use offline_core::ResponseRecord;

use crate::key::RequestKey;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Cache name cannot be used by this backend.
    #[error("invalid cache name: {0}")]
    InvalidName(String),

    /// Failed to serialize/deserialize cache entry.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend storage error.
    #[error("storage error: {0}")]
    Storage(String),
}

/// One named collection of request → response entries.
#[async_trait]
pub trait CacheHandle: Send + Sync {
    /// Name of this cache.
    fn name(&self) -> &str;

    /// Look up the response stored for a request identity.
    async fn match_request(&self, key: &RequestKey) -> CacheResult<Option<ResponseRecord>>;

    /// Store a response, overwriting any previous entry.
    async fn put(&self, key: &RequestKey, response: &ResponseRecord) -> CacheResult<()>;

    /// Remove an entry. Returns whether it existed.
    async fn delete(&self, key: &RequestKey) -> CacheResult<bool>;

    /// All stored request identities.
    async fn keys(&self) -> CacheResult<Vec<RequestKey>>;
}

/// Collection of named caches.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Open a cache, creating it if missing.
    async fn open(&self, name: &str) -> CacheResult<Arc<dyn CacheHandle>>;

    /// Whether a cache with this name exists.
    async fn has(&self, name: &str) -> CacheResult<bool>;

    /// Delete a cache and all its entries. Returns whether it existed.
    async fn delete(&self, name: &str) -> CacheResult<bool>;

    /// Names of all existing caches.
    async fn keys(&self) -> CacheResult<Vec<String>>;

    /// Look up a request across every cache.
    ///
    /// The `preferred` cache is searched first when it exists; the others
    /// follow in `keys()` order.
    async fn match_any(
        &self,
        key: &RequestKey,
        preferred: Option<&str>,
    ) -> CacheResult<Option<ResponseRecord>> {
        if let Some(name) = preferred {
            if self.has(name).await? {
                if let Some(hit) = self.open(name).await?.match_request(key).await? {
                    return Ok(Some(hit));
                }
            }
        }

        for name in self.keys().await? {
            if Some(name.as_str()) == preferred {
                continue;
            }
            if let Some(hit) = self.open(&name).await?.match_request(key).await? {
                return Ok(Some(hit));
            }
        }

        Ok(None)
    }
}
