//! Directory-backed cache backend.
//!
//! Layout: one directory per cache under the store root, one JSON file per
//! entry named by the request key digest.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use offline_core::{is_valid_cache_name, RequestId, ResponseRecord};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

use crate::key::RequestKey;
use crate::store::{CacheError, CacheHandle, CacheResult, CacheStore};

/// A stored entry as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    /// Request identity.
    pub key: RequestKey,
    /// Captured response.
    pub response: ResponseRecord,
    /// When the entry was written.
    pub stored_at: DateTime<Utc>,
}

/// A single cache directory.
#[derive(Debug)]
pub struct FsCache {
    name: String,
    dir: PathBuf,
}

impl FsCache {
    fn entry_path(&self, key: &RequestKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.digest()))
    }

    /// Read every entry, including write timestamps.
    pub async fn entries(&self) -> CacheResult<Vec<StoredEntry>> {
        let mut entries = Vec::new();
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(e.into()),
        };

        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().map_or(true, |e| e != "json") {
                continue;
            }
            let bytes = fs::read(&path).await?;
            entries.push(serde_json::from_slice::<StoredEntry>(&bytes)?);
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}

#[async_trait]
impl CacheHandle for FsCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn match_request(&self, key: &RequestKey) -> CacheResult<Option<ResponseRecord>> {
        let bytes = match fs::read(self.entry_path(key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: StoredEntry = serde_json::from_slice(&bytes)?;
        Ok(Some(entry.response))
    }

    async fn put(&self, key: &RequestKey, response: &ResponseRecord) -> CacheResult<()> {
        let entry = StoredEntry {
            key: key.clone(),
            response: response.clone(),
            stored_at: Utc::now(),
        };
        let bytes = serde_json::to_vec(&entry)?;

        fs::create_dir_all(&self.dir).await?;

        // Write-then-rename keeps each entry replacement atomic. Temp names
        // are unique per write so concurrent puts of one key never share one.
        let path = self.entry_path(key);
        let tmp = self
            .dir
            .join(format!("{}.{}.tmp", key.digest(), RequestId::generate()));
        fs::write(&tmp, bytes).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!(cache = %self.name, key = %key, "entry written");
        Ok(())
    }

    async fn delete(&self, key: &RequestKey) -> CacheResult<bool> {
        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self) -> CacheResult<Vec<RequestKey>> {
        Ok(self.entries().await?.into_iter().map(|e| e.key).collect())
    }
}

/// Cache store persisted under a root directory.
///
/// Cache names must be non-empty and consist of ASCII alphanumerics, `.`,
/// `-` or `_`. Names are listed in lexical order.
#[derive(Debug, Clone)]
pub struct FsCacheStore {
    root: PathBuf,
}

impl FsCacheStore {
    /// Create a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Open an existing cache with its concrete type.
    pub async fn get(&self, name: &str) -> CacheResult<Option<FsCache>> {
        if !self.has(name).await? {
            return Ok(None);
        }
        Ok(Some(self.cache(name)?))
    }

    fn cache(&self, name: &str) -> CacheResult<FsCache> {
        validate_name(name)?;
        Ok(FsCache {
            name: name.to_string(),
            dir: self.root.join(name),
        })
    }
}

fn validate_name(name: &str) -> CacheResult<()> {
    if is_valid_cache_name(name) {
        Ok(())
    } else {
        Err(CacheError::InvalidName(name.to_string()))
    }
}

#[async_trait]
impl CacheStore for FsCacheStore {
    async fn open(&self, name: &str) -> CacheResult<Arc<dyn CacheHandle>> {
        let cache = self.cache(name)?;
        fs::create_dir_all(&cache.dir).await?;
        Ok(Arc::new(cache))
    }

    async fn has(&self, name: &str) -> CacheResult<bool> {
        if validate_name(name).is_err() {
            return Ok(false);
        }
        match fs::metadata(self.root.join(name)).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, name: &str) -> CacheResult<bool> {
        if !self.has(name).await? {
            return Ok(false);
        }
        fs::remove_dir_all(self.root.join(name)).await?;
        Ok(true)
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        let mut names = Vec::new();
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };

        while let Some(item) = dir.next_entry().await? {
            if !item.file_type().await?.is_dir() {
                continue;
            }
            match item.file_name().to_str() {
                Some(name) if is_valid_cache_name(name) => names.push(name.to_string()),
                _ => warn!(path = %item.path().display(), "skipping directory with invalid cache name"),
            }
        }

        names.sort();
        Ok(names)
    }
}
