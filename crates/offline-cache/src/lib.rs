//! Versioned response stores for the offline cache agent.
//!
//! This crate provides:
//! - `RequestKey` - Request identity (method + absolute URL)
//! - `CacheStore` / `CacheHandle` - Named store capability
//! - `MemoryCacheStore` - In-process backend
//! - `FsCacheStore` - Directory-backed backend that survives restarts
//! - `InterceptPolicy` - Which requests are intercepted and which responses are stored
//!
//! # Example
//!
//! ```ignore
//! use offline_cache::{CacheStore, MemoryCacheStore, RequestKey};
//! use offline_core::{RequestRecord, ResponseRecord};
//!
//! let store = MemoryCacheStore::new();
//! let cache = store.open("app-v1").await?;
//!
//! let key = RequestKey::from_request(&RequestRecord::get("https://app.test/"));
//! cache.put(&key, &ResponseRecord::ok("<html>")).await?;
//!
//! let hit = store.match_any(&key, Some("app-v1")).await?;
//! ```

mod fs;
mod key;
mod memory;
mod policy;
mod store;

pub use fs::*;
pub use key::*;
pub use memory::*;
pub use policy::*;
pub use store::*;
