//! Agent error types.

use std::time::Duration;

use offline_cache::CacheError;

/// Error raised by a `NetworkFetcher`.
///
/// Returned to the caller unchanged unless an offline navigation can be
/// answered with the cached root page.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("network offline")]
    Offline,

    #[error("DNS lookup failed for {0}")]
    Dns(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("request error: {0}")]
    Request(String),
}

/// Install failure. Fatal to the install attempt; no retry is scheduled.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("failed to open cache '{name}': {source}")]
    Open {
        name: String,
        #[source]
        source: CacheError,
    },

    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: NetworkError,
    },

    #[error("bad response for {url}: status {status}")]
    BadStatus { url: String, status: u16 },

    #[error("failed to store {url}: {source}")]
    Store {
        url: String,
        #[source]
        source: CacheError,
    },
}

/// A stale cache that could not be deleted during activation. Non-fatal.
#[derive(Debug, thiserror::Error)]
#[error("failed to delete stale cache '{name}': {source}")]
pub struct ActivationDeletionError {
    /// Cache name.
    pub name: String,
    #[source]
    pub source: CacheError,
}
