//! Agent counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters for one agent instance.
#[derive(Debug, Default)]
pub struct AgentMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    stored: AtomicU64,
    store_failures: AtomicU64,
    not_stored: AtomicU64,
    bypassed: AtomicU64,
    fallbacks: AtomicU64,
    network_errors: AtomicU64,
    installed_assets: AtomicU64,
    deleted_caches: AtomicU64,
}

/// Point-in-time copy of `AgentMetrics`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Requests served from a cache.
    pub hits: u64,
    /// Requests that went to the network.
    pub misses: u64,
    /// Network responses written to the cache.
    pub stored: u64,
    /// Best-effort writes that failed.
    pub store_failures: u64,
    /// Network responses returned without storing (status or type).
    pub not_stored: u64,
    /// Requests left to default handling.
    pub bypassed: u64,
    /// Offline navigations answered with the cached root page.
    pub fallbacks: u64,
    /// Network failures propagated to the caller.
    pub network_errors: u64,
    /// Assets written during install.
    pub installed_assets: u64,
    /// Stale caches deleted during activation.
    pub deleted_caches: u64,
}

impl MetricsSnapshot {
    /// Fraction of intercepted requests served from cache.
    pub fn hit_ratio(&self) -> Option<f64> {
        let total = self.hits + self.misses;
        if total == 0 {
            None
        } else {
            Some(self.hits as f64 / total as f64)
        }
    }

    /// Format as JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl AgentMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stored(&self) {
        self.stored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_failure(&self) {
        self.store_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_not_stored(&self) {
        self.not_stored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bypass(&self) {
        self.bypassed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_network_error(&self) {
        self.network_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_installed_asset(&self) {
        self.installed_assets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deleted_cache(&self) {
        self.deleted_caches.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stored: self.stored.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
            not_stored: self.not_stored.load(Ordering::Relaxed),
            bypassed: self.bypassed.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            network_errors: self.network_errors.load(Ordering::Relaxed),
            installed_assets: self.installed_assets.load(Ordering::Relaxed),
            deleted_caches: self.deleted_caches.load(Ordering::Relaxed),
        }
    }
}
