//! The cache-first agent.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::try_join_all;
use offline_cache::{
    BypassReason, CacheHandle, CacheStatus, CacheStore, InterceptPolicy, Interception, RequestKey,
    StoreDecision,
};
use offline_core::{
    AgentConfig, AgentPhase, CacheVersion, LifecycleError, LifecycleObserver, LifecycleState,
    RequestRecord, ResponseRecord,
};
use offline_observability::AgentMetrics;
use tokio::sync::Notify;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::error::{ActivationDeletionError, InstallError, NetworkError};
use crate::fetcher::NetworkFetcher;
use crate::host::{ClientHost, LoggingHost};

/// Outcome of intercepting a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchDecision {
    /// Not handled; the host performs its default network fetch.
    PassThrough(BypassReason),
    /// Answer the request with this response.
    Respond {
        response: ResponseRecord,
        status: CacheStatus,
    },
}

impl FetchDecision {
    /// The response, if the agent answered.
    pub fn response(&self) -> Option<&ResponseRecord> {
        match self {
            Self::Respond { response, .. } => Some(response),
            Self::PassThrough(_) => None,
        }
    }

    /// Consume into the response, if the agent answered.
    pub fn into_response(self) -> Option<ResponseRecord> {
        match self {
            Self::Respond { response, .. } => Some(response),
            Self::PassThrough(_) => None,
        }
    }

    /// How the request was handled.
    pub fn status(&self) -> CacheStatus {
        match self {
            Self::Respond { status, .. } => *status,
            Self::PassThrough(_) => CacheStatus::Bypass,
        }
    }
}

/// Result of an activation. Activation never fails; problems are collected
/// here.
#[derive(Debug, Default)]
pub struct ActivationReport {
    /// Version kept.
    pub version: String,
    /// Stale caches that were deleted.
    pub deleted: Vec<String>,
    /// Stale caches that could not be deleted.
    pub failures: Vec<ActivationDeletionError>,
    /// Set when the cache names could not be listed.
    pub listing_error: Option<String>,
    /// Set when activation was not attempted because the instance was not
    /// waiting (install failed, never ran, or activation already happened).
    pub skipped: bool,
}

impl ActivationReport {
    fn new(version: &CacheVersion) -> Self {
        Self {
            version: version.to_string(),
            ..Default::default()
        }
    }

    /// Whether every stale cache was removed.
    pub fn is_clean(&self) -> bool {
        !self.skipped && self.failures.is_empty() && self.listing_error.is_none()
    }
}

/// Cache-first request interception over a versioned cache store.
///
/// Handlers take `&self`; share the agent behind an `Arc` to serve
/// concurrent fetches.
pub struct CacheAgent {
    config: AgentConfig,
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn NetworkFetcher>,
    host: Arc<dyn ClientHost>,
    policy: InterceptPolicy,
    lifecycle: Mutex<LifecycleState>,
    observers: Vec<Arc<dyn LifecycleObserver>>,
    metrics: AgentMetrics,
    skip_signal: Notify,
}

impl std::fmt::Debug for CacheAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheAgent")
            .field("version", &self.config.version)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl CacheAgent {
    /// Create an agent in the `Installing` phase.
    pub fn new(
        config: AgentConfig,
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn NetworkFetcher>,
    ) -> Self {
        let policy = InterceptPolicy::from_config(&config);
        Self {
            config,
            store,
            fetcher,
            host: Arc::new(LoggingHost),
            policy,
            lifecycle: Mutex::new(LifecycleState::new()),
            observers: Vec::new(),
            metrics: AgentMetrics::new(),
            skip_signal: Notify::new(),
        }
    }

    /// Send lifecycle signals to this host.
    pub fn with_host(mut self, host: Arc<dyn ClientHost>) -> Self {
        self.host = host;
        self
    }

    /// Notify an observer on every phase transition.
    pub fn with_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Start from a phase recorded earlier, e.g. by a previous process.
    pub fn with_phase(self, phase: AgentPhase) -> Self {
        *self.state() = LifecycleState::resume(phase);
        self
    }

    /// Current cache version.
    pub fn version(&self) -> &CacheVersion {
        &self.config.version
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn host(&self) -> &Arc<dyn ClientHost> {
        &self.host
    }

    pub fn metrics(&self) -> &AgentMetrics {
        &self.metrics
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> AgentPhase {
        self.state().phase()
    }

    /// Reason for a failed install, if any.
    pub fn install_failure(&self) -> Option<String> {
        self.state().failure().map(str::to_string)
    }

    /// Whether skip-waiting has been requested.
    pub fn skip_waiting_requested(&self) -> bool {
        self.state().skip_waiting_requested()
    }

    /// Whether this instance may leave `Waiting`.
    pub fn can_activate(&self, clients_released: bool) -> bool {
        self.state().can_activate(clients_released)
    }

    /// Pre-populate the cache named after the current version.
    ///
    /// Every manifest asset is fetched before anything is written; one
    /// failed fetch or non-2xx response fails the whole install. Entries
    /// already written by a failed store step are left in place.
    pub async fn install(&self) -> Result<(), InstallError> {
        let paths = self.config.manifest.unique_paths();
        info!(version = %self.config.version, assets = paths.len(), "install started");

        match self.populate(&paths).await {
            Ok(count) => {
                self.transition(LifecycleState::installed);
                info!(version = %self.config.version, assets = count, "install complete");
                if self.config.skip_waiting_on_install {
                    self.skip_waiting().await;
                }
                Ok(())
            }
            Err(err) => {
                error!(version = %self.config.version, error = %err, "install failed");
                let reason = err.to_string();
                self.transition(|state| state.install_failed(reason));
                Err(err)
            }
        }
    }

    async fn populate(&self, paths: &[&str]) -> Result<usize, InstallError> {
        let name = self.config.version.as_str();
        let cache = self
            .store
            .open(name)
            .await
            .map_err(|source| InstallError::Open {
                name: name.to_string(),
                source,
            })?;

        let fetches = paths.iter().map(|path| async move {
            let url = self.config.resolve(path);
            let request = RequestRecord::get(url.clone());
            debug!(url = %url, "fetching asset");

            let response = self
                .fetcher
                .fetch(&request)
                .await
                .map_err(|source| InstallError::Fetch {
                    url: url.clone(),
                    source,
                })?;

            if !response.is_success() {
                return Err(InstallError::BadStatus {
                    url,
                    status: response.status,
                });
            }

            Ok::<_, InstallError>((RequestKey::from_request(&request), response))
        });
        let assets = try_join_all(fetches).await?;

        for (key, response) in &assets {
            cache
                .put(key, response)
                .await
                .map_err(|source| InstallError::Store {
                    url: key.url.clone(),
                    source,
                })?;
            self.metrics.record_installed_asset();
            debug!(url = %key.url, status = response.status, "asset stored");
        }

        Ok(assets.len())
    }

    /// Delete every cache not named after the current version, then claim
    /// open pages.
    pub async fn activate(&self) -> ActivationReport {
        let mut report = ActivationReport::new(&self.config.version);

        if !self.transition(LifecycleState::begin_activation) {
            warn!(
                version = %self.config.version,
                phase = %self.phase(),
                "instance is not waiting; keeping existing caches"
            );
            report.skipped = true;
            return report;
        }
        info!(version = %self.config.version, "activation started");

        match self.store.keys().await {
            Ok(names) => {
                for name in names {
                    if name == self.config.version.as_str() {
                        continue;
                    }
                    match self.store.delete(&name).await {
                        Ok(_) => {
                            info!(cache = %name, "deleted stale cache");
                            self.metrics.record_deleted_cache();
                            report.deleted.push(name);
                        }
                        Err(source) => {
                            let err = ActivationDeletionError { name, source };
                            warn!(error = %err, "stale cache not deleted");
                            report.failures.push(err);
                        }
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to list caches");
                report.listing_error = Some(err.to_string());
            }
        }

        self.host.claim().await;
        self.transition(LifecycleState::activated);
        info!(
            version = %self.config.version,
            deleted = report.deleted.len(),
            failures = report.failures.len(),
            "activation complete"
        );
        report
    }

    /// Intercept a request.
    ///
    /// Non-`GET` requests and extension-internal URLs pass through. Others
    /// are served from any stored cache, or fetched and opportunistically
    /// stored. A failed navigation falls back to the cached root page.
    pub async fn handle_fetch(
        &self,
        request: &RequestRecord,
    ) -> Result<FetchDecision, NetworkError> {
        let span = info_span!(
            "fetch",
            request_id = %request.request_id,
            method = %request.method,
            url = %request.url,
        );
        self.respond(request).instrument(span).await
    }

    async fn respond(&self, request: &RequestRecord) -> Result<FetchDecision, NetworkError> {
        if let Interception::Bypass(reason) = self.policy.intercept(request) {
            debug!(%reason, "pass through");
            self.metrics.record_bypass();
            return Ok(FetchDecision::PassThrough(reason));
        }

        let key = RequestKey::from_request(request);
        if let Some(response) = self.lookup(&key).await {
            debug!(status = %CacheStatus::Hit, "served from cache");
            self.metrics.record_hit();
            return Ok(FetchDecision::Respond {
                response,
                status: CacheStatus::Hit,
            });
        }

        self.metrics.record_miss();
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                self.store_copy(&key, &response).await;
                debug!(status = %CacheStatus::Miss, code = response.status, "served from network");
                Ok(FetchDecision::Respond {
                    response,
                    status: CacheStatus::Miss,
                })
            }
            Err(err) if request.is_navigation() => {
                let root = RequestKey::get(self.config.root_url());
                match self.lookup(&root).await {
                    Some(response) => {
                        info!(error = %err, root = %root.url, "offline navigation served from root page");
                        self.metrics.record_fallback();
                        Ok(FetchDecision::Respond {
                            response,
                            status: CacheStatus::Fallback,
                        })
                    }
                    None => {
                        warn!(error = %err, "navigation failed and root page is not cached");
                        self.metrics.record_network_error();
                        Err(err)
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "network fetch failed");
                self.metrics.record_network_error();
                Err(err)
            }
        }
    }

    async fn lookup(&self, key: &RequestKey) -> Option<ResponseRecord> {
        match self
            .store
            .match_any(key, Some(self.config.version.as_str()))
            .await
        {
            Ok(hit) => hit,
            Err(err) => {
                warn!(key = %key, error = %err, "cache lookup failed; treating as miss");
                None
            }
        }
    }

    async fn store_copy(&self, key: &RequestKey, response: &ResponseRecord) {
        if let StoreDecision::Skip(reason) = self.policy.store_decision(response) {
            debug!(%reason, "response not stored");
            self.metrics.record_not_stored();
            return;
        }

        let result = match self.store.open(self.config.version.as_str()).await {
            Ok(cache) => cache.put(key, response).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => self.metrics.record_stored(),
            Err(err) => {
                warn!(key = %key, error = %err, "failed to store response");
                self.metrics.record_store_failure();
            }
        }
    }

    /// Make a waiting instance eligible for activation now.
    pub async fn skip_waiting(&self) {
        self.state().request_skip_waiting();
        self.skip_signal.notify_one();
        self.host.skip_waiting().await;
    }

    /// Resolve once skip-waiting has been requested.
    pub async fn wait_for_skip_waiting(&self) {
        if self.skip_waiting_requested() {
            return;
        }
        self.skip_signal.notified().await;
    }

    fn state(&self) -> MutexGuard<'_, LifecycleState> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a lifecycle step. Returns whether the transition was allowed.
    fn transition<T>(&self, step: T) -> bool
    where
        T: FnOnce(&mut LifecycleState) -> Result<AgentPhase, LifecycleError>,
    {
        let (result, elapsed) = {
            let mut state = self.state();
            let result = step(&mut state);
            (result, state.timing().elapsed())
        };

        match result {
            Ok(phase) => {
                debug!(%phase, ?elapsed, "lifecycle transition");
                for observer in &self.observers {
                    observer.on_phase(phase, elapsed);
                }
                true
            }
            Err(err) => {
                warn!(error = %err, "lifecycle transition rejected");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use offline_cache::MemoryCacheStore;
    use offline_core::AssetManifest;

    use crate::host::{HostSignal, RecordingHost};

    #[derive(Default)]
    struct StubFetcher {
        responses: HashMap<String, ResponseRecord>,
        calls: AtomicUsize,
    }

    impl StubFetcher {
        fn with(mut self, url: &str, response: ResponseRecord) -> Self {
            self.responses.insert(url.to_string(), response);
            self
        }
    }

    #[async_trait]
    impl NetworkFetcher for StubFetcher {
        async fn fetch(&self, request: &RequestRecord) -> Result<ResponseRecord, NetworkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .get(&request.url)
                .cloned()
                .ok_or(NetworkError::Offline)
        }
    }

    fn config() -> AgentConfig {
        AgentConfig::new("https://app.test")
            .with_version("v1")
            .with_manifest(AssetManifest::new(["/654/", "/654/app.js"]))
    }

    fn fetcher() -> StubFetcher {
        StubFetcher::default()
            .with("https://app.test/654/", ResponseRecord::ok("<html>"))
            .with("https://app.test/654/app.js", ResponseRecord::ok("js"))
    }

    #[tokio::test]
    async fn test_install_moves_to_waiting_and_skips() {
        let host = Arc::new(RecordingHost::new());
        let agent = CacheAgent::new(config(), Arc::new(MemoryCacheStore::new()), Arc::new(fetcher()))
            .with_host(host.clone());

        agent.install().await.unwrap();
        assert_eq!(agent.phase(), AgentPhase::Waiting);
        assert!(agent.skip_waiting_requested());
        assert_eq!(host.signals(), vec![HostSignal::SkipWaiting]);
        assert_eq!(agent.metrics().snapshot().installed_assets, 2);
    }

    #[tokio::test]
    async fn test_install_without_forced_activation_keeps_waiting() {
        let host = Arc::new(RecordingHost::new());
        let agent = CacheAgent::new(
            config().without_forced_activation(),
            Arc::new(MemoryCacheStore::new()),
            Arc::new(fetcher()),
        )
        .with_host(host.clone());

        agent.install().await.unwrap();
        assert!(!agent.skip_waiting_requested());
        assert!(!agent.can_activate(false));
        assert!(agent.can_activate(true));
        assert!(host.signals().is_empty());
    }

    #[tokio::test]
    async fn test_install_failure_is_terminal() {
        let fetcher = StubFetcher::default().with("https://app.test/654/", ResponseRecord::ok("<html>"));
        let agent = CacheAgent::new(config(), Arc::new(MemoryCacheStore::new()), Arc::new(fetcher));

        let err = agent.install().await.unwrap_err();
        assert!(matches!(err, InstallError::Fetch { ref url, .. } if url == "https://app.test/654/app.js"));
        assert_eq!(agent.phase(), AgentPhase::InstallFailed);
        assert!(agent.install_failure().is_some());
    }

    #[tokio::test]
    async fn test_install_rejects_non_ok_status() {
        let fetcher = fetcher().with("https://app.test/654/app.js", ResponseRecord::new(404));
        let agent = CacheAgent::new(config(), Arc::new(MemoryCacheStore::new()), Arc::new(fetcher));

        let err = agent.install().await.unwrap_err();
        assert!(matches!(err, InstallError::BadStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_activate_after_failed_install_keeps_caches() {
        let store = Arc::new(MemoryCacheStore::new());
        store.open("v0").await.unwrap();

        let agent = CacheAgent::new(config(), store.clone(), Arc::new(StubFetcher::default()));
        assert!(agent.install().await.is_err());

        let report = agent.activate().await;
        assert!(report.skipped);
        assert!(!report.is_clean());
        assert!(store.has("v0").await.unwrap());
    }

    #[tokio::test]
    async fn test_activate_twice_deletes_only_once() {
        let store = Arc::new(MemoryCacheStore::new());
        let host = Arc::new(RecordingHost::new());
        let agent = CacheAgent::new(config(), store.clone(), Arc::new(fetcher())).with_host(host.clone());
        agent.install().await.unwrap();
        assert!(agent.activate().await.is_clean());

        store.open("v0").await.unwrap();
        let report = agent.activate().await;

        assert!(report.skipped);
        assert!(report.deleted.is_empty());
        assert!(store.has("v0").await.unwrap());
        assert_eq!(agent.phase(), AgentPhase::Active);
        assert_eq!(host.signals(), vec![HostSignal::SkipWaiting, HostSignal::Claim]);
    }

    #[tokio::test]
    async fn test_lookup_prefers_current_version() {
        let store = Arc::new(MemoryCacheStore::new());
        let key = RequestKey::get("https://app.test/654/");
        store
            .open("old")
            .await
            .unwrap()
            .put(&key, &ResponseRecord::ok("old"))
            .await
            .unwrap();
        store
            .open("v1")
            .await
            .unwrap()
            .put(&key, &ResponseRecord::ok("new"))
            .await
            .unwrap();

        let agent = CacheAgent::new(config(), store, Arc::new(StubFetcher::default()));
        let decision = agent
            .handle_fetch(&RequestRecord::get("https://app.test/654/"))
            .await
            .unwrap();

        assert_eq!(decision.status(), CacheStatus::Hit);
        assert_eq!(decision.response().unwrap().text(), "new");
    }

    #[tokio::test]
    async fn test_wait_for_skip_waiting_after_request() {
        let agent = CacheAgent::new(config(), Arc::new(MemoryCacheStore::new()), Arc::new(fetcher()));
        agent.skip_waiting().await;
        agent.wait_for_skip_waiting().await;
        assert!(agent.skip_waiting_requested());
    }

    #[test]
    fn test_fetch_decision_accessors() {
        let pass = FetchDecision::PassThrough(BypassReason::Method(offline_core::Method::Post));
        assert_eq!(pass.status(), CacheStatus::Bypass);
        assert!(pass.response().is_none());

        let respond = FetchDecision::Respond {
            response: ResponseRecord::ok("x"),
            status: CacheStatus::Miss,
        };
        assert_eq!(respond.into_response().unwrap().text(), "x");
    }
}
