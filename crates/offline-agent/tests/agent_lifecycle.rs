//! End-to-end behavior of the agent against scripted capabilities.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use offline_agent::{
    AgentEvent, CacheAgent, ControlMessage, EventOutcome, FetchDecision, HostSignal, InstallError, NetworkError,
    NetworkFetcher, RecordingHost,
};
use offline_cache::{
    BypassReason, CacheError, CacheHandle, CacheResult, CacheStatus, CacheStore, FsCacheStore,
    MemoryCacheStore, RequestKey,
};
use offline_core::{
    AgentConfig, AgentPhase, AssetManifest, Method, RequestMode, RequestRecord, ResponseRecord,
    ResponseType,
};
use tokio::sync::oneshot;

const ORIGIN: &str = "https://ship.test";

/// Fetcher answering from a script, counting every call.
#[derive(Default)]
struct ScriptedFetcher {
    responses: Mutex<HashMap<String, ResponseRecord>>,
    calls: Mutex<Vec<String>>,
    offline: AtomicBool,
}

impl ScriptedFetcher {
    fn site() -> Self {
        let fetcher = Self::default();
        fetcher.respond("/654/", ResponseRecord::ok("<html>root</html>"));
        fetcher.respond("/654/index.html", ResponseRecord::ok("<html>index</html>"));
        fetcher.respond("/654/manifest.json", ResponseRecord::ok("{}"));
        fetcher
    }

    fn respond(&self, path: &str, response: ResponseRecord) {
        self.responses
            .lock()
            .unwrap()
            .insert(format!("{ORIGIN}{path}"), response);
    }

    fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn calls_for(&self, path: &str) -> usize {
        let url = format!("{ORIGIN}{path}");
        self.calls.lock().unwrap().iter().filter(|u| **u == url).count()
    }
}

#[async_trait]
impl NetworkFetcher for ScriptedFetcher {
    async fn fetch(&self, request: &RequestRecord) -> Result<ResponseRecord, NetworkError> {
        self.calls.lock().unwrap().push(request.url.clone());
        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::Offline);
        }
        self.responses
            .lock()
            .unwrap()
            .get(&request.url)
            .cloned()
            .ok_or_else(|| NetworkError::Connection(format!("no route to {}", request.url)))
    }
}

/// Store wrapper whose writes or deletes can be made to fail.
struct FlakyStore {
    inner: MemoryCacheStore,
    fail_puts: AtomicBool,
    fail_delete: Option<String>,
    lookups: AtomicUsize,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: MemoryCacheStore::new(),
            fail_puts: AtomicBool::new(false),
            fail_delete: None,
            lookups: AtomicUsize::new(0),
        }
    }
}

struct FlakyHandle {
    inner: Arc<dyn CacheHandle>,
    fail_puts: bool,
}

#[async_trait]
impl CacheHandle for FlakyHandle {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn match_request(&self, key: &RequestKey) -> CacheResult<Option<ResponseRecord>> {
        self.inner.match_request(key).await
    }

    async fn put(&self, key: &RequestKey, response: &ResponseRecord) -> CacheResult<()> {
        if self.fail_puts {
            return Err(CacheError::Storage("quota exceeded".into()));
        }
        self.inner.put(key, response).await
    }

    async fn delete(&self, key: &RequestKey) -> CacheResult<bool> {
        self.inner.delete(key).await
    }

    async fn keys(&self) -> CacheResult<Vec<RequestKey>> {
        self.inner.keys().await
    }
}

#[async_trait]
impl CacheStore for FlakyStore {
    async fn open(&self, name: &str) -> CacheResult<Arc<dyn CacheHandle>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FlakyHandle {
            inner: self.inner.open(name).await?,
            fail_puts: self.fail_puts.load(Ordering::SeqCst),
        }))
    }

    async fn has(&self, name: &str) -> CacheResult<bool> {
        self.inner.has(name).await
    }

    async fn delete(&self, name: &str) -> CacheResult<bool> {
        if self.fail_delete.as_deref() == Some(name) {
            return Err(CacheError::Storage(format!("{name} is locked")));
        }
        self.inner.delete(name).await
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        self.inner.keys().await
    }
}

fn config() -> AgentConfig {
    AgentConfig::new(ORIGIN)
}

fn url(path: &str) -> String {
    format!("{ORIGIN}{path}")
}

async fn installed_agent() -> (CacheAgent, Arc<MemoryCacheStore>, Arc<ScriptedFetcher>) {
    let store = Arc::new(MemoryCacheStore::new());
    let fetcher = Arc::new(ScriptedFetcher::site());
    let agent = CacheAgent::new(config(), store.clone(), fetcher.clone());
    agent.install().await.unwrap();
    agent.activate().await;
    (agent, store, fetcher)
}

async fn entry_count(store: &MemoryCacheStore, name: &str) -> usize {
    match store.get(name).await {
        Some(cache) => cache.len().await,
        None => 0,
    }
}

#[tokio::test]
async fn install_is_idempotent() {
    let store = Arc::new(MemoryCacheStore::new());
    let fetcher = Arc::new(ScriptedFetcher::site());
    let agent = CacheAgent::new(config(), store.clone(), fetcher.clone());

    agent.install().await.unwrap();
    let first = store.open(agent.version().as_str()).await.unwrap().keys().await.unwrap();

    agent.install().await.unwrap();
    let second = store.open(agent.version().as_str()).await.unwrap().keys().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
    assert_eq!(store.keys().await.unwrap(), vec!["ship-captain-crew-v1.0.0".to_string()]);
}

#[tokio::test]
async fn install_dedupes_manifest() {
    let store = Arc::new(MemoryCacheStore::new());
    let fetcher = Arc::new(ScriptedFetcher::site());
    let config = config().with_manifest(AssetManifest::new(["/654/", "/654/index.html", "/654/"]));
    let agent = CacheAgent::new(config, store.clone(), fetcher.clone());

    agent.install().await.unwrap();
    assert_eq!(fetcher.calls_for("/654/"), 1);
    assert_eq!(entry_count(&store, "ship-captain-crew-v1.0.0").await, 2);
}

#[tokio::test]
async fn install_fails_on_missing_asset() {
    let store = Arc::new(MemoryCacheStore::new());
    let fetcher = Arc::new(ScriptedFetcher::site());
    fetcher.respond("/654/manifest.json", ResponseRecord::new(404));
    let agent = CacheAgent::new(config(), store.clone(), fetcher);

    let err = agent.install().await.unwrap_err();
    assert!(matches!(err, InstallError::BadStatus { status: 404, .. }));
    assert_eq!(agent.phase(), AgentPhase::InstallFailed);
    assert_eq!(entry_count(&store, "ship-captain-crew-v1.0.0").await, 0);
}

#[tokio::test]
async fn install_fails_when_store_rejects_writes() {
    let store = Arc::new(FlakyStore::new());
    store.fail_puts.store(true, Ordering::SeqCst);
    let agent = CacheAgent::new(config(), store, Arc::new(ScriptedFetcher::site()));

    let err = agent.install().await.unwrap_err();
    assert!(matches!(err, InstallError::Store { .. }));
}

#[tokio::test]
async fn activation_keeps_only_current_version() {
    let store = Arc::new(MemoryCacheStore::new());
    for old in ["ship-captain-crew-v0.9.0", "scratch"] {
        store
            .open(old)
            .await
            .unwrap()
            .put(&RequestKey::get(url("/old.js")), &ResponseRecord::ok("old"))
            .await
            .unwrap();
    }

    let host = Arc::new(RecordingHost::new());
    let agent = CacheAgent::new(config(), store.clone(), Arc::new(ScriptedFetcher::site()))
        .with_host(host.clone());
    agent.install().await.unwrap();
    let report = agent.activate().await;

    assert!(report.is_clean());
    assert_eq!(report.deleted.len(), 2);
    assert_eq!(store.keys().await.unwrap(), vec!["ship-captain-crew-v1.0.0".to_string()]);
    assert_eq!(agent.phase(), AgentPhase::Active);
    assert_eq!(host.signals(), vec![HostSignal::SkipWaiting, HostSignal::Claim]);
}

#[tokio::test]
async fn activation_reports_deletion_failures() {
    let mut store = FlakyStore::new();
    store.fail_delete = Some("locked-v0".to_string());
    store.inner.open("locked-v0").await.unwrap();
    store.inner.open("old-v0").await.unwrap();
    let store = Arc::new(store);

    let agent = CacheAgent::new(config(), store.clone(), Arc::new(ScriptedFetcher::site()));
    agent.install().await.unwrap();
    let report = agent.activate().await;

    assert_eq!(report.deleted, vec!["old-v0".to_string()]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].name, "locked-v0");
    assert_eq!(agent.phase(), AgentPhase::Active);
}

#[tokio::test]
async fn activation_before_install_keeps_previous_caches() {
    let store = Arc::new(MemoryCacheStore::new());
    store
        .open("ship-captain-crew-v0.9.0")
        .await
        .unwrap()
        .put(&RequestKey::get(url("/654/")), &ResponseRecord::ok("<html>v0</html>"))
        .await
        .unwrap();

    let fetcher = Arc::new(ScriptedFetcher::site());
    fetcher.go_offline();
    let host = Arc::new(RecordingHost::new());
    let agent = CacheAgent::new(config(), store.clone(), fetcher).with_host(host.clone());

    let outcome = agent.dispatch(AgentEvent::Activate).await.unwrap();
    let EventOutcome::Activated(report) = outcome else {
        panic!("expected an activation report");
    };

    assert!(report.skipped);
    assert!(!report.is_clean());
    assert!(report.deleted.is_empty());
    assert_eq!(agent.phase(), AgentPhase::Installing);
    assert_eq!(store.keys().await.unwrap(), vec!["ship-captain-crew-v0.9.0".to_string()]);
    assert!(host.signals().is_empty());

    let decision = agent
        .handle_fetch(&RequestRecord::navigate(url("/654/ships/7")))
        .await
        .unwrap();
    assert_eq!(decision.status(), CacheStatus::Fallback);
    assert_eq!(decision.response().unwrap().text(), "<html>v0</html>");
}

#[tokio::test]
async fn second_activation_is_a_no_op() {
    let (agent, store, _fetcher) = installed_agent().await;
    assert_eq!(agent.phase(), AgentPhase::Active);

    store.open("ship-captain-crew-v2.0.0").await.unwrap();
    let report = agent.activate().await;

    assert!(report.skipped);
    assert!(report.deleted.is_empty());
    assert!(store.has("ship-captain-crew-v2.0.0").await.unwrap());
    assert_eq!(agent.phase(), AgentPhase::Active);
}

#[tokio::test]
async fn cache_hit_never_calls_network() {
    let (agent, _store, fetcher) = installed_agent().await;
    let before = fetcher.call_count();

    let decision = agent
        .handle_fetch(&RequestRecord::get(url("/654/index.html")))
        .await
        .unwrap();

    assert_eq!(decision.status(), CacheStatus::Hit);
    assert_eq!(decision.response().unwrap().text(), "<html>index</html>");
    assert_eq!(fetcher.call_count(), before);
}

#[tokio::test]
async fn hit_from_older_cache_is_served() {
    let store = Arc::new(MemoryCacheStore::new());
    store
        .open("previous")
        .await
        .unwrap()
        .put(&RequestKey::get(url("/legacy.css")), &ResponseRecord::ok("body{}"))
        .await
        .unwrap();
    let fetcher = Arc::new(ScriptedFetcher::default());
    let agent = CacheAgent::new(config(), store, fetcher.clone());

    let decision = agent
        .handle_fetch(&RequestRecord::get(url("/legacy.css")))
        .await
        .unwrap();
    assert_eq!(decision.status(), CacheStatus::Hit);
    assert_eq!(fetcher.call_count(), 0);
}

#[tokio::test]
async fn only_ok_basic_responses_are_stored() {
    let (agent, store, fetcher) = installed_agent().await;
    fetcher.respond("/app.js", ResponseRecord::ok("console.log(1)"));
    fetcher.respond("/missing.js", ResponseRecord::new(404));
    fetcher.respond(
        "/font.woff2",
        ResponseRecord::ok("font").with_type(ResponseType::Cors),
    );
    let version = agent.version().to_string();
    let before = entry_count(&store, &version).await;

    let ok = agent.handle_fetch(&RequestRecord::get(url("/app.js"))).await.unwrap();
    assert_eq!(ok.status(), CacheStatus::Miss);

    let missing = agent
        .handle_fetch(&RequestRecord::get(url("/missing.js")))
        .await
        .unwrap();
    assert_eq!(missing.response().unwrap().status, 404);

    agent
        .handle_fetch(&RequestRecord::get(url("/font.woff2")))
        .await
        .unwrap();

    assert_eq!(entry_count(&store, &version).await, before + 1);
    let cache = store.get(&version).await.unwrap();
    assert!(cache
        .match_request(&RequestKey::get(url("/app.js")))
        .await
        .unwrap()
        .is_some());
    assert!(cache
        .match_request(&RequestKey::get(url("/missing.js")))
        .await
        .unwrap()
        .is_none());

    let snapshot = agent.metrics().snapshot();
    assert_eq!(snapshot.stored, 1);
    assert_eq!(snapshot.not_stored, 2);

    let calls = fetcher.call_count();
    agent.handle_fetch(&RequestRecord::get(url("/app.js"))).await.unwrap();
    assert_eq!(fetcher.call_count(), calls);
}

#[tokio::test]
async fn store_failures_are_swallowed() {
    let store = Arc::new(FlakyStore::new());
    let fetcher = Arc::new(ScriptedFetcher::site());
    fetcher.respond("/app.js", ResponseRecord::ok("js"));
    let agent = CacheAgent::new(config(), store.clone(), fetcher);
    agent.install().await.unwrap();

    store.fail_puts.store(true, Ordering::SeqCst);
    let decision = agent.handle_fetch(&RequestRecord::get(url("/app.js"))).await.unwrap();

    assert_eq!(decision.response().unwrap().text(), "js");
    assert_eq!(agent.metrics().snapshot().store_failures, 1);
}

#[tokio::test]
async fn offline_navigation_falls_back_to_root() {
    let (agent, _store, fetcher) = installed_agent().await;
    fetcher.go_offline();

    let decision = agent
        .handle_fetch(&RequestRecord::navigate(url("/654/ships/42")))
        .await
        .unwrap();

    assert_eq!(decision.status(), CacheStatus::Fallback);
    assert_eq!(decision.response().unwrap().text(), "<html>root</html>");
    assert_eq!(agent.metrics().snapshot().fallbacks, 1);
}

#[tokio::test]
async fn offline_subresource_propagates_error() {
    let (agent, _store, fetcher) = installed_agent().await;
    fetcher.go_offline();

    let err = agent
        .handle_fetch(&RequestRecord::get(url("/654/ships/42.json")).with_mode(RequestMode::SameOrigin))
        .await
        .unwrap_err();
    assert_eq!(err, NetworkError::Offline);
}

#[tokio::test]
async fn offline_navigation_without_root_propagates_error() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    fetcher.go_offline();
    let agent = CacheAgent::new(config(), Arc::new(MemoryCacheStore::new()), fetcher);

    let err = agent
        .handle_fetch(&RequestRecord::navigate(url("/654/")))
        .await
        .unwrap_err();
    assert_eq!(err, NetworkError::Offline);
    assert_eq!(agent.metrics().snapshot().network_errors, 1);
}

#[tokio::test]
async fn non_get_is_never_looked_up_or_stored() {
    let store = Arc::new(FlakyStore::new());
    let fetcher = Arc::new(ScriptedFetcher::default());
    let agent = CacheAgent::new(config(), store.clone(), fetcher.clone());

    let decision = agent
        .handle_fetch(&RequestRecord::new(Method::Post, url("/654/api/crew")))
        .await
        .unwrap();

    assert_eq!(
        decision,
        FetchDecision::PassThrough(BypassReason::Method(Method::Post))
    );
    assert_eq!(fetcher.call_count(), 0);
    assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
    assert!(store.keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn extension_urls_pass_through() {
    let (agent, _store, fetcher) = installed_agent().await;
    let before = fetcher.call_count();

    for url in [
        "chrome-extension://abc/content.js",
        "moz-extension://abc/content.js",
    ] {
        let decision = agent.handle_fetch(&RequestRecord::get(url)).await.unwrap();
        assert!(matches!(
            decision,
            FetchDecision::PassThrough(BypassReason::ExcludedScheme(_))
        ));
    }
    assert_eq!(fetcher.call_count(), before);
}

#[tokio::test]
async fn control_channel_round_trip() {
    let (agent, _store, _fetcher) = installed_agent().await;

    let (tx, rx) = oneshot::channel();
    agent
        .dispatch(AgentEvent::Message(
            ControlMessage::parse(&serde_json::json!({"type": "GET_VERSION"})),
            Some(tx),
        ))
        .await
        .unwrap();
    assert_eq!(rx.await.unwrap().version, "ship-captain-crew-v1.0.0");

    let outcome = agent
        .dispatch(AgentEvent::Message(
            ControlMessage::parse(&serde_json::json!({"type": "SKIP_WAITING"})),
            None,
        ))
        .await
        .unwrap();
    assert!(matches!(outcome, EventOutcome::Handled));
}

#[tokio::test]
async fn fs_store_serves_across_agent_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::site());

    let first = CacheAgent::new(config(), Arc::new(FsCacheStore::new(dir.path())), fetcher.clone());
    first.install().await.unwrap();
    first.activate().await;

    fetcher.go_offline();
    let second = CacheAgent::new(config(), Arc::new(FsCacheStore::new(dir.path())), fetcher)
        .with_phase(AgentPhase::Active);

    let decision = second
        .handle_fetch(&RequestRecord::get(url("/654/manifest.json")))
        .await
        .unwrap();
    assert_eq!(decision.status(), CacheStatus::Hit);
    assert_eq!(decision.response().unwrap().text(), "{}");
}

#[tokio::test]
async fn concurrent_fetches_share_one_agent() {
    let (agent, _store, fetcher) = installed_agent().await;
    for i in 0..8 {
        fetcher.respond(&format!("/asset-{i}.js"), ResponseRecord::ok(format!("asset {i}")));
    }
    let agent = Arc::new(agent);

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let agent = agent.clone();
            tokio::spawn(async move {
                agent
                    .handle_fetch(&RequestRecord::get(url(&format!("/asset-{i}.js"))))
                    .await
            })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap().status(), CacheStatus::Miss);
    }
    assert_eq!(agent.metrics().snapshot().stored, 8);
}
