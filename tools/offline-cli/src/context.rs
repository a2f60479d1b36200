//! CLI execution context.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use offline_agent::{CacheAgent, NetworkError, NetworkFetcher, RecordingHost, ReqwestFetcher};
use offline_cache::FsCacheStore;
use offline_core::{RequestRecord, ResponseRecord};

use crate::config::CliConfig;
use crate::output::Output;

/// Config file names searched for, in order, from the working directory up.
pub const CONFIG_NAMES: [&str; 3] = ["offline.toml", ".offline.toml", "offline.json"];

/// Execution context for CLI commands.
pub struct Context {
    /// CLI configuration.
    pub config: CliConfig,
    /// Config file the configuration came from, if any.
    pub config_path: Option<PathBuf>,
    /// Output handler.
    pub output: Output,
    /// Working directory.
    pub cwd: PathBuf,
}

impl Context {
    /// Load context from config file.
    pub fn load(config_path: Option<&str>, output: Output) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let (config, config_path) = if let Some(path) = config_path {
            (CliConfig::load(path)?, Some(PathBuf::from(path)))
        } else {
            match Self::find_config(&cwd) {
                Some((config, path)) => (config, Some(path)),
                None => (CliConfig::default(), None),
            }
        };

        Ok(Self {
            config,
            config_path,
            output,
            cwd,
        })
    }

    /// Find config file in directory tree.
    fn find_config(start: &Path) -> Option<(CliConfig, PathBuf)> {
        let mut current = start.to_path_buf();
        loop {
            for name in &CONFIG_NAMES {
                let config_path = current.join(name);
                if config_path.exists() {
                    if let Ok(config) = CliConfig::load(config_path.to_str()?) {
                        return Some((config, config_path));
                    }
                }
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    /// Get the cache store directory.
    pub fn store_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.store.dir)
    }

    /// Open the directory-backed cache store.
    pub fn store(&self) -> FsCacheStore {
        FsCacheStore::new(self.store_dir())
    }

    /// Build the HTTP fetcher for the configured origin.
    pub fn fetcher(&self) -> Result<ReqwestFetcher> {
        ReqwestFetcher::with_timeout(&self.config.agent, self.config.network.timeouts())
            .context("Failed to build HTTP client")
    }

    /// Build an agent over the configured store, recording host signals.
    pub fn agent(&self, fetcher: Arc<dyn NetworkFetcher>, host: Arc<RecordingHost>) -> CacheAgent {
        CacheAgent::new(self.config.agent.clone(), Arc::new(self.store()), fetcher).with_host(host)
    }

    /// Resolve a path relative to the working directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        if PathBuf::from(path).is_absolute() {
            PathBuf::from(path)
        } else {
            self.cwd.join(path)
        }
    }
}

/// Fetcher for commands that must not touch the network.
pub struct OfflineFetcher;

#[async_trait]
impl NetworkFetcher for OfflineFetcher {
    async fn fetch(&self, _request: &RequestRecord) -> Result<ResponseRecord, NetworkError> {
        Err(NetworkError::Offline)
    }
}
