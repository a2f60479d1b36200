//! CLI configuration.

use std::time::Duration;

use anyhow::{Context, Result};
use offline_agent::TimeoutConfig;
use offline_core::AgentConfig;
use offline_observability::{LogFormat, LogLevel, LoggingConfig};
use serde::{Deserialize, Serialize};

/// CLI configuration file (`offline.toml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Agent configuration: version, origin, manifest.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Cache store location.
    #[serde(default)]
    pub store: StoreConfig,

    /// Network fetcher settings.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Log output.
    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,
}

fn default_logging() -> LoggingConfig {
    LoggingConfig::new(LogLevel::Warn, LogFormat::Human)
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            store: StoreConfig::default(),
            network: NetworkConfig::default(),
            logging: default_logging(),
        }
    }
}

impl CliConfig {
    /// Load config from a file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Self = if path.ends_with(".json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path))?
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path))?
        };

        config
            .agent
            .validate()
            .with_context(|| format!("Invalid agent config in {}", path))?;
        Ok(config)
    }

    /// Save config to a file.
    pub fn save(&self, path: &str) -> Result<()> {
        let content = if path.ends_with(".json") {
            serde_json::to_string_pretty(self)?
        } else {
            toml::to_string_pretty(self)?
        };

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path))
    }
}

/// Where caches are kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store root, relative to the working directory.
    #[serde(default = "default_store_dir")]
    pub dir: String,
}

fn default_store_dir() -> String {
    ".offline/caches".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
        }
    }
}

/// Network fetcher timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Total request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    5
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl NetworkConfig {
    pub fn timeouts(&self) -> TimeoutConfig {
        TimeoutConfig::new(
            Duration::from_secs(self.connect_timeout_secs),
            Duration::from_secs(self.timeout_secs),
        )
    }
}

/// Generate a default offline.toml config file.
pub fn generate_default_config(origin: &str) -> String {
    format!(
        r#"# Offline cache agent configuration

[agent]
# Bump the version whenever the manifest or asset contents change.
version = "ship-captain-crew-v1.0.0"
origin = "{origin}"
root_path = "/654/"
manifest = [
    "/654/",
    "/654/index.html",
    "/654/manifest.json",
]
excluded_schemes = ["chrome-extension", "moz-extension", "safari-web-extension"]
skip_waiting_on_install = true

[store]
dir = ".offline/caches"

[network]
timeout_secs = 30
connect_timeout_secs = 5

[logging]
level = "warn"
format = "human"
"#,
        origin = origin
    )
}
