//! Agent configuration: cache version, origin and asset manifest.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Cache generation identifier.
///
/// Bumping the version is the only way to invalidate previously stored
/// caches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheVersion(String);

impl CacheVersion {
    /// Create a cache version.
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    /// Get the version string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this version can name a stored cache in every backend.
    pub fn is_valid(&self) -> bool {
        is_valid_cache_name(&self.0)
    }
}

/// Cache names are non-empty ASCII alphanumerics, `.`, `-` or `_`, and
/// never `.` or `..`, so they double as directory names.
pub fn is_valid_cache_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

impl fmt::Display for CacheVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheVersion {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CacheVersion {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<str> for CacheVersion {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// Ordered list of root-relative asset paths to store at install time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetManifest(Vec<String>);

impl AssetManifest {
    /// Create a manifest from paths.
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self(paths.into_iter().map(Into::into).collect())
    }

    /// All paths as listed, duplicates included.
    pub fn paths(&self) -> &[String] {
        &self.0
    }

    /// Paths with duplicates removed, keeping first-occurrence order.
    pub fn unique_paths(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.0
            .iter()
            .filter(|p| seen.insert(p.as_str()))
            .map(|p| p.as_str())
            .collect()
    }

    /// Number of listed paths.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the manifest is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Error loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to serialize TOML config: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Immutable agent configuration, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Current cache generation.
    #[serde(default = "default_version")]
    pub version: CacheVersion,

    /// Origin the application is served from (e.g. `https://app.example`).
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Application root path, served to offline navigations.
    #[serde(default = "default_root_path")]
    pub root_path: String,

    /// Assets stored at install time.
    #[serde(default = "default_manifest")]
    pub manifest: AssetManifest,

    /// URL schemes that are never intercepted.
    #[serde(default = "default_excluded_schemes")]
    pub excluded_schemes: Vec<String>,

    /// Request skip-waiting as soon as install succeeds.
    #[serde(default = "default_true")]
    pub skip_waiting_on_install: bool,
}

fn default_true() -> bool {
    true
}

fn default_version() -> CacheVersion {
    CacheVersion::new("ship-captain-crew-v1.0.0")
}

fn default_origin() -> String {
    "http://localhost:8080".to_string()
}

fn default_root_path() -> String {
    "/654/".to_string()
}

fn default_manifest() -> AssetManifest {
    AssetManifest::new(["/654/", "/654/index.html", "/654/manifest.json"])
}

fn default_excluded_schemes() -> Vec<String> {
    vec![
        "chrome-extension".to_string(),
        "moz-extension".to_string(),
        "safari-web-extension".to_string(),
    ]
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            origin: default_origin(),
            root_path: default_root_path(),
            manifest: default_manifest(),
            excluded_schemes: default_excluded_schemes(),
            skip_waiting_on_install: true,
        }
    }
}

impl AgentConfig {
    /// Create a config for an origin with default version and manifest.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            ..Default::default()
        }
    }

    /// Set the cache version.
    pub fn with_version(mut self, version: impl Into<CacheVersion>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the root path.
    pub fn with_root_path(mut self, root_path: impl Into<String>) -> Self {
        self.root_path = root_path.into();
        self
    }

    /// Set the asset manifest.
    pub fn with_manifest(mut self, manifest: AssetManifest) -> Self {
        self.manifest = manifest;
        self
    }

    /// Leave a freshly installed instance waiting until its predecessor
    /// releases its pages.
    pub fn without_forced_activation(mut self) -> Self {
        self.skip_waiting_on_install = false;
        self
    }

    /// Load config from a file (`.json` or TOML).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let config: Self = if path.extension().is_some_and(|e| e == "json") {
            serde_json::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save config to a file (`.json` or TOML).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = if path.extension().is_some_and(|e| e == "json") {
            serde_json::to_string_pretty(self)?
        } else {
            toml::to_string_pretty(self)?
        };

        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })
    }

    /// Check the config for values the agent cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.as_str().trim().is_empty() {
            return Err(ConfigError::Invalid("version must not be empty".into()));
        }
        if !self.version.is_valid() {
            return Err(ConfigError::Invalid(format!(
                "version '{}' may only contain ASCII letters, digits, '.', '-' and '_'",
                self.version
            )));
        }

        let origin: http::Uri = self
            .origin
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("origin '{}': {}", self.origin, e)))?;
        if origin.scheme().is_none() || origin.authority().is_none() {
            return Err(ConfigError::Invalid(format!(
                "origin '{}' must include scheme and host",
                self.origin
            )));
        }

        if !self.root_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "root_path '{}' must start with '/'",
                self.root_path
            )));
        }

        if let Some(bad) = self.manifest.paths().iter().find(|p| !p.starts_with('/')) {
            return Err(ConfigError::Invalid(format!(
                "manifest path '{}' must be root-relative",
                bad
            )));
        }

        Ok(())
    }

    /// Resolve a root-relative path against the origin.
    pub fn resolve(&self, path: &str) -> String {
        format!("{}{}", self.origin.trim_end_matches('/'), path)
    }

    /// Absolute URL of the application root.
    pub fn root_url(&self) -> String {
        self.resolve(&self.root_path)
    }

    /// Whether a URL scheme is excluded from interception.
    pub fn is_excluded_scheme(&self, scheme: &str) -> bool {
        self.excluded_schemes
            .iter()
            .any(|s| s.eq_ignore_ascii_case(scheme))
    }
}
