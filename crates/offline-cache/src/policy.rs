//! Interception and storage policy.

use std::fmt;

use offline_core::{AgentConfig, Method, RequestRecord, ResponseRecord, ResponseType};
use serde::{Deserialize, Serialize};

/// Status of a request as handled by the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Served from a stored cache.
    Hit,
    /// Not stored; fetched from the network.
    Miss,
    /// Offline navigation served from the cached root page.
    Fallback,
    /// Not intercepted.
    Bypass,
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hit => write!(f, "HIT"),
            Self::Miss => write!(f, "MISS"),
            Self::Fallback => write!(f, "FALLBACK"),
            Self::Bypass => write!(f, "BYPASS"),
        }
    }
}

/// Why a request is left to default network handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BypassReason {
    /// Only `GET` takes part in caching.
    Method(Method),
    /// Browser-extension-internal resource.
    ExcludedScheme(String),
}

impl fmt::Display for BypassReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Method(m) => write!(f, "method {}", m),
            Self::ExcludedScheme(s) => write!(f, "scheme {}", s),
        }
    }
}

/// Whether a request is handled by the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interception {
    Intercept,
    Bypass(BypassReason),
}

/// Why a network response is returned without being stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Status(u16),
    Type(ResponseType),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(s) => write!(f, "status {}", s),
            Self::Type(t) => write!(f, "type {}", t),
        }
    }
}

/// Whether a network response is written to the current cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreDecision {
    Store,
    Skip(SkipReason),
}

/// Request interception and response storage rules.
#[derive(Debug, Clone)]
pub struct InterceptPolicy {
    excluded_schemes: Vec<String>,
}

impl InterceptPolicy {
    /// Create a policy excluding the given URL schemes.
    pub fn new<I, S>(excluded_schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded_schemes: excluded_schemes
                .into_iter()
                .map(|s| s.into().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Build from agent configuration.
    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.excluded_schemes.iter().cloned())
    }

    /// Decide whether the agent handles a request.
    pub fn intercept(&self, request: &RequestRecord) -> Interception {
        if request.method != Method::Get {
            return Interception::Bypass(BypassReason::Method(request.method));
        }

        if let Some(scheme) = request.scheme() {
            if self.excluded_schemes.iter().any(|s| *s == scheme) {
                return Interception::Bypass(BypassReason::ExcludedScheme(scheme));
            }
        }

        Interception::Intercept
    }

    /// Decide whether a network response is stored.
    pub fn store_decision(&self, response: &ResponseRecord) -> StoreDecision {
        if response.status != 200 {
            return StoreDecision::Skip(SkipReason::Status(response.status));
        }
        if response.response_type != ResponseType::Basic {
            return StoreDecision::Skip(SkipReason::Type(response.response_type));
        }
        StoreDecision::Store
    }
}

impl Default for InterceptPolicy {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_get_bypassed() {
        let policy = InterceptPolicy::default();
        let req = RequestRecord::new(Method::Post, "https://app.test/api");

        assert_eq!(
            policy.intercept(&req),
            Interception::Bypass(BypassReason::Method(Method::Post))
        );
    }

    #[test]
    fn test_extension_scheme_bypassed() {
        let policy = InterceptPolicy::default();
        let req = RequestRecord::get("chrome-extension://abcdef/content.js");

        assert_eq!(
            policy.intercept(&req),
            Interception::Bypass(BypassReason::ExcludedScheme("chrome-extension".into()))
        );
    }

    #[test]
    fn test_custom_schemes_case_insensitive() {
        let policy = InterceptPolicy::new(["Custom-Ext"]);
        let req = RequestRecord::get("custom-ext://x/y");
        assert!(matches!(policy.intercept(&req), Interception::Bypass(_)));

        let req = RequestRecord::get("chrome-extension://x/y");
        assert_eq!(policy.intercept(&req), Interception::Intercept);
    }

    #[test]
    fn test_same_origin_get_intercepted() {
        let policy = InterceptPolicy::default();
        let req = RequestRecord::get("https://app.test/654/index.html");
        assert_eq!(policy.intercept(&req), Interception::Intercept);
    }

    #[test]
    fn test_store_decision() {
        let policy = InterceptPolicy::default();

        assert_eq!(policy.store_decision(&ResponseRecord::ok("x")), StoreDecision::Store);
        assert_eq!(
            policy.store_decision(&ResponseRecord::new(404)),
            StoreDecision::Skip(SkipReason::Status(404))
        );
        assert_eq!(
            policy.store_decision(&ResponseRecord::ok("x").with_type(ResponseType::Opaque)),
            StoreDecision::Skip(SkipReason::Type(ResponseType::Opaque))
        );
    }

    #[test]
    fn test_cache_status_display() {
        assert_eq!(CacheStatus::Hit.to_string(), "HIT");
        assert_eq!(CacheStatus::Fallback.to_string(), "FALLBACK");
    }
}
