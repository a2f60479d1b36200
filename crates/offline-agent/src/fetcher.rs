//! Network retrieval capability.

use std::time::Duration;

use async_trait::async_trait;
use offline_core::{AgentConfig, Headers, RequestMode, RequestRecord, ResponseRecord, ResponseType};
use tracing::debug;

use crate::error::NetworkError;

/// Performs actual network retrieval for the agent.
#[async_trait]
pub trait NetworkFetcher: Send + Sync {
    /// Fetch a request from the network.
    async fn fetch(&self, request: &RequestRecord) -> Result<ResponseRecord, NetworkError>;
}

/// Timeout configuration for network fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Connection timeout.
    pub connect: Duration,
    /// Total operation timeout.
    pub total: Duration,
}

impl TimeoutConfig {
    /// Create a new timeout configuration.
    pub fn new(connect: Duration, total: Duration) -> Self {
        Self { connect, total }
    }

    /// Create from a single total timeout.
    pub fn from_total(total: Duration) -> Self {
        Self {
            connect: total / 4,
            total,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            total: Duration::from_secs(30),
        }
    }
}

/// `NetworkFetcher` backed by a `reqwest` client.
///
/// Responses whose final URL shares the configured origin are classified
/// `basic`; cross-origin responses are `cors`, or `opaque` for `no-cors`
/// requests.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    origin: String,
    timeout: TimeoutConfig,
}

impl ReqwestFetcher {
    /// Create a fetcher for the configured origin with default timeouts.
    pub fn new(config: &AgentConfig) -> Result<Self, NetworkError> {
        Self::with_timeout(config, TimeoutConfig::default())
    }

    /// Create a fetcher with explicit timeouts.
    pub fn with_timeout(config: &AgentConfig, timeout: TimeoutConfig) -> Result<Self, NetworkError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout.connect)
            .timeout(timeout.total)
            .user_agent(concat!("offline-agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NetworkError::Request(e.to_string()))?;

        Ok(Self {
            client,
            origin: config.origin.clone(),
            timeout,
        })
    }

    fn map_error(&self, url: &str, error: reqwest::Error) -> NetworkError {
        if error.is_timeout() {
            NetworkError::Timeout(self.timeout.total)
        } else if error.is_builder() {
            NetworkError::InvalidUrl(url.to_string())
        } else if error.is_connect() {
            if is_dns_failure(&error) {
                NetworkError::Dns(url.to_string())
            } else {
                NetworkError::Connection(error.to_string())
            }
        } else {
            NetworkError::Request(error.to_string())
        }
    }
}

fn is_dns_failure(error: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = std::error::Error::source(error);
    while let Some(err) = source {
        let text = err.to_string().to_ascii_lowercase();
        if text.contains("dns") || text.contains("failed to lookup address") {
            return true;
        }
        source = err.source();
    }
    false
}

#[async_trait]
impl NetworkFetcher for ReqwestFetcher {
    async fn fetch(&self, request: &RequestRecord) -> Result<ResponseRecord, NetworkError> {
        let mut builder = self
            .client
            .request(request.method.into(), request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.map_error(&request.url, e))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let mut headers = Headers::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str().to_string(), value.to_string());
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_error(&request.url, e))?;

        let response_type = classify(&self.origin, &final_url, request.mode);
        debug!(url = %request.url, status, %response_type, "network response");

        if response_type == ResponseType::Opaque {
            return Ok(ResponseRecord::new(0).with_type(ResponseType::Opaque));
        }

        Ok(ResponseRecord {
            status,
            response_type,
            url: Some(final_url),
            headers,
            body: body.to_vec(),
        })
    }
}

/// Classify a response by comparing its final URL with the agent origin.
pub fn classify(origin: &str, final_url: &str, mode: RequestMode) -> ResponseType {
    if same_origin(origin, final_url) {
        ResponseType::Basic
    } else if mode == RequestMode::NoCors {
        ResponseType::Opaque
    } else {
        ResponseType::Cors
    }
}

/// Whether two URLs share scheme, host and port.
pub fn same_origin(a: &str, b: &str) -> bool {
    match (origin_tuple(a), origin_tuple(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn origin_tuple(url: &str) -> Option<(String, String, u16)> {
    let uri: http::Uri = url.parse().ok()?;
    let scheme = uri.scheme_str()?.to_ascii_lowercase();
    let host = uri.host()?.to_ascii_lowercase();
    let port = match uri.port_u16() {
        Some(port) => port,
        None => match scheme.as_str() {
            "http" => 80,
            "https" => 443,
            _ => return None,
        },
    };
    Some((scheme, host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_origin_default_ports() {
        assert!(same_origin("https://app.test", "https://app.test:443/654/"));
        assert!(same_origin("http://APP.test", "http://app.test/x"));
        assert!(!same_origin("https://app.test", "http://app.test/"));
        assert!(!same_origin("https://app.test", "https://cdn.app.test/"));
        assert!(!same_origin("https://app.test", "https://app.test:8443/"));
    }

    #[test]
    fn test_same_origin_rejects_relative() {
        assert!(!same_origin("https://app.test", "/654/"));
    }

    #[test]
    fn test_classify() {
        let origin = "http://localhost:8080";
        assert_eq!(
            classify(origin, "http://localhost:8080/654/", RequestMode::Navigate),
            ResponseType::Basic
        );
        assert_eq!(
            classify(origin, "https://fonts.example/font.woff2", RequestMode::Cors),
            ResponseType::Cors
        );
        assert_eq!(
            classify(origin, "https://fonts.example/font.woff2", RequestMode::NoCors),
            ResponseType::Opaque
        );
    }

    #[test]
    fn test_timeout_from_total() {
        let timeout = TimeoutConfig::from_total(Duration::from_secs(8));
        assert_eq!(timeout.connect, Duration::from_secs(2));
        assert_eq!(timeout.total, Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let config = AgentConfig::new("http://127.0.0.1:9");
        let fetcher =
            ReqwestFetcher::with_timeout(&config, TimeoutConfig::from_total(Duration::from_secs(2)))
                .unwrap();

        let result = fetcher
            .fetch(&RequestRecord::get("http://127.0.0.1:9/654/"))
            .await;
        assert!(result.is_err());
    }
}
