//! Request identity used as the cache key.

use offline_core::{Method, RequestRecord};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A cache key uniquely identifying a stored response.
///
/// Only method and absolute URL take part; headers and request mode do not.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
}

impl RequestKey {
    /// Create a key from its parts.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
        }
    }

    /// Create a `GET` key for a URL.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Derive the key of a request.
    pub fn from_request(request: &RequestRecord) -> Self {
        Self::new(request.method, request.url.clone())
    }

    /// Stable SHA-256 hex digest, safe for use as a file name.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.method.as_str().as_bytes());
        hasher.update(b" ");
        hasher.update(self.url.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offline_core::RequestMode;

    #[test]
    fn test_key_ignores_mode_and_headers() {
        let a = RequestRecord::get("https://app.test/654/").with_mode(RequestMode::Navigate);
        let b = RequestRecord::get("https://app.test/654/").with_header("Accept", "text/html");

        assert_eq!(RequestKey::from_request(&a), RequestKey::from_request(&b));
    }

    #[test]
    fn test_key_distinguishes_method() {
        let get = RequestKey::get("https://app.test/api");
        let post = RequestKey::new(Method::Post, "https://app.test/api");
        assert_ne!(get, post);
        assert_ne!(get.digest(), post.digest());
    }

    #[test]
    fn test_digest_is_stable_hex() {
        let key = RequestKey::get("https://app.test/654/index.html");
        let digest = key.digest();

        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest, RequestKey::get("https://app.test/654/index.html").digest());
    }

    #[test]
    fn test_display() {
        let key = RequestKey::get("https://app.test/");
        assert_eq!(key.to_string(), "GET https://app.test/");
    }
}
