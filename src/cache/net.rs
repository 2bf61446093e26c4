//! Network abstraction for the request cache.
//!
//! The cache never talks to a socket itself; the host injects a `Network`
//! implementation (browser fetch, HTTP client, test fake). Every strategy is
//! exercised against this seam, which is what keeps the handlers testable
//! without a live sandbox.

use async_trait::async_trait;
use http::Method;
use url::Url;

use crate::error::NetworkError;

use super::store::CachedResponse;

/// An intercepted outbound read request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub method: Method,
    pub url: Url,
}

impl ResourceRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url }
    }

    /// Convenience constructor for a GET request.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Whether the request targets an http(s) origin.
    pub fn is_http(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }
}

/// Injected network fetch.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &ResourceRequest) -> Result<CachedResponse, NetworkError>;
}
