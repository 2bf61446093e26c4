//! Per-class request strategies.
//!
//! Every intercepted request resolves to *some* response: a real one, a
//! cached one, or a synthesized offline fallback. A rejected network fetch
//! never propagates past this module.
//!
//! - API → network-first, 503 JSON fallback
//! - static asset → cache-first, write-through on a 200 miss
//! - page → stale-while-revalidate, offline HTML fallback

use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use metrics::counter;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::CacheRules;
use crate::error::NetworkError;
use crate::telemetry::{
    METRIC_CACHE_FALLBACK_TOTAL, METRIC_CACHE_HIT_TOTAL, METRIC_CACHE_MISS_TOTAL,
};

use super::classify::{Classifier, ResourceClass};
use super::net::{Network, ResourceRequest};
use super::store::{CacheEntry, CacheKey, CachedResponse, StoreRegistry};

/// Strategy-dispatching request cache.
pub struct RequestCache {
    rules: CacheRules,
    classifier: Classifier,
    registry: Arc<StoreRegistry>,
    network: Arc<dyn Network>,
}

impl RequestCache {
    pub fn new(rules: CacheRules, registry: Arc<StoreRegistry>, network: Arc<dyn Network>) -> Self {
        let classifier = Classifier::from_rules(&rules);
        Self {
            rules,
            classifier,
            registry,
            network,
        }
    }

    pub fn registry(&self) -> &Arc<StoreRegistry> {
        &self.registry
    }

    pub fn rules(&self) -> &CacheRules {
        &self.rules
    }

    /// Satisfy an intercepted request according to its classification.
    pub async fn handle(&self, request: ResourceRequest) -> CachedResponse {
        let class = self.classifier.classify(&request);
        debug!(url = %request.url, class = ?class, "Handling intercepted request");

        match class {
            ResourceClass::Bypass => self.pass_through(&request).await,
            ResourceClass::Api => self.network_first(&request).await,
            ResourceClass::StaticAsset => self.cache_first(&request).await,
            ResourceClass::Page => self.stale_while_revalidate(&request).await,
        }
    }

    async fn pass_through(&self, request: &ResourceRequest) -> CachedResponse {
        match self.network.fetch(request).await {
            Ok(response) => response,
            Err(err) => offline_api_response(&err),
        }
    }

    async fn network_first(&self, request: &ResourceRequest) -> CachedResponse {
        match self.network.fetch(request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(url = %request.url, error = %err, "API fetch failed, synthesizing offline response");
                counter!(METRIC_CACHE_FALLBACK_TOTAL, "class" => "api").increment(1);
                offline_api_response(&err)
            }
        }
    }

    async fn cache_first(&self, request: &ResourceRequest) -> CachedResponse {
        let store = self.registry.open(&self.rules.static_store_name());
        let key = CacheKey::new(request.method.clone(), request.url.clone());

        if let Some(entry) = store.get(&key) {
            debug!(url = %request.url, cache = "static", outcome = "hit", "Serving static asset from cache");
            counter!(METRIC_CACHE_HIT_TOTAL, "class" => "static").increment(1);
            return entry.response;
        }

        counter!(METRIC_CACHE_MISS_TOTAL, "class" => "static").increment(1);
        match self.network.fetch(request).await {
            Ok(response) => {
                // Only a clean 200 is worth keeping; the clone is stored so
                // the caller consumes the original body exactly once.
                if response.status == StatusCode::OK {
                    store.put(key, response.clone());
                }
                response
            }
            Err(err) => {
                warn!(url = %request.url, error = %err, "Static asset unavailable offline");
                counter!(METRIC_CACHE_FALLBACK_TOTAL, "class" => "static").increment(1);
                offline_api_response(&err)
            }
        }
    }

    async fn stale_while_revalidate(&self, request: &ResourceRequest) -> CachedResponse {
        let store_name = self.rules.runtime_store_name();
        let store = self.registry.open(&store_name);
        let key = CacheKey::new(request.method.clone(), request.url.clone());

        if let Some(entry) = self.fresh_entry(&store_name, &key) {
            debug!(url = %request.url, cache = "runtime", outcome = "hit", "Serving page from cache, revalidating in background");
            counter!(METRIC_CACHE_HIT_TOTAL, "class" => "page").increment(1);
            self.spawn_revalidation(request.clone(), key);
            return entry.response;
        }

        counter!(METRIC_CACHE_MISS_TOTAL, "class" => "page").increment(1);
        match self.network.fetch(request).await {
            Ok(response) => {
                if response.status == StatusCode::OK {
                    store.put(key, response.clone());
                }
                response
            }
            Err(err) => {
                warn!(url = %request.url, error = %err, "Page unavailable offline, serving offline shell");
                counter!(METRIC_CACHE_FALLBACK_TOTAL, "class" => "page").increment(1);
                offline_page_response()
            }
        }
    }

    /// Look up a runtime entry, honoring the optional max-age knob.
    ///
    /// An over-age entry is dropped, not served: the next read takes the
    /// network path as if the entry never existed.
    fn fresh_entry(&self, store_name: &str, key: &CacheKey) -> Option<CacheEntry> {
        let store = self.registry.open(store_name);
        let entry = store.get(key)?;
        if let Some(max_age) = self.rules.page_max_age_secs {
            if entry.age_secs(time::OffsetDateTime::now_utc()) > max_age {
                debug!(url = %key.url, cache = "runtime", outcome = "expired", "Dropping over-age page entry");
                store.remove(key);
                return None;
            }
        }
        Some(entry)
    }

    /// Fire-and-forget refresh of a runtime entry. Does not block the
    /// already-returned cached response; only a 200 overwrites the entry.
    fn spawn_revalidation(&self, request: ResourceRequest, key: CacheKey) {
        let network = Arc::clone(&self.network);
        let registry = Arc::clone(&self.registry);
        let store_name = self.rules.runtime_store_name();

        tokio::spawn(async move {
            match network.fetch(&request).await {
                Ok(response) if response.status == StatusCode::OK => {
                    registry.open(&store_name).put(key, response);
                    debug!(url = %request.url, cache = "runtime", outcome = "refreshed", "Revalidated page entry");
                }
                Ok(response) => {
                    debug!(url = %request.url, status = %response.status, "Revalidation response not cacheable");
                }
                Err(err) => {
                    debug!(url = %request.url, error = %err, "Revalidation failed, keeping stale entry");
                }
            }
        });
    }
}

/// Synthesized 503 JSON response carrying the failure in an `error` field.
pub fn offline_api_response(err: &NetworkError) -> CachedResponse {
    let body = json!({ "error": err.to_string(), "offline": true });
    CachedResponse::new(
        StatusCode::SERVICE_UNAVAILABLE,
        vec![("content-type".to_string(), "application/json".to_string())],
        Bytes::from(body.to_string()),
    )
}

/// Synthesized offline HTML page with an embedded retry action.
pub fn offline_page_response() -> CachedResponse {
    let html = "<!doctype html>\
        <html><head><title>Offline</title></head>\
        <body><h1>You are offline</h1>\
        <p>This page is not available without a connection.</p>\
        <button onclick=\"location.reload()\">Retry</button>\
        </body></html>";
    CachedResponse::new(
        StatusCode::SERVICE_UNAVAILABLE,
        vec![("content-type".to_string(), "text/html; charset=utf-8".to_string())],
        Bytes::from(html),
    )
}

/// Revalidation settles quickly in tests; a short bounded wait is enough.
#[cfg(test)]
pub(crate) async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(25)).await;
}
