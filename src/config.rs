//! Data-layer configuration.
//!
//! All knobs are supplied by the host application, typically deserialized
//! from its own config file. Every field has a sensible default so a bare
//! `CacheRules::default()` / `LoaderConfig::default()` works out of the box.

use serde::Deserialize;

// Default values for loader configuration
const DEFAULT_PAGE_SIZE: usize = 20;
const DEFAULT_PROXIMITY_MARGIN: f64 = 100.0;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_BASE_MS: u64 = 1000;

/// Request classification and store-versioning rules for the request cache.
///
/// The version tag names the live stores: only `static-{version}` and
/// `runtime-{version}` survive activation, everything else is deleted.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheRules {
    /// Version tag naming the live static/runtime stores.
    pub version: String,
    /// Origin used to resolve critical routes at install time.
    pub origin: String,
    /// Routes pre-fetched into the static store at install.
    pub critical_routes: Vec<String>,
    /// URL path prefixes classified as API requests.
    pub api_prefixes: Vec<String>,
    /// URL path prefixes classified as static assets.
    pub static_prefixes: Vec<String>,
    /// File-extension allowlist classified as static assets.
    pub static_extensions: Vec<String>,
    /// Maximum age for stale-while-revalidate page entries, in seconds.
    ///
    /// `None` means entries never expire by age, matching the historical
    /// behavior; an over-age entry is dropped and treated as a miss.
    pub page_max_age_secs: Option<u64>,
}

impl Default for CacheRules {
    fn default() -> Self {
        Self {
            version: "v1".to_string(),
            origin: "http://localhost".to_string(),
            critical_routes: vec!["/".to_string(), "/offline".to_string()],
            api_prefixes: vec!["/api/".to_string()],
            static_prefixes: vec!["/assets/".to_string(), "/static/".to_string()],
            static_extensions: vec![
                "css".to_string(),
                "js".to_string(),
                "woff2".to_string(),
                "png".to_string(),
                "jpg".to_string(),
                "svg".to_string(),
                "ico".to_string(),
            ],
            page_max_age_secs: None,
        }
    }
}

impl CacheRules {
    /// Name of the live static store under the current version tag.
    pub fn static_store_name(&self) -> String {
        format!("static-{}", self.version)
    }

    /// Name of the live runtime store under the current version tag.
    pub fn runtime_store_name(&self) -> String {
        format!("runtime-{}", self.version)
    }

    /// The set of store names that survive activation.
    pub fn live_store_names(&self) -> [String; 2] {
        [self.static_store_name(), self.runtime_store_name()]
    }
}

/// Paginated-loader configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Expected items per page; a shorter page latches `has_more` to false.
    pub page_size: usize,
    /// Distance (in scroll units) at which the sentinel triggers a load.
    pub proximity_margin: f64,
    /// Automatic retry ceiling before the loader enters the error state.
    pub max_retries: u32,
    /// Base backoff delay; attempt `n` waits `retry_base_ms * n`.
    pub retry_base_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            proximity_margin: DEFAULT_PROXIMITY_MARGIN,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_ms: DEFAULT_RETRY_BASE_MS,
        }
    }
}

impl LoaderConfig {
    /// Returns the page size, clamping to 1 if configured as zero.
    pub fn page_size_non_zero(&self) -> usize {
        self.page_size.max(1)
    }
}
