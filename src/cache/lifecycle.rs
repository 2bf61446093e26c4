//! Cache lifecycle.
//!
//! INSTALLING → INSTALLED → ACTIVATING → ACTIVE, driven by explicit handler
//! functions over an injected registry and network rather than implicit
//! global event listeners, so the whole flow runs under plain tests.

use std::sync::Arc;
use std::sync::RwLock;

use http::StatusCode;
use tracing::{info, warn};
use url::Url;

use crate::config::CacheRules;
use crate::lock::{rw_read, rw_write};

use super::net::{Network, ResourceRequest};
use super::store::{CacheKey, StoreRegistry};

const SOURCE: &str = "cache::lifecycle";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Installing,
    Installed,
    Activating,
    Active,
}

/// Tracks the cache's lifecycle phase and runs the phase transitions.
pub struct CacheLifecycle {
    phase: RwLock<LifecyclePhase>,
}

impl CacheLifecycle {
    pub fn new() -> Self {
        Self {
            phase: RwLock::new(LifecyclePhase::Installing),
        }
    }

    pub fn phase(&self) -> LifecyclePhase {
        *rw_read(&self.phase, SOURCE, "phase")
    }

    fn set_phase(&self, phase: LifecyclePhase) {
        *rw_write(&self.phase, SOURCE, "set_phase") = phase;
    }

    /// Pre-populate the static store with the configured critical routes.
    ///
    /// Individual route failures are logged and skipped so one unreachable
    /// route does not block installation. Returns the number of routes
    /// actually cached.
    pub async fn install(
        &self,
        registry: &StoreRegistry,
        network: &Arc<dyn Network>,
        rules: &CacheRules,
    ) -> usize {
        self.set_phase(LifecyclePhase::Installing);
        let store = registry.open(&rules.static_store_name());
        let mut cached = 0usize;

        for route in &rules.critical_routes {
            let url = match Url::parse(&rules.origin).and_then(|base| base.join(route)) {
                Ok(url) => url,
                Err(err) => {
                    warn!(route = %route, error = %err, "Skipping unparseable critical route");
                    continue;
                }
            };
            let request = ResourceRequest::get(url);
            match network.fetch(&request).await {
                Ok(response) if response.status == StatusCode::OK => {
                    store.put(
                        CacheKey::new(request.method.clone(), request.url.clone()),
                        response,
                    );
                    cached += 1;
                }
                Ok(response) => {
                    warn!(route = %route, status = %response.status, "Critical route not pre-cached");
                }
                Err(err) => {
                    warn!(route = %route, error = %err, "Critical route fetch failed during install");
                }
            }
        }

        info!(
            cached,
            total = rules.critical_routes.len(),
            store = %rules.static_store_name(),
            "Install phase complete"
        );
        self.set_phase(LifecyclePhase::Installed);
        cached
    }

    /// Delete every store not matching the current version tags and go live.
    ///
    /// Stale stores are deleted, not merely ignored: after activation no read
    /// can be served from a superseded version.
    pub fn activate(&self, registry: &StoreRegistry, rules: &CacheRules) -> Vec<String> {
        self.set_phase(LifecyclePhase::Activating);

        let live = rules.live_store_names();
        // Open both live stores so activation on a cold start still ends with
        // the expected containers in place.
        registry.open(&live[0]);
        registry.open(&live[1]);
        let deleted = registry.retain_only(&live);

        info!(
            version = %rules.version,
            deleted = deleted.len(),
            "Activation complete"
        );
        self.set_phase(LifecyclePhase::Active);
        deleted
    }
}

impl Default for CacheLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
