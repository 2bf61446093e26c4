//! Offline-resilient request cache.
//!
//! Intercepted read requests are classified (API, static asset, page) and
//! satisfied by a per-class strategy over two versioned stores:
//!
//! - **static** store: pre-cached critical routes and cache-first assets
//! - **runtime** store: stale-while-revalidate page entries
//!
//! Every request resolves to a usable response; network failures are replaced
//! by cached or synthesized fallbacks, never surfaced as errors.

mod classify;
mod lifecycle;
mod net;
mod strategy;
mod sync;

pub mod store;

pub use classify::{Classifier, ClassifyRule, ResourceClass};
pub use lifecycle::{CacheLifecycle, LifecyclePhase};
pub use net::{Network, ResourceRequest};
pub use store::{CacheEntry, CacheKey, CacheStore, CachedResponse, StoreRegistry};
pub use strategy::{RequestCache, offline_api_response, offline_page_response};
pub use sync::{BackgroundSync, SyncHandler};
