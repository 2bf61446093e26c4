//! Versioned cache stores.
//!
//! A `CacheStore` is a named key-value container of serialized responses with
//! per-key last-write-wins semantics. Stores are versioned by name
//! (`static-v3`, `runtime-v3`); activation deletes every store whose name is
//! not in the live set, so entries from a superseded version can never be
//! served again.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use http::{Method, StatusCode};
use time::OffsetDateTime;
use tracing::info;
use url::Url;

use crate::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

/// Cache key: method + URL identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub method: Method,
    pub url: Url,
}

impl CacheKey {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url }
    }
}

/// A serialized response suitable for caching and replay.
///
/// Bodies are `Bytes`, so cloning an entry to hand one copy to the caller and
/// keep one in the store is cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn new(status: StatusCode, headers: Vec<(String, String)>, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// A 200 response with the given content type and body.
    pub fn ok(content_type: &str, body: impl Into<Bytes>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: vec![("content-type".to_string(), content_type.to_string())],
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK
    }
}

/// One stored entry: the response plus provenance.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub response: CachedResponse,
    /// Name of the owning store at write time.
    pub store: String,
    pub written_at: OffsetDateTime,
}

impl CacheEntry {
    /// Age of the entry in whole seconds, saturating at zero.
    pub fn age_secs(&self, now: OffsetDateTime) -> u64 {
        let age = (now - self.written_at).whole_seconds();
        u64::try_from(age).unwrap_or(0)
    }
}

/// A named key → entry container with last-write-wins semantics.
pub struct CacheStore {
    name: String,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl CacheStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        rw_read(&self.entries, SOURCE, "get").get(key).cloned()
    }

    /// Insert or overwrite the entry for a key.
    pub fn put(&self, key: CacheKey, response: CachedResponse) {
        let entry = CacheEntry {
            response,
            store: self.name.clone(),
            written_at: OffsetDateTime::now_utc(),
        };
        rw_write(&self.entries, SOURCE, "put").insert(key, entry);
    }

    pub fn remove(&self, key: &CacheKey) -> Option<CacheEntry> {
        rw_write(&self.entries, SOURCE, "remove").remove(key)
    }

    /// Insert a pre-built entry, bypassing the write timestamp.
    #[cfg(test)]
    pub(crate) fn insert_entry(&self, key: CacheKey, entry: CacheEntry) {
        rw_write(&self.entries, SOURCE, "insert_entry").insert(key, entry);
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Registry of named stores.
///
/// Stores are created on first open. `retain_only` implements activation
/// pruning: everything outside the live set is dropped wholesale.
#[derive(Default)]
pub struct StoreRegistry {
    stores: RwLock<HashMap<String, Arc<CacheStore>>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store, creating it if absent.
    pub fn open(&self, name: &str) -> Arc<CacheStore> {
        let mut stores = rw_write(&self.stores, SOURCE, "open");
        stores
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CacheStore::new(name)))
            .clone()
    }

    /// Look up an existing store without creating it.
    pub fn get(&self, name: &str) -> Option<Arc<CacheStore>> {
        rw_read(&self.stores, SOURCE, "get").get(name).cloned()
    }

    pub fn delete(&self, name: &str) -> bool {
        rw_write(&self.stores, SOURCE, "delete")
            .remove(name)
            .is_some()
    }

    pub fn names(&self) -> Vec<String> {
        rw_read(&self.stores, SOURCE, "names").keys().cloned().collect()
    }

    /// Delete every store whose name is not in `live`, returning the names of
    /// the deleted stores.
    pub fn retain_only(&self, live: &[String]) -> Vec<String> {
        let mut stores = rw_write(&self.stores, SOURCE, "retain_only");
        let stale: Vec<String> = stores
            .keys()
            .filter(|name| !live.contains(name))
            .cloned()
            .collect();
        for name in &stale {
            stores.remove(name);
            info!(store = %name, "Deleted stale cache store");
        }
        stale
    }
}
