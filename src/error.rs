//! Crate-wide error taxonomy.
//!
//! Network failures are transient and are always substituted with a cached or
//! synthesized response by the request cache; they only surface as values from
//! the `Network` trait. A cache miss is not an error anywhere in this crate:
//! lookups return `Option` and a miss triggers the next strategy step.

use thiserror::Error;

/// A failed network fetch.
///
/// The request cache never propagates these to callers; the loader retries
/// them; the mutator rolls back and reports them as a notice.
#[derive(Debug, Clone, Error)]
pub enum NetworkError {
    #[error("network unreachable: {0}")]
    Offline(String),
    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },
    #[error("upstream responded with status {status}")]
    Status { status: u16 },
}

impl NetworkError {
    pub fn offline(message: impl Into<String>) -> Self {
        Self::Offline(message.into())
    }
}

/// Errors surfaced by the paginated loader.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The initial page fetch failed; initialization is not retried.
    #[error("initial page fetch failed: {source}")]
    InitialFetch {
        #[source]
        source: NetworkError,
    },
    /// All automatic retries were consumed; a manual `retry()` is required.
    #[error("page fetch failed after {attempts} attempts: {source}")]
    ExhaustedRetries {
        attempts: u32,
        #[source]
        source: NetworkError,
    },
    /// The loader was torn down; callbacks on a discarded loader are refused.
    #[error("loader has been torn down")]
    TornDown,
    /// Bad caller input. Fails fast, never retried.
    #[error("loader validation failed: {message}")]
    Validation { message: String },
}

impl LoaderError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Errors surfaced by the optimistic mutator.
///
/// A superseded rollback is deliberately *not* represented here: it resolves
/// as a no-op, observable only through the ticket API.
#[derive(Debug, Error)]
pub enum MutationError {
    #[error("collection `{collection}` is not registered")]
    CollectionNotFound { collection: String },
    #[error("item `{item_id}` not found in collection `{collection}`")]
    ItemNotFound { collection: String, item_id: String },
    #[error("mutation validation failed: {message}")]
    Validation { message: String },
    #[error("remote mutation failed: {source}")]
    Remote {
        #[source]
        source: NetworkError,
    },
}

impl MutationError {
    pub fn collection_not_found(collection: impl Into<String>) -> Self {
        Self::CollectionNotFound {
            collection: collection.into(),
        }
    }

    pub fn item_not_found(collection: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self::ItemNotFound {
            collection: collection.into(),
            item_id: item_id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
