//! Offline-resilient caching and data synchronization for feed-style clients.
//!
//! Four cooperating components, none of which depend on UI specifics:
//!
//! - [`cache::RequestCache`] classifies intercepted read requests and
//!   satisfies each with a per-class strategy over versioned stores, so every
//!   request resolves to a usable response even offline.
//! - [`loader::PaginatedLoader`] grows a shared item collection page by page,
//!   with retry backoff and scroll proximity sensing.
//! - [`window::ViewportWindow`] derives the visible index range and total
//!   scroll height so a host renders only what is on screen.
//! - [`mutate::OptimisticMutator`] applies speculative edits to the same
//!   collection ahead of remote confirmation, with one-shot per-edit
//!   rollback.

pub mod cache;
pub mod collection;
pub mod config;
pub mod error;
pub mod loader;
pub mod mutate;
pub mod telemetry;
pub mod window;

mod lock;

pub use cache::{CacheLifecycle, Network, RequestCache, ResourceRequest};
pub use collection::{CollectionHandle, Item, ItemCollections};
pub use config::{CacheRules, LoaderConfig};
pub use error::{LoaderError, MutationError, NetworkError};
pub use loader::{PaginatedLoader, ProximitySensor};
pub use mutate::{OptimisticMutator, RollbackTicket};
pub use window::{ItemSizing, ViewportWindow, VisibleRange};
