//! On-demand paginated loading.
//!
//! The loader fetches ordered pages through an injected async `fetch_page`
//! function and accumulates items in a shared, append-only collection. It
//! owns the retry/backoff policy; callers trigger it either explicitly
//! (`load_more`, `retry`) or through a [`ProximitySensor`].
//!
//! State machine:
//! IDLE → LOADING_INITIAL → READY ⇄ LOADING_MORE → READY | ERROR → retry()

mod backoff;
mod sensor;

pub use backoff::RetryBackoff;
pub use sensor::ProximitySensor;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use futures::future::BoxFuture;
use metrics::counter;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::collection::{CollectionHandle, Item};
use crate::config::LoaderConfig;
use crate::error::{LoaderError, NetworkError};
use crate::lock::mutex_lock;
use crate::telemetry::METRIC_LOADER_RETRY_TOTAL;

const SOURCE: &str = "loader";

/// Injected page fetch: page number (1-based) → items.
pub type PageFetcher =
    Arc<dyn Fn(u32) -> BoxFuture<'static, Result<Vec<Item>, NetworkError>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderStatus {
    Idle,
    LoadingInitial,
    LoadingMore,
    Ready,
    Error,
}

#[derive(Debug)]
struct LoaderState {
    status: LoaderStatus,
    current_page: u32,
    has_more: bool,
    retry_count: u32,
    last_error: Option<NetworkError>,
}

/// Paginated loader over a shared item collection.
pub struct PaginatedLoader {
    config: LoaderConfig,
    backoff: RetryBackoff,
    fetcher: PageFetcher,
    items: CollectionHandle,
    state: Mutex<LoaderState>,
    in_flight: AtomicBool,
    torn_down: AtomicBool,
    teardown_signal: Notify,
}

/// Releases the in-flight flag on every exit path.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl PaginatedLoader {
    pub fn new(fetcher: PageFetcher, config: LoaderConfig) -> Arc<Self> {
        let backoff = RetryBackoff::new(config.retry_base_ms, config.max_retries);
        Arc::new(Self {
            config,
            backoff,
            fetcher,
            items: Arc::new(RwLock::new(Vec::new())),
            state: Mutex::new(LoaderState {
                status: LoaderStatus::Idle,
                current_page: 0,
                has_more: true,
                retry_count: 0,
                last_error: None,
            }),
            in_flight: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
            teardown_signal: Notify::new(),
        })
    }

    /// Shared handle to the accumulated items, registrable with
    /// [`crate::collection::ItemCollections`].
    pub fn items(&self) -> CollectionHandle {
        Arc::clone(&self.items)
    }

    pub fn status(&self) -> LoaderStatus {
        mutex_lock(&self.state, SOURCE, "status").status
    }

    pub fn has_more(&self) -> bool {
        mutex_lock(&self.state, SOURCE, "has_more").has_more
    }

    pub fn current_page(&self) -> u32 {
        mutex_lock(&self.state, SOURCE, "current_page").current_page
    }

    pub fn retry_count(&self) -> u32 {
        mutex_lock(&self.state, SOURCE, "retry_count").retry_count
    }

    pub fn last_error(&self) -> Option<NetworkError> {
        mutex_lock(&self.state, SOURCE, "last_error").last_error.clone()
    }

    pub fn item_count(&self) -> usize {
        crate::lock::rw_read(&self.items, SOURCE, "item_count").len()
    }

    pub(crate) fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Fetch page 1. Not retried: failure lands in the error state directly.
    pub async fn initialize(&self) -> Result<(), LoaderError> {
        if self.is_torn_down() {
            return Err(LoaderError::TornDown);
        }
        {
            let mut state = mutex_lock(&self.state, SOURCE, "initialize");
            if state.status != LoaderStatus::Idle {
                return Err(LoaderError::validation("loader is already initialized"));
            }
            state.status = LoaderStatus::LoadingInitial;
        }

        match (self.fetcher)(1).await {
            Ok(page) => {
                let page_len = page.len();
                {
                    let mut items = crate::lock::rw_write(&self.items, SOURCE, "initialize.items");
                    *items = page;
                }
                let mut state = mutex_lock(&self.state, SOURCE, "initialize.ready");
                state.current_page = 1;
                state.has_more = page_len >= self.config.page_size_non_zero();
                state.status = LoaderStatus::Ready;
                state.retry_count = 0;
                debug!(items = page_len, has_more = state.has_more, "Initial page loaded");
                Ok(())
            }
            Err(err) => {
                let mut state = mutex_lock(&self.state, SOURCE, "initialize.error");
                state.status = LoaderStatus::Error;
                state.last_error = Some(err.clone());
                warn!(error = %err, "Initial page fetch failed");
                Err(LoaderError::InitialFetch { source: err })
            }
        }
    }

    /// Fetch the next page, appending to the collection.
    ///
    /// Re-entrancy guarded: overlapping triggers (sensor + manual) collapse
    /// to one in-flight fetch. A no-op when there is nothing more to load or
    /// the loader is in a state that requires a manual `retry`.
    pub async fn load_more(self: &Arc<Self>) -> Result<(), LoaderError> {
        if self.is_torn_down() {
            return Err(LoaderError::TornDown);
        }
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let _guard = InFlightGuard(&self.in_flight);

        let next_page = {
            let mut state = mutex_lock(&self.state, SOURCE, "load_more");
            let blocked = !state.has_more
                || matches!(
                    state.status,
                    LoaderStatus::Idle
                        | LoaderStatus::LoadingInitial
                        | LoaderStatus::LoadingMore
                        | LoaderStatus::Error
                );
            if blocked {
                return Ok(());
            }
            state.status = LoaderStatus::LoadingMore;
            state.current_page + 1
        };

        loop {
            if self.is_torn_down() {
                return Err(LoaderError::TornDown);
            }

            match (self.fetcher)(next_page).await {
                Ok(page) => {
                    let page_len = page.len();
                    {
                        let mut items =
                            crate::lock::rw_write(&self.items, SOURCE, "load_more.items");
                        items.extend(page);
                    }
                    let mut state = mutex_lock(&self.state, SOURCE, "load_more.ready");
                    state.current_page = next_page;
                    state.has_more = page_len >= self.config.page_size_non_zero();
                    state.retry_count = 0;
                    state.last_error = None;
                    state.status = LoaderStatus::Ready;
                    debug!(
                        page = next_page,
                        items = page_len,
                        has_more = state.has_more,
                        "Page appended"
                    );
                    return Ok(());
                }
                Err(err) => {
                    let attempt = {
                        let mut state = mutex_lock(&self.state, SOURCE, "load_more.failed");
                        state.retry_count += 1;
                        state.last_error = Some(err.clone());
                        state.retry_count
                    };
                    counter!(METRIC_LOADER_RETRY_TOTAL).increment(1);

                    if self.backoff.is_exhausted(attempt) {
                        let mut state = mutex_lock(&self.state, SOURCE, "load_more.exhausted");
                        state.status = LoaderStatus::Error;
                        warn!(page = next_page, attempts = attempt, error = %err, "Retries exhausted");
                        return Err(LoaderError::ExhaustedRetries {
                            attempts: attempt,
                            source: err,
                        });
                    }

                    let delay = self.backoff.delay_for(attempt);
                    debug!(page = next_page, attempt, delay_ms = delay.as_millis() as u64, "Scheduling retry");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.teardown_signal.notified() => {
                            return Err(LoaderError::TornDown);
                        }
                    }
                }
            }
        }
    }

    /// Reset the retry budget and resume loading after an error.
    pub async fn retry(self: &Arc<Self>) -> Result<(), LoaderError> {
        {
            let mut state = mutex_lock(&self.state, SOURCE, "retry");
            state.retry_count = 0;
            state.last_error = None;
            if state.status == LoaderStatus::Error {
                state.status = LoaderStatus::Ready;
            }
        }
        self.load_more().await
    }

    /// Stop the loader: pending backoff timers are cancelled immediately and
    /// all further triggers are refused. Idempotent.
    pub fn teardown(&self) {
        if !self.torn_down.swap(true, Ordering::SeqCst) {
            debug!("Loader torn down");
        }
        self.teardown_signal.notify_waiters();
    }
}
