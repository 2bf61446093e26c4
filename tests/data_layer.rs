//! End-to-end flows across the cache, loader, window, and mutator.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode};
use serde_json::json;
use url::Url;

use ebbtide::cache::{
    BackgroundSync, CacheKey, CacheLifecycle, CachedResponse, Network, RequestCache,
    ResourceRequest, StoreRegistry, SyncHandler,
};
use ebbtide::loader::{LoaderStatus, PageFetcher};
use ebbtide::mutate::RemoteMutation;
use ebbtide::{
    CacheRules, Item, ItemCollections, ItemSizing, LoaderConfig, NetworkError, OptimisticMutator,
    PaginatedLoader, ViewportWindow,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Fixed route map with a connectivity toggle.
struct ToggleNetwork {
    routes: Mutex<HashMap<String, CachedResponse>>,
    online: AtomicBool,
}

impl ToggleNetwork {
    fn new(routes: Vec<(&str, CachedResponse)>) -> Arc<Self> {
        Arc::new(Self {
            routes: Mutex::new(
                routes
                    .into_iter()
                    .map(|(path, response)| (path.to_string(), response))
                    .collect(),
            ),
            online: AtomicBool::new(true),
        })
    }

    fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl Network for ToggleNetwork {
    async fn fetch(&self, request: &ResourceRequest) -> Result<CachedResponse, NetworkError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(NetworkError::offline("connection lost"));
        }
        self.routes
            .lock()
            .expect("routes lock")
            .get(request.url.path())
            .cloned()
            .ok_or(NetworkError::Status { status: 404 })
    }
}

fn get(url: &str) -> ResourceRequest {
    ResourceRequest::get(Url::parse(url).expect("url"))
}

fn key(url: &str) -> CacheKey {
    CacheKey::new(Method::GET, Url::parse(url).expect("url"))
}

#[tokio::test]
async fn version_upgrade_deletes_every_superseded_store() {
    init_tracing();

    let registry = StoreRegistry::new();
    let network = ToggleNetwork::new(vec![
        ("/", CachedResponse::ok("text/html", "home")),
        ("/offline", CachedResponse::ok("text/html", "offline shell")),
    ]);
    let network_dyn: Arc<dyn Network> = network.clone();

    let v1 = CacheRules::default();
    let lifecycle = CacheLifecycle::new();
    lifecycle.install(&registry, &network_dyn, &v1).await;
    lifecycle.activate(&registry, &v1);

    // A session under v1 leaves a runtime page entry behind.
    registry
        .open("runtime-v1")
        .put(key("http://localhost/posts/hello"), CachedResponse::ok("text/html", "v1 page"));

    // Upgrade: install and activate under the next version tag.
    let v2 = CacheRules {
        version: "v2".to_string(),
        ..Default::default()
    };
    let upgrade = CacheLifecycle::new();
    let cached = upgrade.install(&registry, &network_dyn, &v2).await;
    assert_eq!(cached, 2);

    let mut deleted = upgrade.activate(&registry, &v2);
    deleted.sort();
    assert_eq!(deleted, vec!["runtime-v1", "static-v1"]);

    // Reads against the superseded stores miss entirely.
    assert!(registry.get("runtime-v1").is_none());
    assert!(registry.get("static-v1").is_none());
    let static_v2 = registry.get("static-v2").expect("live static store");
    assert!(static_v2.get(&key("http://localhost/offline")).is_some());
}

#[tokio::test]
async fn offline_session_every_request_resolves() {
    init_tracing();

    let registry = Arc::new(StoreRegistry::new());
    let network = ToggleNetwork::new(vec![
        ("/app.css", CachedResponse::ok("text/css", "body{}")),
        ("/posts/hello", CachedResponse::ok("text/html", "hello post")),
    ]);
    let cache = RequestCache::new(CacheRules::default(), registry.clone(), network.clone());

    // Warm the stores while online: one asset, one page.
    let css = cache.handle(get("http://localhost/app.css")).await;
    assert_eq!(css.status, StatusCode::OK);
    let page = cache.handle(get("http://localhost/posts/hello")).await;
    assert_eq!(page.status, StatusCode::OK);

    network.set_online(false);

    // Cached asset and page survive the disconnect.
    let css = cache.handle(get("http://localhost/app.css")).await;
    assert_eq!(css.body, Bytes::from("body{}"));
    let page = cache.handle(get("http://localhost/posts/hello")).await;
    assert_eq!(page.body, Bytes::from("hello post"));

    // API calls degrade to a synthesized 503 with an error field.
    let api = cache.handle(get("http://localhost/api/posts")).await;
    assert_eq!(api.status, StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = serde_json::from_slice(&api.body).expect("json");
    assert!(body.get("error").is_some());

    // An uncached page degrades to the offline shell, never an error.
    let unknown = cache.handle(get("http://localhost/posts/unseen")).await;
    assert_eq!(unknown.status, StatusCode::SERVICE_UNAVAILABLE);
    let shell = String::from_utf8(unknown.body.to_vec()).expect("utf8");
    assert!(shell.contains("Retry"));
}

fn feed_fetcher(page_sizes: &'static [usize]) -> PageFetcher {
    Arc::new(move |page| {
        Box::pin(async move {
            let count = page_sizes.get(page as usize - 1).copied().unwrap_or(0);
            let start: usize = page_sizes[..(page as usize - 1).min(page_sizes.len())]
                .iter()
                .sum();
            Ok((start..start + count)
                .map(|n| {
                    Item::new(format!("post-{n}"))
                        .with_field("likes", json!(n as i64))
                        .with_field("liked", json!(false))
                })
                .collect())
        })
    })
}

#[tokio::test]
async fn feed_scroll_session_loads_windows_and_mutates() {
    init_tracing();

    // Three full pages then a short one: has_more latches false at page 4.
    let fetcher = feed_fetcher(&[5, 5, 5, 2]);
    let config = LoaderConfig {
        page_size: 5,
        retry_base_ms: 10,
        ..Default::default()
    };
    let loader = PaginatedLoader::new(fetcher, config);
    loader.initialize().await.expect("initial page");
    assert_eq!(loader.status(), LoaderStatus::Ready);

    // The loader's collection is the one the mutator edits in place.
    let collections = Arc::new(ItemCollections::new());
    collections.register("feed", loader.items());

    while loader.has_more() {
        loader.load_more().await.expect("next page");
    }
    assert_eq!(loader.item_count(), 17);
    assert!(!loader.has_more());

    // Window over the fully loaded feed, scrolled to the bottom.
    let mut window = ViewportWindow::new(ItemSizing::fixed(40.0), 2, 400.0);
    assert_eq!(window.total_height(17), 680.0);
    window.set_scroll_offset(280.0);
    let range = window.visible_range(17).expect("non-empty feed");
    assert_eq!(range.end, 16);
    assert!(range.contains(10));

    // Like a visible post optimistically; the remote confirms.
    let mutator = OptimisticMutator::new(collections.clone());
    let ok_remote: RemoteMutation = Arc::new(|item| Box::pin(async move { Ok(item) }));
    mutator
        .increment_remote("feed", "post-10", "likes", "liked", ok_remote)
        .await
        .expect("like");

    let liked = collections.find_item("feed", "post-10").expect("item");
    assert_eq!(liked.number("likes"), Some(11));
    assert_eq!(liked.flag("liked"), Some(true));

    // A like that the remote rejects reverts exactly.
    let failing: RemoteMutation =
        Arc::new(|_item| Box::pin(async { Err(NetworkError::offline("gone again")) }));
    let result = mutator
        .increment_remote("feed", "post-3", "likes", "liked", failing)
        .await;
    assert!(result.is_err());

    let reverted = collections.find_item("feed", "post-3").expect("item");
    assert_eq!(reverted.number("likes"), Some(3));
    assert_eq!(reverted.flag("liked"), Some(false));
}

#[tokio::test]
async fn exhausted_retries_recover_through_manual_retry() {
    init_tracing();

    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher: PageFetcher = {
        let calls = calls.clone();
        Arc::new(move |page| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                // Call 0 is the initial page; calls 1..=3 fail, later succeed.
                if (1..=3).contains(&n) {
                    Err(NetworkError::Timeout { ms: 5 })
                } else {
                    let start = (page as usize - 1) * 2;
                    Ok(vec![
                        Item::new(format!("post-{start}")),
                        Item::new(format!("post-{}", start + 1)),
                    ])
                }
            })
        })
    };

    let loader = PaginatedLoader::new(
        fetcher,
        LoaderConfig {
            page_size: 2,
            max_retries: 2,
            retry_base_ms: 10,
            ..Default::default()
        },
    );
    loader.initialize().await.expect("initial page");

    // Two automatic retries burn out, leaving the error state.
    let err = loader.load_more().await.expect_err("exhausted");
    assert!(matches!(
        err,
        ebbtide::LoaderError::ExhaustedRetries { attempts: 2, .. }
    ));
    assert_eq!(loader.status(), LoaderStatus::Error);

    // The manual retry affordance resets the counter and succeeds.
    loader.retry().await.expect("manual retry");
    assert_eq!(loader.status(), LoaderStatus::Ready);
    assert_eq!(loader.item_count(), 4);
}

#[tokio::test]
async fn queued_work_flushes_once_connectivity_returns() {
    init_tracing();

    let online = Arc::new(AtomicBool::new(false));
    let attempts = Arc::new(AtomicUsize::new(0));

    let sync = BackgroundSync::new();
    let handler: SyncHandler = {
        let online = online.clone();
        let attempts = attempts.clone();
        Arc::new(move || {
            let online = online.clone();
            let attempts = attempts.clone();
            Box::pin(async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                if online.load(Ordering::SeqCst) {
                    Ok(())
                } else {
                    Err(NetworkError::offline("still offline"))
                }
            })
        })
    };
    sync.register("queued-posts", handler);

    // Flushing while offline keeps the task registered for the next attempt.
    let results = sync.flush().await;
    assert_eq!(results, vec![("queued-posts".to_string(), false)]);
    assert!(sync.is_registered("queued-posts"));

    online.store(true, Ordering::SeqCst);
    let results = sync.flush().await;
    assert_eq!(results, vec![("queued-posts".to_string(), true)]);
    assert!(!sync.is_registered("queued-posts"));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}
