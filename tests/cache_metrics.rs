use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use metrics_util::debugging::DebuggingRecorder;
use url::Url;

use ebbtide::cache::{CachedResponse, Network, RequestCache, ResourceRequest, StoreRegistry};
use ebbtide::loader::PageFetcher;
use ebbtide::telemetry::{
    METRIC_CACHE_FALLBACK_TOTAL, METRIC_CACHE_HIT_TOTAL, METRIC_CACHE_MISS_TOTAL,
    METRIC_LOADER_RETRY_TOTAL, METRIC_MUTATION_ROLLBACK_TOTAL,
};
use ebbtide::{
    CacheRules, Item, ItemCollections, LoaderConfig, NetworkError, OptimisticMutator,
    PaginatedLoader,
};

struct OfflineNetwork;

#[async_trait]
impl Network for OfflineNetwork {
    async fn fetch(&self, _request: &ResourceRequest) -> Result<CachedResponse, NetworkError> {
        Err(NetworkError::offline("unplugged"))
    }
}

fn get(url: &str) -> ResourceRequest {
    ResourceRequest::get(Url::parse(url).expect("url"))
}

#[tokio::test]
async fn data_layer_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    ebbtide::telemetry::describe_metrics();

    // Cache hit (seeded static store), miss + fallback (offline page/API).
    let registry = Arc::new(StoreRegistry::new());
    let cache = RequestCache::new(
        CacheRules::default(),
        registry.clone(),
        Arc::new(OfflineNetwork),
    );
    let css = get("http://localhost/app.css");
    registry.open("static-v1").put(
        ebbtide::cache::CacheKey::new(css.method.clone(), css.url.clone()),
        CachedResponse::ok("text/css", "body{}"),
    );
    cache.handle(css).await;
    cache.handle(get("http://localhost/api/posts")).await;
    cache.handle(get("http://localhost/posts/hello")).await;

    // One automatic loader retry before the page lands.
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_for_fetch = calls.clone();
    let fetcher: PageFetcher = Arc::new(move |_page| {
        let n = calls_for_fetch.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            match n {
                0 => Ok(vec![Item::new("post-0"), Item::new("post-1")]),
                1 => Err(NetworkError::offline("flaky")),
                _ => Ok(vec![Item::new("post-2"), Item::new("post-3")]),
            }
        })
    });
    let loader = PaginatedLoader::new(
        fetcher,
        LoaderConfig {
            page_size: 2,
            retry_base_ms: 5,
            ..Default::default()
        },
    );
    loader.initialize().await.expect("initial page");
    loader.load_more().await.expect("retried page");

    // One rolled-back speculative mutation.
    let collections = Arc::new(ItemCollections::new());
    collections.register("feed", loader.items());
    let mutator = OptimisticMutator::new(collections);
    let ticket = mutator
        .increment("feed", "post-0", "likes", "liked")
        .expect("speculative like");
    mutator.roll_back(&ticket);

    let snapshot = snapshotter.snapshot().into_vec();
    let names: HashSet<String> = snapshot
        .iter()
        .map(|(key, _, _, _)| key.key().name().to_string())
        .collect();

    for expected in [
        METRIC_CACHE_HIT_TOTAL,
        METRIC_CACHE_MISS_TOTAL,
        METRIC_CACHE_FALLBACK_TOTAL,
        METRIC_LOADER_RETRY_TOTAL,
        METRIC_MUTATION_ROLLBACK_TOTAL,
    ] {
        assert!(names.contains(expected), "missing metric {expected}");
    }
}
