use std::collections::VecDeque;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use gsearch_core::backend::{FetchError, SearchBackend, UpstreamRequest};
use gsearch_core::cache::{CacheConfig, ResultCache};
use gsearch_core::control::{ControlError, SearchControl};
use gsearch_core::fetch::{FetchConfig, ThrottledFetcher};
use gsearch_store::{CacheEntry, SearchRequest, SearchResult};

/// Serves scripted batches and counts upstream calls.
struct CountingBackend {
    calls: AtomicUsize,
    batches: Mutex<VecDeque<Result<Vec<SearchResult>, FetchError>>>,
}

impl CountingBackend {
    fn new(batches: Vec<Result<Vec<SearchResult>, FetchError>>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            batches: Mutex::new(batches.into()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SearchBackend for CountingBackend {
    async fn search(&self, request: &UpstreamRequest) -> Result<Vec<SearchResult>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.batches.lock().expect("batches lock").pop_front();
        next.unwrap_or_else(|| Ok(batch(&request.query, request.num_results as usize)))
    }
}

fn batch(label: &str, count: usize) -> Vec<SearchResult> {
    (1..=count)
        .map(|rank| {
            SearchResult::new(
                format!("{label} #{rank}"),
                format!("https://{}.test/{rank}", label.replace(' ', "-")),
            )
            .with_description(format!("about {label} ({rank})"))
        })
        .collect()
}

fn fast_fetch_config(max_retries: u32) -> FetchConfig {
    FetchConfig::new(Duration::ZERO, max_retries)
        .with_request_jitter(Duration::ZERO)
        .with_backoff_jitter(Duration::ZERO)
}

fn build_control(
    dir: &tempfile::TempDir,
    batches: Vec<Result<Vec<SearchResult>, FetchError>>,
) -> SearchControl<CountingBackend> {
    let cache = ResultCache::open(CacheConfig::new(dir.path().join("google_cache.json")))
        .expect("open cache");
    let fetcher = ThrottledFetcher::new(CountingBackend::new(batches), fast_fetch_config(3));
    SearchControl::new(fetcher).with_cache(cache)
}

fn request(query: &str, num_results: i64, use_cache: bool) -> SearchRequest {
    SearchRequest::new(query, num_results, use_cache, true).expect("valid request")
}

#[tokio::test]
async fn cache_hit_returns_the_last_fetch() {
    let dir = tempfile::tempdir().expect("tempdir");
    let control = build_control(&dir, vec![Ok(batch("rust", 5))]);
    let request = request("rust", 5, true);

    let first = control.search(&request).await.expect("first search");
    assert!(!first.cached);
    assert_eq!(first.results, batch("rust", 5));

    let second = control.search(&request).await.expect("second search");
    assert!(second.cached);
    assert_eq!(second.results, first.results);
    assert_eq!(control.fetcher().backend().calls(), 1);
}

#[tokio::test]
async fn bypassing_the_cache_still_refreshes_it() {
    let dir = tempfile::tempdir().expect("tempdir");
    let control = build_control(
        &dir,
        vec![Ok(batch("old", 3)), Ok(batch("new", 3))],
    );

    control.search(&request("rust", 3, true)).await.expect("seed");
    let fresh = control
        .search(&request("rust", 3, false))
        .await
        .expect("uncached search");
    assert_eq!(fresh.results, batch("new", 3));

    let cached = control.search(&request("rust", 3, true)).await.expect("cached");
    assert!(cached.cached);
    assert_eq!(cached.results, batch("new", 3));
    assert_eq!(control.fetcher().backend().calls(), 2);
}

#[tokio::test]
async fn keys_distinguish_every_parameter() {
    let dir = tempfile::tempdir().expect("tempdir");
    let control = build_control(&dir, Vec::new());

    control.search(&request("rust", 3, true)).await.expect("base");
    control.search(&request("rust", 4, true)).await.expect("more results");
    control.search(&request("Rust", 3, true)).await.expect("different case");
    let without = SearchRequest::new("rust", 3, true, false).expect("valid request");
    let plain = control.search(&without).await.expect("no descriptions");

    assert_eq!(control.fetcher().backend().calls(), 4);
    assert!(plain.results.iter().all(|result| result.description.is_none()));
    assert_eq!(control.cache().expect("cache").len().expect("len"), 4);
}

#[tokio::test]
async fn exhausted_retries_surface_an_error_and_cache_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let rate_limited = || Err(FetchError::RateLimited { retry_after: None });
    let control = build_control(&dir, vec![rate_limited(), rate_limited(), rate_limited()]);

    let err = control.search(&request("rust", 5, true)).await.unwrap_err();
    assert!(
        matches!(
            err,
            ControlError::Fetch(FetchError::RetriesExhausted { attempts: 3, .. })
        ),
        "unexpected error: {err}"
    );
    assert_eq!(control.fetcher().backend().calls(), 3);
    assert!(control.cache().expect("cache").is_empty().expect("is_empty"));
}

#[tokio::test]
async fn corrupt_cache_falls_back_to_upstream() {
    let dir = tempfile::tempdir().expect("tempdir");
    let control = build_control(&dir, Vec::new());
    let cache_path = control.cache().expect("cache").path().to_path_buf();
    fs::write(&cache_path, "\u{0}\u{0}garbage").expect("corrupt cache");

    let response = control.search(&request("rust", 2, true)).await.expect("search");
    assert!(!response.cached);
    assert_eq!(control.fetcher().backend().calls(), 1);

    let again = control.search(&request("rust", 2, true)).await.expect("search");
    assert!(again.cached);
}

#[tokio::test]
async fn works_without_a_cache() {
    let fetcher = ThrottledFetcher::new(CountingBackend::new(Vec::new()), fast_fetch_config(1));
    let control = SearchControl::new(fetcher);
    let request = request("rust", 2, true);

    control.search(&request).await.expect("first");
    let second = control.search_formatted(&request).await.expect("second");

    assert!(!second.response.cached);
    assert_eq!(control.fetcher().backend().calls(), 2);
    assert!(second.markdown.starts_with("## Search results for \"rust\""));
    assert!(second.markdown.contains("1. [rust #1](https://rust.test/1)"));
}

#[test]
fn concurrent_writers_never_corrupt_the_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("shared.json");
    let writers = 8;
    let per_writer = 10;

    let handles: Vec<_> = (0..writers)
        .map(|writer| {
            let path = path.clone();
            thread::spawn(move || {
                // Separate instances so each thread takes the OS lock independently.
                let cache = ResultCache::open(
                    CacheConfig::new(path).with_lock_timeout(Duration::from_secs(30)),
                )
                .expect("open cache");
                for item in 0..per_writer {
                    let query = format!("writer {writer} item {item}");
                    let request = SearchRequest::new(&query, 2, true, true).expect("valid");
                    cache
                        .put(CacheEntry::new(&request, batch(&query, 2)))
                        .expect("put");
                    assert_eq!(cache.get(&request.cache_key()), Some(batch(&query, 2)));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("writer thread");
    }

    let raw = fs::read_to_string(&path).expect("read cache file");
    let parsed: serde_json::Value = serde_json::from_str(&raw).expect("cache file is valid JSON");
    assert!(parsed["entries"].is_object());

    let cache = ResultCache::open(CacheConfig::new(&path)).expect("open cache");
    assert_eq!(cache.len().expect("len"), writers * per_writer);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_share_one_cache() {
    let dir = tempfile::tempdir().expect("tempdir");
    let control = Arc::new(build_control(&dir, Vec::new()));

    let tasks: Vec<_> = (0..12)
        .map(|index| {
            let control = control.clone();
            tokio::spawn(async move {
                let query = format!("topic {}", index % 4);
                control.search(&request(&query, 3, true)).await
            })
        })
        .collect();
    for response in futures::future::join_all(tasks).await {
        let response = response.expect("task").expect("search");
        assert_eq!(response.results.len(), 3);
    }

    let cache = control.cache().expect("cache");
    assert_eq!(cache.len().expect("len"), 4);
    for index in 0..4 {
        let query = format!("topic {index}");
        assert_eq!(
            cache.get(&request(&query, 3, true).cache_key()),
            Some(batch(&query, 3))
        );
    }
}
