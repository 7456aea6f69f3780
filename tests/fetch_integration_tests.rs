//! Integration Tests for the Fetch Pipeline
//!
//! Runs the fetcher against a local upstream so the network miss path streams
//! real response bodies through each backend.

use std::io::Read;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use fetch_cache::cache::{EmbeddedCache, FileCache};
use fetch_cache::{Cache, CacheError, Fetcher, Source};

// == Upstream ==

const BODY_LEN: usize = 110_000;

fn payload() -> Vec<u8> {
    (0..BODY_LEN).map(|i| (i % 251) as u8).collect()
}

async fn blob(State(calls): State<Arc<AtomicUsize>>) -> impl IntoResponse {
    calls.fetch_add(1, Ordering::SeqCst);
    ([(header::CONTENT_TYPE, "application/x-test-blob")], payload())
}

async fn gone(State(calls): State<Arc<AtomicUsize>>) -> impl IntoResponse {
    calls.fetch_add(1, Ordering::SeqCst);
    (StatusCode::NOT_FOUND, "gone")
}

/// Serves `/blob` and a failing `/gone` on an ephemeral port.
async fn spawn_upstream() -> (SocketAddr, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/blob", get(blob))
        .route("/gone", get(gone))
        .with_state(calls.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, calls)
}

// == Helper Functions ==

async fn assert_network_then_cache(cache: Cache) {
    let (addr, calls) = spawn_upstream().await;
    let url = format!("http://{}/blob", addr);
    let fetcher = Fetcher::new(cache, Duration::from_secs(5)).unwrap();

    let first = fetcher.fetch(&url).await.unwrap();
    assert_eq!(first.source, Source::Network);
    assert_eq!(first.content_type, "application/x-test-blob");
    assert_eq!(first.body.len(), BODY_LEN);
    assert_eq!(first.body, payload());

    let second = fetcher.fetch(&url).await.unwrap();
    assert_eq!(second.source, Source::Cache);
    assert_eq!(second.content_type, first.content_type);
    assert_eq!(second.body, first.body);

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let stats = fetcher.cache().stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);

    fetcher.cache().close().unwrap();
}

async fn assert_error_status_not_cached(cache: Cache) {
    let (addr, calls) = spawn_upstream().await;
    let url = format!("http://{}/gone", addr);
    let fetcher = Fetcher::new(cache, Duration::from_secs(5)).unwrap();

    let result = fetcher.fetch(&url).await;
    assert!(matches!(result, Err(CacheError::UpstreamStatus(404))));

    let lookup = fetcher
        .cache()
        .get(&url, &mut |_: &str, _: &mut dyn Read| Ok(()));
    assert!(matches!(lookup, Err(CacheError::Missing)));

    // Still a miss, so the second attempt goes upstream again
    let result = fetcher.fetch(&url).await;
    assert!(matches!(result, Err(CacheError::UpstreamStatus(404))));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    fetcher.cache().close().unwrap();
}

// == Network Miss Path ==

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_file_backend_stores_network_body() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FileCache::new(dir.path(), 0, Duration::from_secs(60));

    assert_network_then_cache(Cache::new(backend)).await;

    let partition = dir.path().join(".cache").join("127.0.0.1");
    assert_eq!(std::fs::read_dir(partition).unwrap().count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_embedded_backend_stores_network_body() {
    let dir = tempfile::tempdir().unwrap();
    let backend = EmbeddedCache::open(dir.path().join("cache.db"), Duration::from_secs(60));
    let backend = backend.unwrap();

    assert_network_then_cache(Cache::new(backend)).await;
}

#[tokio::test]
async fn test_current_thread_runtime_streams_body() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FileCache::new(dir.path(), 0, Duration::from_secs(60));

    assert_network_then_cache(Cache::new(backend)).await;
}

// == Upstream Failures ==

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_file_backend_skips_error_status() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FileCache::new(dir.path(), 0, Duration::from_secs(60));

    assert_error_status_not_cached(Cache::new(backend)).await;

    assert!(!dir.path().join(".cache").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_embedded_backend_skips_error_status() {
    let dir = tempfile::tempdir().unwrap();
    let backend = EmbeddedCache::open(dir.path().join("cache.db"), Duration::from_secs(60));
    let backend = backend.unwrap();

    assert_error_status_not_cached(Cache::new(backend)).await;
}
