//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the contract every backend must honor.

use proptest::prelude::*;
use std::collections::HashMap;
use std::io::{self, Read};
use std::time::Duration;

use crate::cache::{CacheKey, Consumer, EmbeddedCache, FileCache, ResponseCache};
use crate::error::{CacheError, Result};

// == Test Configuration ==
const TEST_TTL: Duration = Duration::from_secs(300);

// == Strategies ==
/// URL-shaped keys spread over a few hosts
fn url_key_strategy() -> impl Strategy<Value = String> {
    ("[a-c]", "[a-z0-9/]{0,24}").prop_map(|(host, path)| format!("http://{}.test/{}", host, path))
}

/// Opaque content-type tags
fn content_type_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,10}/[a-z0-9.+-]{1,16}"
}

fn body_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..2048)
}

// == Helpers ==
fn drain() -> Consumer<'static> {
    Box::new(|_: &str, reader: &mut dyn Read| {
        io::copy(reader, &mut io::sink())?;
        Ok(())
    })
}

/// Reads `fail_after` bytes and then rejects the payload.
fn failing(fail_after: usize) -> Consumer<'static> {
    Box::new(move |_: &str, reader: &mut dyn Read| {
        let mut buf = vec![0u8; fail_after];
        let _ = reader.read(&mut buf)?;
        Err(CacheError::consumer("decode failed"))
    })
}

fn put(cache: &dyn ResponseCache, key: &str, content_type: &str, body: &[u8]) -> Result<()> {
    cache.wrap(key, drain())(content_type, &mut &body[..])
}

fn fetch(cache: &dyn ResponseCache, key: &str) -> Result<(String, Vec<u8>)> {
    let mut out = None;
    cache.get(key, &mut |content_type: &str, reader: &mut dyn Read| {
        let mut body = Vec::new();
        reader.read_to_end(&mut body)?;
        out = Some((content_type.to_string(), body));
        Ok(())
    })?;
    out.ok_or(CacheError::Missing)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Hashing is a pure function of the input string.
    #[test]
    fn prop_key_is_deterministic(raw in ".*") {
        prop_assert_eq!(CacheKey::new(&raw), CacheKey::new(&raw.clone()));
        prop_assert_eq!(CacheKey::new(&raw).file_name().len(), 16);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    // A key that was never written is reported missing.
    #[test]
    fn prop_unwritten_key_is_missing(key in url_key_strategy()) {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path(), 0, TEST_TTL);

        prop_assert!(matches!(fetch(&cache, &key), Err(CacheError::Missing)));
    }

    // What the writing consumer saw is exactly what a later reader sees.
    #[test]
    fn prop_file_cache_replays_payload(
        key in url_key_strategy(),
        content_type in content_type_strategy(),
        body in body_strategy(),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path(), 0, TEST_TTL);

        put(&cache, &key, &content_type, &body).unwrap();

        let (seen_type, seen_body) = fetch(&cache, &key).unwrap();
        prop_assert_eq!(seen_type, content_type);
        prop_assert_eq!(seen_body, body);
    }

    // A failing consumer never leaves an entry behind, however much it read.
    #[test]
    fn prop_failed_consumer_never_persists(
        key in url_key_strategy(),
        body in body_strategy(),
        fail_after in 0usize..4096,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let file = FileCache::new(dir.path(), 0, TEST_TTL);
        let embedded = EmbeddedCache::open(dir.path().join("cache.db"), TEST_TTL).unwrap();

        for cache in [&file as &dyn ResponseCache, &embedded as &dyn ResponseCache] {
            let err = cache.wrap(&key, failing(fail_after))("text/plain", &mut &body[..]).unwrap_err();
            prop_assert_eq!(err.to_string(), "decode failed");
            prop_assert!(matches!(fetch(cache, &key), Err(CacheError::Missing)));
        }
        prop_assert!(!file.path_for(&key).exists());
    }

    // Each key holds at most one entry and the last write wins.
    #[test]
    fn prop_last_writer_wins(
        writes in prop::collection::vec((url_key_strategy(), body_strategy()), 1..12),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path(), 0, TEST_TTL);
        let mut expected: HashMap<String, Vec<u8>> = HashMap::new();

        for (key, body) in writes {
            put(&cache, &key, "application/octet-stream", &body).unwrap();
            expected.insert(key, body);
        }

        prop_assert_eq!(cache.len(), expected.len());
        for (key, body) in expected {
            let (_, seen) = fetch(&cache, &key).unwrap();
            prop_assert_eq!(seen, body);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    // Same replay guarantee for the embedded store.
    #[test]
    fn prop_embedded_cache_replays_payload(
        key in url_key_strategy(),
        content_type in content_type_strategy(),
        body in body_strategy(),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddedCache::open(dir.path().join("cache.db"), TEST_TTL).unwrap();

        put(&cache, &key, &content_type, &body).unwrap();

        let (seen_type, seen_body) = fetch(&cache, &key).unwrap();
        prop_assert_eq!(seen_type, content_type);
        prop_assert_eq!(seen_body, body);
    }
}
