//! Null Backend
//!
//! Always misses and never stores, so callers can use the cache
//! unconditionally when caching is disabled.

use std::io::Read;

use crate::cache::{Consumer, ResponseCache};
use crate::error::{CacheError, Result};

#[derive(Debug, Default, Clone, Copy)]
pub struct NullCache;

impl ResponseCache for NullCache {
    fn name(&self) -> &'static str {
        "none"
    }

    fn get(&self, _: &str, _: &mut dyn FnMut(&str, &mut dyn Read) -> Result<()>) -> Result<()> {
        Err(CacheError::Missing)
    }

    fn wrap<'a>(&'a self, _: &str, consumer: Consumer<'a>) -> Consumer<'a> {
        consumer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_cache_always_misses() {
        let cache = NullCache;
        let mut called = false;
        let result = cache.get("http://h/a", &mut |_: &str, _: &mut dyn Read| {
            called = true;
            Ok(())
        });

        assert!(matches!(result, Err(CacheError::Missing)));
        assert!(!called);
    }

    #[test]
    fn test_null_cache_passes_consumer_through() {
        let cache = NullCache;
        let mut wrapped = cache.wrap(
            "http://h/a",
            Box::new(|content_type: &str, reader: &mut dyn Read| {
                let mut body = String::new();
                reader.read_to_string(&mut body)?;
                assert_eq!(content_type, "text/plain");
                assert_eq!(body, "hello");
                Ok(())
            }),
        );
        wrapped("text/plain", &mut &b"hello"[..]).unwrap();
        drop(wrapped);

        let result = cache.get("http://h/a", &mut |_: &str, _: &mut dyn Read| Ok(()));
        assert!(matches!(result, Err(CacheError::Missing)));
    }
}
