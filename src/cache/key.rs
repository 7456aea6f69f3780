//! Cache Key Module
//!
//! Maps caller-supplied strings (URLs, query scopes) to fixed-width keys.

use std::fmt;

use serde_json::Value;
use xxhash_rust::xxh32::Xxh32;
use xxhash_rust::xxh64::xxh64;

// == Cache Key ==
/// Fixed-width key derived from the xxHash64 of a caller string.
///
/// Equal strings always produce equal keys across runs. Two strings that
/// collide are treated as the same entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(u64);

impl CacheKey {
    /// Hashes a caller string into a key.
    pub fn new(raw: &str) -> Self {
        Self(xxh64(raw.as_bytes(), 0))
    }

    /// Raw 64-bit value, used as the embedded store key.
    pub fn value(self) -> u64 {
        self.0
    }

    /// File name used by the filesystem backend.
    pub fn file_name(self) -> String {
        format!("{:016x}", self.0)
    }
}

impl From<u64> for CacheKey {
    fn from(hash: u64) -> Self {
        Self(hash)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Short hex digest of a query payload, used to scope cache keys per query.
///
/// Variables other than `null` are hashed after the query text in their
/// compact JSON form, so payloads differing only in variables get distinct
/// digests.
pub fn query_digest(query: &str, variables: Option<&Value>) -> String {
    let mut hasher = Xxh32::new(0);
    hasher.update(query.as_bytes());
    if let Some(variables) = variables.filter(|vars| !vars.is_null()) {
        hasher.update(&[0]);
        hasher.update(variables.to_string().as_bytes());
    }
    format!("{:08x}", hasher.digest())
}
