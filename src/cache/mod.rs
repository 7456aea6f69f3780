//! Cache Module
//!
//! Response caching in front of a fetch pipeline. A consumer decodes a
//! response body exactly once; the cache either replays stored bytes into it
//! or tees the live body into storage while it decodes.

mod embedded;
mod entry;
mod facade;
mod file;
mod index;
mod key;
mod null;
mod stats;
mod tee;

#[cfg(test)]
mod property_tests;

use std::io::Read;

use crate::error::Result;

// Re-export public types
pub use embedded::EmbeddedCache;
pub use entry::CacheEntry;
pub use facade::Cache;
pub use file::FileCache;
pub use index::{EntryIndex, Lookup};
pub use key::{query_digest, CacheKey};
pub use null::NullCache;
pub use stats::CacheStats;
pub use tee::TeeReader;

// == Public Constants ==
/// Directory created under the cache root by the filesystem backend
pub const CACHE_DIR_NAME: &str = ".cache";

/// Partition used for keys that carry no host
pub const DEFAULT_PARTITION: &str = "_";

/// Content type reported when upstream sends none
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

// == Consumer ==
/// Decoding callback: receives the content-type tag and the body stream.
///
/// Its result gates whether a wrapped write is committed.
pub type Consumer<'a> = Box<dyn FnMut(&str, &mut dyn Read) -> Result<()> + Send + 'a>;

// == Response Cache ==
/// Capability shared by every storage backend.
pub trait ResponseCache: Send + Sync {
    /// Short backend name for logs and stats.
    fn name(&self) -> &'static str;

    /// Replays a stored entry into `consumer`.
    ///
    /// Returns `Missing` or `Expired` without calling the consumer when there
    /// is nothing usable; otherwise returns whatever the consumer returns.
    fn get(&self, key: &str, consumer: &mut dyn FnMut(&str, &mut dyn Read) -> Result<()>)
        -> Result<()>;

    /// Wraps `consumer` so the stream it decodes is persisted under `key`,
    /// committed only when the consumer succeeds.
    fn wrap<'a>(&'a self, key: &str, consumer: Consumer<'a>) -> Consumer<'a>;

    /// Releases backend resources. Further calls may fail.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}
