//! Cache Façade
//!
//! The handle the fetch pipeline holds: a backend chosen at construction time
//! behind the two-operation contract, plus lookup statistics.

use std::io::Read;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::cache::{CacheStats, Consumer, EmbeddedCache, FileCache, NullCache, ResponseCache};
use crate::config::{BackendKind, Config};
use crate::error::{CacheError, Result};

// == Cache ==
/// Cheaply clonable cache handle shared by concurrent fetches.
#[derive(Clone)]
pub struct Cache {
    backend: Arc<dyn ResponseCache>,
    stats: Arc<Mutex<CacheStats>>,
}

impl Cache {
    // == Constructors ==
    /// Wraps an already constructed backend.
    pub fn new(backend: impl ResponseCache + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
            stats: Arc::new(Mutex::new(CacheStats::new())),
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self::new(NullCache)
    }

    /// Builds the backend selected by `config`.
    ///
    /// The filesystem janitor is started on the current tokio runtime, if any.
    pub fn from_config(config: &Config) -> Result<Self> {
        let ttl = config.ttl();
        let cache = match config.backend {
            BackendKind::File => Self::new(FileCache::with_sweep_interval(
                &config.cache_dir,
                config.capacity,
                ttl,
                config.sweep_interval(),
            )),
            BackendKind::Embedded if config.fresh_store => {
                Self::new(EmbeddedCache::create_fresh(&config.db_path, ttl)?)
            }
            BackendKind::Embedded => Self::new(EmbeddedCache::open(&config.db_path, ttl)?),
            BackendKind::None => Self::disabled(),
        };
        info!("Using {} cache backend with TTL {:?}", cache.backend_name(), ttl);
        Ok(cache)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    // == Get ==
    /// Feeds a stored entry for `key` into `consumer`.
    ///
    /// `Missing` and `Expired` are returned as errors so callers can fall
    /// through to the network; anything else is the consumer's own result or
    /// a storage failure. Stats count a hit whenever the consumer ran, even
    /// if it failed.
    pub fn get(
        &self,
        key: &str,
        consumer: &mut dyn FnMut(&str, &mut dyn Read) -> Result<()>,
    ) -> Result<()> {
        let mut served = false;
        let result = self.backend.get(key, &mut |content_type: &str, reader: &mut dyn Read| {
            served = true;
            consumer(content_type, reader)
        });
        {
            let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
            match &result {
                _ if served => stats.record_hit(),
                Err(CacheError::Missing) => stats.record_miss(),
                Err(CacheError::Expired) => stats.record_expiration(),
                _ => {}
            }
        }
        match &result {
            Ok(()) => debug!("Cache hit for {}", key),
            Err(err) => debug!("Cache lookup for {}: {}", key, err),
        }
        result
    }

    // == Do ==
    /// Wraps `consumer` so the body it decodes is stored under `key` when it
    /// succeeds.
    pub fn wrap<'a>(&'a self, key: &str, consumer: Consumer<'a>) -> Consumer<'a> {
        self.backend.wrap(key, consumer)
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // == Close ==
    /// Stops background work and releases storage. Call once at shutdown.
    pub fn close(&self) -> Result<()> {
        self.backend.close()
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("backend", &self.backend.name())
            .field("stats", &self.stats())
            .finish()
    }
}
