//! Configuration Module
//!
//! Handles loading cache and proxy configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Storage strategy selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Files under a cache root with an in-memory index
    File,
    /// Single embedded transactional store file
    Embedded,
    /// Caching disabled
    None,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" | "fs" => Ok(Self::File),
            "embedded" | "db" => Ok(Self::Embedded),
            "none" | "off" | "null" => Ok(Self::None),
            other => Err(format!("unknown cache backend: {}", other)),
        }
    }
}

/// Cache and server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Which backend the cache uses
    pub backend: BackendKind,
    /// Root directory for the filesystem backend
    pub cache_dir: PathBuf,
    /// Store file for the embedded backend
    pub db_path: PathBuf,
    /// Remove any existing embedded store file before opening
    pub fresh_store: bool,
    /// Entry time-to-live in seconds, 0 disables caching
    pub ttl: u64,
    /// Entry count that triggers janitor sweeps, 0 = unbounded
    pub capacity: usize,
    /// Janitor wake interval in seconds, defaults to the TTL
    pub sweep_interval: Option<u64>,
    /// Upstream request timeout in seconds
    pub fetch_timeout: u64,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_BACKEND` - `file`, `embedded` or `none` (default: file)
    /// - `CACHE_DIR` - Filesystem cache root (default: .)
    /// - `CACHE_DB_PATH` - Embedded store file (default: .cache.db)
    /// - `CACHE_FRESH` - Recreate the embedded store on startup (default: false)
    /// - `CACHE_TTL` - TTL in seconds (default: 300)
    /// - `CACHE_CAPACITY` - Entry count bound (default: 1000)
    /// - `CACHE_SWEEP_INTERVAL` - Janitor interval in seconds (default: TTL)
    /// - `FETCH_TIMEOUT` - Upstream timeout in seconds (default: 30)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backend: parse_var("CACHE_BACKEND").unwrap_or(defaults.backend),
            cache_dir: env::var("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            db_path: env::var("CACHE_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            fresh_store: parse_var("CACHE_FRESH").unwrap_or(defaults.fresh_store),
            ttl: parse_var("CACHE_TTL").unwrap_or(defaults.ttl),
            capacity: parse_var("CACHE_CAPACITY").unwrap_or(defaults.capacity),
            sweep_interval: parse_var("CACHE_SWEEP_INTERVAL").or(defaults.sweep_interval),
            fetch_timeout: parse_var("FETCH_TIMEOUT").unwrap_or(defaults.fetch_timeout),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
        }
    }

    /// TTL as a duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl)
    }

    /// Janitor interval, falling back to the TTL when unset.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval.unwrap_or(self.ttl))
    }

    /// Upstream request timeout as a duration.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::File,
            cache_dir: PathBuf::from("."),
            db_path: PathBuf::from(".cache.db"),
            fresh_store: false,
            ttl: 300,
            capacity: 1000,
            sweep_interval: None,
            fetch_timeout: 30,
            server_port: 3000,
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
