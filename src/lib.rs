//! Fetch Cache - A transparent response cache for HTTP fetch pipelines
//!
//! Stores response bodies on the filesystem or in an embedded transactional
//! store while a single consumer decodes them, and serves them back until
//! their TTL elapses.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{Cache, Consumer, ResponseCache};
pub use config::Config;
pub use error::{CacheError, Result};
pub use fetch::{Fetched, Fetcher, Source};
