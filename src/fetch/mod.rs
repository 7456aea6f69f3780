//! Fetch Module
//!
//! Cache-aware HTTP fetching. Lookups go to the cache first; misses hit the
//! network and the response streams through the cache into the consumer.

use std::io::{self, Read};
use std::sync::mpsc;
use std::time::Duration;

use futures::TryStreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use tokio_util::io::{StreamReader, SyncIoBridge};
use tracing::{debug, info};
use url::Url;

use crate::cache::{query_digest, Cache, Consumer, DEFAULT_CONTENT_TYPE};
use crate::error::{CacheError, Result};

/// Where a fetched body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Network,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Cache => "hit",
            Source::Network => "miss",
        }
    }
}

/// Fully collected response body.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub content_type: String,
    pub body: Vec<u8>,
    pub source: Source,
}

// == Fetcher ==
/// HTTP client paired with a cache.
///
/// Consumers are synchronous and run on the blocking pool, reading the
/// network body as it arrives.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    cache: Cache,
}

impl Fetcher {
    pub fn new(cache: Cache, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, cache })
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    // == Get With ==
    /// Feeds the body of `url` into `consumer`, from cache when possible.
    pub async fn get_with(&self, url: &str, consumer: Consumer<'static>) -> Result<Source> {
        let consumer = match self.lookup(url.to_owned(), consumer).await? {
            Some(consumer) => consumer,
            None => return Ok(Source::Cache),
        };

        let request = self.client.get(url);
        self.stream(url.to_owned(), request, consumer).await?;
        Ok(Source::Network)
    }

    // == Query With ==
    /// POSTs `{"query": query, "variables": variables}` to `url`, caching per
    /// query text and variables.
    ///
    /// The cache key is `url` with a path segment holding the query digest.
    pub async fn query_with(
        &self,
        url: &str,
        query: &str,
        variables: Option<&Value>,
        consumer: Consumer<'static>,
    ) -> Result<Source> {
        let key = query_key(url, query, variables)?;
        let consumer = match self.lookup(key.clone(), consumer).await? {
            Some(consumer) => consumer,
            None => return Ok(Source::Cache),
        };

        let request = self.client.post(url).json(&query_body(query, variables));
        self.stream(key, request, consumer).await?;
        Ok(Source::Network)
    }

    // == Collecting Variants ==
    /// Fetches `url` and collects its body.
    pub async fn fetch(&self, url: &str) -> Result<Fetched> {
        let (consumer, rx) = collector();
        let source = self.get_with(url, consumer).await?;
        finish(rx, source)
    }

    /// Runs `query` against `url` and collects the response body.
    pub async fn query(
        &self,
        url: &str,
        query: &str,
        variables: Option<&Value>,
    ) -> Result<Fetched> {
        let (consumer, rx) = collector();
        let source = self.query_with(url, query, variables, consumer).await?;
        finish(rx, source)
    }

    /// Tries the cache. Hands the consumer back when the network is needed.
    async fn lookup(
        &self,
        key: String,
        mut consumer: Consumer<'static>,
    ) -> Result<Option<Consumer<'static>>> {
        let cache = self.cache.clone();
        let (consumer, result) = tokio::task::spawn_blocking(move || {
            let result = cache.get(&key, &mut consumer);
            (consumer, result)
        })
        .await
        .map_err(|err| CacheError::Internal(err.to_string()))?;

        match result {
            Ok(()) => Ok(None),
            Err(err) if err.is_miss() => Ok(Some(consumer)),
            Err(err) => Err(err),
        }
    }

    /// Sends `request` and streams a successful body through the cache.
    async fn stream(
        &self,
        key: String,
        request: RequestBuilder,
        consumer: Consumer<'static>,
    ) -> Result<()> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CacheError::UpstreamStatus(status.as_u16()));
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        info!("Fetched {} ({}, {})", key, status, content_type);

        let body = response.bytes_stream().map_err(io::Error::other);
        let mut reader = SyncIoBridge::new(StreamReader::new(Box::pin(body)));

        let cache = self.cache.clone();
        tokio::task::spawn_blocking(move || {
            let mut consumer = cache.wrap(&key, consumer);
            consumer(&content_type, &mut reader)
        })
        .await
        .map_err(|err| CacheError::Internal(err.to_string()))?
    }
}

/// Cache key for a query payload sent to `url`.
pub fn query_key(url: &str, query: &str, variables: Option<&Value>) -> Result<String> {
    let mut url = Url::parse(url).map_err(|err| CacheError::InvalidRequest(err.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(CacheError::InvalidRequest(format!(
            "{} cannot be a base URL",
            url
        )));
    }
    if let Ok(mut segments) = url.path_segments_mut() {
        segments
            .pop_if_empty()
            .push(&query_digest(query, variables));
    }
    Ok(url.to_string())
}

/// JSON request body for a query; `variables` is left out when absent.
fn query_body(query: &str, variables: Option<&Value>) -> Value {
    match variables.filter(|vars| !vars.is_null()) {
        Some(variables) => json!({ "query": query, "variables": variables }),
        None => json!({ "query": query }),
    }
}

fn collector() -> (Consumer<'static>, mpsc::Receiver<(String, Vec<u8>)>) {
    let (tx, rx) = mpsc::channel();
    let consumer: Consumer<'static> = Box::new(move |content_type: &str, reader: &mut dyn Read| {
        let mut body = Vec::new();
        reader.read_to_end(&mut body)?;
        let _ = tx.send((content_type.to_string(), body));
        Ok(())
    });
    (consumer, rx)
}

fn finish(rx: mpsc::Receiver<(String, Vec<u8>)>, source: Source) -> Result<Fetched> {
    let (content_type, body) = rx
        .try_recv()
        .map_err(|_| CacheError::Internal("consumer produced no body".to_string()))?;
    debug!("Collected {} bytes ({})", body.len(), source.as_str());
    Ok(Fetched {
        content_type,
        body,
        source,
    })
}
