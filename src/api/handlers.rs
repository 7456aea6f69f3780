//! API Handlers
//!
//! HTTP request handlers for each caching proxy endpoint.

use axum::{
    extract::{Query, State},
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};

use crate::cache::Cache;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::fetch::{Fetched, Fetcher};
use crate::models::{FetchParams, HealthResponse, QueryRequest, StatsResponse};

/// Header telling clients whether the body came from the cache.
pub const X_CACHE: &str = "x-cache";

/// Application state shared across all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Cache-aware HTTP client
    pub fetcher: Fetcher,
}

impl AppState {
    /// Creates a new AppState around a fetcher.
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Opens the configured cache backend and builds the HTTP client.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cache = Cache::from_config(config)?;
        Ok(Self::new(Fetcher::new(cache, config.fetch_timeout())?))
    }

    pub fn cache(&self) -> &Cache {
        self.fetcher.cache()
    }
}

/// Handler for GET /fetch?url=...
///
/// Returns the resource body with its original content type.
pub async fn fetch_handler(
    State(state): State<AppState>,
    Query(params): Query<FetchParams>,
) -> Result<Response> {
    if let Some(error_msg) = params.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let fetched = state.fetcher.fetch(&params.url).await?;
    Ok(into_body_response(fetched))
}

/// Handler for POST /query
///
/// Sends the query upstream unless a cached answer exists.
pub async fn query_handler(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Response> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let fetched = state
        .fetcher
        .query(&req.url, &req.query, req.variables.as_ref())
        .await?;
    Ok(into_body_response(fetched))
}

/// Handler for GET /stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let cache = state.cache();
    Json(StatsResponse::new(cache.backend_name(), &cache.stats()))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

fn into_body_response(fetched: Fetched) -> Response {
    let content_type = HeaderValue::from_str(&fetched.content_type)
        .unwrap_or(HeaderValue::from_static("application/octet-stream"));
    (
        [
            (header::CONTENT_TYPE, content_type),
            (
                HeaderName::from_static(X_CACHE),
                HeaderValue::from_static(fetched.source.as_str()),
            ),
        ],
        fetched.body,
    )
        .into_response()
}
