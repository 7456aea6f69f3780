//! Request DTOs for the caching proxy API
//!
//! Defines the structure of incoming query strings and request bodies.

use serde::Deserialize;
use serde_json::Value;
use url::Url;

/// Query string for GET /fetch
#[derive(Debug, Clone, Deserialize)]
pub struct FetchParams {
    /// Absolute http(s) URL to fetch
    pub url: String,
}

impl FetchParams {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        validate_url(&self.url)
    }
}

/// Request body for POST /query
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    /// Endpoint receiving the query
    pub url: String,
    /// Query text, also used to scope the cache key
    pub query: String,
    /// Optional query variables, sent upstream and folded into the cache key
    #[serde(default)]
    pub variables: Option<Value>,
}

impl QueryRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.query.trim().is_empty() {
            return Some("Query cannot be empty".to_string());
        }
        validate_url(&self.url)
    }
}

fn validate_url(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return Some("URL cannot be empty".to_string());
    }
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => None,
        Ok(url) => Some(format!("Unsupported URL scheme: {}", url.scheme())),
        Err(err) => Some(format!("Invalid URL: {}", err)),
    }
}
