//! Error types for the response cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the cache, the fetch pipeline and the proxy server.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key was never stored (or its backing data vanished)
    #[error("missing")]
    Missing,

    /// Key was stored but its TTL has elapsed
    #[error("expired")]
    Expired,

    /// Error returned by a caller-supplied consumer, passed through untouched
    #[error("{0}")]
    Consumer(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Filesystem failure while reading or writing an entry
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedded store failure
    #[error("store error: {0}")]
    Store(#[from] redb::Error),

    /// Embedded store used after it was closed
    #[error("cache store is closed")]
    Closed,

    /// Upstream request could not be performed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("upstream responded with status {0}")]
    UpstreamStatus(u16),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Wraps an arbitrary decode error raised inside a consumer.
    pub fn consumer<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Consumer(err.into())
    }

    /// Returns true for the two outcomes that mean "go to the network".
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::Missing | Self::Expired)
    }
}

// The engine reports a distinct error type per operation; all of them fold
// into `redb::Error`.
macro_rules! store_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for CacheError {
                fn from(err: $ty) -> Self {
                    CacheError::Store(err.into())
                }
            }
        )*
    };
}

store_error!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::Missing | CacheError::Expired => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Http(_) | CacheError::UpstreamStatus(_) => StatusCode::BAD_GATEWAY,
            CacheError::Consumer(_)
            | CacheError::Io(_)
            | CacheError::Store(_)
            | CacheError::Closed
            | CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
