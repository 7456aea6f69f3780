//! Cache Entry Module
//!
//! Metadata describing one stored response, plus the shared staleness rule.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

// == Cache Entry ==
/// Index record for one entry of the filesystem backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Moment the write was committed
    pub created_at: DateTime<Utc>,
    /// Location of the payload on disk
    pub path: PathBuf,
    /// Content-type tag supplied with the payload
    pub content_type: String,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry stamped with the current time.
    pub fn new(path: PathBuf, content_type: impl Into<String>) -> Self {
        Self {
            created_at: Utc::now(),
            path,
            content_type: content_type.into(),
        }
    }

    // == Age ==
    /// Time elapsed since the entry was committed.
    pub fn age(&self) -> TimeDelta {
        Utc::now().signed_duration_since(self.created_at)
    }

    // == Is Expired ==
    /// Checks the entry against a TTL.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        is_stale(self.created_at, ttl)
    }
}

// == Utility Functions ==
/// Boundary condition: an entry whose age equals the TTL is already stale.
/// A zero TTL makes everything stale.
pub fn is_stale(created_at: DateTime<Utc>, ttl: Duration) -> bool {
    if ttl.is_zero() {
        return true;
    }
    Utc::now().signed_duration_since(created_at) >= to_delta(ttl)
}

/// Converts a std duration, saturating on overflow.
pub fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}
