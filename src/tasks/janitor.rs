//! Capacity Janitor Task
//!
//! Background task that keeps the filesystem cache near its capacity bound by
//! sweeping old entries in bulk.

use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::EntryIndex;

/// Spawns the janitor for a filesystem cache index.
///
/// Every `interval` the task checks the index size. Below `capacity` it does
/// nothing; otherwise every entry older than `interval` is dropped from the
/// index and its file deleted. Nothing is enforced between sweeps.
///
/// # Returns
/// A JoinHandle for the spawned task, aborted when the cache is closed.
///
/// # Example
/// ```ignore
/// let index = Arc::new(EntryIndex::new());
/// let handle = spawn_janitor_task(index.clone(), 1000, Duration::from_secs(300));
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_janitor_task(
    index: Arc<EntryIndex>,
    capacity: usize,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting cache janitor with capacity {} and interval of {:?}",
            capacity, interval
        );

        loop {
            tokio::time::sleep(interval).await;

            let size = index.len();
            if size < capacity {
                debug!("Janitor: {} entries, below capacity {}", size, capacity);
                continue;
            }

            let evicted = index.sweep(interval);
            for (key, entry) in &evicted {
                // Rewritten since the sweep; the file now belongs to the new entry.
                if index.contains(*key) {
                    continue;
                }
                match tokio::fs::remove_file(&entry.path).await {
                    Ok(()) => {}
                    Err(err) if err.kind() == ErrorKind::NotFound => {}
                    Err(err) => warn!("Janitor: failed to remove {}: {}", entry.path.display(), err),
                }
            }

            if evicted.is_empty() {
                debug!("Janitor: {} entries but none older than {:?}", size, interval);
            } else {
                info!("Janitor: evicted {} of {} entries", evicted.len(), size);
            }
        }
    })
}
