//! Filesystem Backend
//!
//! Stores each response as a file under `<root>/.cache/<host>/<key>` and keeps
//! an in-memory index of committed entries.

use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tempfile::NamedTempFile;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use crate::cache::{
    CacheEntry, CacheKey, Consumer, EntryIndex, Lookup, ResponseCache, TeeReader, CACHE_DIR_NAME,
    DEFAULT_PARTITION,
};
use crate::error::{CacheError, Result};
use crate::tasks::spawn_janitor_task;

// == File Cache ==
/// Filesystem-backed response cache.
///
/// Writes go to a temporary file next to the final path and are renamed into
/// place only after the consumer succeeds, so a reader never sees a partial
/// body and a failed write leaves nothing behind.
///
/// Files of expired or swept entries are unlinked after the index lock is
/// released, and only when no newer entry for the same key has been
/// registered by then. A write that renames its file into place but has not
/// yet registered it can still lose that file; the next read then reports
/// `Missing` and forgets the entry.
#[derive(Debug)]
pub struct FileCache {
    /// `<root>/.cache`
    dir: PathBuf,
    ttl: Duration,
    capacity: usize,
    index: Arc<EntryIndex>,
    janitor: Mutex<Option<JoinHandle<()>>>,
}

impl FileCache {
    // == Constructor ==
    /// Creates a cache under `root` whose janitor wakes once per TTL.
    ///
    /// # Arguments
    /// * `root` - Directory receiving the `.cache` tree
    /// * `capacity` - Entry count that triggers sweeps, 0 disables the janitor
    /// * `ttl` - Entry time-to-live, zero disables caching
    pub fn new(root: impl AsRef<Path>, capacity: usize, ttl: Duration) -> Self {
        Self::with_sweep_interval(root, capacity, ttl, ttl)
    }

    /// Same as [`FileCache::new`] with an explicit janitor interval.
    ///
    /// The janitor runs on the ambient tokio runtime; without one the cache
    /// still works but the capacity bound is never enforced.
    pub fn with_sweep_interval(
        root: impl AsRef<Path>,
        capacity: usize,
        ttl: Duration,
        sweep_interval: Duration,
    ) -> Self {
        let index = Arc::new(EntryIndex::new());
        let janitor = if capacity == 0 || sweep_interval.is_zero() || ttl.is_zero() {
            None
        } else if tokio::runtime::Handle::try_current().is_ok() {
            Some(spawn_janitor_task(index.clone(), capacity, sweep_interval))
        } else {
            warn!("No async runtime available, cache janitor not started");
            None
        };

        Self {
            dir: root.as_ref().join(CACHE_DIR_NAME),
            ttl,
            capacity,
            index,
            janitor: Mutex::new(janitor),
        }
    }

    /// Directory holding the cached files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries currently registered in the index.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Deterministic on-disk location for `key`.
    ///
    /// URL keys are partitioned by host; anything else lands in a shared
    /// partition.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let partition = Url::parse(key)
            .ok()
            .and_then(|url| url.host_str().map(sanitize_host))
            .filter(|host| !host.is_empty())
            .unwrap_or_else(|| DEFAULT_PARTITION.to_string());
        self.dir.join(partition).join(CacheKey::new(key).file_name())
    }

    /// Removes entries older than `max_age` from the index and disk.
    ///
    /// Returns the number of entries evicted.
    pub fn sweep(&self, max_age: Duration) -> usize {
        let evicted = self.index.sweep(max_age);
        for (key, entry) in &evicted {
            discard_unclaimed(&self.index, *key, &entry.path);
        }
        evicted.len()
    }

    fn store(
        &self,
        key: &str,
        content_type: &str,
        reader: &mut dyn Read,
        consumer: &mut dyn FnMut(&str, &mut dyn Read) -> Result<()>,
    ) -> Result<()> {
        let path = self.path_for(key);
        let parent = path
            .parent()
            .ok_or_else(|| CacheError::Internal(format!("no parent for {}", path.display())))?;
        fs::create_dir_all(parent)?;

        // Dropped (and deleted) on every early return below.
        let mut sink = NamedTempFile::new_in(parent)?;
        consumer(content_type, &mut TeeReader::new(reader, sink.as_file_mut()))?;

        sink.persist(&path).map_err(|err| CacheError::Io(err.error))?;
        self.index
            .insert(CacheKey::new(key), CacheEntry::new(path, content_type));
        debug!("Cached {} ({})", key, content_type);
        Ok(())
    }
}

impl ResponseCache for FileCache {
    fn name(&self) -> &'static str {
        "file"
    }

    fn get(
        &self,
        key: &str,
        consumer: &mut dyn FnMut(&str, &mut dyn Read) -> Result<()>,
    ) -> Result<()> {
        if self.ttl.is_zero() {
            return Err(CacheError::Expired);
        }

        let cache_key = CacheKey::new(key);
        let entry = match self.index.lookup(cache_key, self.ttl) {
            Lookup::Fresh(entry) => entry,
            Lookup::Expired(entry) => {
                debug!("Cache entry for {} expired", key);
                discard_unclaimed(&self.index, cache_key, &entry.path);
                return Err(CacheError::Expired);
            }
            Lookup::Absent => return Err(CacheError::Missing),
        };

        let mut file = match File::open(&entry.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!("Cached file for {} disappeared", key);
                self.index.forget(cache_key, &entry);
                return Err(CacheError::Missing);
            }
            Err(err) => return Err(err.into()),
        };
        consumer(&entry.content_type, &mut file)
    }

    fn wrap<'a>(&'a self, key: &str, mut consumer: Consumer<'a>) -> Consumer<'a> {
        if self.ttl.is_zero() {
            return consumer;
        }
        let key = key.to_owned();
        Box::new(move |content_type: &str, reader: &mut dyn Read| {
            self.store(&key, content_type, reader, &mut consumer)
        })
    }

    fn close(&self) -> Result<()> {
        let handle = self
            .janitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
        Ok(())
    }
}

impl Drop for FileCache {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn sanitize_host(host: &str) -> String {
    host.chars()
        .map(|c| match c {
            ':' | '[' | ']' | '/' | '\\' => '_',
            c => c,
        })
        .collect()
}

/// Deletes the file of an entry that has left the index, unless a newer
/// write for `key` has been registered in the meantime.
///
/// Returns true when the file was handed to the filesystem for removal.
fn discard_unclaimed(index: &EntryIndex, key: CacheKey, path: &Path) -> bool {
    if index.contains(key) {
        debug!("Keeping {}, superseded by a newer write", path.display());
        return false;
    }
    remove_quietly(path);
    true
}

fn remove_quietly(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!("Failed to remove {}: {}", path.display(), err),
    }
}
