//! Entry Index Module
//!
//! Mutex-guarded map from key to entry metadata for the filesystem backend.
//! The lock is only ever held for map operations, never across file I/O.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::cache::entry::to_delta;
use crate::cache::{CacheEntry, CacheKey};

/// Outcome of an index lookup.
#[derive(Debug)]
pub enum Lookup {
    /// Live entry
    Fresh(CacheEntry),
    /// Entry was stale and has been removed from the index
    Expired(CacheEntry),
    /// Nothing registered under the key
    Absent,
}

// == Entry Index ==
#[derive(Debug, Default)]
pub struct EntryIndex {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl EntryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        // A panicking holder cannot leave the map half-updated.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // == Lookup ==
    /// Looks up `key`, evicting it from the index if older than `ttl`.
    pub fn lookup(&self, key: CacheKey, ttl: Duration) -> Lookup {
        let mut entries = self.lock();
        match entries.get(&key) {
            None => Lookup::Absent,
            Some(entry) if entry.is_expired(ttl) => match entries.remove(&key) {
                Some(entry) => Lookup::Expired(entry),
                None => Lookup::Absent,
            },
            Some(entry) => Lookup::Fresh(entry.clone()),
        }
    }

    // == Insert ==
    /// Registers a committed entry; last writer wins.
    pub fn insert(&self, key: CacheKey, entry: CacheEntry) {
        self.lock().insert(key, entry);
    }

    // == Forget ==
    /// Removes `key` only if it still points at `stale`, so a newer
    /// registration made in the meantime survives.
    pub fn forget(&self, key: CacheKey, stale: &CacheEntry) -> bool {
        let mut entries = self.lock();
        if entries.get(&key) == Some(stale) {
            entries.remove(&key);
            true
        } else {
            false
        }
    }

    // == Sweep ==
    /// Removes and returns every entry at least `max_age` old, with its key.
    pub fn sweep(&self, max_age: Duration) -> Vec<(CacheKey, CacheEntry)> {
        let max_age = to_delta(max_age);
        let mut entries = self.lock();
        let stale: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, entry)| entry.age() >= max_age)
            .map(|(key, _)| *key)
            .collect();

        stale
            .into_iter()
            .filter_map(|key| entries.remove(&key).map(|entry| (key, entry)))
            .collect()
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, key: CacheKey) -> bool {
        self.lock().contains_key(&key)
    }
}
