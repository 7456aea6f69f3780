//! Embedded Store Backend
//!
//! Keeps every entry in one redb file split across three tables keyed by the
//! same 64-bit key hash:
//!
//! | Table | Value |
//! |-------|-------|
//! | `content` | response bytes |
//! | `content_type` | content-type tag |
//! | `written_at` | commit time, Unix milliseconds as 8 big-endian bytes |
//!
//! The tables are the index: every read is one read transaction and every
//! write is one write transaction covering all three tables.

use std::fs;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use redb::{Database, TableDefinition};
use tracing::{debug, info};

use crate::cache::entry::is_stale;
use crate::cache::{CacheKey, Consumer, ResponseCache, TeeReader};
use crate::error::{CacheError, Result};

const CONTENT: TableDefinition<u64, &[u8]> = TableDefinition::new("content");
const CONTENT_TYPE: TableDefinition<u64, &str> = TableDefinition::new("content_type");
const WRITTEN_AT: TableDefinition<u64, &[u8]> = TableDefinition::new("written_at");

// == Embedded Cache ==
/// Response cache stored in a single transactional database file.
pub struct EmbeddedCache {
    db: RwLock<Option<Database>>,
    path: PathBuf,
    ttl: Duration,
}

impl EmbeddedCache {
    // == Constructor ==
    /// Opens the store at `path`, creating it and its tables when absent.
    pub fn open(path: impl AsRef<Path>, ttl: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let db = Database::create(&path)?;

        let txn = db.begin_write()?;
        txn.open_table(CONTENT)?;
        txn.open_table(CONTENT_TYPE)?;
        txn.open_table(WRITTEN_AT)?;
        txn.commit()?;

        info!("Opened embedded cache store at {}", path.display());
        Ok(Self {
            db: RwLock::new(Some(db)),
            path,
            ttl,
        })
    }

    /// Removes any existing store file at `path` before opening a new one.
    pub fn create_fresh(path: impl AsRef<Path>, ttl: Duration) -> Result<Self> {
        match fs::remove_file(path.as_ref()) {
            Ok(()) => debug!("Removed stale cache store {}", path.as_ref().display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        Self::open(path, ttl)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_db<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        let guard = self.db.read().unwrap_or_else(PoisonError::into_inner);
        let db = guard.as_ref().ok_or(CacheError::Closed)?;
        f(db)
    }

    fn read(
        &self,
        key: CacheKey,
        consumer: &mut dyn FnMut(&str, &mut dyn Read) -> Result<()>,
    ) -> Result<()> {
        self.with_db(|db| {
            let txn = db.begin_read()?;

            let written_at = txn.open_table(WRITTEN_AT)?;
            let stamp = match written_at.get(key.value())? {
                Some(raw) => decode_timestamp(raw.value()).ok_or(CacheError::Missing)?,
                None => return Err(CacheError::Missing),
            };
            if is_stale(stamp, self.ttl) {
                return Err(CacheError::Expired);
            }

            let content = txn.open_table(CONTENT)?;
            let content_type = txn.open_table(CONTENT_TYPE)?;
            let (body, tag) = match (content.get(key.value())?, content_type.get(key.value())?) {
                (Some(body), Some(tag)) => (body, tag),
                _ => return Err(CacheError::Missing),
            };
            let mut bytes: &[u8] = body.value();
            consumer(tag.value(), &mut bytes)
        })
    }

    fn write(&self, key: CacheKey, content_type: &str, body: &[u8]) -> Result<()> {
        let stamp = Utc::now().timestamp_millis().to_be_bytes();
        self.with_db(|db| {
            let txn = db.begin_write()?;
            {
                let mut written_at = txn.open_table(WRITTEN_AT)?;
                written_at.insert(key.value(), stamp.as_slice())?;
                let mut content = txn.open_table(CONTENT)?;
                content.insert(key.value(), body)?;
                let mut types = txn.open_table(CONTENT_TYPE)?;
                types.insert(key.value(), content_type)?;
            }
            txn.commit()?;
            Ok(())
        })
    }
}

impl ResponseCache for EmbeddedCache {
    fn name(&self) -> &'static str {
        "embedded"
    }

    fn get(
        &self,
        key: &str,
        consumer: &mut dyn FnMut(&str, &mut dyn Read) -> Result<()>,
    ) -> Result<()> {
        if self.ttl.is_zero() {
            return Err(CacheError::Missing);
        }
        self.read(CacheKey::new(key), consumer)
    }

    fn wrap<'a>(&'a self, key: &str, mut consumer: Consumer<'a>) -> Consumer<'a> {
        if self.ttl.is_zero() {
            return consumer;
        }
        let key = key.to_owned();
        Box::new(move |content_type: &str, reader: &mut dyn Read| {
            // The whole value is needed before the transaction can start.
            let mut buf = Vec::new();
            consumer(content_type, &mut TeeReader::new(reader, &mut buf))?;
            self.write(CacheKey::new(&key), content_type, &buf)?;
            debug!("Cached {} ({}, {} bytes)", key, content_type, buf.len());
            Ok(())
        })
    }

    fn close(&self) -> Result<()> {
        let db = self
            .db
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if db.is_some() {
            info!("Closed embedded cache store at {}", self.path.display());
        }
        Ok(())
    }
}

fn decode_timestamp(raw: &[u8]) -> Option<DateTime<Utc>> {
    let millis = i64::from_be_bytes(raw.try_into().ok()?);
    DateTime::from_timestamp_millis(millis)
}
