//! Durable storage on an embedded sled database
//!
//! Values are stored as UTF-8 JSON text. With `flush_on_write` enabled every
//! `set`/`remove` is followed by a sled flush so the entry survives a crash
//! right after the call returns; otherwise sled flushes in the background.

use super::Storage;
use crate::error::{StorageError, StorageResult};
use std::path::Path;
use tracing::{info, trace};

/// Handle to a sled-backed store (cheap to clone)
#[derive(Clone)]
pub struct SledStorage {
    db: sled::Db,
    flush_on_write: bool,
}

impl SledStorage {
    /// Open (or create) the database at `path`
    ///
    /// # Errors
    ///
    /// Returns an error if sled cannot open the directory.
    pub fn open(path: impl AsRef<Path>, flush_on_write: bool) -> StorageResult<Self> {
        let path = path.as_ref();
        let db = sled::open(path)?;
        info!("Opened sled storage at: {}", path.display());
        Ok(Self { db, flush_on_write })
    }

    /// Wrap an already opened database
    pub fn from_db(db: sled::Db, flush_on_write: bool) -> Self {
        Self { db, flush_on_write }
    }

    /// Flush outstanding writes to disk
    pub fn flush(&self) -> StorageResult<()> {
        self.db.flush()?;
        Ok(())
    }

    fn maybe_flush(&self) -> StorageResult<()> {
        if self.flush_on_write {
            self.db.flush()?;
            trace!("sled flushed after write");
        }
        Ok(())
    }
}

impl Storage for SledStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        match self.db.get(key.as_bytes())? {
            Some(data) => String::from_utf8(data.to_vec())
                .map(Some)
                .map_err(|_| StorageError::InvalidText {
                    key: key.to_string(),
                }),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.db.insert(key.as_bytes(), value.as_bytes())?;
        self.maybe_flush()
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.db.remove(key.as_bytes())?;
        self.maybe_flush()
    }
}
