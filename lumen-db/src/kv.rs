//! localStorage-style convenience layer.
//!
//! Plugins that only want `setItem`/`getItem` ergonomics get them here,
//! layered on the document API: a set reads the current revision, carries
//! it into a put, and retries once if another writer slipped in between.
//! Values are JSON.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::blocking::Database;
use crate::document::Document;
use crate::error::DbError;

/// Key-value view over a [`Database`], obtained via [`Database::kv`].
pub struct KvStorage<'a> {
    db: &'a Database,
}

impl<'a> KvStorage<'a> {
    pub(crate) fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Store a JSON value under a key, overwriting any previous value.
    pub fn set_item<T: Serialize>(&self, key: &str, value: &T) -> Result<(), DbError> {
        let mut doc = Document::from_json(key, value)?;
        doc.rev = self.db.get(key)?.and_then(|existing| existing.rev);

        match self.db.put(&doc) {
            Ok(_) => Ok(()),
            // Lost a race with another writer, or the key holds a deletion
            // tombstone; the conflict reports the revision to supersede
            Err(DbError::Conflict { current, .. }) => {
                doc.rev = current;
                self.db.put(&doc).map(|_| ())
            }
            Err(e) => Err(e),
        }
    }

    /// Read the JSON value stored under a key.
    pub fn get_item<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DbError> {
        match self.db.get(key)? {
            Some(doc) => doc.to_json().map(Some),
            None => Ok(None),
        }
    }

    /// Delete a key. Deleting an absent key is a no-op.
    pub fn remove_item(&self, key: &str) -> Result<(), DbError> {
        match self.db.remove(key) {
            Ok(_) => Ok(()),
            Err(DbError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
