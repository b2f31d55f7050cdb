//! Blocking database façade.

use std::path::Path;
use std::sync::Arc;

use crate::document::{DocQuery, Document, PutResponse, RemoveTarget, SyncMeta};
use crate::error::DbError;
use crate::kv::KvStorage;
use crate::promises::Promises;
use crate::store::{StoreConfig, StoreCore, StoreStats};

/// The plugin database.
///
/// Every method blocks for the duration of one engine transaction and
/// delegates to the shared [`StoreCore`]; the async counterpart is reached
/// through [`Database::promises`]. The engine handle is opened once here
/// and closed on [`Database::close`] (or drop).
///
/// ```no_run
/// use lumen_db::{Database, Document, StoreConfig};
///
/// let db = Database::open(StoreConfig::default())?;
/// let resp = db.put(&Document::new("PLUGIN/clock/settings", br#"{"h24":true}"#.to_vec()))?;
/// let doc = db.get("PLUGIN/clock/settings")?.unwrap();
/// assert_eq!(doc.rev, Some(resp.rev));
/// # Ok::<(), lumen_db::DbError>(())
/// ```
pub struct Database {
    core: Arc<StoreCore>,
    promises: Promises,
}

impl Database {
    /// Open (or create) the database at the configured path.
    pub fn open(config: StoreConfig) -> Result<Self, DbError> {
        let core = Arc::new(StoreCore::open(config)?);
        let promises = Promises::new(Arc::clone(&core));
        Ok(Self { core, promises })
    }

    /// The async façade over the same store.
    pub fn promises(&self) -> &Promises {
        &self.promises
    }

    /// localStorage-style convenience layer over the document API.
    pub fn kv(&self) -> KvStorage<'_> {
        KvStorage::new(self)
    }

    // ─── Documents ────────────────────────────────────────────────────

    /// Create or update a document. See [`StoreCore::put`].
    pub fn put(&self, doc: &Document) -> Result<PutResponse, DbError> {
        self.core.put(doc)
    }

    /// Fetch a document by id.
    pub fn get(&self, id: &str) -> Result<Option<Document>, DbError> {
        self.core.get(id)
    }

    /// Remove a document by full document (revision-checked) or bare id.
    pub fn remove(&self, target: impl Into<RemoveTarget>) -> Result<PutResponse, DbError> {
        self.core.remove(target)
    }

    /// Apply put semantics to each document independently.
    pub fn bulk_docs(&self, docs: &[Document]) -> Vec<Result<PutResponse, DbError>> {
        self.core.bulk_docs(docs)
    }

    /// Fetch documents: all, by id prefix, or by id list.
    pub fn all_docs(&self, query: impl Into<DocQuery>) -> Result<Vec<Document>, DbError> {
        self.core.all_docs(query)
    }

    // ─── Attachments ──────────────────────────────────────────────────

    /// Write or replace the attachment for an id.
    pub fn post_attachment(&self, id: &str, bytes: &[u8], mime: &str) -> Result<(), DbError> {
        self.core.post_attachment(id, bytes, mime)
    }

    /// Read the attachment blob for an id.
    pub fn get_attachment(&self, id: &str) -> Result<Option<Vec<u8>>, DbError> {
        self.core.get_attachment(id)
    }

    /// Read the attachment MIME type without reading the blob.
    pub fn get_attachment_type(&self, id: &str) -> Result<Option<String>, DbError> {
        self.core.get_attachment_type(id)
    }

    // ─── Sync bookkeeping ─────────────────────────────────────────────

    /// Read the sync bookkeeping record for an id.
    pub fn get_sync_meta(&self, id: &str) -> Result<Option<SyncMeta>, DbError> {
        self.core.get_sync_meta(id)
    }

    /// Flip the cloud-synced flag (advisory, last-write-wins).
    pub fn update_sync_status(&self, id: &str, cloud_synced: bool) -> Result<(), DbError> {
        self.core.update_sync_status(id, cloud_synced)
    }

    // ─── Lifecycle ────────────────────────────────────────────────────

    /// Flush memtables to disk.
    pub fn flush(&self) -> Result<(), DbError> {
        self.core.flush()
    }

    /// Live key counts per keyspace.
    pub fn stats(&self) -> Result<StoreStats, DbError> {
        self.core.stats()
    }

    /// The database path.
    pub fn path(&self) -> &Path {
        self.core.path()
    }

    /// Flush and close the database.
    pub fn close(self) -> Result<(), DbError> {
        self.core.flush()?;
        log::info!("Closed document store at {}", self.core.path().display());
        Ok(())
    }
}
