//! Async database façade.
//!
//! Mirrors the blocking API one-to-one as futures. Each operation moves its
//! owned arguments into `tokio::task::spawn_blocking`, so the engine
//! transaction begins and commits entirely inside the blocking closure and
//! is never held across an await point. Dropping a returned future after
//! the closure has started does not undo a committed write (the result is
//! simply not delivered); dropping it before the task is spawned runs
//! nothing.

use std::sync::Arc;
use std::time::Duration;

use crate::document::{DocQuery, Document, PutResponse, RemoveTarget, SyncMeta};
use crate::error::DbError;
use crate::store::{StoreCore, StoreStats};

/// Async counterpart of [`crate::Database`], obtained via
/// [`crate::Database::promises`].
///
/// ```no_run
/// # async fn demo(db: lumen_db::Database) -> Result<(), lumen_db::DbError> {
/// use lumen_db::Document;
///
/// let resp = db.promises().put(&Document::new("PLUGIN/clock/state", b"{}".to_vec())).await?;
/// let doc = db.promises().get("PLUGIN/clock/state").await?.unwrap();
/// assert_eq!(doc.rev, Some(resp.rev));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Promises {
    core: Arc<StoreCore>,
    timeout: Option<Duration>,
}

impl Promises {
    pub(crate) fn new(core: Arc<StoreCore>) -> Self {
        Self {
            core,
            timeout: None,
        }
    }

    /// A copy of this façade that fails operations with
    /// [`DbError::Timeout`] once the deadline expires. The deadline only
    /// abandons waiting; a write that already reached the engine still
    /// completes.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            core: Arc::clone(&self.core),
            timeout: Some(timeout),
        }
    }

    /// Run a core operation on the blocking pool, honoring the configured
    /// deadline.
    async fn run<T, F>(&self, op: &'static str, f: F) -> Result<T, DbError>
    where
        T: Send + 'static,
        F: FnOnce(&StoreCore) -> Result<T, DbError> + Send + 'static,
    {
        let core = Arc::clone(&self.core);
        let handle = tokio::task::spawn_blocking(move || f(&core));

        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(joined) => joined,
                Err(_) => return Err(DbError::Timeout { op, after: limit }),
            },
            None => handle.await,
        };

        joined.unwrap_or_else(|e| Err(DbError::Storage(format!("{op} task failed: {e}"))))
    }

    // ─── Documents ────────────────────────────────────────────────────

    /// Create or update a document.
    pub async fn put(&self, doc: &Document) -> Result<PutResponse, DbError> {
        let doc = doc.clone();
        self.run("put", move |core| core.put(&doc)).await
    }

    /// Fetch a document by id.
    pub async fn get(&self, id: &str) -> Result<Option<Document>, DbError> {
        let id = id.to_string();
        self.run("get", move |core| core.get(&id)).await
    }

    /// Remove a document by full document (revision-checked) or bare id.
    pub async fn remove(
        &self,
        target: impl Into<RemoveTarget>,
    ) -> Result<PutResponse, DbError> {
        let target = target.into();
        self.run("remove", move |core| core.remove(target)).await
    }

    /// Apply put semantics to each document independently.
    pub async fn bulk_docs(
        &self,
        docs: &[Document],
    ) -> Result<Vec<Result<PutResponse, DbError>>, DbError> {
        let docs = docs.to_vec();
        self.run("bulk_docs", move |core| Ok(core.bulk_docs(&docs)))
            .await
    }

    /// Fetch documents: all, by id prefix, or by id list.
    pub async fn all_docs(&self, query: impl Into<DocQuery>) -> Result<Vec<Document>, DbError> {
        let query = query.into();
        self.run("all_docs", move |core| core.all_docs(query)).await
    }

    // ─── Attachments ──────────────────────────────────────────────────

    /// Write or replace the attachment for an id.
    pub async fn post_attachment(
        &self,
        id: &str,
        bytes: &[u8],
        mime: &str,
    ) -> Result<(), DbError> {
        let id = id.to_string();
        let bytes = bytes.to_vec();
        let mime = mime.to_string();
        self.run("post_attachment", move |core| {
            core.post_attachment(&id, &bytes, &mime)
        })
        .await
    }

    /// Read the attachment blob for an id.
    pub async fn get_attachment(&self, id: &str) -> Result<Option<Vec<u8>>, DbError> {
        let id = id.to_string();
        self.run("get_attachment", move |core| core.get_attachment(&id))
            .await
    }

    /// Read the attachment MIME type without reading the blob.
    pub async fn get_attachment_type(&self, id: &str) -> Result<Option<String>, DbError> {
        let id = id.to_string();
        self.run("get_attachment_type", move |core| {
            core.get_attachment_type(&id)
        })
        .await
    }

    // ─── Sync bookkeeping ─────────────────────────────────────────────

    /// Read the sync bookkeeping record for an id.
    pub async fn get_sync_meta(&self, id: &str) -> Result<Option<SyncMeta>, DbError> {
        let id = id.to_string();
        self.run("get_sync_meta", move |core| core.get_sync_meta(&id))
            .await
    }

    /// Flip the cloud-synced flag (advisory, last-write-wins).
    pub async fn update_sync_status(&self, id: &str, cloud_synced: bool) -> Result<(), DbError> {
        let id = id.to_string();
        self.run("update_sync_status", move |core| {
            core.update_sync_status(&id, cloud_synced)
        })
        .await
    }

    // ─── Lifecycle ────────────────────────────────────────────────────

    /// Flush memtables to disk.
    pub async fn flush(&self) -> Result<(), DbError> {
        self.run("flush", move |core| core.flush()).await
    }

    /// Live key counts per keyspace.
    pub async fn stats(&self) -> Result<StoreStats, DbError> {
        self.run("stats", move |core| core.stats()).await
    }
}
