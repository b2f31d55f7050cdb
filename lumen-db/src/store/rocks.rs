//! RocksDB-backed store core.
//!
//! Column families:
//! - `documents` - revisioned document records (bincode)
//! - `attachments` - LZ4-compressed blobs plus a small metadata record per id
//! - `sync_meta` - per-id bookkeeping for the external sync service
//!
//! Every mutation of a document id writes its document record and its
//! sync-meta record in one `WriteBatch`, so the two keyspaces can never be
//! observed out of step. Revision validation and the batch commit happen
//! inside a single writer critical section that is never held across an
//! await point; readers go straight to the engine.

use rocksdb::{
    BlockBasedOptions, Cache, ColumnFamilyDescriptor, DBCompressionType, DBWithThreadMode,
    Direction, IteratorMode, Options, SingleThreaded, WriteBatch, WriteOptions,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use crate::document::{DocQuery, Document, PutResponse, RemoveTarget, SyncMeta};
use crate::error::DbError;
use crate::store::revision::Revision;

/// Column family names.
const CF_DOCUMENTS: &str = "documents";
const CF_ATTACHMENTS: &str = "attachments";
const CF_SYNC_META: &str = "sync_meta";

/// All column family names for initialization.
const COLUMN_FAMILIES: &[&str] = &[CF_DOCUMENTS, CF_ATTACHMENTS, CF_SYNC_META];

/// Suffix byte distinguishing an attachment metadata key from its blob key.
/// Ids containing NUL are rejected, so the two key forms never collide.
const ATTACHMENT_META_SUFFIX: u8 = 0x00;

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database directory path
    pub path: PathBuf,
    /// Block cache size in bytes (default: 64MB)
    pub block_cache_size: usize,
    /// Bloom filter bits per key (default: 10)
    pub bloom_filter_bits: i32,
    /// fsync every committed batch (default: true; plugin data is small and
    /// callers expect durability on return)
    pub sync_writes: bool,
    /// Max open files for RocksDB (default: 256)
    pub max_open_files: i32,
    /// Write buffer size per column family (default: 16MB)
    pub write_buffer_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("lumen_data"),
            block_cache_size: 64 * 1024 * 1024,
            bloom_filter_bits: 10,
            sync_writes: true,
            max_open_files: 256,
            write_buffer_size: 16 * 1024 * 1024,
        }
    }
}

impl StoreConfig {
    /// Config for testing (small caches, no fsync).
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 8 * 1024 * 1024,
            bloom_filter_bits: 10,
            sync_writes: false,
            max_open_files: 64,
            write_buffer_size: 4 * 1024 * 1024,
        }
    }
}

/// Stored document record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DocRecord {
    rev: Revision,
    payload: Vec<u8>,
}

/// Stored sync-meta record. `deleted: true` is a tombstone retained after
/// removal so stale pre-delete revisions keep failing as conflicts.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MetaRecord {
    rev: Revision,
    last_modified: u64,
    cloud_synced: bool,
    deleted: bool,
}

/// Stored attachment metadata, readable without touching the blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AttachmentMeta {
    mime: String,
    size: u64,
}

/// Live key counts per keyspace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub documents: u64,
    pub attachments: u64,
    pub tombstones: u64,
}

/// The document store core.
///
/// Owns the engine handle for the whole process lifetime: opened once at
/// store construction, closed once at teardown. Both façades delegate here;
/// neither duplicates validation.
pub struct StoreCore {
    /// RocksDB instance (single-threaded mode; concurrency via tokio)
    db: DBWithThreadMode<SingleThreaded>,
    config: StoreConfig,
    /// Serializes the validate-batch-commit critical section.
    write_lock: Mutex<()>,
}

impl StoreCore {
    /// Open the store at the configured path, creating the database and
    /// column families if needed.
    pub fn open(config: StoreConfig) -> Result<Self, DbError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_open_files(config.max_open_files);
        db_opts.set_keep_log_file_num(5);
        db_opts.increase_parallelism(num_cpus());

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| {
                let cf_opts = Self::cf_options(name, &config);
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let db = DBWithThreadMode::<SingleThreaded>::open_cf_descriptors(
            &db_opts,
            &config.path,
            cf_descriptors,
        )?;

        log::info!("Opened document store at {}", config.path.display());

        Ok(Self {
            db,
            config,
            write_lock: Mutex::new(()),
        })
    }

    /// Build column-family-specific options.
    fn cf_options(name: &str, config: &StoreConfig) -> Options {
        let mut opts = Options::default();

        let mut block_opts = BlockBasedOptions::default();
        let cache = Cache::new_lru_cache(config.block_cache_size);
        block_opts.set_block_cache(&cache);
        block_opts.set_bloom_filter(config.bloom_filter_bits as f64, false);
        block_opts.set_block_size(16 * 1024);
        opts.set_block_based_table_factory(&block_opts);

        opts.set_write_buffer_size(config.write_buffer_size);

        match name {
            CF_DOCUMENTS => {
                // Small JSON-ish payloads, point reads dominate
                opts.set_compression_type(DBCompressionType::Lz4);
                opts.set_max_write_buffer_number(2);
                opts.optimize_for_point_lookup(config.block_cache_size as u64);
            }
            CF_ATTACHMENTS => {
                // Blobs arrive LZ4-compressed already
                opts.set_compression_type(DBCompressionType::None);
                opts.set_max_write_buffer_number(2);
            }
            CF_SYNC_META => {
                // Tiny records, scanned by the sync service
                opts.set_compression_type(DBCompressionType::Lz4);
                opts.set_max_write_buffer_number(2);
                opts.optimize_for_point_lookup(config.block_cache_size as u64);
            }
            _ => {}
        }

        opts
    }

    // ─── Documents ────────────────────────────────────────────────────

    /// Create or update a document.
    ///
    /// A create needs no revision; an update must supply the currently
    /// stored revision and otherwise fails with `Conflict` carrying that
    /// revision. On success the document record and its sync-meta record
    /// are written in one atomic batch and the new revision is returned.
    pub fn put(&self, doc: &Document) -> Result<PutResponse, DbError> {
        validate_id(&doc.id)?;

        let _guard = self.write_guard();

        let next_rev = self.next_revision(&doc.id, doc.rev.as_ref(), &doc.payload)?;

        let cf_docs = self.cf(CF_DOCUMENTS)?;
        let cf_meta = self.cf(CF_SYNC_META)?;

        let record = DocRecord {
            rev: next_rev,
            payload: doc.payload.clone(),
        };
        let meta = MetaRecord {
            rev: next_rev,
            last_modified: unix_millis(),
            cloud_synced: false,
            deleted: false,
        };

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_docs, doc.id.as_bytes(), encode(&record)?);
        batch.put_cf(&cf_meta, doc.id.as_bytes(), encode(&meta)?);
        self.commit(batch)?;

        log::debug!("put {} rev {}", doc.id, next_rev);

        Ok(PutResponse {
            id: doc.id.clone(),
            rev: next_rev,
        })
    }

    /// Compute the revision a successful put would assign, enforcing the
    /// revision-match rule against the stored document or tombstone.
    fn next_revision(
        &self,
        id: &str,
        supplied: Option<&Revision>,
        payload: &[u8],
    ) -> Result<Revision, DbError> {
        if let Some(stored) = self.read_doc_record(id)? {
            return match supplied {
                Some(rev) if *rev == stored.rev => Ok(stored.rev.next(payload)),
                _ => Err(DbError::Conflict {
                    id: id.to_string(),
                    current: Some(stored.rev),
                }),
            };
        }

        match self.read_meta_record(id)? {
            Some(meta) if meta.deleted => match supplied {
                // Resurrection: only the exact tombstone revision reopens a
                // deleted id, and the generation keeps counting.
                Some(rev) if *rev == meta.rev => Ok(meta.rev.next(payload)),
                _ => Err(DbError::Conflict {
                    id: id.to_string(),
                    current: Some(meta.rev),
                }),
            },
            _ => match supplied {
                None => Ok(Revision::first(payload)),
                Some(_) => Err(DbError::Conflict {
                    id: id.to_string(),
                    current: None,
                }),
            },
        }
    }

    /// Fetch a document by id. Missing and deleted ids both read as `None`.
    pub fn get(&self, id: &str) -> Result<Option<Document>, DbError> {
        validate_id(id)?;
        Ok(self.read_doc_record(id)?.map(|record| Document {
            id: id.to_string(),
            rev: Some(record.rev),
            payload: record.payload,
        }))
    }

    /// Remove a document.
    ///
    /// Passing a full document checks its embedded revision; passing a bare
    /// id removes whatever revision is current. Deletes the document key and
    /// its attachment (blob and metadata) and writes a tombstone whose
    /// revision supersedes the deleted one.
    pub fn remove(&self, target: impl Into<RemoveTarget>) -> Result<PutResponse, DbError> {
        let target = target.into();
        let (id, supplied_rev) = match &target {
            RemoveTarget::Id(id) => (id.as_str(), None),
            RemoveTarget::Doc(doc) => (doc.id.as_str(), doc.rev),
        };
        validate_id(id)?;

        let _guard = self.write_guard();

        let stored = self
            .read_doc_record(id)?
            .ok_or_else(|| DbError::NotFound { id: id.to_string() })?;

        if let Some(rev) = supplied_rev {
            if rev != stored.rev {
                return Err(DbError::Conflict {
                    id: id.to_string(),
                    current: Some(stored.rev),
                });
            }
        }

        let tombstone_rev = stored.rev.next(&[]);
        let meta = MetaRecord {
            rev: tombstone_rev,
            last_modified: unix_millis(),
            cloud_synced: false,
            deleted: true,
        };

        let cf_docs = self.cf(CF_DOCUMENTS)?;
        let cf_atts = self.cf(CF_ATTACHMENTS)?;
        let cf_meta = self.cf(CF_SYNC_META)?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf_docs, id.as_bytes());
        batch.delete_cf(&cf_atts, id.as_bytes());
        batch.delete_cf(&cf_atts, attachment_meta_key(id));
        batch.put_cf(&cf_meta, id.as_bytes(), encode(&meta)?);
        self.commit(batch)?;

        log::debug!("removed {} at rev {}", id, stored.rev);

        Ok(PutResponse {
            id: id.to_string(),
            rev: tombstone_rev,
        })
    }

    /// Apply put semantics to each document independently.
    ///
    /// One document's conflict never aborts its siblings; results come back
    /// order-matched to the input. Deliberately not one cross-document
    /// transaction.
    pub fn bulk_docs(&self, docs: &[Document]) -> Vec<Result<PutResponse, DbError>> {
        docs.iter().map(|doc| self.put(doc)).collect()
    }

    /// Fetch documents by query: everything, an id prefix, or an explicit
    /// id list. Results are in ascending key order; tombstones never
    /// surface.
    pub fn all_docs(&self, query: impl Into<DocQuery>) -> Result<Vec<Document>, DbError> {
        match query.into() {
            DocQuery::All => self.scan_documents(""),
            DocQuery::Prefix(prefix) => self.scan_documents(&prefix),
            DocQuery::Ids(ids) => {
                let mut sorted: Vec<String> = ids;
                sorted.sort();
                sorted.dedup();

                let mut docs = Vec::new();
                for id in sorted {
                    if id.is_empty() {
                        continue;
                    }
                    if let Some(doc) = self.get(&id)? {
                        docs.push(doc);
                    }
                }
                Ok(docs)
            }
        }
    }

    /// Forward scan over the documents keyspace from a prefix, stopping at
    /// the first non-matching key.
    fn scan_documents(&self, prefix: &str) -> Result<Vec<Document>, DbError> {
        let cf = self.cf(CF_DOCUMENTS)?;
        let mode = if prefix.is_empty() {
            IteratorMode::Start
        } else {
            IteratorMode::From(prefix.as_bytes(), Direction::Forward)
        };

        let mut docs = Vec::new();
        for item in self.db.iterator_cf(&cf, mode) {
            let (key, value) = item.map_err(|e| DbError::Storage(e.to_string()))?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            let id = String::from_utf8(key.to_vec())
                .map_err(|_| DbError::Storage("non-UTF-8 document key".to_string()))?;
            let record: DocRecord = decode(&value)?;
            docs.push(Document {
                id,
                rev: Some(record.rev),
                payload: record.payload,
            });
        }
        Ok(docs)
    }

    // ─── Attachments ──────────────────────────────────────────────────

    /// Write or replace the attachment blob for an id.
    ///
    /// Attachments are last-write-wins and independent of the owning
    /// document: no revision is required and none is altered. The blob is
    /// stored LZ4-compressed next to a small metadata record so type
    /// lookups never read the blob.
    pub fn post_attachment(&self, id: &str, bytes: &[u8], mime: &str) -> Result<(), DbError> {
        validate_id(id)?;

        let compressed = lz4_flex::compress_prepend_size(bytes);
        let meta = AttachmentMeta {
            mime: mime.to_string(),
            size: bytes.len() as u64,
        };

        let _guard = self.write_guard();
        let cf = self.cf(CF_ATTACHMENTS)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf, id.as_bytes(), compressed);
        batch.put_cf(&cf, attachment_meta_key(id), encode(&meta)?);
        self.commit(batch)?;

        log::debug!("attachment {} ({} bytes, {})", id, bytes.len(), mime);
        Ok(())
    }

    /// Read an attachment blob, decompressed.
    pub fn get_attachment(&self, id: &str) -> Result<Option<Vec<u8>>, DbError> {
        validate_id(id)?;
        let cf = self.cf(CF_ATTACHMENTS)?;
        match self.db.get_cf(&cf, id.as_bytes())? {
            Some(compressed) => {
                let bytes = lz4_flex::decompress_size_prepended(&compressed)
                    .map_err(|e| DbError::Storage(format!("attachment decompression: {e}")))?;
                Ok(Some(bytes))
            }
            None => Ok(None),
        }
    }

    /// Read an attachment's MIME type from its metadata record only.
    pub fn get_attachment_type(&self, id: &str) -> Result<Option<String>, DbError> {
        validate_id(id)?;
        let cf = self.cf(CF_ATTACHMENTS)?;
        match self.db.get_cf(&cf, attachment_meta_key(id))? {
            Some(bytes) => {
                let meta: AttachmentMeta = decode(&bytes)?;
                Ok(Some(meta.mime))
            }
            None => Ok(None),
        }
    }

    // ─── Sync bookkeeping ─────────────────────────────────────────────

    /// Read the sync bookkeeping record for an id. Tombstones are visible
    /// here so the sync service can propagate deletions.
    pub fn get_sync_meta(&self, id: &str) -> Result<Option<SyncMeta>, DbError> {
        validate_id(id)?;
        Ok(self.read_meta_record(id)?.map(|meta| SyncMeta {
            rev: meta.rev,
            last_modified: meta.last_modified,
            cloud_synced: meta.cloud_synced,
            deleted: meta.deleted,
        }))
    }

    /// Flip the cloud-synced flag. Last-write-wins and advisory: the flag
    /// applies to whatever record is current, `rev` and `last_modified`
    /// stay untouched, and a missing record is a silent no-op.
    pub fn update_sync_status(&self, id: &str, cloud_synced: bool) -> Result<(), DbError> {
        validate_id(id)?;

        let _guard = self.write_guard();

        let Some(mut meta) = self.read_meta_record(id)? else {
            return Ok(());
        };
        if meta.cloud_synced == cloud_synced {
            return Ok(());
        }
        meta.cloud_synced = cloud_synced;

        let cf = self.cf(CF_SYNC_META)?;
        let mut batch = WriteBatch::default();
        batch.put_cf(&cf, id.as_bytes(), encode(&meta)?);
        self.commit(batch)
    }

    // ─── Lifecycle ────────────────────────────────────────────────────

    /// Flush memtables to disk.
    pub fn flush(&self) -> Result<(), DbError> {
        self.db.flush().map_err(DbError::from)
    }

    /// Count live keys per keyspace.
    pub fn stats(&self) -> Result<StoreStats, DbError> {
        let mut stats = StoreStats::default();

        let cf = self.cf(CF_DOCUMENTS)?;
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            item.map_err(|e| DbError::Storage(e.to_string()))?;
            stats.documents += 1;
        }

        let cf = self.cf(CF_ATTACHMENTS)?;
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, _) = item.map_err(|e| DbError::Storage(e.to_string()))?;
            // Count blobs only, not their metadata keys
            if key.last() != Some(&ATTACHMENT_META_SUFFIX) {
                stats.attachments += 1;
            }
        }

        let cf = self.cf(CF_SYNC_META)?;
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| DbError::Storage(e.to_string()))?;
            let meta: MetaRecord = decode(&value)?;
            if meta.deleted {
                stats.tombstones += 1;
            }
        }

        Ok(stats)
    }

    /// The database path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    // ─── Helpers ──────────────────────────────────────────────────────

    fn read_doc_record(&self, id: &str) -> Result<Option<DocRecord>, DbError> {
        let cf = self.cf(CF_DOCUMENTS)?;
        match self.db.get_cf(&cf, id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn read_meta_record(&self, id: &str) -> Result<Option<MetaRecord>, DbError> {
        let cf = self.cf(CF_SYNC_META)?;
        match self.db.get_cf(&cf, id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), DbError> {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        self.db.write_opt(batch, &write_opts).map_err(DbError::from)
    }

    fn write_guard(&self) -> std::sync::MutexGuard<'_, ()> {
        // The guard protects no data of its own, so a poisoned lock is
        // still usable.
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily, DbError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| DbError::Storage(format!("column family '{name}' not found")))
    }
}

impl Drop for StoreCore {
    fn drop(&mut self) {
        if let Err(e) = self.db.flush() {
            log::warn!("flush on close failed: {e}");
        }
    }
}

/// Reject empty ids and ids containing NUL (reserved for the attachment
/// metadata key suffix).
fn validate_id(id: &str) -> Result<(), DbError> {
    if id.is_empty() {
        return Err(DbError::InvalidId {
            id: id.to_string(),
            reason: "id must not be empty",
        });
    }
    if id.as_bytes().contains(&ATTACHMENT_META_SUFFIX) {
        return Err(DbError::InvalidId {
            id: id.to_string(),
            reason: "id must not contain NUL",
        });
    }
    Ok(())
}

fn attachment_meta_key(id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(id.len() + 1);
    key.extend_from_slice(id.as_bytes());
    key.push(ATTACHMENT_META_SUFFIX);
    key
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, DbError> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| DbError::Storage(format!("record encoding: {e}")))
}

fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, DbError> {
    let (value, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| DbError::Storage(format!("record decoding: {e}")))?;
    Ok(value)
}

/// Get number of CPU cores for RocksDB parallelism.
fn num_cpus() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as i32)
        .unwrap_or(4)
}
