//! # lumen-db — Embedded document store for Lumen plugins
//!
//! Each launcher plugin gets private, durable, document-oriented storage
//! with attachment support and revision-based conflict detection, in the
//! CouchDB/PouchDB document model.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐          ┌──────────────┐
//! │  Database    │          │  Promises    │
//! │  (blocking)  │          │  (async)     │
//! └──────┬───────┘          └──────┬───────┘
//!        │      one shared core    │
//!        └───────────┬─────────────┘
//!                    ▼
//!             ┌──────────────┐
//!             │  StoreCore   │  revision checks, atomic batches
//!             │  (RocksDB)   │
//!             └──────┬───────┘
//!        ┌───────────┼────────────┐
//!        ▼           ▼            ▼
//!   documents   attachments   sync_meta
//! ```
//!
//! ## Modules
//!
//! - [`store`] — RocksDB core: three keyspaces, revision tokens, atomic
//!   per-document batches
//! - [`blocking`] — [`Database`], the synchronous façade
//! - [`promises`] — [`Promises`], the asynchronous façade with identical
//!   semantics
//! - [`kv`] — [`KvStorage`], a localStorage-style helper for plugins
//! - [`error`] — the [`DbError`] taxonomy
//!
//! ## Concurrency
//!
//! One writer at a time per store; writers validate the caller's revision
//! and commit inside a single non-suspending critical section. Readers are
//! never blocked. Optimistic concurrency throughout: a stale revision gets
//! a `Conflict` carrying the current one, and the caller retries with
//! fresh data.

pub mod blocking;
pub mod document;
pub mod error;
pub mod kv;
pub mod promises;
pub mod store;

// Re-exports for convenience
pub use blocking::Database;
pub use document::{DocQuery, Document, PutResponse, RemoveTarget, SyncMeta};
pub use error::DbError;
pub use kv::KvStorage;
pub use promises::Promises;
pub use store::{ParseRevisionError, Revision, StoreConfig, StoreCore, StoreStats};
