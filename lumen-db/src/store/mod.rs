//! Storage layer for plugin documents.
//!
//! Architecture:
//! ```text
//! ┌────────────┐   blocking   ┌──────────────┐
//! │ Database   │ ───────────► │  StoreCore   │
//! └────────────┘              │  (RocksDB)   │
//! ┌────────────┐    async     └──────┬───────┘
//! │ Promises   │ ───────────►        │ column families
//! └────────────┘                     ▼
//!                 ┌─────────────────────────────────────┐
//!                 │ CF "documents"   - revisioned docs   │
//!                 │ CF "attachments" - LZ4 blobs + MIME  │
//!                 │ CF "sync_meta"   - sync bookkeeping  │
//!                 └─────────────────────────────────────┘
//! ```
//!
//! Both façades route through the same [`StoreCore`]; validation lives in
//! one place and the two calling conventions cannot diverge.

pub mod revision;
pub mod rocks;

pub use revision::{ParseRevisionError, Revision};
pub use rocks::{StoreConfig, StoreCore, StoreStats};
