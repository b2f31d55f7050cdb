//! Error taxonomy shared by both database façades.

use crate::store::Revision;
use std::fmt;
use std::time::Duration;

/// Errors surfaced by document and attachment operations.
///
/// `Conflict`, `NotFound` and `InvalidId` are detected by the store core and
/// always returned to the immediate caller; they are never retried
/// internally because a retry needs fresh caller data. `Storage` wraps
/// engine-level I/O failures and is surfaced, not swallowed. `Timeout` is
/// produced only by the async façade when a per-operation deadline expires.
#[derive(Debug, Clone)]
pub enum DbError {
    /// Stale or missing revision on a mutation. Carries the currently
    /// stored revision (if any) so the caller can re-read and retry.
    Conflict {
        id: String,
        current: Option<Revision>,
    },
    /// The document id does not exist.
    NotFound { id: String },
    /// Empty or malformed document id.
    InvalidId { id: String, reason: &'static str },
    /// Underlying engine failure (I/O, corruption, encoding).
    Storage(String),
    /// Async façade deadline expired. The underlying write, if it had
    /// already started, still completes.
    Timeout { op: &'static str, after: Duration },
}

impl DbError {
    /// Wire-style error name, matching what plugin callers expect in a
    /// structured failure result.
    pub fn name(&self) -> &'static str {
        match self {
            DbError::Conflict { .. } => "conflict",
            DbError::NotFound { .. } => "not_found",
            DbError::InvalidId { .. } => "invalid_id",
            DbError::Storage(_) => "storage_failure",
            DbError::Timeout { .. } => "timeout",
        }
    }

    /// The currently stored revision reported by a `Conflict`.
    pub fn current_rev(&self) -> Option<Revision> {
        match self {
            DbError::Conflict { current, .. } => *current,
            _ => None,
        }
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::Conflict {
                id,
                current: Some(rev),
            } => {
                write!(f, "Document update conflict on {id:?}: current revision is {rev}")
            }
            DbError::Conflict { id, current: None } => {
                write!(f, "Document update conflict on {id:?}: document does not exist")
            }
            DbError::NotFound { id } => write!(f, "Document not found: {id:?}"),
            DbError::InvalidId { id, reason } => {
                write!(f, "Invalid document id {id:?}: {reason}")
            }
            DbError::Storage(e) => write!(f, "Storage failure: {e}"),
            DbError::Timeout { op, after } => {
                write!(f, "Operation {op} timed out after {after:?}")
            }
        }
    }
}

impl std::error::Error for DbError {}

impl From<rocksdb::Error> for DbError {
    fn from(e: rocksdb::Error) -> Self {
        DbError::Storage(e.to_string())
    }
}
