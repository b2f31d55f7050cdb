//! Public value types for the document API.

use crate::error::DbError;
use crate::store::Revision;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A document as seen by callers.
///
/// The payload is opaque to the store; callers pick their own serialization.
/// `from_json`/`to_json` cover the dominant case of plugins storing JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Caller-chosen id. Hierarchical namespacing such as
    /// `"PLUGIN/<name>/<suffix>"` is a caller convention.
    #[serde(rename = "_id")]
    pub id: String,
    /// Last-known revision. `None` when creating a document.
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<Revision>,
    /// Opaque payload bytes.
    pub payload: Vec<u8>,
}

impl Document {
    /// New document without a revision (a create when first put).
    pub fn new(id: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            rev: None,
            payload: payload.into(),
        }
    }

    /// New document carrying a known revision (an update when put).
    pub fn with_rev(id: impl Into<String>, rev: Revision, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            rev: Some(rev),
            payload: payload.into(),
        }
    }

    /// Build a document from a JSON-serializable value.
    pub fn from_json<T: Serialize>(id: impl Into<String>, value: &T) -> Result<Self, DbError> {
        let payload = serde_json::to_vec(value)
            .map_err(|e| DbError::Storage(format!("payload serialization: {e}")))?;
        Ok(Self::new(id, payload))
    }

    /// Decode the payload as JSON.
    pub fn to_json<T: DeserializeOwned>(&self) -> Result<T, DbError> {
        serde_json::from_slice(&self.payload)
            .map_err(|e| DbError::Storage(format!("payload deserialization: {e}")))
    }
}

/// Successful result of a put or remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutResponse {
    pub id: String,
    pub rev: Revision,
}

/// Query argument for `all_docs`, mirroring the three calling modes:
/// everything, an id prefix, or an explicit id list.
#[derive(Debug, Clone, Default)]
pub enum DocQuery {
    /// All documents in ascending key order.
    #[default]
    All,
    /// Documents whose id starts with the prefix, ascending.
    Prefix(String),
    /// Exactly the listed ids that exist, returned in key order; missing
    /// ids are omitted.
    Ids(Vec<String>),
}

impl From<&str> for DocQuery {
    fn from(prefix: &str) -> Self {
        DocQuery::Prefix(prefix.to_string())
    }
}

impl From<String> for DocQuery {
    fn from(prefix: String) -> Self {
        DocQuery::Prefix(prefix)
    }
}

impl From<Vec<String>> for DocQuery {
    fn from(ids: Vec<String>) -> Self {
        DocQuery::Ids(ids)
    }
}

impl From<&[&str]> for DocQuery {
    fn from(ids: &[&str]) -> Self {
        DocQuery::Ids(ids.iter().map(|s| s.to_string()).collect())
    }
}

/// Argument for `remove`: either a full document (revision-checked) or a
/// bare id (removes whatever revision is current).
#[derive(Debug, Clone)]
pub enum RemoveTarget {
    Id(String),
    Doc(Document),
}

impl From<&str> for RemoveTarget {
    fn from(id: &str) -> Self {
        RemoveTarget::Id(id.to_string())
    }
}

impl From<String> for RemoveTarget {
    fn from(id: String) -> Self {
        RemoveTarget::Id(id)
    }
}

impl From<&Document> for RemoveTarget {
    fn from(doc: &Document) -> Self {
        RemoveTarget::Doc(doc.clone())
    }
}

impl From<Document> for RemoveTarget {
    fn from(doc: Document) -> Self {
        RemoveTarget::Doc(doc)
    }
}

/// Per-document bookkeeping consumed by an external sync service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMeta {
    /// Revision the bookkeeping refers to.
    pub rev: Revision,
    /// Last successful mutation, milliseconds since the Unix epoch.
    pub last_modified: u64,
    /// Whether the external syncer has pushed this revision.
    pub cloud_synced: bool,
    /// True when the record is a deletion tombstone.
    pub deleted: bool,
}
