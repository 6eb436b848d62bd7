use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use cask_txn::{TxnError, TxnResult};
use cask_types::ResourceHash;

/// Collection holding one document per distinct live digest pair.
pub(crate) const COLLECTION: &str = "resources";

/// Persisted catalog record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct ResourceDoc {
    pub id: String,
    pub md5: String,
    pub sha256: String,
    pub length: u64,
    pub path: String,
    pub ref_count: i64,
    pub uploaded: bool,
}

impl ResourceDoc {
    /// A fresh record for content nobody has cataloged: one reference,
    /// upload still pending, and a newly generated storage path.
    pub fn new(hash: &ResourceHash, length: u64) -> Self {
        Self {
            id: doc_id(hash),
            md5: hash.md5().to_string(),
            sha256: hash.sha256().to_string(),
            length,
            path: new_path(),
            ref_count: 1,
            uploaded: false,
        }
    }

    pub fn hash(&self) -> ResourceHash {
        ResourceHash::new(self.md5.clone(), self.sha256.clone())
    }

    pub fn to_value(&self) -> TxnResult<Value> {
        serde_json::to_value(self)
            .map_err(|err| TxnError::Backend(format!("encode resource record: {err}")))
    }
}

/// Document key for a digest pair.
///
/// Deriving the key from the content digests makes "no live record with this
/// hash" a single missing-document precondition, so the store itself enforces
/// at most one live record per pair. The key is stable across a record's
/// lifetime; callers treat it as opaque.
pub(crate) fn doc_id(hash: &ResourceHash) -> String {
    format!("{}:{}", hash.md5(), hash.sha256())
}

/// Fresh storage path for a new record generation.
pub(crate) fn new_path() -> String {
    Uuid::now_v7().to_string()
}
