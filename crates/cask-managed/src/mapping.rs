use serde::{Deserialize, Serialize};
use serde_json::Value;

use cask_txn::{TxnError, TxnResult};

/// Collection holding one document per named blob.
pub(crate) const COLLECTION: &str = "managed_blobs";

/// Persisted name binding: a bucket-scoped name pointing at a catalog
/// resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct MappingDoc {
    pub id: String,
    pub bucket: String,
    pub name: String,
    pub resource_id: String,
}

impl MappingDoc {
    pub fn new(bucket: &str, name: &str, resource_id: &str) -> Self {
        Self {
            id: mapping_id(bucket, name),
            bucket: bucket.to_string(),
            name: name.to_string(),
            resource_id: resource_id.to_string(),
        }
    }

    pub fn to_value(&self) -> TxnResult<Value> {
        serde_json::to_value(self)
            .map_err(|err| TxnError::Backend(format!("encode blob mapping: {err}")))
    }
}

/// Document key for a named blob. Buckets namespace names, nothing more.
pub(crate) fn mapping_id(bucket: &str, name: &str) -> String {
    format!("buckets/{bucket}/{name}")
}
