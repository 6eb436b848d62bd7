use std::sync::Arc;

use cask_txn::{Assert, DocumentStore, Operation, TxnRunner, Update};
use cask_types::{ResourceHash, ResourceId};

use crate::error::{CatalogError, CatalogResult};
use crate::record::{doc_id, ResourceDoc, COLLECTION};

/// What a [`ResourceCatalog::put`] decided.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PutOutcome {
    pub id: ResourceId,
    /// Storage path the content lives at (or will, once uploaded).
    pub path: String,
    /// Whether this put created the record. The creator is responsible for
    /// uploading the content to `path` and calling
    /// [`upload_complete`](ResourceCatalog::upload_complete).
    pub is_new: bool,
}

/// What a [`ResourceCatalog::remove`] decided.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoveOutcome {
    /// Whether this remove released the last reference and deleted the
    /// record. At most one of a set of racing removers sees `true`.
    pub was_deleted: bool,
    /// Storage path to reclaim; `Some` exactly when `was_deleted`.
    pub path: Option<String>,
}

/// A complete, uploaded resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resource {
    pub id: ResourceId,
    pub hash: ResourceHash,
    pub length: u64,
    pub path: String,
}

/// Content-addressed resource catalog over a transactional document store.
///
/// One record exists per distinct live digest pair; callers holding the same
/// content share it through a reference count. All mutations are conditioned
/// on the exact record state they were built from and retried from fresh
/// state when a concurrent writer gets there first, so the count never
/// drifts no matter how callers interleave.
#[derive(Clone, Debug)]
pub struct ResourceCatalog {
    runner: TxnRunner,
}

impl ResourceCatalog {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            runner: TxnRunner::new(store),
        }
    }

    /// Catalog over a runner with non-default retry settings.
    pub fn with_runner(runner: TxnRunner) -> Self {
        Self { runner }
    }

    /// Register a reference to content with the given digests and length.
    ///
    /// If no record exists one is created, pending upload. If one exists with
    /// the same length its reference count is incremented and the existing
    /// path is returned; the content itself is already stored (or already on
    /// its way). A record whose length disagrees with `length` fails with
    /// [`CatalogError::LengthMismatch`] and changes nothing.
    pub fn put(&self, hash: &ResourceHash, length: u64) -> CatalogResult<PutOutcome> {
        let id = doc_id(hash);
        self.runner.run(|_attempt| match self.read_doc(&id)? {
            None => {
                let doc = ResourceDoc::new(hash, length);
                let outcome = PutOutcome {
                    id: ResourceId::new(doc.id.clone()),
                    path: doc.path.clone(),
                    is_new: true,
                };
                tracing::debug!("cataloging new resource {} at {}", doc.id, doc.path);
                let op = Operation::insert(COLLECTION, doc.id.clone(), doc.to_value()?);
                Ok((vec![op], outcome))
            }
            Some(doc) => {
                if doc.length != length {
                    return Err(CatalogError::LengthMismatch {
                        stored: doc.length,
                        declared: length,
                    });
                }
                let outcome = PutOutcome {
                    id: ResourceId::new(doc.id.clone()),
                    path: doc.path.clone(),
                    is_new: false,
                };
                tracing::debug!(
                    "resource {} already cataloged, count {} -> {}",
                    doc.id,
                    doc.ref_count,
                    doc.ref_count + 1
                );
                let op = Operation::update(
                    COLLECTION,
                    doc.id,
                    Assert::field("ref_count", doc.ref_count),
                    Update::new().inc("ref_count", 1),
                );
                Ok((vec![op], outcome))
            }
        })
    }

    /// Fetch a resource whose upload has completed.
    ///
    /// A record that exists but is still pending fails with
    /// [`CatalogError::UploadPending`] so callers can distinguish "not there"
    /// from "not there yet".
    pub fn get(&self, id: &ResourceId) -> CatalogResult<Resource> {
        let doc = self
            .read_doc(id.as_str())?
            .ok_or_else(|| CatalogError::NotFound(id.clone()))?;
        if !doc.uploaded {
            return Err(CatalogError::UploadPending(id.clone()));
        }
        Ok(Resource {
            id: id.clone(),
            hash: doc.hash(),
            length: doc.length,
            path: doc.path,
        })
    }

    /// Look up the record id for a digest pair.
    ///
    /// Pending records are found too; only absence is an error.
    pub fn find(&self, hash: &ResourceHash) -> CatalogResult<ResourceId> {
        match self.read_doc(&doc_id(hash))? {
            Some(doc) => Ok(ResourceId::new(doc.id)),
            None => Err(CatalogError::HashNotFound(hash.clone())),
        }
    }

    /// Mark a record's content as fully uploaded, publishing it to readers.
    ///
    /// Idempotent: completing an already-complete record is a no-op, and so
    /// is completing a record that has since been removed — the reference is
    /// gone, so the upload outcome no longer matters.
    pub fn upload_complete(&self, id: &ResourceId) -> CatalogResult<()> {
        self.runner.run(|_attempt| {
            let Some(doc) = self.read_doc(id.as_str())? else {
                return Ok((Vec::new(), ()));
            };
            if doc.uploaded {
                return Ok((Vec::new(), ()));
            }
            tracing::debug!("upload complete for resource {}", doc.id);
            let op = Operation::update(
                COLLECTION,
                doc.id,
                Assert::Exists,
                Update::new().set("uploaded", true),
            );
            Ok((vec![op], ()))
        })
    }

    /// Release one reference to a record.
    ///
    /// Deletes the record when the last reference goes, handing the caller
    /// the storage path to reclaim. If the record vanishes between attempts a
    /// racing remove won the delete; the caller's reference is gone either
    /// way, so that is reported as success without a path.
    pub fn remove(&self, id: &ResourceId) -> CatalogResult<RemoveOutcome> {
        self.runner.run(|attempt| {
            let doc = match self.read_doc(id.as_str())? {
                Some(doc) => doc,
                None if attempt == 0 => return Err(CatalogError::NotFound(id.clone())),
                None => {
                    tracing::debug!("resource {} already deleted by a racing remove", id);
                    return Ok((
                        Vec::new(),
                        RemoveOutcome {
                            was_deleted: false,
                            path: None,
                        },
                    ));
                }
            };
            if doc.ref_count == 1 {
                let outcome = RemoveOutcome {
                    was_deleted: true,
                    path: Some(doc.path.clone()),
                };
                tracing::debug!("deleting resource {} with last reference gone", doc.id);
                let op = Operation::delete(COLLECTION, doc.id, Assert::field("ref_count", 1));
                Ok((vec![op], outcome))
            } else {
                let outcome = RemoveOutcome {
                    was_deleted: false,
                    path: None,
                };
                tracing::debug!(
                    "releasing reference to resource {}, count {} -> {}",
                    doc.id,
                    doc.ref_count,
                    doc.ref_count - 1
                );
                let op = Operation::update(
                    COLLECTION,
                    doc.id,
                    Assert::field("ref_count", doc.ref_count),
                    Update::new().inc("ref_count", -1),
                );
                Ok((vec![op], outcome))
            }
        })
    }

    fn read_doc(&self, id: &str) -> CatalogResult<Option<ResourceDoc>> {
        let Some(value) = self.runner.store().read(COLLECTION, id)? else {
            return Ok(None);
        };
        let doc = serde_json::from_value(value).map_err(|err| CatalogError::Corrupt {
            id: ResourceId::new(id),
            reason: err.to_string(),
        })?;
        Ok(Some(doc))
    }
}
