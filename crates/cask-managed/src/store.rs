use std::io::Read;
use std::sync::Arc;

use cask_blobs::{BlobError, BlobStore};
use cask_catalog::{PutOutcome, ResourceCatalog};
use cask_txn::{Assert, DocumentStore, Operation, TxnRunner, Update};
use cask_types::{ResourceHash, ResourceId};

use crate::error::{ManagedError, ManagedResult};
use crate::mapping::{mapping_id, MappingDoc, COLLECTION};

/// Named blob storage over a deduplicating resource catalog.
///
/// Blobs are addressed by `(bucket, name)` pairs while the bytes themselves
/// are stored once per distinct content and shared between names through the
/// catalog's reference counts. The mapping documents binding names to
/// resources commit under the same conditioned-transaction regime as the
/// catalog records, so concurrent puts and removes of one name converge
/// instead of leaking references or bytes.
#[derive(Clone)]
pub struct ManagedStore {
    catalog: ResourceCatalog,
    blobs: Arc<dyn BlobStore>,
    runner: TxnRunner,
}

impl ManagedStore {
    /// Managed storage over a document store and a blob backend.
    ///
    /// The catalog shares the document store, so resource records and name
    /// mappings go through the same transaction machinery.
    pub fn new(store: Arc<dyn DocumentStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            catalog: ResourceCatalog::new(Arc::clone(&store)),
            blobs,
            runner: TxnRunner::new(store),
        }
    }

    /// Managed storage with non-default retry settings.
    pub fn with_runner(runner: TxnRunner, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            catalog: ResourceCatalog::with_runner(runner.clone()),
            blobs,
            runner,
        }
    }

    // ---- Write path ----

    /// Store `length` bytes read from `data` under `(bucket, name)`.
    ///
    /// Content is staged and hashed first, then registered with the catalog.
    /// New content is written to the backend and checksum-verified before
    /// the record is published; content the catalog already holds gains a
    /// reference and no bytes move. The name is then pointed at the
    /// resource, and whatever resource it pointed at before is released.
    ///
    /// Every failure after the catalog registration releases the reference
    /// it took, so an aborted put leaves no trace.
    pub fn put(
        &self,
        bucket: &str,
        name: &str,
        data: &mut dyn Read,
        length: u64,
    ) -> ManagedResult<ResourceId> {
        let staged = stage(data, length)?;
        let hash = ResourceHash::of(&staged);
        let outcome = self.catalog.put(&hash, length)?;
        if outcome.is_new {
            if let Err(err) = self.upload(&outcome, &hash, &staged, length) {
                self.release_quietly(&outcome.id);
                return Err(err);
            }
        }
        let previous = match self.bind(bucket, name, &outcome.id) {
            Ok(previous) => previous,
            Err(err) => {
                self.release_quietly(&outcome.id);
                return Err(err);
            }
        };
        if let Some(previous) = previous {
            self.release(&previous)?;
        }
        tracing::debug!("stored blob {}/{} as resource {}", bucket, name, outcome.id);
        Ok(outcome.id)
    }

    /// Write staged content to the backend and publish the record.
    fn upload(
        &self,
        outcome: &PutOutcome,
        hash: &ResourceHash,
        staged: &[u8],
        length: u64,
    ) -> ManagedResult<()> {
        let checksum = self.blobs.put(&outcome.path, &mut &staged[..], length)?;
        if checksum != hash.md5() {
            if let Err(remove_err) = self.blobs.remove(&outcome.path) {
                tracing::warn!("error cleaning up after failed write: {}", remove_err);
            }
            return Err(ManagedError::ChecksumMismatch {
                expected: hash.md5().to_string(),
                actual: checksum,
            });
        }
        self.catalog.upload_complete(&outcome.id)?;
        Ok(())
    }

    /// Point `(bucket, name)` at `resource_id`, returning the resource the
    /// name pointed at before, if any.
    ///
    /// The mapping write is conditioned on the exact binding observed, so a
    /// concurrent put or remove of the same name forces a retry from fresh
    /// state and no binding is ever silently overwritten.
    fn bind(
        &self,
        bucket: &str,
        name: &str,
        resource_id: &ResourceId,
    ) -> ManagedResult<Option<ResourceId>> {
        let id = mapping_id(bucket, name);
        self.runner.run(|_attempt| match self.read_mapping(&id)? {
            None => {
                let doc = MappingDoc::new(bucket, name, resource_id.as_str());
                let op = Operation::insert(COLLECTION, doc.id.clone(), doc.to_value()?);
                Ok((vec![op], None))
            }
            Some(doc) => {
                let previous = ResourceId::new(doc.resource_id.clone());
                let op = Operation::update(
                    COLLECTION,
                    doc.id,
                    Assert::field("resource_id", doc.resource_id),
                    Update::new().set("resource_id", resource_id.as_str()),
                );
                Ok((vec![op], Some(previous)))
            }
        })
    }

    // ---- Read path ----

    /// Open the blob stored under `(bucket, name)`.
    ///
    /// Returns a reader over the content and its length. A name whose
    /// resource is still uploading fails with the catalog's upload-pending
    /// error rather than serving bytes that are not all there yet.
    pub fn get(&self, bucket: &str, name: &str) -> ManagedResult<(Box<dyn Read + Send>, u64)> {
        let id = mapping_id(bucket, name);
        let doc = self
            .read_mapping(&id)?
            .ok_or_else(|| ManagedError::NotFound {
                bucket: bucket.to_string(),
                name: name.to_string(),
            })?;
        let resource = self.catalog.get(&ResourceId::new(doc.resource_id))?;
        let reader = self.blobs.get(&resource.path)?;
        Ok((reader, resource.length))
    }

    // ---- Remove path ----

    /// Remove the blob under `(bucket, name)` and release its resource.
    ///
    /// The mapping delete is conditioned on the resource the name was
    /// observed pointing at. Losing that race to another remover is fine:
    /// the name is gone and the winner released the reference, so this
    /// remove reports success. A name that was never there on the first
    /// look is [`ManagedError::NotFound`].
    pub fn remove(&self, bucket: &str, name: &str) -> ManagedResult<()> {
        let id = mapping_id(bucket, name);
        let released = self.runner.run(|attempt| {
            let doc = match self.read_mapping(&id)? {
                Some(doc) => doc,
                None if attempt == 0 => {
                    return Err(ManagedError::NotFound {
                        bucket: bucket.to_string(),
                        name: name.to_string(),
                    })
                }
                None => {
                    tracing::debug!("blob {}/{} already removed by a racing remove", bucket, name);
                    return Ok((Vec::new(), None));
                }
            };
            let previous = ResourceId::new(doc.resource_id.clone());
            let op = Operation::delete(
                COLLECTION,
                doc.id,
                Assert::field("resource_id", doc.resource_id),
            );
            Ok((vec![op], Some(previous)))
        })?;
        if let Some(resource_id) = released {
            self.release(&resource_id)?;
        }
        tracing::debug!("removed blob {}/{}", bucket, name);
        Ok(())
    }

    /// Release one reference, reclaiming the stored bytes if it was the
    /// last one.
    fn release(&self, id: &ResourceId) -> ManagedResult<()> {
        let removed = self.catalog.remove(id)?;
        if removed.was_deleted {
            if let Some(path) = removed.path {
                tracing::debug!("reclaiming blob at {} for deleted resource {}", path, id);
                match self.blobs.remove(&path) {
                    Ok(()) => {}
                    // The record can die before its bytes ever arrived.
                    Err(BlobError::NotFound(_)) => {}
                    Err(err) => return Err(err.into()),
                }
            }
        }
        Ok(())
    }

    /// Best-effort release on a failure path already carrying an error.
    fn release_quietly(&self, id: &ResourceId) {
        if let Err(err) = self.release(id) {
            tracing::warn!("error releasing resource {} after failed put: {}", id, err);
        }
    }

    fn read_mapping(&self, id: &str) -> ManagedResult<Option<MappingDoc>> {
        let Some(value) = self.runner.store().read(COLLECTION, id)? else {
            return Ok(None);
        };
        let doc = serde_json::from_value(value).map_err(|err| ManagedError::Corrupt {
            id: id.to_string(),
            reason: err.to_string(),
        })?;
        Ok(Some(doc))
    }
}

impl std::fmt::Debug for ManagedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedStore")
            .field("runner", &self.runner)
            .finish()
    }
}

/// Read exactly `length` bytes into memory, leaving anything beyond unread.
fn stage(data: &mut dyn Read, length: u64) -> ManagedResult<Vec<u8>> {
    let mut staged = Vec::new();
    data.take(length).read_to_end(&mut staged)?;
    if (staged.len() as u64) < length {
        return Err(ManagedError::ShortData {
            declared: length,
            actual: staged.len() as u64,
        });
    }
    Ok(staged)
}
