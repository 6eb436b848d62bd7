use cask_txn::TxnError;
use cask_types::{ResourceHash, ResourceId};

/// Errors from catalog operations.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// No record exists for the given id.
    #[error("resource with id \"{0}\" not found")]
    NotFound(ResourceId),

    /// No record exists for the given digest pair.
    #[error("resource with {0} not found")]
    HashNotFound(ResourceHash),

    /// The record exists but its content upload has not completed.
    #[error("resource with id \"{0}\" is still uploading")]
    UploadPending(ResourceId),

    /// The declared length disagrees with the cataloged record.
    #[error("length mismatch in resource document: {stored} != {declared}")]
    LengthMismatch { stored: u64, declared: u64 },

    /// A persisted record failed to decode.
    #[error("corrupt resource record {id}: {reason}")]
    Corrupt { id: ResourceId, reason: String },

    /// The transactional store failed, including giving up after repeated
    /// aborts under sustained contention.
    #[error("store error: {0}")]
    Store(#[from] TxnError),
}

/// Result alias for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;
