use cask_blobs::BlobError;
use cask_catalog::CatalogError;
use cask_txn::TxnError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManagedError {
    #[error("no blob \"{name}\" in bucket \"{bucket}\"")]
    NotFound { bucket: String, name: String },

    #[error("blob data ended early: declared {declared} bytes, got {actual}")]
    ShortData { declared: u64, actual: u64 },

    #[error("checksum mismatch after write: expected md5 {expected}, backend reported {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("corrupt blob mapping \"{id}\": {reason}")]
    Corrupt { id: String, reason: String },

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("blob error: {0}")]
    Blob(#[from] BlobError),

    #[error("store error: {0}")]
    Txn(#[from] TxnError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ManagedResult<T> = Result<T, ManagedError>;
