/// Errors from blob storage operations.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// No content is stored at the given path.
    #[error("no blob stored at \"{0}\"")]
    NotFound(String),

    /// The data stream ended before the declared length was written.
    #[error("blob data ended early: declared {declared} bytes, got {actual}")]
    ShortData { declared: u64, actual: u64 },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for blob storage operations.
pub type BlobResult<T> = Result<T, BlobError>;
