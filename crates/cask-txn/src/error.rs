/// Errors from transaction operations.
#[derive(Debug, thiserror::Error)]
pub enum TxnError {
    /// A precondition did not hold at commit time. Nothing was applied.
    ///
    /// This is the retry signal consumed by [`TxnRunner`](crate::TxnRunner);
    /// it never escapes a runner-driven operation.
    #[error("transaction aborted: a precondition did not hold")]
    Aborted,

    /// Every allowed attempt aborted; the caller sees this, never `Aborted`.
    #[error("state changing too quickly; transaction still aborted after {attempts} attempts")]
    ExcessiveContention { attempts: u32 },

    /// An operation is malformed for the document it targets.
    #[error("invalid operation on {collection}/{id}: {reason}")]
    InvalidOperation {
        collection: String,
        id: String,
        reason: String,
    },

    /// Failure in the underlying store infrastructure. Never retried.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Result alias for transaction operations.
pub type TxnResult<T> = Result<T, TxnError>;
