use serde_json::Value;

use crate::error::TxnResult;
use crate::op::Operation;

/// Transactional document store.
///
/// All implementations must satisfy these invariants:
/// - `apply` evaluates every operation's precondition against committed
///   state; if any fails, nothing is applied and the call returns
///   [`TxnError::Aborted`](crate::TxnError::Aborted).
/// - A batch commits entirely or not at all; readers never observe partial
///   application.
/// - Concurrent `apply` calls are serialized with respect to each other, so
///   a precondition that held when checked still holds when its change lands.
/// - Infrastructure failures surface as errors distinct from `Aborted` and
///   must not be retried by callers.
pub trait DocumentStore: Send + Sync {
    /// Read a document's committed state.
    ///
    /// Returns `Ok(None)` if the document does not exist.
    fn read(&self, collection: &str, id: &str) -> TxnResult<Option<Value>>;

    /// Atomically apply a batch of conditioned operations.
    fn apply(&self, ops: &[Operation]) -> TxnResult<()>;
}
