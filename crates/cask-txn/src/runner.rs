use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::TxnError;
use crate::op::Operation;
use crate::traits::DocumentStore;

/// Commit attempts before a run gives up with `ExcessiveContention`.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Tunables for the retry loop.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Commit attempts before giving up. Clamped to at least one.
    pub max_attempts: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Optimistic retry loop over a [`DocumentStore`].
///
/// Conditioned batches abort instead of blocking when another writer got
/// there first. The runner re-invokes the caller's `build` closure so it can
/// re-read state and rebuild its operations against what actually committed,
/// up to a bounded number of attempts.
#[derive(Clone)]
pub struct TxnRunner {
    store: Arc<dyn DocumentStore>,
    max_attempts: u32,
}

impl TxnRunner {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_config(store, RunnerConfig::default())
    }

    pub fn with_config(store: Arc<dyn DocumentStore>, config: RunnerConfig) -> Self {
        Self {
            store,
            max_attempts: config.max_attempts.max(1),
        }
    }

    /// The store this runner commits against.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Run `build` until its operations commit cleanly.
    ///
    /// `build` receives the attempt number (starting at zero) and must
    /// re-read whatever state it conditions on, returning the operations to
    /// apply plus the value to surface on success. Returning no operations
    /// commits nothing and succeeds immediately. An abort at commit time
    /// triggers another attempt; domain errors from `build` and
    /// infrastructure errors from the store pass straight through.
    pub fn run<T, E, F>(&self, mut build: F) -> Result<T, E>
    where
        E: From<TxnError>,
        F: FnMut(u32) -> Result<(Vec<Operation>, T), E>,
    {
        for attempt in 0..self.max_attempts {
            let (ops, value) = build(attempt)?;
            if ops.is_empty() {
                return Ok(value);
            }
            match self.store.apply(&ops) {
                Ok(()) => return Ok(value),
                Err(TxnError::Aborted) => {
                    tracing::debug!(attempt, "batch aborted on a stale precondition, retrying");
                }
                Err(err) => return Err(E::from(err)),
            }
        }
        tracing::warn!(
            attempts = self.max_attempts,
            "giving up on contended transaction"
        );
        Err(E::from(TxnError::ExcessiveContention {
            attempts: self.max_attempts,
        }))
    }
}

impl std::fmt::Debug for TxnRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxnRunner")
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::op::{Assert, Update};
    use crate::TxnResult;
    use serde_json::json;

    fn runner_over(store: &Arc<MemoryStore>) -> TxnRunner {
        TxnRunner::new(Arc::clone(store) as Arc<dyn DocumentStore>)
    }

    #[test]
    fn commits_on_first_attempt() {
        let store = Arc::new(MemoryStore::new());
        let runner = runner_over(&store);

        let made: TxnResult<&str> = runner.run(|_attempt| {
            Ok((
                vec![Operation::insert("things", "t1", json!({"n": 1}))],
                "done",
            ))
        });
        assert_eq!(made.unwrap(), "done");
        assert_eq!(store.read("things", "t1").unwrap().unwrap()["n"], json!(1));
    }

    #[test]
    fn rebuilds_after_abort() {
        let store = Arc::new(MemoryStore::new());
        store
            .apply(&[Operation::insert("things", "t1", json!({"n": 1}))])
            .unwrap();
        let runner = runner_over(&store);

        // First attempt conditions on a stale value; the rebuild reads the
        // real one and succeeds.
        let mut attempts = Vec::new();
        let result: TxnResult<()> = runner.run(|attempt| {
            attempts.push(attempt);
            let doc = store.read("things", "t1")?.unwrap();
            let seen = if attempt == 0 {
                99 // pretend a stale read
            } else {
                doc["n"].as_i64().unwrap()
            };
            Ok((
                vec![Operation::update(
                    "things",
                    "t1",
                    Assert::field("n", seen),
                    Update::new().inc("n", 1),
                )],
                (),
            ))
        });
        result.unwrap();
        assert_eq!(attempts, vec![0, 1]);
        assert_eq!(store.read("things", "t1").unwrap().unwrap()["n"], json!(2));
    }

    #[test]
    fn exhausts_attempts_with_excessive_contention() {
        let store = Arc::new(MemoryStore::new());
        store
            .apply(&[Operation::insert("things", "t1", json!({"n": 1}))])
            .unwrap();
        let runner = TxnRunner::with_config(
            Arc::clone(&store) as Arc<dyn DocumentStore>,
            RunnerConfig { max_attempts: 4 },
        );

        // Every attempt conditions on a value the document never holds.
        let result: TxnResult<()> = runner.run(|_attempt| {
            Ok((
                vec![Operation::assert_only("things", "t1", Assert::field("n", 999))],
                (),
            ))
        });
        match result.unwrap_err() {
            TxnError::ExcessiveContention { attempts } => assert_eq!(attempts, 4),
            other => panic!("expected ExcessiveContention, got: {other}"),
        }
    }

    #[test]
    fn empty_ops_commit_nothing_and_succeed() {
        let store = Arc::new(MemoryStore::new());
        let runner = runner_over(&store);

        let value: TxnResult<i32> = runner.run(|_attempt| Ok((Vec::new(), 7)));
        assert_eq!(value.unwrap(), 7);
        assert_eq!(store.count("things"), 0);
    }

    #[test]
    fn build_errors_pass_through_unchanged() {
        #[derive(Debug, thiserror::Error)]
        enum AppError {
            #[error("domain rule broken")]
            Domain,
            #[error(transparent)]
            Txn(#[from] TxnError),
        }

        let store = Arc::new(MemoryStore::new());
        let runner = runner_over(&store);

        let mut calls = 0;
        let result: Result<(), AppError> = runner.run(|_attempt| {
            calls += 1;
            Err(AppError::Domain)
        });
        assert!(matches!(result.unwrap_err(), AppError::Domain));
        // Domain errors are not retried.
        assert_eq!(calls, 1);
    }

    #[test]
    fn infrastructure_errors_are_not_retried() {
        struct FailingStore;
        impl DocumentStore for FailingStore {
            fn read(&self, _collection: &str, _id: &str) -> TxnResult<Option<serde_json::Value>> {
                Err(TxnError::Backend("read failed".into()))
            }
            fn apply(&self, _ops: &[Operation]) -> TxnResult<()> {
                Err(TxnError::Backend("apply failed".into()))
            }
        }

        let runner = TxnRunner::new(Arc::new(FailingStore));
        let mut calls = 0;
        let result: TxnResult<()> = runner.run(|_attempt| {
            calls += 1;
            Ok((vec![Operation::insert("things", "t1", json!({}))], ()))
        });
        assert!(matches!(result.unwrap_err(), TxnError::Backend(_)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn max_attempts_clamps_to_one() {
        let store = Arc::new(MemoryStore::new());
        let runner = TxnRunner::with_config(
            Arc::clone(&store) as Arc<dyn DocumentStore>,
            RunnerConfig { max_attempts: 0 },
        );
        let result: TxnResult<i32> = runner.run(|_attempt| Ok((Vec::new(), 1)));
        assert_eq!(result.unwrap(), 1);
    }
}
