use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use serde_json::Value;

use crate::error::{TxnError, TxnResult};
use crate::op::{Assert, Change, Operation};
use crate::traits::DocumentStore;

/// In-memory, HashMap-based document store.
///
/// Intended for tests and embedding. Collections are created on first write
/// and held behind a single `RwLock`, which serializes `apply` batches and
/// makes each one atomic with respect to readers.
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

enum Staged {
    Put(String, String, Value),
    Remove(String, String),
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Number of documents in a collection. Zero if it was never written.
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .expect("lock poisoned")
            .get(collection)
            .map_or(0, |docs| docs.len())
    }

    /// Sorted ids of all documents in a collection.
    pub fn ids(&self, collection: &str) -> Vec<String> {
        self.collections
            .read()
            .expect("lock poisoned")
            .get(collection)
            .map_or_else(Vec::new, |docs| docs.keys().cloned().collect())
    }

    /// Remove all documents from all collections.
    pub fn clear(&self) {
        self.collections.write().expect("lock poisoned").clear();
    }

    fn check(
        op: &Operation,
        doc: Option<&Value>,
    ) -> TxnResult<()> {
        match (&op.assert, doc) {
            (Assert::Missing, None) => {}
            (Assert::Exists, Some(_)) => {}
            (Assert::Fields(fields), Some(doc)) => {
                for (field, expected) in fields {
                    if doc.get(field) != Some(expected) {
                        return Err(TxnError::Aborted);
                    }
                }
            }
            _ => return Err(TxnError::Aborted),
        }
        Ok(())
    }

    fn invalid(op: &Operation, reason: impl Into<String>) -> TxnError {
        TxnError::InvalidOperation {
            collection: op.collection.clone(),
            id: op.id.clone(),
            reason: reason.into(),
        }
    }

    /// Compute the post-state of one operation, precondition already checked.
    fn stage(op: &Operation, doc: Option<&Value>) -> TxnResult<Option<Staged>> {
        match &op.change {
            Change::Insert(body) => {
                if !body.is_object() {
                    return Err(Self::invalid(op, "insert body must be a JSON object"));
                }
                Ok(Some(Staged::Put(
                    op.collection.clone(),
                    op.id.clone(),
                    body.clone(),
                )))
            }
            Change::Update(update) => {
                // The assert guaranteed existence unless it was `Missing`,
                // which cannot precede a mutation.
                let doc = doc.ok_or_else(|| {
                    Self::invalid(op, "cannot update a document asserted missing")
                })?;
                let mut updated = doc.clone();
                let obj = updated
                    .as_object_mut()
                    .ok_or_else(|| Self::invalid(op, "document is not a JSON object"))?;
                for (field, value) in update.sets() {
                    obj.insert(field.clone(), value.clone());
                }
                for (field, delta) in update.incs() {
                    let current = obj.get(field).and_then(Value::as_i64).ok_or_else(|| {
                        Self::invalid(op, format!("cannot increment non-integer field `{field}`"))
                    })?;
                    let next = current.checked_add(*delta).ok_or_else(|| {
                        Self::invalid(op, format!("integer overflow incrementing `{field}`"))
                    })?;
                    obj.insert(field.clone(), Value::from(next));
                }
                Ok(Some(Staged::Put(
                    op.collection.clone(),
                    op.id.clone(),
                    updated,
                )))
            }
            Change::Delete => {
                if doc.is_none() {
                    return Err(Self::invalid(op, "cannot delete a document asserted missing"));
                }
                Ok(Some(Staged::Remove(op.collection.clone(), op.id.clone())))
            }
            Change::AssertOnly => Ok(None),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryStore {
    fn read(&self, collection: &str, id: &str) -> TxnResult<Option<Value>> {
        let collections = self.collections.read().expect("lock poisoned");
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    fn apply(&self, ops: &[Operation]) -> TxnResult<()> {
        let mut collections = self.collections.write().expect("lock poisoned");

        // Two operations on the same document would make the second's
        // precondition unverifiable against committed state.
        let mut seen = HashSet::new();
        for op in ops {
            if !seen.insert((op.collection.as_str(), op.id.as_str())) {
                return Err(Self::invalid(op, "duplicate document in one batch"));
            }
        }

        // Phase 1: evaluate every precondition, then compute post-states.
        // No mutation happens until the whole batch has passed.
        let mut staged = Vec::with_capacity(ops.len());
        for op in ops {
            let doc = collections.get(&op.collection).and_then(|docs| docs.get(&op.id));
            Self::check(op, doc)?;
            if let Some(change) = Self::stage(op, doc)? {
                staged.push(change);
            }
        }

        // Phase 2: commit. Infallible by construction.
        for change in staged {
            match change {
                Staged::Put(collection, id, doc) => {
                    collections.entry(collection).or_default().insert(id, doc);
                }
                Staged::Remove(collection, id) => {
                    if let Some(docs) = collections.get_mut(&collection) {
                        docs.remove(&id);
                    }
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let collections = self.collections.read().expect("lock poisoned");
        let doc_count: usize = collections.values().map(|docs| docs.len()).sum();
        f.debug_struct("MemoryStore")
            .field("collections", &collections.len())
            .field("documents", &doc_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::Update;
    use serde_json::json;

    fn store_with_doc(collection: &str, id: &str, body: Value) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .apply(&[Operation::insert(collection, id, body)])
            .unwrap();
        store
    }

    // -----------------------------------------------------------------------
    // Inserts
    // -----------------------------------------------------------------------

    #[test]
    fn insert_and_read_back() {
        let store = MemoryStore::new();
        store
            .apply(&[Operation::insert("things", "t1", json!({"n": 1}))])
            .unwrap();
        let doc = store.read("things", "t1").unwrap().unwrap();
        assert_eq!(doc, json!({"n": 1}));
    }

    #[test]
    fn insert_over_existing_aborts() {
        let store = store_with_doc("things", "t1", json!({"n": 1}));
        let err = store
            .apply(&[Operation::insert("things", "t1", json!({"n": 2}))])
            .unwrap_err();
        assert!(matches!(err, TxnError::Aborted));
        // Original untouched.
        assert_eq!(store.read("things", "t1").unwrap().unwrap(), json!({"n": 1}));
    }

    #[test]
    fn insert_non_object_is_invalid() {
        let store = MemoryStore::new();
        let err = store
            .apply(&[Operation::insert("things", "t1", json!(42))])
            .unwrap_err();
        assert!(matches!(err, TxnError::InvalidOperation { .. }));
        assert!(store.read("things", "t1").unwrap().is_none());
    }

    // -----------------------------------------------------------------------
    // Asserts
    // -----------------------------------------------------------------------

    #[test]
    fn exists_assert_fails_on_missing_doc() {
        let store = MemoryStore::new();
        let err = store
            .apply(&[Operation::update(
                "things",
                "ghost",
                Assert::Exists,
                Update::new().set("n", 1),
            )])
            .unwrap_err();
        assert!(matches!(err, TxnError::Aborted));
    }

    #[test]
    fn fields_assert_matches_current_value() {
        let store = store_with_doc("things", "t1", json!({"n": 3, "s": "x"}));
        store
            .apply(&[Operation::update(
                "things",
                "t1",
                Assert::Fields(vec![
                    ("n".to_string(), json!(3)),
                    ("s".to_string(), json!("x")),
                ]),
                Update::new().inc("n", 1),
            )])
            .unwrap();
        assert_eq!(store.read("things", "t1").unwrap().unwrap()["n"], json!(4));
    }

    #[test]
    fn fields_assert_rejects_stale_value() {
        let store = store_with_doc("things", "t1", json!({"n": 3}));
        let err = store
            .apply(&[Operation::update(
                "things",
                "t1",
                Assert::field("n", 2),
                Update::new().inc("n", 1),
            )])
            .unwrap_err();
        assert!(matches!(err, TxnError::Aborted));
        assert_eq!(store.read("things", "t1").unwrap().unwrap()["n"], json!(3));
    }

    #[test]
    fn fields_assert_on_missing_doc_aborts() {
        let store = MemoryStore::new();
        let err = store
            .apply(&[Operation::assert_only("things", "ghost", Assert::field("n", 1))])
            .unwrap_err();
        assert!(matches!(err, TxnError::Aborted));
    }

    #[test]
    fn assert_only_guards_without_mutating() {
        let store = store_with_doc("things", "t1", json!({"n": 1}));
        store
            .apply(&[
                Operation::assert_only("things", "t1", Assert::field("n", 1)),
                Operation::insert("things", "t2", json!({"n": 2})),
            ])
            .unwrap();
        assert_eq!(store.read("things", "t1").unwrap().unwrap(), json!({"n": 1}));
        assert!(store.read("things", "t2").unwrap().is_some());
    }

    // -----------------------------------------------------------------------
    // Updates
    // -----------------------------------------------------------------------

    #[test]
    fn set_adds_and_replaces_fields() {
        let store = store_with_doc("things", "t1", json!({"n": 1}));
        store
            .apply(&[Operation::update(
                "things",
                "t1",
                Assert::Exists,
                Update::new().set("n", 5).set("fresh", true),
            )])
            .unwrap();
        let doc = store.read("things", "t1").unwrap().unwrap();
        assert_eq!(doc, json!({"n": 5, "fresh": true}));
    }

    #[test]
    fn inc_requires_integer_field() {
        let store = store_with_doc("things", "t1", json!({"s": "text"}));
        let err = store
            .apply(&[Operation::update(
                "things",
                "t1",
                Assert::Exists,
                Update::new().inc("s", 1),
            )])
            .unwrap_err();
        assert!(matches!(err, TxnError::InvalidOperation { .. }));
    }

    #[test]
    fn inc_on_absent_field_is_invalid() {
        let store = store_with_doc("things", "t1", json!({"n": 1}));
        let err = store
            .apply(&[Operation::update(
                "things",
                "t1",
                Assert::Exists,
                Update::new().inc("missing", 1),
            )])
            .unwrap_err();
        assert!(matches!(err, TxnError::InvalidOperation { .. }));
    }

    #[test]
    fn inc_can_decrement() {
        let store = store_with_doc("things", "t1", json!({"n": 2}));
        store
            .apply(&[Operation::update(
                "things",
                "t1",
                Assert::Exists,
                Update::new().inc("n", -1),
            )])
            .unwrap();
        assert_eq!(store.read("things", "t1").unwrap().unwrap()["n"], json!(1));
    }

    // -----------------------------------------------------------------------
    // Deletes
    // -----------------------------------------------------------------------

    #[test]
    fn delete_conditioned_on_fields() {
        let store = store_with_doc("things", "t1", json!({"n": 1}));
        store
            .apply(&[Operation::delete("things", "t1", Assert::field("n", 1))])
            .unwrap();
        assert!(store.read("things", "t1").unwrap().is_none());
    }

    #[test]
    fn delete_with_stale_assert_aborts() {
        let store = store_with_doc("things", "t1", json!({"n": 2}));
        let err = store
            .apply(&[Operation::delete("things", "t1", Assert::field("n", 1))])
            .unwrap_err();
        assert!(matches!(err, TxnError::Aborted));
        assert!(store.read("things", "t1").unwrap().is_some());
    }

    // -----------------------------------------------------------------------
    // Batch atomicity
    // -----------------------------------------------------------------------

    #[test]
    fn failing_batch_applies_nothing() {
        let store = store_with_doc("things", "t1", json!({"n": 1}));
        let err = store
            .apply(&[
                Operation::update("things", "t1", Assert::Exists, Update::new().inc("n", 1)),
                Operation::insert("things", "t1b", json!({"n": 10})),
                // Fails: no such document.
                Operation::update("things", "t2", Assert::Exists, Update::new().inc("n", 1)),
            ])
            .unwrap_err();
        assert!(matches!(err, TxnError::Aborted));
        assert_eq!(store.read("things", "t1").unwrap().unwrap()["n"], json!(1));
        assert!(store.read("things", "t1b").unwrap().is_none());
    }

    #[test]
    fn batch_spanning_collections_commits_together() {
        let store = MemoryStore::new();
        store
            .apply(&[
                Operation::insert("left", "a", json!({"n": 1})),
                Operation::insert("right", "b", json!({"n": 2})),
            ])
            .unwrap();
        assert_eq!(store.count("left"), 1);
        assert_eq!(store.count("right"), 1);
    }

    #[test]
    fn duplicate_document_in_batch_is_invalid() {
        let store = store_with_doc("things", "t1", json!({"n": 1}));
        let err = store
            .apply(&[
                Operation::update("things", "t1", Assert::Exists, Update::new().inc("n", 1)),
                Operation::update("things", "t1", Assert::Exists, Update::new().inc("n", 1)),
            ])
            .unwrap_err();
        assert!(matches!(err, TxnError::InvalidOperation { .. }));
        assert_eq!(store.read("things", "t1").unwrap().unwrap()["n"], json!(1));
    }

    // -----------------------------------------------------------------------
    // Reads and helpers
    // -----------------------------------------------------------------------

    #[test]
    fn read_missing_returns_none() {
        let store = MemoryStore::new();
        assert!(store.read("things", "nope").unwrap().is_none());
    }

    #[test]
    fn count_ids_and_clear() {
        let store = MemoryStore::new();
        assert_eq!(store.count("things"), 0);
        store
            .apply(&[
                Operation::insert("things", "b", json!({})),
                Operation::insert("things", "a", json!({})),
            ])
            .unwrap();
        assert_eq!(store.count("things"), 2);
        assert_eq!(store.ids("things"), vec!["a".to_string(), "b".to_string()]);

        store.clear();
        assert_eq!(store.count("things"), 0);
    }

    #[test]
    fn concurrent_applies_serialize() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(MemoryStore::new());
        store
            .apply(&[Operation::insert("things", "t1", json!({"n": 0}))])
            .unwrap();

        // Unconditioned increments from many threads must all land.
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store
                        .apply(&[Operation::update(
                            "things",
                            "t1",
                            Assert::Exists,
                            Update::new().inc("n", 1),
                        )])
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread should not panic");
        }
        assert_eq!(store.read("things", "t1").unwrap().unwrap()["n"], json!(8));
    }
}
