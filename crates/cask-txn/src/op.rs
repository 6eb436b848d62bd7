use serde_json::Value;

/// Precondition evaluated against a document's committed state.
#[derive(Clone, Debug, PartialEq)]
pub enum Assert {
    /// The document must not exist.
    Missing,
    /// The document must exist.
    Exists,
    /// The document must exist and each listed field must currently hold
    /// the given value.
    Fields(Vec<(String, Value)>),
}

impl Assert {
    /// Convenience for a single-field equality precondition.
    pub fn field(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Assert::Fields(vec![(name.into(), value.into())])
    }
}

/// Mutation applied once an operation's precondition holds.
#[derive(Clone, Debug, PartialEq)]
pub enum Change {
    /// Create the document with the given body (a JSON object).
    Insert(Value),
    /// Mutate fields of the existing document.
    Update(Update),
    /// Delete the document.
    Delete,
    /// No mutation; the operation participates only as a guard.
    AssertOnly,
}

/// Field mutations applied to an existing document.
///
/// Built with the chaining [`set`](Update::set) / [`inc`](Update::inc)
/// methods. `inc` targets must currently hold an integer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Update {
    sets: Vec<(String, Value)>,
    incs: Vec<(String, i64)>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `field` to `value`, adding the field if absent.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.sets.push((field.into(), value.into()));
        self
    }

    /// Add `delta` to the integer currently held by `field`.
    pub fn inc(mut self, field: impl Into<String>, delta: i64) -> Self {
        self.incs.push((field.into(), delta));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty() && self.incs.is_empty()
    }

    /// Fields set by this update, in application order.
    pub fn sets(&self) -> &[(String, Value)] {
        &self.sets
    }

    /// Fields incremented by this update, in application order.
    pub fn incs(&self) -> &[(String, i64)] {
        &self.incs
    }
}

/// One conditioned step against a single document.
///
/// An operation names a document, the precondition that must hold for the
/// containing batch to commit, and the change applied when it does.
#[derive(Clone, Debug, PartialEq)]
pub struct Operation {
    pub collection: String,
    pub id: String,
    pub assert: Assert,
    pub change: Change,
}

impl Operation {
    /// Create a document. Always conditioned on the document being missing.
    pub fn insert(collection: impl Into<String>, id: impl Into<String>, body: Value) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            assert: Assert::Missing,
            change: Change::Insert(body),
        }
    }

    /// Mutate an existing document, conditioned on `assert`.
    pub fn update(
        collection: impl Into<String>,
        id: impl Into<String>,
        assert: Assert,
        update: Update,
    ) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            assert,
            change: Change::Update(update),
        }
    }

    /// Delete an existing document, conditioned on `assert`.
    pub fn delete(collection: impl Into<String>, id: impl Into<String>, assert: Assert) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            assert,
            change: Change::Delete,
        }
    }

    /// Guard on a document's state without changing it.
    pub fn assert_only(
        collection: impl Into<String>,
        id: impl Into<String>,
        assert: Assert,
    ) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            assert,
            change: Change::AssertOnly,
        }
    }
}
