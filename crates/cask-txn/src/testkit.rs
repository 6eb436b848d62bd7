//! Deterministic race injection for transaction tests.
//!
//! [`HookStore`] wraps any [`DocumentStore`] and consumes one queued hook per
//! top-level `apply`, running its `before` closure between the caller's reads
//! and the commit they condition on. That is exactly the window an optimistic
//! writer loses, so tests can force a competing caller into it and assert the
//! retry behaves.
//!
//! Applies issued from inside a hook (the competing caller's own commits) see
//! an empty queue: the remaining hooks are out of the store for the duration
//! of the top-level apply and are restored afterwards.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::error::TxnResult;
use crate::op::Operation;
use crate::traits::DocumentStore;

type HookFn = Box<dyn FnMut() + Send>;

/// A before/after closure pair consumed by one top-level `apply`.
pub struct Hook {
    before: Option<HookFn>,
    after: Option<HookFn>,
}

impl Hook {
    /// Hook that runs `f` just before the commit it is queued for.
    pub fn before(f: impl FnMut() + Send + 'static) -> Self {
        Self {
            before: Some(Box::new(f)),
            after: None,
        }
    }

    /// Hook that runs `f` just after the commit it is queued for.
    pub fn after(f: impl FnMut() + Send + 'static) -> Self {
        Self {
            before: None,
            after: Some(Box::new(f)),
        }
    }

    /// Hook that does nothing; consumes one apply slot.
    pub fn none() -> Self {
        Self {
            before: None,
            after: None,
        }
    }
}

/// A [`DocumentStore`] wrapper that interleaves queued hooks with commits.
pub struct HookStore {
    inner: Arc<dyn DocumentStore>,
    hooks: Mutex<VecDeque<Hook>>,
}

impl HookStore {
    pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner,
            hooks: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue hooks; each top-level `apply` consumes one, in order.
    pub fn queue(&self, hooks: Vec<Hook>) {
        self.hooks.lock().expect("lock poisoned").extend(hooks);
    }

    /// Queue one `before` hook.
    pub fn queue_before(&self, f: impl FnMut() + Send + 'static) {
        self.queue(vec![Hook::before(f)]);
    }

    /// Hooks queued but not yet consumed.
    ///
    /// Tests assert this is zero at the end so a race that never fired does
    /// not pass silently.
    pub fn remaining(&self) -> usize {
        self.hooks.lock().expect("lock poisoned").len()
    }
}

impl DocumentStore for HookStore {
    fn read(&self, collection: &str, id: &str) -> TxnResult<Option<Value>> {
        self.inner.read(collection, id)
    }

    fn apply(&self, ops: &[Operation]) -> TxnResult<()> {
        // Take the whole queue so applies issued from inside the hook do not
        // consume further hooks.
        let mut taken = std::mem::take(&mut *self.hooks.lock().expect("lock poisoned"));
        let hook = taken.pop_front();

        let mut hook = match hook {
            Some(hook) => hook,
            None => return self.inner.apply(ops),
        };
        if let Some(before) = hook.before.as_mut() {
            before();
        }
        let result = self.inner.apply(ops);
        if let Some(after) = hook.after.as_mut() {
            after();
        }

        // Restore the remainder ahead of anything queued while we ran.
        let mut queue = self.hooks.lock().expect("lock poisoned");
        while let Some(hook) = taken.pop_back() {
            queue.push_front(hook);
        }
        result
    }
}

impl std::fmt::Debug for HookStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookStore")
            .field("remaining_hooks", &self.remaining())
            .finish()
    }
}
