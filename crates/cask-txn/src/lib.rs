//! Conditioned document transactions for the Cask catalog.
//!
//! This crate models the one capability the catalog requires of its backing
//! store: read documents by id, and atomically apply a batch of per-document
//! operations whose preconditions are evaluated at commit time. If any
//! precondition fails the whole batch is discarded without side effects, and
//! [`TxnRunner`] turns that abort into a bounded read-rebuild-retry loop.
//!
//! # Key Types
//!
//! - [`Operation`] / [`Assert`] / [`Change`] / [`Update`] — one conditioned
//!   step against a single document
//! - [`DocumentStore`] — the read/apply seam storage backends implement
//! - [`MemoryStore`] — `HashMap`-backed reference backend
//! - [`TxnRunner`] — optimistic retry loop with a bounded attempt limit
//! - [`testkit::HookStore`] — deterministic race injection for tests
//!
//! # Design Rules
//!
//! 1. Preconditions are evaluated against committed state, never against
//!    other operations in the same batch.
//! 2. A batch applies entirely or not at all; partial state is never visible.
//! 3. A failed precondition is an abort, not an error: callers re-read and
//!    rebuild. Infrastructure failures are errors and are never retried.

pub mod error;
pub mod memory;
pub mod op;
pub mod runner;
pub mod testkit;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{TxnError, TxnResult};
pub use memory::MemoryStore;
pub use op::{Assert, Change, Operation, Update};
pub use runner::{RunnerConfig, TxnRunner, DEFAULT_MAX_ATTEMPTS};
pub use traits::DocumentStore;
