//! Named blob storage over the Cask catalog.
//!
//! This is the surface applications embed: blobs are written and read by
//! `(bucket, name)` pairs, while deduplication, reference counting, and the
//! upload lifecycle happen underneath in [`cask_catalog`] and the bytes land
//! in a pluggable [`BlobStore`] backend.
//!
//! # Key Types
//!
//! - [`ManagedStore`] -- named blob storage: `put`, `get`, `remove`
//! - [`ManagedError`] -- typed failures, wrapping catalog and backend errors
//!
//! # Design Rules
//!
//! - Bytes are written and verified before a record is published, so a
//!   readable name never serves a partial blob.
//! - Every reference taken on a failure path is released before the error
//!   surfaces; an aborted put leaves no record, mapping, or bytes behind.

pub mod error;
mod mapping;
pub mod store;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{ManagedError, ManagedResult};
pub use store::ManagedStore;

// Re-export key types
pub use cask_blobs::{BlobStore, FsBlobStore, FsConfig, MemoryBlobStore};
pub use cask_catalog::ResourceCatalog;
pub use cask_txn::{DocumentStore, MemoryStore};
pub use cask_types::{ResourceHash, ResourceId};
