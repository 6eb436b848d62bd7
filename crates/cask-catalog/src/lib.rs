//! The Cask resource catalog.
//!
//! The catalog deduplicates binary resources by their content digest pair and
//! reference-counts the logical owners of each one. Putting content that is
//! already cataloged increments its count instead of storing anything new;
//! removing a reference decrements it, and whoever releases the last
//! reference learns it is now responsible for reclaiming the stored bytes.
//!
//! Records carry an `uploaded` flag so a record can exist before its bytes
//! do: `put` reserves the record, the caller uploads, and `upload_complete`
//! publishes it. Readers that arrive in between get a distinct
//! "still uploading" error rather than a missing-resource error.
//!
//! Every operation is a bounded optimistic retry over a
//! [`DocumentStore`](cask_txn::DocumentStore): read the record, build
//! operations conditioned on exactly what was read, and rebuild from fresh
//! state if a concurrent writer invalidated them.
//!
//! # Key Types
//!
//! - [`ResourceCatalog`] -- the catalog surface
//! - [`PutOutcome`] / [`RemoveOutcome`] -- what a mutation decided
//! - [`Resource`] -- a complete, uploaded resource
//! - [`CatalogError`] -- typed failures, including `UploadPending`

pub mod catalog;
pub mod error;
mod record;

pub use catalog::{PutOutcome, RemoveOutcome, Resource, ResourceCatalog};
pub use error::{CatalogError, CatalogResult};
