//! Raw blob storage for the Cask catalog.
//!
//! The catalog tracks metadata; crates in this workspace store the actual
//! bytes through the [`BlobStore`] trait. Writes declare their length up
//! front and either land completely or leave nothing behind, and every write
//! reports the MD5 checksum of what was stored so callers can verify the
//! bytes that arrived are the bytes they hashed.
//!
//! # Storage Backends
//!
//! - [`MemoryBlobStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsBlobStore`] -- one file per path under a root directory

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use error::{BlobError, BlobResult};
pub use fs::{FsBlobStore, FsConfig};
pub use memory::MemoryBlobStore;
pub use traits::BlobStore;
