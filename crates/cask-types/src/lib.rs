//! Foundation types for the Cask blob catalog.
//!
//! This crate provides the identity types shared by every other Cask crate:
//! the content digest pair that deduplication keys on, and the opaque handle
//! callers hold for a catalog record.
//!
//! # Key Types
//!
//! - [`ResourceHash`] — MD5 + SHA-256 digest pair identifying blob content
//! - [`ResourceId`] — opaque handle for a catalog record

pub mod hash;
pub mod id;

pub use hash::ResourceHash;
pub use id::ResourceId;
