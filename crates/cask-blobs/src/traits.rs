use std::io::Read;

use crate::error::BlobResult;

/// Write-once blob storage keyed by path.
///
/// All implementations must satisfy these invariants:
/// - `put` writes exactly `length` bytes; on any failure the path retains no
///   partial content. Bytes beyond `length` are left unread on the stream.
/// - The checksum returned by `put` is the lowercase-hex MD5 of the bytes
///   actually stored, computed by the backend, so callers can cross-check it
///   against the digest of the bytes they intended to store.
/// - Paths are opaque names; backends never interpret blob contents.
pub trait BlobStore: Send + Sync {
    /// Store exactly `length` bytes read from `data` at `path`, returning
    /// the MD5 checksum of what was written.
    fn put(&self, path: &str, data: &mut dyn Read, length: u64) -> BlobResult<String>;

    /// Open the content at `path` for reading.
    fn get(&self, path: &str) -> BlobResult<Box<dyn Read + Send>>;

    /// Delete the content at `path`.
    fn remove(&self, path: &str) -> BlobResult<()>;

    /// Whether content exists at `path`.
    fn exists(&self, path: &str) -> BlobResult<bool>;
}
