use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::RwLock;

use md5::{Digest, Md5};

use crate::error::{BlobError, BlobResult};
use crate::traits::BlobStore;

/// In-memory, HashMap-based blob store.
///
/// Intended for tests and embedding. All blobs are held in memory behind a
/// `RwLock`; reads hand out an owned copy of the bytes.
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
        }
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.blobs.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored blobs.
    pub fn total_bytes(&self) -> u64 {
        self.blobs
            .read()
            .expect("lock poisoned")
            .values()
            .map(|data| data.len() as u64)
            .sum()
    }

    /// Whether a blob exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.blobs.read().expect("lock poisoned").contains_key(path)
    }

    /// Remove all blobs from the store.
    pub fn clear(&self) {
        self.blobs.write().expect("lock poisoned").clear();
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, path: &str, data: &mut dyn Read, length: u64) -> BlobResult<String> {
        let mut buf = Vec::new();
        data.take(length).read_to_end(&mut buf)?;
        if (buf.len() as u64) < length {
            // Nothing was inserted, so there is no partial content to clean.
            return Err(BlobError::ShortData {
                declared: length,
                actual: buf.len() as u64,
            });
        }
        let checksum = hex::encode(Md5::digest(&buf));
        self.blobs
            .write()
            .expect("lock poisoned")
            .insert(path.to_string(), buf);
        Ok(checksum)
    }

    fn get(&self, path: &str) -> BlobResult<Box<dyn Read + Send>> {
        let blobs = self.blobs.read().expect("lock poisoned");
        match blobs.get(path) {
            Some(data) => Ok(Box::new(Cursor::new(data.clone()))),
            None => Err(BlobError::NotFound(path.to_string())),
        }
    }

    fn remove(&self, path: &str) -> BlobResult<()> {
        let mut blobs = self.blobs.write().expect("lock poisoned");
        match blobs.remove(path) {
            Some(_) => Ok(()),
            None => Err(BlobError::NotFound(path.to_string())),
        }
    }

    fn exists(&self, path: &str) -> BlobResult<bool> {
        Ok(self.contains(path))
    }
}

impl std::fmt::Debug for MemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBlobStore")
            .field("blob_count", &self.len())
            .field("total_bytes", &self.total_bytes())
            .finish()
    }
}
