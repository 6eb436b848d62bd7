use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::error::{BlobError, BlobResult};
use crate::traits::BlobStore;

const COPY_BUF_SIZE: usize = 8 * 1024;

/// Settings for the filesystem backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FsConfig {
    /// Directory blobs are stored under, one file per path.
    pub root: PathBuf,
}

/// Filesystem-backed blob store.
///
/// Each path maps to one file under the root directory. Writes stream
/// through a fixed buffer, hashing as they go; a failed write removes
/// whatever partial file it produced.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open a store rooted at `config.root`, creating the directory if
    /// needed.
    pub fn open(config: FsConfig) -> BlobResult<Self> {
        std::fs::create_dir_all(&config.root)?;
        Ok(Self { root: config.root })
    }

    fn blob_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

/// Copy exactly `length` bytes into `file`, returning the MD5 of the copy.
fn copy_exact(file: &mut File, data: &mut dyn Read, length: u64) -> BlobResult<String> {
    let mut hasher = Md5::new();
    let mut limited = data.take(length);
    let mut buf = [0u8; COPY_BUF_SIZE];
    let mut written = 0u64;
    loop {
        let n = limited.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        file.write_all(&buf[..n])?;
        written += n as u64;
    }
    if written < length {
        return Err(BlobError::ShortData {
            declared: length,
            actual: written,
        });
    }
    file.flush()?;
    Ok(hex::encode(hasher.finalize()))
}

impl BlobStore for FsBlobStore {
    fn put(&self, path: &str, data: &mut dyn Read, length: u64) -> BlobResult<String> {
        let target = self.blob_path(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(&target)?;
        match copy_exact(&mut file, data, length) {
            Ok(checksum) => Ok(checksum),
            Err(err) => {
                drop(file);
                if let Err(remove_err) = std::fs::remove_file(&target) {
                    tracing::warn!("error cleaning up after failed write: {}", remove_err);
                }
                Err(err)
            }
        }
    }

    fn get(&self, path: &str) -> BlobResult<Box<dyn Read + Send>> {
        match File::open(self.blob_path(path)) {
            Ok(file) => Ok(Box::new(file)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(path.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn remove(&self, path: &str) -> BlobResult<()> {
        match std::fs::remove_file(self.blob_path(path)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(path.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn exists(&self, path: &str) -> BlobResult<bool> {
        Ok(self.blob_path(path).try_exists()?)
    }
}

impl std::fmt::Debug for FsBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsBlobStore").field("root", &self.root).finish()
    }
}
