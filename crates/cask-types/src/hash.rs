use std::fmt;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Content digest pair identifying a blob's bytes.
///
/// A `ResourceHash` carries the lowercase-hex MD5 and SHA-256 digests of the
/// same content. Two hashes are equal only when both digests match, and that
/// equality is what the catalog deduplicates on.
///
/// The catalog itself never recomputes digests; it trusts whatever strings
/// the ingest path supplies. Ingest paths that hash content themselves use
/// [`ResourceHash::of`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceHash {
    md5: String,
    sha256: String,
}

impl ResourceHash {
    /// Build a hash from pre-computed digest strings.
    pub fn new(md5: impl Into<String>, sha256: impl Into<String>) -> Self {
        Self {
            md5: md5.into(),
            sha256: sha256.into(),
        }
    }

    /// Compute both digests of `data`.
    pub fn of(data: &[u8]) -> Self {
        Self {
            md5: hex::encode(Md5::digest(data)),
            sha256: hex::encode(Sha256::digest(data)),
        }
    }

    /// The MD5 digest, lowercase hex.
    pub fn md5(&self) -> &str {
        &self.md5
    }

    /// The SHA-256 digest, lowercase hex.
    pub fn sha256(&self) -> &str {
        &self.sha256
    }
}

impl fmt::Display for ResourceHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "md5={}, sha256={}", self.md5, self.sha256)
    }
}
