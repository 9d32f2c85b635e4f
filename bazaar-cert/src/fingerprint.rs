use crate::error::{CertError, Result};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// SHA-256 of a file's raw bytes.
///
/// Used to decide cheaply whether a file on disk changed since it was last
/// parsed. Two fingerprints are equal iff the byte contents were equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&hasher.finalize());
        Self(digest)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 16 hex characters, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

/// A file's contents together with their fingerprint.
///
/// The bytes are read once; the same buffer is fingerprinted and later parsed,
/// so the fingerprint always describes exactly what was parsed.
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    pub bytes: Vec<u8>,
    pub fingerprint: Fingerprint,
}

impl FileSnapshot {
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| CertError::read(path, e))?;
        let fingerprint = Fingerprint::of(&bytes);
        Ok(Self { bytes, fingerprint })
    }
}
