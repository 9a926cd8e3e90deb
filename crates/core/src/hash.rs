//! Content fingerprints using BLAKE3

use std::fmt;
use std::io::Read;
use std::path::Path;

use crate::error::{MirrorError, Result};

/// Size of each read when streaming a file through the hasher
pub const CHUNK_SIZE: usize = 8192;

/// A 256-bit digest of a file's full contents.
///
/// Only used as an equality oracle between a source file and its mirror.
/// Never persisted, so the digest algorithm can change freely.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Hash arbitrary bytes
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Hash a file by path, streaming it in [`CHUNK_SIZE`] reads
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or read
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut file = std::fs::File::open(path).map_err(|e| MirrorError::io("open", path, e))?;
        let mut hasher = blake3::Hasher::new();
        let mut buffer = [0u8; CHUNK_SIZE];

        loop {
            let bytes_read = file
                .read(&mut buffer)
                .map_err(|e| MirrorError::io("read", path, e))?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(Self(*hasher.finalize().as_bytes()))
    }

    /// Convert to hex string
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Fingerprint({})", hex.get(..16).unwrap_or(&hex))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
