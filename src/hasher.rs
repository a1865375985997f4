//! Streaming content hashing
//!
//! The reconciler only relinks an existing target after proving it is
//! byte-identical to its source. [`ContentHasher`] provides that proof with a
//! SHA-256 digest computed over fixed-size chunks, so arbitrarily large media
//! files never need to fit in memory.

use crate::error::{RelinkError, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use tracing::trace;

/// Chunked SHA-256 file hasher
#[derive(Debug, Clone)]
pub struct ContentHasher {
    chunk_size: usize,
}

impl ContentHasher {
    /// Create a hasher that reads `chunk_size` bytes at a time
    ///
    /// # Errors
    ///
    /// - [`crate::RelinkError::InvalidConfiguration`] if `chunk_size` is zero
    pub fn new(chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RelinkError::invalid_config("hash chunk size must be greater than zero"));
        }
        Ok(Self { chunk_size })
    }

    /// Hash a file's content
    ///
    /// Returns the digest as a 64-character hexadecimal string.
    ///
    /// # Errors
    ///
    /// - [`crate::RelinkError::Io`] if the file cannot be opened or a read fails
    ///   mid-stream. Callers decide whether that is fatal.
    pub fn hash_file(&self, path: &Path) -> Result<String> {
        let mut file = File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; self.chunk_size];

        loop {
            let bytes_read = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            hasher.update(&buffer[..bytes_read]);
        }

        let digest = hex::encode(hasher.finalize());
        trace!("Hashed {:?}: {}", path, digest);
        Ok(digest)
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self {
            chunk_size: crate::types::DEFAULT_HASH_CHUNK_SIZE,
        }
    }
}
