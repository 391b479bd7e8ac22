//! Content fingerprinting.
//!
//! A [`Fingerprint`] is the SHA-256 and MD5 of a file's exact bytes, both
//! lowercase hex. Both digests are fed from the same chunk so the input is
//! read once and never held in memory as a whole.
//!
//! # Example
//!
//! ```rust
//! use paperless_checksum::fingerprint::{EMPTY_SHA256, Fingerprint};
//!
//! let fp = Fingerprint::of_bytes(b"");
//! assert_eq!(fp.sha256, EMPTY_SHA256);
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{Read, Seek, SeekFrom};

/// Read buffer size for chunked hashing.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// SHA-256 of zero bytes.
pub const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// MD5 of zero bytes.
pub const EMPTY_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";

/// Content digests identifying a file's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Lowercase hex SHA-256.
    pub sha256: String,
    /// Lowercase hex MD5.
    pub md5: String,
}

impl Fingerprint {
    /// Fingerprints an in-memory buffer.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = FingerprintHasher::new();
        hasher.update(bytes);
        hasher.finish()
    }

    /// Fingerprints a reader from its current position to end-of-stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if a read fails. Interrupted reads are retried.
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let mut hasher = FingerprintHasher::new();
        let mut buf = [0u8; CHUNK_SIZE];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => hasher.update(&buf[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {},
                Err(e) => return Err(Error::io("read_upload", e)),
            }
        }
        Ok(hasher.finish())
    }

    /// Fingerprints a seekable source from its start and rewinds it afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if seeking or reading fails.
    pub fn from_seekable<R: Read + Seek>(source: &mut R) -> Result<Self> {
        source
            .seek(SeekFrom::Start(0))
            .map_err(|e| Error::io("rewind_upload", e))?;
        let fingerprint = Self::from_reader(source)?;
        source
            .seek(SeekFrom::Start(0))
            .map_err(|e| Error::io("rewind_upload", e))?;
        Ok(fingerprint)
    }

    /// Returns `true` if `sha256_hex` is exactly this fingerprint's SHA-256.
    #[must_use]
    pub fn matches_sha256(&self, sha256_hex: &str) -> bool {
        self.sha256 == sha256_hex
    }
}

/// Incremental SHA-256 + MD5 hasher.
///
/// Used where the input arrives as asynchronous chunks (multipart bodies).
pub struct FingerprintHasher {
    sha256: Sha256,
    md5: md5::Context,
    bytes: u64,
}

impl FingerprintHasher {
    /// Creates an empty hasher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sha256: Sha256::new(),
            md5: md5::Context::new(),
            bytes: 0,
        }
    }

    /// Feeds a chunk into both digests.
    pub fn update(&mut self, chunk: &[u8]) {
        self.sha256.update(chunk);
        self.md5.consume(chunk);
        self.bytes += chunk.len() as u64;
    }

    /// Number of bytes hashed so far.
    #[must_use]
    pub const fn bytes_hashed(&self) -> u64 {
        self.bytes
    }

    /// Finalizes both digests.
    #[must_use]
    pub fn finish(self) -> Fingerprint {
        Fingerprint {
            sha256: hex::encode(self.sha256.finalize()),
            md5: format!("{:x}", self.md5.compute()),
        }
    }
}

impl Default for FingerprintHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Incremental SHA-256 used when verifying remote content.
pub struct Sha256Hasher(Sha256);

impl Sha256Hasher {
    /// Creates an empty hasher.
    #[must_use]
    pub fn new() -> Self {
        Self(Sha256::new())
    }

    /// Feeds a chunk.
    pub fn update(&mut self, chunk: &[u8]) {
        self.0.update(chunk);
    }

    /// Returns the lowercase hex digest.
    #[must_use]
    pub fn finish_hex(self) -> String {
        hex::encode(self.0.finalize())
    }
}

impl Default for Sha256Hasher {
    fn default() -> Self {
        Self::new()
    }
}
