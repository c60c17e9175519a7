//! Integrity verification for downloaded files

use sha1::Sha1;
use sha2::{Digest, Sha512};

use crate::core::{PackwrightError, PackwrightResult};
use crate::platform::FileHashes;

/// Incremental verifier fed chunk by chunk while a file streams to disk.
/// SHA-512 is preferred when the platform publishes both digests.
pub enum IntegrityChecker {
    Sha512 { hasher: Sha512, expected: String },
    Sha1 { hasher: Sha1, expected: String },
    Unchecked,
}

impl IntegrityChecker {
    pub fn new(hashes: &FileHashes) -> Self {
        if let Some(ref expected) = hashes.sha512 {
            IntegrityChecker::Sha512 {
                hasher: Sha512::new(),
                expected: expected.to_ascii_lowercase(),
            }
        } else if let Some(ref expected) = hashes.sha1 {
            IntegrityChecker::Sha1 {
                hasher: Sha1::new(),
                expected: expected.to_ascii_lowercase(),
            }
        } else {
            IntegrityChecker::Unchecked
        }
    }

    pub fn update(&mut self, chunk: &[u8]) {
        match self {
            IntegrityChecker::Sha512 { hasher, .. } => hasher.update(chunk),
            IntegrityChecker::Sha1 { hasher, .. } => hasher.update(chunk),
            IntegrityChecker::Unchecked => {}
        }
    }

    /// Compare the digest of everything fed so far
    pub fn verify(self, file: &str) -> PackwrightResult<()> {
        let (actual, expected) = match self {
            IntegrityChecker::Sha512 { hasher, expected } => (hex::encode(hasher.finalize()), expected),
            IntegrityChecker::Sha1 { hasher, expected } => (hex::encode(hasher.finalize()), expected),
            IntegrityChecker::Unchecked => return Ok(()),
        };

        if actual != expected {
            return Err(PackwrightError::IntegrityCheckFailed {
                file: file.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }
}
