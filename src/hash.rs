// src/hash.rs

//! Content hashing for entry fingerprints and output checksums
//!
//! - **XXH128** fingerprints entry content when deciding whether two
//!   contributions to the same path are identical. Fast, non-cryptographic.
//! - **SHA-256** checksums the finished archive for the assembly report.

use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use xxhash_rust::xxh3::xxh3_128;

/// Content fingerprint of an archive entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(u128);

impl Fingerprint {
    #[inline]
    pub fn of(data: &[u8]) -> Self {
        Self(xxh3_128(data))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Compute the SHA-256 of everything a reader yields
pub fn sha256_reader<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// SHA-256 of a file on disk, streamed
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    sha256_reader(&mut reader)
}
