//! Artifact digest computation.
//!
//! The update protocol identifies launcher builds by MD5: the remote
//! manifest publishes the digest of the current build, and the download
//! response's `ETag` carries the same value. This module computes the
//! matching digest of local files so the bootstrap can decide whether
//! the installed artifact is current.
//!
//! MD5 is an identity check against accidental corruption here, not a
//! security boundary; the digest format is fixed by the publishing side.

use anyhow::{Context, Result};
use md5::{Digest, Md5};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::constants::DIGEST_CHUNK_SIZE;

/// Computes and compares artifact digests.
pub struct ChecksumVerifier;

impl ChecksumVerifier {
    /// Compute the MD5 digest of a file as 32 lowercase hex characters.
    ///
    /// The file is read in fixed-size chunks feeding a streaming hash,
    /// so artifacts of any size digest in constant memory.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or read. Callers checking
    /// freshness treat that as "assume stale, attempt update" rather
    /// than aborting: a file we cannot digest is a file worth replacing.
    pub async fn file_digest(path: &Path) -> Result<String> {
        debug!("Computing digest for: {:?}", path);

        let mut file = File::open(path)
            .await
            .with_context(|| format!("Failed to open file for digest: {}", path.display()))?;

        let mut hasher = Md5::new();
        let mut buffer = vec![0u8; DIGEST_CHUNK_SIZE];
        loop {
            let read = file
                .read(&mut buffer)
                .await
                .with_context(|| format!("Failed to read file for digest: {}", path.display()))?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(hex::encode(hasher.finalize()))
    }

    /// Compare two digests case-insensitively.
    ///
    /// Remote manifests are lowercase by convention but nothing enforces
    /// it, and `ETag` values arrive in whatever case the server chose.
    #[must_use]
    pub fn digests_match(a: &str, b: &str) -> bool {
        a.eq_ignore_ascii_case(b)
    }
}
