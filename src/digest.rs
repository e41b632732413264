//! SHA256 digest utilities for layer processing
//!
//! This module centralizes digest computation for the commit pipeline. Layer
//! blob sums must be calculated from gzip-compressed tar streams while diff
//! ids are calculated from the uncompressed tar bytes; [`compress_and_digest`]
//! produces both in a single streaming pass.

use crate::error::{CommitError, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::io::{Read, Write};

/// Canonical digest of an empty tar archive (1024 zero bytes of trailer).
///
/// Semantically-empty layers always report this diff id so that two empty
/// layers compare equal regardless of gzip encoder metadata.
pub const EMPTY_TAR_DIGEST: &str =
    "sha256:5f70bf18a086007016e948b04aed3b82103a36bea41755b6cddfaf10ace3c6ef";

/// Digests produced by one pass of [`compress_and_digest`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestPair {
    /// Digest of the input bytes before compression
    pub diff_id: String,
    /// Digest of the compressed output bytes
    pub blob_sum: String,
    /// Number of uncompressed bytes consumed from the input
    pub bytes_read: u64,
}

/// `Write` adapter that feeds a SHA256 accumulator while forwarding to the
/// inner writer
pub struct HashingWriter<W: Write> {
    inner: W,
    hasher: Sha256,
    written: u64,
}

impl<W: Write> HashingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            written: 0,
        }
    }

    /// Consume the adapter, returning the inner writer, the digest in
    /// `sha256:<hex>` form and the number of bytes written
    pub fn finish(self) -> (W, String, u64) {
        let digest = format!("sha256:{}", hex::encode(self.hasher.finalize()));
        (self.inner, digest, self.written)
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Compress `input` into `dest` with gzip while computing the digest of the
/// uncompressed bytes (diff id) and of the compressed bytes (blob sum) in one
/// streaming pass.
///
/// No whole-payload buffering takes place; any read or write error aborts the
/// pass and partial output at `dest` must not be treated as valid.
pub fn compress_and_digest<R: Read, W: Write>(mut input: R, dest: W) -> Result<DigestPair> {
    let mut diff_hasher = Sha256::new();
    let mut encoder = GzEncoder::new(HashingWriter::new(dest), Compression::default());

    let mut chunk = [0u8; 32 * 1024];
    let mut bytes_read = 0u64;
    loop {
        let n = input
            .read(&mut chunk)
            .map_err(|e| CommitError::Io(format!("Failed to read diff stream: {}", e)))?;
        if n == 0 {
            break;
        }
        diff_hasher.update(&chunk[..n]);
        encoder
            .write_all(&chunk[..n])
            .map_err(|e| CommitError::Io(format!("Failed to write compressed diff: {}", e)))?;
        bytes_read += n as u64;
    }

    let sink = encoder
        .finish()
        .map_err(|e| CommitError::Io(format!("Failed to finalize gzip stream: {}", e)))?;
    let (mut dest, blob_sum, _) = sink.finish();
    dest.flush()?;

    Ok(DigestPair {
        diff_id: format!("sha256:{}", hex::encode(diff_hasher.finalize())),
        blob_sum,
        bytes_read,
    })
}

/// Compute the full `sha256:<hex>` digest of an in-memory byte slice
pub fn digest_of(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// Validate SHA256 hex string (64 characters, all hex)
pub fn is_valid_sha256_hex(digest: &str) -> bool {
    digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit())
}

/// Validate full digest format (`sha256:<64 hex>`)
pub fn is_valid_digest(digest: &str) -> bool {
    match digest.strip_prefix("sha256:") {
        Some(hex_part) => is_valid_sha256_hex(hex_part),
        None => false,
    }
}

/// Extract the hex part from a `sha256:<hex>` digest
pub fn hex_part(digest: &str) -> Result<&str> {
    match digest.strip_prefix("sha256:") {
        Some(hex_part) if is_valid_sha256_hex(hex_part) => Ok(hex_part),
        _ => Err(CommitError::Validation(format!(
            "Invalid digest format: {}",
            digest
        ))),
    }
}

/// Format digest for display (truncated for readability)
pub fn short_digest(digest: &str) -> String {
    match digest.get(..19) {
        Some(prefix) if digest.len() > 19 => format!("{}...", prefix),
        _ => digest.to_string(),
    }
}
