//! Layer records and identifiers
//!
//! A layer is an immutable filesystem delta addressed two ways: by an opaque
//! storage id (the random directory name its blob lives under) and by its
//! content digests (`diff_id` over the uncompressed archive, `blob_sum` over
//! the compressed bytes). The two identifier spaces are related but never
//! interchanged.

pub mod materialize;
pub mod metadata;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

pub use materialize::DiffMaterializer;
pub use metadata::LayerMetadata;

/// Sentinel parent id terminating every layer chain
pub const SCRATCH_LAYER_ID: &str = "scratch";

/// An immutable filesystem delta, created once during commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerRecord {
    /// Opaque storage id; names the on-disk directory, never derived from
    /// content
    pub id: String,
    /// Storage id of the layer this one is stacked on, or [`SCRATCH_LAYER_ID`]
    pub parent: String,
    /// Digest of the uncompressed archive content
    pub diff_id: String,
    /// Digest of the compressed archive bytes
    pub blob_sum: String,
    /// Sum of logical file sizes in the uncompressed archive
    pub size: i64,
    /// Path of the compressed blob
    pub blob_path: PathBuf,
    /// Serialized layer metadata, written as the sidecar file
    #[serde(default)]
    pub meta: String,
}

impl LayerRecord {
    /// True when the layer carries no file content
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// Generate a random 64-hex-character storage id.
///
/// Storage ids are deliberately not content digests: the blob directory must
/// be nameable before the digest pass has finished.
pub fn generate_layer_id() -> String {
    let mut hasher = Sha256::new();
    hasher.update(uuid::Uuid::new_v4().as_bytes());
    hasher.update(uuid::Uuid::new_v4().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_ids_are_unique_hex() {
        let a = generate_layer_id();
        let b = generate_layer_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
