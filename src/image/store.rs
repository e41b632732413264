//! On-disk store layout
//!
//! ```text
//! <root>/
//!   tmp/                      scratch space for in-flight materializations
//!   layers/{layerID}/
//!     {layerID}.tar           compressed layer blob
//!     {layerID}.json          layer metadata sidecar
//!   blobs/sha256/{digest}     canonical content-addressed blob copies
//!   layers.json               layer cache index
//!   images.json               image cache index
//!   repositories.json         repository tag index
//! ```

use crate::digest::{hex_part, HashingWriter};
use crate::error::{CommitError, Result};
use crate::layer::LayerRecord;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

pub const TMP_DIR: &str = "tmp";
pub const LAYERS_DIR: &str = "layers";
pub const BLOBS_DIR: &str = "blobs";
pub const SHA256_PREFIX: &str = "sha256";

/// Filesystem layout of the image store
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    /// Open (creating if necessary) a store rooted at `root`
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = PathBuf::from(root.as_ref());
        fs::create_dir_all(root.join(TMP_DIR))?;
        fs::create_dir_all(root.join(LAYERS_DIR))?;
        fs::create_dir_all(root.join(BLOBS_DIR).join(SHA256_PREFIX))?;
        Ok(ImageStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scratch directory for in-flight temp files; same filesystem as the
    /// layer directories so renames stay atomic
    pub fn scratch_dir(&self) -> PathBuf {
        self.root.join(TMP_DIR)
    }

    /// Directory holding a layer's blob and metadata sidecar
    pub fn layer_dir(&self, layer_id: &str) -> PathBuf {
        self.root.join(LAYERS_DIR).join(layer_id)
    }

    /// Path of a layer's compressed blob file
    pub fn layer_blob_path(&self, layer_id: &str) -> PathBuf {
        self.layer_dir(layer_id).join(format!("{}.tar", layer_id))
    }

    /// Path of a layer's metadata sidecar
    pub fn layer_metadata_path(&self, layer_id: &str) -> PathBuf {
        self.layer_dir(layer_id).join(format!("{}.json", layer_id))
    }

    /// Canonical content-addressed path for a blob digest
    pub fn blob_path(&self, digest: &str) -> Result<PathBuf> {
        Ok(self
            .root
            .join(BLOBS_DIR)
            .join(SHA256_PREFIX)
            .join(hex_part(digest)?))
    }

    pub fn layer_cache_path(&self) -> PathBuf {
        self.root.join("layers.json")
    }

    pub fn image_cache_path(&self) -> PathBuf {
        self.root.join("images.json")
    }

    pub fn repository_cache_path(&self) -> PathBuf {
        self.root.join("repositories.json")
    }

    /// Copy a layer blob to its canonical content-addressed location for
    /// downstream distribution, verifying the digest during the copy.
    ///
    /// The copy is staged in a temp file next to the destination and renamed
    /// only after the digest check passes, so a failed copy never becomes
    /// visible at the canonical path. An existing canonical blob is therefore
    /// always complete and can be trusted as-is.
    pub fn write_image_blob(&self, layer: &LayerRecord) -> Result<PathBuf> {
        let dest = self.blob_path(&layer.blob_sum)?;
        if dest.exists() {
            return Ok(dest);
        }

        let mut src = File::open(&layer.blob_path).map_err(|e| {
            CommitError::Io(format!(
                "Failed to open layer blob {}: {}",
                layer.blob_path.display(),
                e
            ))
        })?;

        let blob_dir = dest.parent().ok_or_else(|| {
            CommitError::Internal(format!("blob path {} has no parent", dest.display()))
        })?;
        // drop of the NamedTempFile removes the staged copy on every failure
        // exit
        let tmp = tempfile::NamedTempFile::new_in(blob_dir)?;
        let mut writer = HashingWriter::new(tmp.reopen()?);
        io::copy(&mut src, &mut writer).map_err(|e| {
            CommitError::Io(format!("Failed to copy blob for layer {}: {}", layer.id, e))
        })?;
        let (file, actual, _) = writer.finish();
        file.sync_all()?;

        if actual != layer.blob_sum {
            return Err(CommitError::Validation(format!(
                "Blob digest mismatch for layer {}: expected {}, got {}",
                layer.id, layer.blob_sum, actual
            )));
        }
        tmp.persist(&dest)?;
        Ok(dest)
    }
}
