//! Layer, image and repository caches
//!
//! Each cache pairs an in-memory index with a durable whole-index JSON file.
//! A record visible in the index either survives a restart in the same state
//! or has not been saved yet; callers must treat a failed `save` as a failed
//! commit. Mutations are serialized per cache, reads may run concurrently,
//! and saves never interleave with one another.

pub mod image;
pub mod layer;
pub mod repository;

use crate::error::{CommitError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;

pub use image::ImageCache;
pub use layer::LayerCache;
pub use repository::RepositoryCache;

/// Write a whole cache index durably: temp file in the same directory, then
/// atomic rename over the destination.
pub(crate) fn write_index<T: Serialize>(path: &Path, index: &T) -> Result<()> {
    let parent = path.parent().ok_or_else(|| CommitError::Cache {
        message: "index path has no parent directory".into(),
        path: Some(path.to_path_buf()),
    })?;

    let json = serde_json::to_string_pretty(index).map_err(|e| CommitError::Cache {
        message: format!("Failed to serialize index: {}", e),
        path: Some(path.to_path_buf()),
    })?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| CommitError::Cache {
        message: format!("Failed to create index temp file: {}", e),
        path: Some(path.to_path_buf()),
    })?;
    tmp.write_all(json.as_bytes())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| CommitError::Cache {
            message: format!("Failed to write index: {}", e),
            path: Some(path.to_path_buf()),
        })?;
    tmp.persist(path).map_err(|e| CommitError::Cache {
        message: format!("Failed to persist index: {}", e.error),
        path: Some(path.to_path_buf()),
    })?;
    Ok(())
}

/// Load a cache index from disk, returning the default when no index file
/// exists yet
pub(crate) fn read_index<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let contents = fs::read_to_string(path).map_err(|e| CommitError::Cache {
        message: format!("Failed to read index: {}", e),
        path: Some(path.to_path_buf()),
    })?;
    serde_json::from_str(&contents).map_err(|e| CommitError::Cache {
        message: format!("Failed to parse index: {}", e),
        path: Some(path.to_path_buf()),
    })
}
