//! Materialization of a filesystem-diff stream into an addressed layer blob
//!
//! The materializer owns the temporary-file lifecycle: the diff stream is
//! compressed and dual-hashed into a uniquely named temp file in the store's
//! scratch directory, a second local pass sums the logical entry sizes, and
//! the finished blob is atomically renamed into its layer directory. The temp
//! file is removed on every failure path; no partial blob ever becomes
//! visible at a content-addressed location.

use crate::digest::{compress_and_digest, short_digest, EMPTY_TAR_DIGEST};
use crate::error::{CommitError, Result};
use crate::image::store::ImageStore;
use crate::layer::{generate_layer_id, LayerRecord};
use crate::logging::Logger;
use flate2::read::GzDecoder;
use std::fs;
use std::io::Read;
use std::path::Path;
use tar::Archive;

/// Turns diff streams into durable, content-addressed layer blobs
#[derive(Debug, Clone)]
pub struct DiffMaterializer {
    store: ImageStore,
    output: Logger,
}

impl DiffMaterializer {
    pub fn new(store: ImageStore, output: Logger) -> Self {
        Self { store, output }
    }

    /// Materialize a tar-formatted diff stream into a new layer.
    ///
    /// `seed` is used only to make the temporary file name recognizable; the
    /// layer's storage id is freshly generated and unrelated to the digests.
    pub fn materialize<R: Read>(&self, diff: R, seed: &str) -> Result<LayerRecord> {
        // Drop of the NamedTempFile removes it, which covers every failure
        // exit until the final persist.
        let tmp = tempfile::Builder::new()
            .prefix(&format!("{}-", seed))
            .suffix(".tmp")
            .tempfile_in(self.store.scratch_dir())
            .map_err(|e| CommitError::Io(format!("Failed to create temp layer file: {}", e)))?;

        let digests = compress_and_digest(diff, tmp.reopen()?)?;
        self.output.debug(&format!(
            "diff id {}, blob sum {}",
            short_digest(&digests.diff_id),
            short_digest(&digests.blob_sum)
        ));

        // Second pass over the now-local file: logical size cannot be derived
        // from the compressed length.
        let size = sum_entry_sizes(tmp.reopen()?)?;
        self.output
            .debug(&format!("layer size {} bytes (seed {})", size, seed));

        let diff_id = if size == 0 {
            EMPTY_TAR_DIGEST.to_string()
        } else {
            digests.diff_id
        };

        let layer_id = generate_layer_id();
        let blob_path = self.store.layer_blob_path(&layer_id);
        persist_blob(tmp, &self.store.layer_dir(&layer_id), &blob_path)?;

        Ok(LayerRecord {
            id: layer_id,
            parent: String::new(),
            diff_id,
            blob_sum: digests.blob_sum,
            size,
            blob_path,
            meta: String::new(),
        })
    }
}

/// Create the layer directory and move the finished temp file into it as the
/// blob. The directory is removed again when the rename fails, so no empty
/// layer directory stays reachable.
fn persist_blob(
    tmp: tempfile::NamedTempFile,
    layer_dir: &Path,
    blob_path: &Path,
) -> Result<()> {
    fs::create_dir_all(layer_dir)?;
    if let Err(err) = tmp.persist(blob_path) {
        let _ = fs::remove_dir_all(layer_dir);
        return Err(err.into());
    }
    Ok(())
}

/// Decompress a gzipped tar and sum the logical sizes of its entries
fn sum_entry_sizes<R: Read>(compressed: R) -> Result<i64> {
    let mut archive = Archive::new(GzDecoder::new(compressed));
    archive.set_ignore_zeros(true);

    let mut total: i64 = 0;
    for entry in archive
        .entries()
        .map_err(|e| CommitError::Io(format!("Failed to read layer archive: {}", e)))?
    {
        let entry =
            entry.map_err(|e| CommitError::Io(format!("Failed to read tar entry: {}", e)))?;
        let size = entry
            .header()
            .size()
            .map_err(|e| CommitError::Parse(format!("Failed to read tar entry size: {}", e)))?;
        total += size as i64;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::digest_of;
    use std::io::{self, Cursor};

    fn test_store() -> (tempfile::TempDir, ImageStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path()).unwrap();
        (dir, store)
    }

    fn tar_with_file(name: &str, content: &[u8]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_path(name).unwrap();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, content).unwrap();
        builder.into_inner().unwrap()
    }

    fn scratch_is_empty(store: &ImageStore) -> bool {
        fs::read_dir(store.scratch_dir()).unwrap().next().is_none()
    }

    #[test]
    fn materialize_places_blob_and_cleans_scratch() {
        let (_dir, store) = test_store();
        let materializer = DiffMaterializer::new(store.clone(), Logger::new_quiet());

        let content = vec![7u8; 100];
        let archive = tar_with_file("etc/hostname", &content);
        let layer = materializer
            .materialize(Cursor::new(archive.clone()), "container1")
            .unwrap();

        assert_eq!(layer.size, 100);
        assert_eq!(layer.diff_id, digest_of(&archive));
        assert!(layer.blob_path.is_file());
        assert_eq!(layer.blob_path, store.layer_blob_path(&layer.id));
        assert!(scratch_is_empty(&store));

        // blob sum covers the bytes actually on disk
        let on_disk = fs::read(&layer.blob_path).unwrap();
        assert_eq!(layer.blob_sum, digest_of(&on_disk));
    }

    #[test]
    fn storage_id_is_not_a_content_digest() {
        let (_dir, store) = test_store();
        let materializer = DiffMaterializer::new(store, Logger::new_quiet());

        let archive = tar_with_file("a", b"x");
        let layer = materializer
            .materialize(Cursor::new(archive), "c")
            .unwrap();

        assert_eq!(layer.id.len(), 64);
        assert!(!layer.diff_id.contains(&layer.id));
        assert!(!layer.blob_sum.contains(&layer.id));
    }

    #[test]
    fn empty_stream_yields_canonical_empty_diff_id() {
        let (_dir, store) = test_store();
        let materializer = DiffMaterializer::new(store, Logger::new_quiet());

        let layer = materializer
            .materialize(Cursor::new(Vec::new()), "container1")
            .unwrap();

        assert_eq!(layer.size, 0);
        assert_eq!(layer.diff_id, EMPTY_TAR_DIGEST);
    }

    #[test]
    fn zero_size_entries_yield_canonical_empty_diff_id() {
        let (_dir, store) = test_store();
        let materializer = DiffMaterializer::new(store, Logger::new_quiet());

        let archive = tar_with_file("empty-file", b"");
        let layer = materializer
            .materialize(Cursor::new(archive), "container1")
            .unwrap();

        assert_eq!(layer.size, 0);
        assert_eq!(layer.diff_id, EMPTY_TAR_DIGEST);
    }

    #[test]
    fn identical_input_yields_identical_digests() {
        let (_dir, store) = test_store();
        let materializer = DiffMaterializer::new(store, Logger::new_quiet());

        let archive = tar_with_file("data", &[1u8; 2048]);
        let a = materializer
            .materialize(Cursor::new(archive.clone()), "c1")
            .unwrap();
        let b = materializer.materialize(Cursor::new(archive), "c2").unwrap();

        assert_eq!(a.diff_id, b.diff_id);
        assert_eq!(a.blob_sum, b.blob_sum);
        assert_eq!(a.size, b.size);
        // storage ids stay distinct even for identical content
        assert_ne!(a.id, b.id);
    }

    struct FailingReader {
        remaining: usize,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.remaining == 0 {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream reset"));
            }
            let n = self.remaining.min(buf.len());
            buf[..n].fill(0xab);
            self.remaining -= n;
            Ok(n)
        }
    }

    #[test]
    fn failed_stream_leaves_no_blob_or_temp_file() {
        let (_dir, store) = test_store();
        let materializer = DiffMaterializer::new(store.clone(), Logger::new_quiet());

        let err = materializer
            .materialize(FailingReader { remaining: 4096 }, "container1")
            .unwrap_err();
        assert!(matches!(err, CommitError::Io(_)));

        assert!(scratch_is_empty(&store));
        // no layer directory was created
        let layers: Vec<_> = fs::read_dir(store.root().join("layers"))
            .unwrap()
            .collect();
        assert!(layers.is_empty());
    }

    #[test]
    fn failed_rename_removes_layer_dir_and_temp_file() {
        let (_dir, store) = test_store();
        let tmp = tempfile::NamedTempFile::new_in(store.scratch_dir()).unwrap();

        let layer_dir = store.layer_dir("blocked");
        let blob_path = store.layer_blob_path("blocked");
        // occupy the blob path with a directory so the rename must fail
        fs::create_dir_all(&blob_path).unwrap();

        let err = persist_blob(tmp, &layer_dir, &blob_path).unwrap_err();
        assert!(matches!(err, CommitError::Io(_)));
        assert!(!layer_dir.exists());
        assert!(scratch_is_empty(&store));
    }

    #[test]
    fn garbage_stream_fails_size_pass_and_cleans_up() {
        let (_dir, store) = test_store();
        let materializer = DiffMaterializer::new(store.clone(), Logger::new_quiet());

        // compresses fine but cannot be parsed as a tar archive
        let err = materializer
            .materialize(Cursor::new(vec![0x55u8; 4096]), "container1")
            .unwrap_err();
        assert!(matches!(err, CommitError::Io(_) | CommitError::Parse(_)));
        assert!(scratch_is_empty(&store));
    }
}
