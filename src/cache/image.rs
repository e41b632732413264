//! Image cache: in-memory index plus durable `images.json`

use crate::error::{CommitError, Result};
use crate::image::store::ImageStore;
use crate::image::ImageConfig;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, RwLock};

/// Process-wide cache of image configurations keyed by image id
#[derive(Debug)]
pub struct ImageCache {
    index: RwLock<HashMap<String, ImageConfig>>,
    path: PathBuf,
    save_lock: Mutex<()>,
}

impl ImageCache {
    /// Load the cache backed by the store's `images.json`
    pub fn load(store: &ImageStore) -> Result<Self> {
        let path = store.image_cache_path();
        let index: HashMap<String, ImageConfig> = super::read_index(&path)?;
        Ok(Self {
            index: RwLock::new(index),
            path,
            save_lock: Mutex::new(()),
        })
    }

    /// Insert or replace an image configuration. Identical configurations
    /// share an image id, so re-adding is a no-op in effect.
    pub fn add(&self, image: ImageConfig) {
        let mut index = self.index.write().expect("image cache lock poisoned");
        index.insert(image.image_id.clone(), image);
    }

    /// Fetch an image configuration by image id
    pub fn get(&self, image_id: &str) -> Result<ImageConfig> {
        let index = self.index.read().expect("image cache lock poisoned");
        index
            .get(image_id)
            .cloned()
            .ok_or_else(|| CommitError::NotFound(format!("image {}", image_id)))
    }

    /// Persist the whole index durably. A failed save means the image must
    /// not be reported as committed.
    pub fn save(&self) -> Result<()> {
        let _guard = self.save_lock.lock().expect("image cache save lock poisoned");
        let snapshot = {
            let index = self.index.read().expect("image cache lock poisoned");
            index.clone()
        };
        super::write_index(&self.path, &snapshot)
    }

    pub fn len(&self) -> usize {
        self.index.read().expect("image cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageContent;

    fn image(id_seed: &str) -> ImageConfig {
        let content = ImageContent {
            container: id_seed.into(),
            architecture: "x86_64".into(),
            os: "linux".into(),
            ..Default::default()
        };
        let image_id = content.image_id().unwrap();
        ImageConfig {
            content,
            image_id,
            layer_ids: vec!["l1".into()],
        }
    }

    #[test]
    fn add_get_save_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path()).unwrap();
        let cache = ImageCache::load(&store).unwrap();

        let img = image("c1");
        let id = img.image_id.clone();
        cache.add(img.clone());
        assert_eq!(cache.get(&id).unwrap(), img);
        cache.save().unwrap();

        let reloaded = ImageCache::load(&store).unwrap();
        assert_eq!(reloaded.get(&id).unwrap(), img);
        assert!(reloaded.get("sha256:missing").unwrap_err().is_not_found());
    }

    #[test]
    fn identical_content_deduplicates() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path()).unwrap();
        let cache = ImageCache::load(&store).unwrap();

        cache.add(image("c1"));
        cache.add(image("c1"));
        assert_eq!(cache.len(), 1);
    }
}
