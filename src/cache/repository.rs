//! Repository cache: `name:tag` references mapped to image ids
//!
//! Tagging is a pure mapping update. An image committed without a reference
//! exists only by id until it is tagged later.

use crate::error::{CommitError, Result};
use crate::image::store::ImageStore;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, RwLock};

/// Process-wide mapping from `name:tag` to image id
#[derive(Debug)]
pub struct RepositoryCache {
    index: RwLock<HashMap<String, String>>,
    path: PathBuf,
    save_lock: Mutex<()>,
}

impl RepositoryCache {
    /// Load the cache backed by the store's `repositories.json`
    pub fn load(store: &ImageStore) -> Result<Self> {
        let path = store.repository_cache_path();
        let index: HashMap<String, String> = super::read_index(&path)?;
        Ok(Self {
            index: RwLock::new(index),
            path,
            save_lock: Mutex::new(()),
        })
    }

    /// Point a `name:tag` reference at an image id
    pub fn tag(&self, reference: &str, image_id: &str) {
        let mut index = self.index.write().expect("repository cache lock poisoned");
        index.insert(reference.to_string(), image_id.to_string());
    }

    /// Resolve a reference to an image id
    pub fn resolve(&self, reference: &str) -> Result<String> {
        let index = self.index.read().expect("repository cache lock poisoned");
        index
            .get(reference)
            .cloned()
            .ok_or_else(|| CommitError::NotFound(format!("reference {}", reference)))
    }

    /// Persist the whole index durably
    pub fn save(&self) -> Result<()> {
        let _guard = self
            .save_lock
            .lock()
            .expect("repository cache save lock poisoned");
        let snapshot = {
            let index = self.index.read().expect("repository cache lock poisoned");
            index.clone()
        };
        super::write_index(&self.path, &snapshot)
    }

    pub fn len(&self) -> usize {
        self.index
            .read()
            .expect("repository cache lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
