//! Layer cache: in-memory index plus durable `layers.json`
//!
//! Layers go through two phases. `add` makes a layer locally resolvable so
//! the commit in progress can walk it; `commit` marks it authoritative and
//! persists the index so later commits may stack on top of it.

use crate::error::{CommitError, Result};
use crate::image::store::ImageStore;
use crate::layer::{LayerRecord, SCRATCH_LAYER_ID};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, RwLock};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LayerEntry {
    record: LayerRecord,
    committed: bool,
}

/// Process-wide cache of layer records
#[derive(Debug)]
pub struct LayerCache {
    index: RwLock<HashMap<String, LayerEntry>>,
    path: PathBuf,
    // serializes whole-index saves; reads stay concurrent
    save_lock: Mutex<()>,
}

impl LayerCache {
    /// Load the cache backed by the store's `layers.json`
    pub fn load(store: &ImageStore) -> Result<Self> {
        let path = store.layer_cache_path();
        let index: HashMap<String, LayerEntry> = super::read_index(&path)?;
        Ok(Self {
            index: RwLock::new(index),
            path,
            save_lock: Mutex::new(()),
        })
    }

    /// Insert or replace a layer record. The layer is resolvable but not yet
    /// authoritative.
    pub fn add(&self, record: LayerRecord) {
        let mut index = self.index.write().expect("layer cache lock poisoned");
        index.insert(
            record.id.clone(),
            LayerEntry {
                record,
                committed: false,
            },
        );
    }

    /// Fetch a layer record by storage id
    pub fn get(&self, id: &str) -> Result<LayerRecord> {
        let index = self.index.read().expect("layer cache lock poisoned");
        index
            .get(id)
            .map(|entry| entry.record.clone())
            .ok_or_else(|| CommitError::NotFound(format!("layer {}", id)))
    }

    /// True once a layer has been marked authoritative
    pub fn is_committed(&self, id: &str) -> bool {
        let index = self.index.read().expect("layer cache lock poisoned");
        index.get(id).map(|e| e.committed).unwrap_or(false)
    }

    /// Mark a previously added layer as finalized and persist the index
    pub fn commit(&self, id: &str) -> Result<()> {
        {
            let mut index = self.index.write().expect("layer cache lock poisoned");
            let entry = index
                .get_mut(id)
                .ok_or_else(|| CommitError::NotFound(format!("layer {}", id)))?;
            entry.committed = true;
        }
        self.save()
    }

    /// Persist the whole index durably
    pub fn save(&self) -> Result<()> {
        let _guard = self.save_lock.lock().expect("layer cache save lock poisoned");
        let snapshot = {
            let index = self.index.read().expect("layer cache lock poisoned");
            index.clone()
        };
        super::write_index(&self.path, &snapshot)
    }

    /// Resolve the full chain from `leaf` down to the scratch sentinel,
    /// ordered leaf first. A missing parent is a fatal inconsistency.
    pub fn resolve_chain(&self, leaf: LayerRecord) -> Result<Vec<LayerRecord>> {
        let mut chain = vec![leaf];
        loop {
            let parent = chain.last().map(|l| l.parent.clone()).unwrap_or_default();
            if parent == SCRATCH_LAYER_ID {
                return Ok(chain);
            }
            if parent.is_empty() {
                return Err(CommitError::ChainInconsistency(format!(
                    "layer {} has no parent reference",
                    chain.last().map(|l| l.id.as_str()).unwrap_or("?")
                )));
            }
            let record = self.get(&parent).map_err(|_| {
                CommitError::ChainInconsistency(format!(
                    "parent layer {} is missing from the cache",
                    parent
                ))
            })?;
            chain.push(record);
        }
    }

    pub fn len(&self) -> usize {
        self.index.read().expect("layer cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
