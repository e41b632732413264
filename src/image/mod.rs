//! Image configuration assembly
//!
//! An image configuration describes a full image: the ordered diff-id chain
//! of its layers, the merged container configuration, provenance fields and a
//! derived image id. The image id is a pure function of the serialized
//! content: identical configurations always produce identical ids, which is
//! what allows deduplication in the image cache.

pub mod store;

use crate::config::ContainerConfig;
use crate::digest::digest_of;
use crate::error::{CommitError, Result};
use crate::layer::{metadata::LayerMetadata, LayerRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use store::ImageStore;

/// Rootfs section of an image configuration: diff ids ordered root to leaf
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RootFs {
    #[serde(rename = "type")]
    pub fs_type: String,
    pub diff_ids: Vec<String>,
}

/// One history entry per layer, ordered root to leaf
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub empty_layer: bool,
}

/// Content-addressed part of an image configuration. The image id is the
/// digest of exactly this serialized structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
    pub architecture: String,
    pub os: String,
    /// Id of the container the image was committed from
    pub container: String,
    pub container_config: ContainerConfig,
    pub config: ContainerConfig,
    pub rootfs: RootFs,
    pub history: Vec<HistoryEntry>,
}

impl ImageContent {
    /// Derive the image id from the serialized content
    pub fn image_id(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(digest_of(&bytes))
    }
}

/// A full image record as held by the image cache
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(flatten)]
    pub content: ImageContent,
    /// Derived digest of `content`
    pub image_id: String,
    /// Storage ids of the image's layers, leaf first. Storage ids are not
    /// part of the hashed content.
    pub layer_ids: Vec<String>,
}

/// Assemble the image configuration for a commit.
///
/// `layers` is the full chain with the new layer first and the root layer
/// last, as produced by the cache chain walk. `metadata` is the new layer's
/// metadata record.
pub fn create_image_config(
    layers: &[LayerRecord],
    metadata: &LayerMetadata,
) -> Result<ImageConfig> {
    if layers.is_empty() {
        return Err(CommitError::Internal(
            "cannot build an image configuration without layers".into(),
        ));
    }

    let mut diff_ids = Vec::with_capacity(layers.len());
    let mut history = Vec::with_capacity(layers.len());
    for layer in layers.iter().rev() {
        diff_ids.push(layer.diff_id.clone());
        history.push(history_entry(layer));
    }

    let content = ImageContent {
        created: metadata.created,
        author: metadata.author.clone(),
        architecture: metadata.architecture.clone(),
        os: metadata.os.clone(),
        container: metadata.container.clone(),
        container_config: metadata.container_config.clone(),
        config: metadata.config.clone(),
        rootfs: RootFs {
            fs_type: "layers".into(),
            diff_ids,
        },
        history,
    };

    let image_id = content.image_id()?;
    Ok(ImageConfig {
        content,
        image_id,
        layer_ids: layers.iter().map(|l| l.id.clone()).collect(),
    })
}

/// History entry for one layer, recovered from its metadata sidecar when
/// present
fn history_entry(layer: &LayerRecord) -> HistoryEntry {
    let meta: Option<LayerMetadata> = if layer.meta.is_empty() {
        None
    } else {
        serde_json::from_str(&layer.meta).ok()
    };
    match meta {
        Some(meta) => HistoryEntry {
            created: meta.created,
            author: meta.author,
            comment: meta.comment,
            empty_layer: layer.is_empty(),
        },
        None => HistoryEntry {
            empty_layer: layer.is_empty(),
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn layer(id: &str, parent: &str, diff: &str, size: i64) -> LayerRecord {
        LayerRecord {
            id: id.into(),
            parent: parent.into(),
            diff_id: format!("sha256:{}", diff.repeat(64 / diff.len())),
            blob_sum: "sha256:bb".into(),
            size,
            blob_path: PathBuf::from("/nonexistent"),
            meta: String::new(),
        }
    }

    fn meta() -> LayerMetadata {
        LayerMetadata {
            id: "l3".into(),
            parent: "l2".into(),
            container: "cid".into(),
            architecture: "x86_64".into(),
            os: "linux".into(),
            ..Default::default()
        }
    }

    #[test]
    fn diff_ids_ordered_root_to_leaf() {
        let layers = vec![
            layer("l3", "l2", "c", 10),
            layer("l2", "l1", "b", 10),
            layer("l1", "scratch", "a", 10),
        ];

        let image = create_image_config(&layers, &meta()).unwrap();
        assert_eq!(
            image.content.rootfs.diff_ids,
            vec![
                layers[2].diff_id.clone(),
                layers[1].diff_id.clone(),
                layers[0].diff_id.clone()
            ]
        );
        assert_eq!(image.layer_ids, vec!["l3", "l2", "l1"]);
        assert_eq!(image.content.history.len(), 3);
    }

    #[test]
    fn image_id_is_pure_function_of_content() {
        let layers = vec![layer("l1", "scratch", "a", 10)];
        let a = create_image_config(&layers, &meta()).unwrap();

        // different storage id, same content
        let relabeled = vec![layer("zz", "scratch", "a", 10)];
        let b = create_image_config(&relabeled, &meta()).unwrap();
        assert_eq!(a.image_id, b.image_id);

        // content change alters the id
        let changed = vec![layer("l1", "scratch", "d", 10)];
        let c = create_image_config(&changed, &meta()).unwrap();
        assert_ne!(a.image_id, c.image_id);

        assert_eq!(a.image_id, a.content.image_id().unwrap());
    }

    #[test]
    fn empty_layers_are_flagged_in_history() {
        let layers = vec![layer("l1", "scratch", "a", 0)];
        let image = create_image_config(&layers, &meta()).unwrap();
        assert!(image.content.history[0].empty_layer);
    }

    #[test]
    fn no_layers_is_an_internal_error() {
        assert!(create_image_config(&[], &meta()).is_err());
    }
}
