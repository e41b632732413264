//! Per-layer metadata records
//!
//! Every materialized layer gets a JSON sidecar written next to its blob.
//! The sidecar is what later consumers (export, pull, re-run) read to
//! reconstruct the image configuration without re-deriving it from disk.

use crate::config::ContainerConfig;
use crate::error::Result;
use crate::image::store::ImageStore;
use crate::layer::LayerRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;

/// Serialized per-layer metadata, written as `<layerID>.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerMetadata {
    pub id: String,
    /// Storage id of the parent layer
    pub parent: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
    pub created: DateTime<Utc>,
    /// Id of the container the layer was committed from
    pub container: String,
    /// Snapshot of the container's configuration at commit time
    pub container_config: ContainerConfig,
    /// Final merged configuration for the committed image
    pub config: ContainerConfig,
    pub architecture: String,
    pub os: String,
    pub engine_version: String,
    pub size: i64,
    /// Identity of the host that produced the layer
    pub host: String,
}

/// Inputs for building a layer metadata record
#[derive(Debug, Clone)]
pub struct MetadataInputs<'a> {
    pub parent_layer_id: &'a str,
    pub container_id: &'a str,
    pub container_config: &'a ContainerConfig,
    pub merged_config: &'a ContainerConfig,
    pub comment: &'a str,
    pub author: &'a str,
    pub host: &'a str,
}

/// Build the metadata record for a freshly materialized layer
pub fn build(layer: &LayerRecord, inputs: &MetadataInputs<'_>) -> LayerMetadata {
    LayerMetadata {
        id: layer.id.clone(),
        parent: inputs.parent_layer_id.to_string(),
        comment: inputs.comment.to_string(),
        author: inputs.author.to_string(),
        created: Utc::now(),
        container: inputs.container_id.to_string(),
        container_config: inputs.container_config.clone(),
        config: inputs.merged_config.clone(),
        architecture: std::env::consts::ARCH.to_string(),
        os: std::env::consts::OS.to_string(),
        engine_version: crate::ENGINE_VERSION.to_string(),
        size: layer.size,
        host: inputs.host.to_string(),
    }
}

/// Serialize the metadata into the layer record and write the sidecar file
/// next to the blob
pub fn write_sidecar(
    store: &ImageStore,
    layer: &mut LayerRecord,
    metadata: &LayerMetadata,
) -> Result<()> {
    layer.meta = serde_json::to_string(metadata)?;
    fs::write(store.layer_metadata_path(&layer.id), layer.meta.as_bytes())?;
    Ok(())
}
