//! Collaborator interfaces at the boundary of the commit pipeline
//!
//! The hypervisor session, guest bootstrap and transport layers are external
//! to this crate. They are consumed through three narrow traits: a diff
//! exporter delivering the container filesystem as a tar stream, a metadata
//! provider reporting container state and identity, and a host identity
//! source used to tag persisted layer metadata.

use crate::config::ContainerConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::io::Read;

/// Handle returned by container name lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    /// Full container id
    pub container_id: String,
    /// Storage id of the container's current top layer
    pub layer_id: String,
    /// Image id the container was created from
    pub image_id: String,
}

/// Point-in-time container state as reported by inspection
#[derive(Debug, Clone, Default)]
pub struct ContainerState {
    pub id: String,
    pub running: bool,
    pub restarting: bool,
    /// Current effective configuration of the container
    pub config: ContainerConfig,
}

/// Exports a container's filesystem delta as a tar-formatted byte stream.
///
/// The returned reader is blocking; the caller fully drains and closes it.
#[async_trait]
pub trait ContainerExport: Send + Sync {
    async fn export_diff(
        &self,
        container_id: &str,
        layer_id: &str,
    ) -> Result<Box<dyn Read + Send>>;
}

/// Container metadata lookup and inspection
#[async_trait]
pub trait ContainerMetadata: Send + Sync {
    /// Resolve a container name to its handle, if known
    fn lookup(&self, name: &str) -> Option<ContainerHandle>;

    /// Report the container's current state and effective configuration
    async fn inspect(&self, name: &str) -> Result<ContainerState>;
}

/// Identity of the host producing layers (hypervisor UUID or hostname)
pub trait HostIdentity: Send + Sync {
    fn host_id(&self) -> Result<String>;
}
