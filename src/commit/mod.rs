//! End-to-end commit orchestration
//!
//! [`Committer::commit`] turns the live filesystem delta of a stopped
//! container into a new image: it validates container state, resolves the
//! final configuration, materializes the diff stream into an addressed layer,
//! assembles the parent-chain image configuration, persists the caches and
//! emits a single audit event.

use crate::backend::{ContainerExport, ContainerMetadata, HostIdentity};
use crate::cache::{ImageCache, LayerCache, RepositoryCache};
use crate::config::{apply_changes, merge, ContainerConfig, EnvKeyCase};
use crate::digest::short_digest;
use crate::error::{CommitError, Result};
use crate::events::{EventActor, EventSink, EventType};
use crate::image::store::ImageStore;
use crate::image::{self, ImageConfig};
use crate::layer::{materialize::DiffMaterializer, metadata, LayerRecord};
use crate::logging::Logger;
use std::sync::Arc;

/// Parameters of a commit operation
#[derive(Debug, Clone)]
pub struct CommitRequest {
    /// Repository name; when absent the image exists only by id
    pub repo: Option<String>,
    /// Tag within the repository, defaults to `latest` when a repo is given
    pub tag: Option<String>,
    pub comment: String,
    pub author: String,
    /// Dockerfile-style change instructions applied before the merge
    pub changes: Vec<String>,
    /// User-supplied configuration overrides
    pub config: Option<ContainerConfig>,
    /// Merge the resulting configuration with the container's current one
    pub merge_configs: bool,
}

impl Default for CommitRequest {
    fn default() -> Self {
        Self {
            repo: None,
            tag: None,
            comment: String::new(),
            author: String::new(),
            changes: Vec::new(),
            config: None,
            merge_configs: true,
        }
    }
}

impl CommitRequest {
    /// Validate and format the optional `name:tag` reference
    fn reference(&self) -> Result<Option<String>> {
        let repo = match &self.repo {
            Some(repo) => repo,
            None => {
                if self.tag.is_some() {
                    return Err(CommitError::Validation(
                        "a tag requires a repository name".into(),
                    ));
                }
                return Ok(None);
            }
        };
        if repo.is_empty()
            || !repo
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "._-/".contains(c))
        {
            return Err(CommitError::Validation(format!(
                "invalid repository name: '{}'",
                repo
            )));
        }
        let tag = self.tag.as_deref().unwrap_or("latest");
        if tag.is_empty()
            || !tag
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "._-".contains(c))
        {
            return Err(CommitError::Validation(format!("invalid tag: '{}'", tag)));
        }
        Ok(Some(format!("{}:{}", repo, tag)))
    }
}

/// Sequences the commit pipeline over injected collaborators and caches
pub struct Committer {
    store: ImageStore,
    materializer: DiffMaterializer,
    layer_cache: Arc<LayerCache>,
    image_cache: Arc<ImageCache>,
    repository_cache: Arc<RepositoryCache>,
    exporter: Arc<dyn ContainerExport>,
    containers: Arc<dyn ContainerMetadata>,
    host: Arc<dyn HostIdentity>,
    events: Arc<dyn EventSink>,
    output: Logger,
}

impl Committer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: ImageStore,
        layer_cache: Arc<LayerCache>,
        image_cache: Arc<ImageCache>,
        repository_cache: Arc<RepositoryCache>,
        exporter: Arc<dyn ContainerExport>,
        containers: Arc<dyn ContainerMetadata>,
        host: Arc<dyn HostIdentity>,
        events: Arc<dyn EventSink>,
        output: Logger,
    ) -> Self {
        let materializer = DiffMaterializer::new(store.clone(), output.clone());
        Self {
            store,
            materializer,
            layer_cache,
            image_cache,
            repository_cache,
            exporter,
            containers,
            host,
            events,
            output,
        }
    }

    /// Commit the current state of `name` into a new image, returning the
    /// new image id
    pub async fn commit(&self, name: &str, request: CommitRequest) -> Result<String> {
        let reference = request.reference()?;

        let handle = self
            .containers
            .lookup(name)
            .ok_or_else(|| CommitError::NotFound(format!("container {}", name)))?;

        let state = self.containers.inspect(name).await?;
        if state.running || state.restarting {
            return Err(CommitError::Conflict(format!(
                "commit of a running container is not supported: {}",
                name
            )));
        }

        // Final configuration: user config + change instructions, then merged
        // with the container's current configuration.
        let user_config = request.config.clone().unwrap_or_default();
        let changed = apply_changes(&user_config, &request.changes)?;
        let merged = if request.merge_configs {
            merge(
                &changed,
                &state.config,
                EnvKeyCase::for_platform(std::env::consts::OS),
            )
        } else {
            changed
        };

        self.output
            .step(&format!("Exporting filesystem diff for {}", name));
        let diff = self
            .exporter
            .export_diff(&handle.container_id, &handle.layer_id)
            .await?;

        let mut layer = self
            .materializer
            .materialize(diff, &handle.container_id)?;
        layer.parent = handle.layer_id.clone();

        let host = self.host.host_id()?;
        self.output
            .debug(&format!("Using host id {} for layer metadata", host));
        let meta = metadata::build(
            &layer,
            &metadata::MetadataInputs {
                parent_layer_id: &handle.layer_id,
                container_id: &handle.container_id,
                container_config: &state.config,
                merged_config: &merged,
                comment: &request.comment,
                author: &request.author,
                host: &host,
            },
        );
        metadata::write_sidecar(&self.store, &mut layer, &meta)?;

        self.layer_cache.add(layer.clone());
        let chain = self.layer_cache.resolve_chain(layer.clone())?;

        let image = image::create_image_config(&chain, &meta)?;
        let image_id = image.image_id.clone();
        self.output.debug(&format!(
            "Assembled image {} from {} layers",
            short_digest(&image_id),
            chain.len()
        ));

        self.persist(image, &layer, reference.as_deref())?;

        let ref_name = reference.unwrap_or_default();
        self.events.log(
            "commit",
            EventType::Image,
            EventActor::image(&image_id, &ref_name),
        );
        self.output
            .success_with_timing(&format!("Committed {}", short_digest(&image_id)));
        Ok(image_id)
    }

    /// Persistence phase: image cache, optional repository mapping, canonical
    /// blob form, then layer finalization. A failure here means the image
    /// must not be reported as committed even though its blob may remain on
    /// disk as a recoverable orphan.
    fn persist(
        &self,
        image: ImageConfig,
        layer: &LayerRecord,
        reference: Option<&str>,
    ) -> Result<()> {
        let image_id = image.image_id.clone();
        self.image_cache.add(image);
        self.image_cache.save()?;

        if let Some(reference) = reference {
            self.repository_cache.tag(reference, &image_id);
            self.repository_cache.save()?;
        }

        self.store.write_image_blob(layer)?;
        self.layer_cache.commit(&layer.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_formatting_and_validation() {
        let mut request = CommitRequest::default();
        assert_eq!(request.reference().unwrap(), None);

        request.repo = Some("web/app".into());
        assert_eq!(request.reference().unwrap(), Some("web/app:latest".into()));

        request.tag = Some("v1.2".into());
        assert_eq!(request.reference().unwrap(), Some("web/app:v1.2".into()));

        request.repo = Some("Bad Name".into());
        assert!(request.reference().is_err());

        let tag_only = CommitRequest {
            tag: Some("v1".into()),
            ..Default::default()
        };
        assert!(tag_only.reference().is_err());
    }
}
