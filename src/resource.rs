//! Picks how a resource gets into the store based on the kind the
//! artifact's metadata declares for it.

use crate::error::CharmError;
use crate::progress::TransferProgress;
use crate::registry::{ImageReference, RegistryResolver};
use crate::store::ResourceStore;
use crate::types::{ArtifactId, Result};
use crate::ui::Reporter;
use crate::upload::{upload_file_resource, FileUpload};
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

const EXTERNAL_IMAGE_PREFIX: &str = "external::";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    File,
    OciImage,
}

impl FromStr for ResourceKind {
    type Err = CharmError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "file" => Ok(ResourceKind::File),
            "oci-image" | "docker" => Ok(ResourceKind::OciImage),
            other => Err(CharmError::UnsupportedResourceType(other.to_string())),
        }
    }
}

/// What the user asked to attach, interpreted for the resource's kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    File { path: PathBuf },
    Image { reference: ImageReference },
}

impl Resource {
    pub fn for_kind(kind: ResourceKind, value: &str, working_dir: &Path) -> Result<Self> {
        match kind {
            ResourceKind::File => Ok(Resource::File {
                path: working_dir.join(value),
            }),
            ResourceKind::OciImage => {
                let value = value.strip_prefix(EXTERNAL_IMAGE_PREFIX).unwrap_or(value);
                let reference = ImageReference::parse(value)
                    .context("cannot use image resource")?;
                Ok(Resource::Image { reference })
            }
        }
    }
}

pub struct ResourceUploader<'a, S: ResourceStore + ?Sized> {
    pub store: &'a S,
    pub resolver: &'a RegistryResolver,
    pub reporter: Arc<dyn Reporter>,
    /// `None` turns off resuming interrupted uploads.
    pub cache_path: Option<PathBuf>,
    pub working_dir: PathBuf,
}

impl<S: ResourceStore + ?Sized> ResourceUploader<'_, S> {
    /// Attaches `value` as a new revision of the named resource and returns
    /// that revision.
    pub async fn upload(
        &self,
        artifact_id: &ArtifactId,
        resource_name: &str,
        value: &str,
    ) -> Result<u64> {
        let resources = self
            .store
            .list_resources(artifact_id)
            .await
            .with_context(|| format!("cannot get resource metadata for {artifact_id}"))?;
        let meta = resources
            .iter()
            .find(|meta| meta.name == resource_name)
            .ok_or_else(|| CharmError::NoSuchResource(resource_name.to_string()))?;
        let kind: ResourceKind = meta.kind.parse()?;

        match Resource::for_kind(kind, value, &self.working_dir)? {
            Resource::File { path } => self.upload_file(artifact_id, resource_name, &path).await,
            Resource::Image { reference } => {
                self.register_image(artifact_id, resource_name, &reference)
                    .await
            }
        }
    }

    async fn upload_file(
        &self,
        artifact_id: &ArtifactId,
        resource_name: &str,
        path: &Path,
    ) -> Result<u64> {
        let mut file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("cannot open {}", path.display()))?;
        let size = file
            .metadata()
            .await
            .with_context(|| format!("cannot stat {}", path.display()))?
            .len();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let progress = TransferProgress::new(self.reporter.clone(), filename.clone(), size);
        let upload = FileUpload {
            artifact_id,
            resource_name,
            filename: &filename,
            size,
            cache_path: self.cache_path.clone(),
        };
        upload_file_resource(self.store, &upload, &mut file, &progress, &self.reporter).await
    }

    async fn register_image(
        &self,
        artifact_id: &ArtifactId,
        resource_name: &str,
        reference: &ImageReference,
    ) -> Result<u64> {
        let digest = self
            .resolver
            .resolve_digest(reference)
            .await
            .with_context(|| format!("cannot resolve digest of {reference}"))?;
        log::debug!("{reference} resolved to {digest}");

        self.store
            .register_docker_resource(artifact_id, resource_name, &reference.name(), &digest)
            .await
            .context("cannot add docker resource")
    }
}
