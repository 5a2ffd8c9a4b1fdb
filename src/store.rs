//! The contract the upload engine and the resource driver need from the
//! artifact store. `api::StoreClient` is the HTTP implementation.

use crate::api::models::ResourceMeta;
use crate::error::CharmError;
use crate::progress::TransferProgress;
use crate::types::ArtifactId;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncSeek};

/// Seekable byte source for a resource upload.
pub trait ResourceContent: AsyncRead + AsyncSeek + Unpin + Send {}

impl<T> ResourceContent for T where T: AsyncRead + AsyncSeek + Unpin + Send {}

/// One-shot notification fired when the store allocates an upload id,
/// before any bytes are transferred. Firing it a second time is a no-op.
pub struct SessionStarted {
    callback: Option<Box<dyn FnOnce(&str) + Send>>,
}

impl SessionStarted {
    pub fn new(callback: impl FnOnce(&str) + Send + 'static) -> Self {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    pub fn ignore() -> Self {
        Self { callback: None }
    }

    pub fn notify(&mut self, upload_id: &str) {
        if let Some(callback) = self.callback.take() {
            callback(upload_id);
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a> {
    /// Previously cached upload id. `None` starts a fresh upload.
    pub upload_id: Option<&'a str>,
    pub artifact_id: &'a ArtifactId,
    pub resource_name: &'a str,
    pub filename: &'a str,
    pub size: u64,
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn list_resources(&self, artifact_id: &ArtifactId)
        -> Result<Vec<ResourceMeta>, CharmError>;

    /// Uploads `content` as a new revision of the resource and returns that
    /// revision. With an upload id, continues the store's existing session
    /// and fails with [`CharmError::UploadNotFound`] if the store no longer
    /// knows it.
    async fn upload_resource(
        &self,
        request: UploadRequest<'_>,
        content: &mut dyn ResourceContent,
        progress: &TransferProgress,
        session_started: SessionStarted,
    ) -> Result<u64, CharmError>;

    /// Registers an image already held by a registry, by digest.
    async fn register_docker_resource(
        &self,
        artifact_id: &ArtifactId,
        resource_name: &str,
        image_name: &str,
        digest: &str,
    ) -> Result<u64, CharmError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_session_started_fires_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut started = SessionStarted::new(move |id| sink.lock().unwrap().push(id.to_string()));

        started.notify("first");
        started.notify("second");

        assert_eq!(*seen.lock().unwrap(), vec!["first".to_string()]);
    }

    #[test]
    fn test_ignored_session_started_is_noop() {
        let mut started = SessionStarted::ignore();
        started.notify("anything");
    }
}
