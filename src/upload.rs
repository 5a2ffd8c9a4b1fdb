//! Resumable upload of a single file resource.
//!
//! With a cache configured, the content is hashed first and the cache is
//! consulted for an upload id left behind by an earlier, interrupted attempt
//! on the same bytes. The store is asked to resume that session; if it has
//! forgotten it, one fresh upload follows. Without a cache every call is a
//! fresh upload.

use crate::content_hash::{hash_and_rewind, ContentHash};
use crate::error::CharmError;
use crate::progress::TransferProgress;
use crate::store::{ResourceContent, ResourceStore, SessionStarted, UploadRequest};
use crate::types::{ArtifactId, Result};
use crate::ui::Reporter;
use crate::upload_cache::{UploadIdCache, UPLOAD_ID_CACHE_EXPIRY};
use anyhow::Context;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncSeekExt;

pub struct FileUpload<'a> {
    pub artifact_id: &'a ArtifactId,
    pub resource_name: &'a str,
    pub filename: &'a str,
    pub size: u64,
    pub cache_path: Option<PathBuf>,
}

struct CacheBinding {
    cache: UploadIdCache,
    hash: ContentHash,
}

pub async fn upload_file_resource<S>(
    store: &S,
    upload: &FileUpload<'_>,
    content: &mut dyn ResourceContent,
    progress: &TransferProgress,
    reporter: &Arc<dyn Reporter>,
) -> Result<u64>
where
    S: ResourceStore + ?Sized,
{
    let mut resume_id = None;
    let binding = match &upload.cache_path {
        Some(path) => {
            let cache = UploadIdCache::new(path, UPLOAD_ID_CACHE_EXPIRY);
            if let Err(err) = cache.remove_expired() {
                reporter.warn(&format!("cannot remove expired upload cache entries: {err}"));
            }

            let hash = hash_and_rewind(content).await?;
            match cache.lookup(upload.artifact_id, upload.resource_name, &hash) {
                Ok(entry) => {
                    reporter.info("resuming previous upload");
                    resume_id = Some(entry.upload_id);
                }
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err).context("cannot read upload cache"),
            }
            Some(CacheBinding { cache, hash })
        }
        None => None,
    };

    let request = UploadRequest {
        upload_id: resume_id.as_deref(),
        artifact_id: upload.artifact_id,
        resource_name: upload.resource_name,
        filename: upload.filename,
        size: upload.size,
    };

    let first = store
        .upload_resource(
            request,
            content,
            progress,
            session_recorder(&binding, upload, reporter),
        )
        .await;

    let revision = match first {
        Ok(revision) => revision,
        Err(CharmError::UploadNotFound(upload_id)) if resume_id.is_some() => {
            log::debug!("store no longer knows upload {upload_id}");
            reporter.warn("previous upload seems to have expired; restarting.");
            content
                .seek(SeekFrom::Start(0))
                .await
                .context("Failed to rewind resource content")?;
            progress.reset();

            let fresh = UploadRequest {
                upload_id: None,
                ..request
            };
            store
                .upload_resource(
                    fresh,
                    content,
                    progress,
                    session_recorder(&binding, upload, reporter),
                )
                .await
                .map_err(anyhow::Error::new)
                .context("can't upload resource")?
        }
        Err(err) => return Err(anyhow::Error::new(err).context("can't upload resource")),
    };

    if let Some(CacheBinding { cache, hash }) = &binding {
        if let Err(err) = cache.remove(upload.artifact_id, upload.resource_name, hash) {
            reporter.error(&format!("cannot remove upload cache entry: {err}"));
        }
    }

    Ok(revision)
}

/// Builds the sink that records a newly allocated upload id in the cache.
fn session_recorder(
    binding: &Option<CacheBinding>,
    upload: &FileUpload<'_>,
    reporter: &Arc<dyn Reporter>,
) -> SessionStarted {
    let Some(CacheBinding { cache, hash }) = binding else {
        return SessionStarted::ignore();
    };

    let cache = cache.clone();
    let hash = *hash;
    let artifact_id = upload.artifact_id.clone();
    let resource_name = upload.resource_name.to_string();
    let reporter = Arc::clone(reporter);

    SessionStarted::new(move |upload_id| {
        if let Err(err) = cache.update(upload_id, &artifact_id, &resource_name, &hash) {
            reporter.error(&format!("cannot update upload cache: {err}"));
        }
    })
}
