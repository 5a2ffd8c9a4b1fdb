use crate::api::models::resource::{DockerResourceRequest, ResourceMeta, RevisionResponse};
use crate::api::models::upload::{
    FinishUploadRequest, FinishUploadResponse, PartRef, PartStatus, UploadInfo,
};
use crate::api::models::ErrorPayload;
use crate::config::{Config, Credentials};
use crate::content_hash::sha384_hex;
use crate::error::CharmError;
use crate::progress::TransferProgress;
use crate::store::{ResourceContent, ResourceStore, SessionStarted, UploadRequest};
use crate::transfer::send_part_with_retry;
use crate::types::{ArtifactId, Result};
use anyhow::Context;
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha384};
use std::io::SeekFrom;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Used when the store reports no limits of its own.
const FALLBACK_MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

#[derive(Clone)]
pub struct StoreClient {
    client: Client,
    transfer_client: Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl StoreClient {
    pub fn new(base_url: &str, credentials: Option<Credentials>) -> Result<Self> {
        let client = build_api_client()?;
        let transfer_client = build_transfer_client()?;

        debug!(
            "StoreClient configured base_url={} credentials_configured={}",
            base_url,
            credentials.is_some()
        );

        Ok(Self {
            client,
            transfer_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.api_url, config.credentials())
    }

    fn build_url_from_base(base_url: &str, endpoint: &str) -> String {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    pub fn build_url(&self, endpoint: &str) -> String {
        Self::build_url_from_base(&self.base_url, endpoint)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(creds) => request.basic_auth(&creds.username, Some(&creds.password)),
            None => request,
        }
    }

    async fn new_upload(&self) -> std::result::Result<UploadInfo, CharmError> {
        let url = self.build_url("upload");
        debug!("POST {url}");
        let response = self.authorize(self.client.post(&url)).send().await?;
        let response = check_status(response, None).await?;
        parse_json(response).await
    }

    async fn upload_info(&self, upload_id: &str) -> std::result::Result<UploadInfo, CharmError> {
        let url = self.build_url(&format!("upload/{}", urlencoding::encode(upload_id)));
        debug!("GET {url}");
        let response = self.authorize(self.client.get(&url)).send().await?;
        let response = check_status(response, Some(upload_id)).await?;
        let mut info: UploadInfo = parse_json(response).await?;
        if info.upload_id.is_empty() {
            info.upload_id = upload_id.to_string();
        }
        Ok(info)
    }

    async fn put_part(
        &self,
        upload_id: &str,
        part: usize,
        offset: u64,
        hash: &str,
        data: Vec<u8>,
    ) -> std::result::Result<(), CharmError> {
        let url = self.build_url(&format!(
            "upload/{}/{}?hash={}&offset={}",
            urlencoding::encode(upload_id),
            part,
            hash,
            offset
        ));
        debug!("PUT {url} ({} bytes)", data.len());

        let response = send_part_with_retry(part, || {
            self.authorize(self.transfer_client.put(&url))
                .body(data.clone())
                .send()
        })
        .await?;
        check_status(response, Some(upload_id)).await?;
        Ok(())
    }

    async fn finish_upload(
        &self,
        upload_id: &str,
        parts: Vec<PartRef>,
    ) -> std::result::Result<String, CharmError> {
        let url = self.build_url(&format!("upload/{}", urlencoding::encode(upload_id)));
        debug!("PUT {url} ({} parts)", parts.len());
        let response = self
            .authorize(self.client.put(&url))
            .json(&FinishUploadRequest { parts })
            .send()
            .await?;
        let response = check_status(response, Some(upload_id)).await?;
        let finished: FinishUploadResponse = parse_json(response).await?;
        Ok(finished.hash)
    }

    async fn add_resource(
        &self,
        request: &UploadRequest<'_>,
        upload_id: &str,
        hash: &str,
    ) -> std::result::Result<u64, CharmError> {
        let url = self.build_url(&format!(
            "{}/resource/{}?hash={}&filename={}&upload-id={}",
            request.artifact_id.path(),
            urlencoding::encode(request.resource_name),
            hash,
            urlencoding::encode(request.filename),
            urlencoding::encode(upload_id)
        ));
        debug!("POST {url}");
        let response = self.authorize(self.client.post(&url)).send().await?;
        let response = check_status(response, None).await?;
        let added: RevisionResponse = parse_json(response).await?;
        Ok(added.revision)
    }
}

#[async_trait]
impl ResourceStore for StoreClient {
    async fn list_resources(
        &self,
        artifact_id: &ArtifactId,
    ) -> std::result::Result<Vec<ResourceMeta>, CharmError> {
        let url = self.build_url(&format!("{}/meta/resources", artifact_id.path()));
        debug!("GET {url}");
        let response = self.authorize(self.client.get(&url)).send().await?;
        let response = check_status(response, None).await?;
        parse_json(response).await
    }

    async fn upload_resource(
        &self,
        request: UploadRequest<'_>,
        content: &mut dyn ResourceContent,
        progress: &TransferProgress,
        mut session_started: SessionStarted,
    ) -> std::result::Result<u64, CharmError> {
        let info = match request.upload_id {
            Some(upload_id) => self.upload_info(upload_id).await?,
            None => {
                let info = self.new_upload().await?;
                session_started.notify(&info.upload_id);
                info
            }
        };
        let upload_id = info.upload_id.clone();
        let part_size = plan_part_size(request.size, &info)?;
        debug!(
            "uploading {} bytes as upload {upload_id} in parts of {part_size}",
            request.size
        );

        content.seek(SeekFrom::Start(0)).await?;

        let mut whole = Sha384::new();
        let mut parts = Vec::new();
        let mut offset = 0u64;
        let mut reusing = true;

        while offset < request.size {
            let length = part_size.min(request.size - offset);
            let mut data = vec![0u8; length as usize];
            content.read_exact(&mut data).await?;
            whole.update(&data);

            let index = parts.len();
            let hash = sha384_hex(&data);
            reusing = reusing && part_already_stored(info.parts.get(index), &hash, length);

            if reusing {
                debug!("part {index} already uploaded");
            } else {
                self.put_part(&upload_id, index, offset, &hash, data).await?;
            }
            progress.record_bytes(length);

            parts.push(PartRef { hash, size: length });
            offset += length;
        }

        let local_hash = hex::encode(whole.finalize());
        let stored_hash = self.finish_upload(&upload_id, parts).await?;
        if stored_hash != local_hash {
            return Err(CharmError::Protocol(format!(
                "upload {upload_id}: store computed hash {stored_hash}, expected {local_hash}"
            )));
        }

        let revision = self.add_resource(&request, &upload_id, &local_hash).await?;
        progress.complete();
        Ok(revision)
    }

    async fn register_docker_resource(
        &self,
        artifact_id: &ArtifactId,
        resource_name: &str,
        image_name: &str,
        digest: &str,
    ) -> std::result::Result<u64, CharmError> {
        let url = self.build_url(&format!(
            "{}/resource/{}",
            artifact_id.path(),
            urlencoding::encode(resource_name)
        ));
        debug!("POST {url} digest={digest}");
        let response = self
            .authorize(self.client.post(&url))
            .json(&DockerResourceRequest {
                digest: digest.to_string(),
                image_name: image_name.to_string(),
            })
            .send()
            .await?;
        let response = check_status(response, None).await?;
        let added: RevisionResponse = parse_json(response).await?;
        Ok(added.revision)
    }
}

fn part_already_stored(status: Option<&PartStatus>, hash: &str, size: u64) -> bool {
    matches!(status, Some(part) if part.complete && part.size == size && part.hash == hash)
}

/// Smallest part size that keeps the upload within the store's part count.
/// A queried session without limits keeps the size its first stored part was
/// sent with, so part boundaries line up with what the store already holds.
pub(crate) fn plan_part_size(
    size: u64,
    info: &UploadInfo,
) -> std::result::Result<u64, CharmError> {
    let has_limits = info.min_part_size > 0 || info.max_parts > 0 || info.max_part_size > 0;
    if !has_limits {
        if let Some(first) = info.parts.first().filter(|part| part.size > 0) {
            return Ok(first.size);
        }
    }

    let min_part_size = if info.min_part_size == 0 {
        FALLBACK_MIN_PART_SIZE
    } else {
        info.min_part_size
    };
    let mut part_size = min_part_size;
    if info.max_parts > 0 {
        part_size = part_size.max(size.div_ceil(u64::from(info.max_parts)));
    }
    if info.max_part_size > 0 && part_size > info.max_part_size {
        return Err(CharmError::ApiError(format!(
            "resource of {size} bytes is too large to upload"
        )));
    }
    Ok(part_size)
}

async fn check_status(
    response: Response,
    upload_id: Option<&str>,
) -> std::result::Result<Response, CharmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorPayload>(&body)
        .ok()
        .map(|payload| payload.message)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("HTTP {status}"));
    debug!("store returned {status}: {message}");

    Err(match (status, upload_id) {
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => {
            CharmError::AuthenticationFailed(message)
        }
        (StatusCode::NOT_FOUND, Some(upload_id)) => {
            CharmError::UploadNotFound(upload_id.to_string())
        }
        _ => CharmError::ApiError(message),
    })
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> std::result::Result<T, CharmError> {
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

fn is_test_mode() -> bool {
    std::env::var("CHARM_TEST_MODE")
        .map(|value| value == "1")
        .unwrap_or(false)
}

fn default_headers() -> Result<reqwest::header::HeaderMap> {
    let user_agent = format!("charm/{}", env!("CARGO_PKG_VERSION"));
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_str(&user_agent).context("Invalid user agent")?,
    );
    Ok(headers)
}

pub(crate) fn build_api_client() -> Result<Client> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .default_headers(default_headers()?)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Some(Duration::from_secs(30)))
        .redirect(reqwest::redirect::Policy::limited(4));

    if is_test_mode() {
        builder = builder
            .connect_timeout(Duration::from_millis(200))
            .timeout(Duration::from_secs(2));
    } else {
        builder = builder
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(30));
    }

    builder.build().context("Failed to build HTTP client")
}

fn build_transfer_client() -> Result<Client> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .default_headers(default_headers()?)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Some(Duration::from_secs(30)))
        .tcp_nodelay(true)
        .redirect(reqwest::redirect::Policy::limited(4));

    if is_test_mode() {
        builder = builder
            .connect_timeout(Duration::from_millis(200))
            .timeout(Duration::from_secs(10));
    } else {
        builder = builder
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(300));
    }

    builder.build().context("Failed to build transfer client")
}
