//! Digest lookup for images held by a v2 registry.
//!
//! Only enough of the registry API is spoken to turn a reference into a
//! manifest digest: the root probe that elicits an auth challenge, the token
//! exchange, and `HEAD` on the manifest.

pub mod challenge;
pub mod reference;

pub use challenge::{BearerChallenge, Challenge};
pub use reference::{ImageReference, ReferenceError};

use crate::error::CharmError;
use crate::types::Result;
use log::debug;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{Client, StatusCode};

pub const MANIFEST_V2_MEDIA_TYPE: &str = "application/vnd.docker.distribution.manifest.v2+json";
const API_VERSION_HEADER: &str = "Docker-Distribution-Api-Version";
const CONTENT_DIGEST_HEADER: &str = "Docker-Content-Digest";
const SUPPORTED_API_VERSION_PREFIX: &str = "registry/2.";

pub struct RegistryResolver {
    client: Client,
}

impl RegistryResolver {
    pub fn new() -> Result<Self> {
        Ok(Self::with_client(crate::api::client::build_api_client()?))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Returns the digest the registry holds for `reference`.
    ///
    /// A reference that already names a digest resolves to that digest once
    /// the registry confirms it serves it. A tag is looked up and the digest
    /// it points to is fetched a second time to confirm the registry serves
    /// the same manifest by digest. Between the two lookups the tag may move;
    /// this is a best-effort consistency check.
    pub async fn resolve_digest(
        &self,
        reference: &ImageReference,
    ) -> std::result::Result<String, CharmError> {
        let endpoint = reference.registry_endpoint();
        let token = self.authorize(&endpoint, reference.path()).await?;

        let manifest_url = |manifest_reference: &str| {
            format!("{endpoint}{}/manifests/{manifest_reference}", reference.path())
        };

        let headers = self
            .head_manifest(&manifest_url(reference.manifest_reference()), token.as_deref())
            .await
            .map_err(|failure| {
                failure.into_error(&format!("cannot get information on {reference}"))
            })?;
        let digest = validate_manifest_headers(&headers)?;

        if let Some(trusted) = reference.digest() {
            return Ok(trusted.to_string());
        }

        let confirmed = self
            .head_manifest(&manifest_url(&digest), token.as_deref())
            .await
            .map_err(|failure| failure.into_error("cannot verify image digest"))?;
        let confirmed_digest = validate_manifest_headers(&confirmed)?;
        if confirmed_digest != digest {
            return Err(CharmError::Protocol(format!(
                "registry returned digest {confirmed_digest} when looking up {digest}"
            )));
        }

        Ok(digest)
    }

    /// Probes the API root and, when challenged for a bearer token, fetches
    /// one scoped to pulling `repository_path`. Any other probe status leaves
    /// the manifest lookup to decide.
    async fn authorize(
        &self,
        endpoint: &str,
        repository_path: &str,
    ) -> std::result::Result<Option<String>, CharmError> {
        debug!("GET {endpoint}");
        let response = self.client.get(endpoint).send().await.map_err(|err| {
            CharmError::ConnectionError(format!(
                "cannot get registry authorization response: {err}"
            ))
        })?;

        match response.status() {
            StatusCode::UNAUTHORIZED => {
                let header = response
                    .headers()
                    .get(WWW_AUTHENTICATE)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default();
                match challenge::parse_challenge(header) {
                    Some(Challenge::Bearer(bearer)) => {
                        challenge::fetch_token(&self.client, &bearer, repository_path)
                            .await
                            .map(Some)
                    }
                    other => {
                        debug!("no bearer challenge from {endpoint}: {other:?}");
                        Ok(None)
                    }
                }
            }
            status => {
                debug!("no challenge from {endpoint}: {status}");
                Ok(None)
            }
        }
    }

    /// `HEAD` on a manifest. Anything but 200 is a failure.
    async fn head_manifest(
        &self,
        url: &str,
        token: Option<&str>,
    ) -> std::result::Result<HeaderMap, HeadFailure> {
        debug!("HEAD {url}");
        let mut request = self.client.head(url).header(ACCEPT, MANIFEST_V2_MEDIA_TYPE);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await.map_err(HeadFailure::Transport)?;
        if response.status() != StatusCode::OK {
            return Err(HeadFailure::Status(response.status()));
        }
        Ok(response.headers().clone())
    }
}

#[derive(Debug)]
enum HeadFailure {
    Status(StatusCode),
    Transport(reqwest::Error),
}

impl HeadFailure {
    fn into_error(self, context: &str) -> CharmError {
        match self {
            HeadFailure::Status(status) => CharmError::Protocol(format!("{context}: {status}")),
            HeadFailure::Transport(err) => CharmError::ConnectionError(format!("{context}: {err}")),
        }
    }
}

fn validate_manifest_headers(headers: &HeaderMap) -> std::result::Result<String, CharmError> {
    let version = headers
        .get(API_VERSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if !version.starts_with(SUPPORTED_API_VERSION_PREFIX) {
        return Err(CharmError::Protocol(format!(
            "incompatible registry version {version:?}"
        )));
    }

    let digest = headers
        .get(CONTENT_DIGEST_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .unwrap_or_default();
    if digest.is_empty() {
        return Err(CharmError::Protocol("no digest in response".to_string()));
    }
    Ok(digest.to_string())
}
