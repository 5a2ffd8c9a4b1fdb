use oci_distribution::Reference;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_DOMAIN: &str = "docker.io";
const DOCKER_HUB_REGISTRY_HOST: &str = "registry-1.docker.io";
const DEFAULT_TAG: &str = "latest";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("empty image reference")]
    Empty,
    #[error("invalid image reference {reference:?}: {reason}")]
    Invalid { reference: String, reason: String },
}

/// A container image reference in its fully-qualified form, e.g.
/// `docker.io/library/ubuntu:latest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    inner: Reference,
    tag: Option<String>,
}

impl ImageReference {
    pub fn parse(value: &str) -> Result<Self, ReferenceError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ReferenceError::Empty);
        }

        let inner = Reference::try_from(value).map_err(|e| ReferenceError::Invalid {
            reference: value.to_string(),
            reason: e.to_string(),
        })?;
        let tag = match (inner.tag(), inner.digest()) {
            (Some(tag), _) => Some(tag.to_string()),
            (None, None) => Some(DEFAULT_TAG.to_string()),
            (None, Some(_)) => None,
        };

        Ok(Self { inner, tag })
    }

    pub fn domain(&self) -> &str {
        self.inner.registry()
    }

    /// Repository path within the registry, e.g. `library/ubuntu`.
    pub fn path(&self) -> &str {
        self.inner.repository()
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.inner.digest()
    }

    /// Fully-qualified repository name without tag or digest.
    pub fn name(&self) -> String {
        format!("{}/{}", self.domain(), self.path())
    }

    /// What to ask the registry's manifest endpoint for. A digest wins
    /// over a tag.
    pub fn manifest_reference(&self) -> &str {
        self.digest().or(self.tag()).unwrap_or(DEFAULT_TAG)
    }

    /// Base URL of the registry's v2 API, with a trailing slash.
    pub fn registry_endpoint(&self) -> String {
        let host = if self.domain() == DEFAULT_DOMAIN {
            DOCKER_HUB_REGISTRY_HOST
        } else {
            self.domain()
        };
        format!("{}://{}/v2/", scheme_for_host(host), host)
    }
}

impl FromStr for ImageReference {
    type Err = ReferenceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())?;
        if let Some(tag) = self.tag() {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = self.digest() {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

fn scheme_for_host(host: &str) -> &'static str {
    let hostname = host.rsplit_once(':').map_or(host, |(name, _)| name);
    if hostname == "localhost" || hostname == "127.0.0.1" {
        "http"
    } else {
        "https"
    }
}
