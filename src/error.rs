use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Expected absence that drives a fallback path.
    NotFound,
    /// The remote side answered in a way we cannot safely trust.
    Protocol,
    /// Network or transfer failure; the caller may retry the whole operation.
    Transient,
    Fatal,
}

#[derive(Debug)]
pub enum CharmError {
    ConfigNotFound,
    CacheEntryNotFound,
    UploadNotFound(String),
    NoSuchResource(String),
    UnsupportedResourceType(String),
    Protocol(String),
    ApiError(String),
    IoError(String),
    NetworkError(String),
    ConnectionError(String),
    AuthenticationFailed(String),
}

impl CharmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CharmError::CacheEntryNotFound | CharmError::UploadNotFound(_) => ErrorKind::NotFound,
            CharmError::Protocol(_) => ErrorKind::Protocol,
            CharmError::NetworkError(_) | CharmError::ConnectionError(_) => ErrorKind::Transient,
            CharmError::ConfigNotFound
            | CharmError::NoSuchResource(_)
            | CharmError::UnsupportedResourceType(_)
            | CharmError::ApiError(_)
            | CharmError::IoError(_)
            | CharmError::AuthenticationFailed(_) => ErrorKind::Fatal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl fmt::Display for CharmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CharmError::ConfigNotFound => write!(f, "Config file not found"),
            CharmError::CacheEntryNotFound => write!(f, "upload cache entry not found"),
            CharmError::UploadNotFound(upload_id) => {
                write!(f, "upload {upload_id} not found")
            }
            CharmError::NoSuchResource(name) => write!(f, "no such resource {name:?}"),
            CharmError::UnsupportedResourceType(kind) => {
                write!(f, "unsupported resource type {kind:?}")
            }
            CharmError::Protocol(msg) => write!(f, "{msg}"),
            CharmError::ApiError(msg) => write!(f, "API Error: {msg}"),
            CharmError::IoError(msg) => write!(f, "IO Error: {msg}"),
            CharmError::NetworkError(msg) => write!(f, "Network Error: {msg}"),
            CharmError::ConnectionError(msg) => write!(f, "{msg}"),
            CharmError::AuthenticationFailed(msg) => {
                write!(f, "Authentication failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for CharmError {}

impl From<std::io::Error> for CharmError {
    fn from(err: std::io::Error) -> Self {
        CharmError::IoError(err.to_string())
    }
}

impl From<reqwest::Error> for CharmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            CharmError::ConnectionError(format!(
                "cannot connect to {}",
                err.url()
                    .map(|url| url.as_str().to_string())
                    .unwrap_or_else(|| "server".to_string())
            ))
        } else if err.is_timeout() {
            CharmError::ConnectionError("connection timed out".to_string())
        } else if err.is_request() {
            CharmError::NetworkError(format!("Request failed: {err}"))
        } else {
            CharmError::NetworkError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CharmError {
    fn from(err: serde_json::Error) -> Self {
        CharmError::ApiError(format!("JSON parsing error: {err}"))
    }
}
