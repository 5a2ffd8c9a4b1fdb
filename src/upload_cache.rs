//! Persistent map from (artifact, resource, content hash) to the store's
//! upload id, so an interrupted upload of byte-identical content can resume.
//!
//! The cache file is read and rewritten whole on every operation and never
//! held open across a transfer. Writes go to a temporary file in the same
//! directory which is then renamed over the cache, so concurrent processes
//! see either the old or the new contents.

use crate::content_hash::ContentHash;
use crate::error::CharmError;
use crate::types::ArtifactId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

pub const UPLOAD_ID_CACHE_EXPIRY: Duration = Duration::from_secs(48 * 60 * 60);

const CACHE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub artifact_id: String,
    pub resource_name: String,
    pub content_hash: String,
    pub upload_id: String,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    fn matches(&self, artifact_id: &ArtifactId, resource_name: &str, hash: &ContentHash) -> bool {
        self.artifact_id == artifact_id.as_str()
            && self.resource_name == resource_name
            && self.content_hash == hash.to_hex()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default = "default_format_version")]
    format_version: u32,
    #[serde(default)]
    entries: Vec<CacheEntry>,
}

fn default_format_version() -> u32 {
    CACHE_FORMAT_VERSION
}

#[derive(Debug, Clone)]
pub struct UploadIdCache {
    path: PathBuf,
    expiry: chrono::Duration,
}

impl UploadIdCache {
    pub fn new(path: impl Into<PathBuf>, expiry: Duration) -> Self {
        Self {
            path: path.into(),
            expiry: chrono::Duration::from_std(expiry).unwrap_or(chrono::Duration::MAX),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drops every entry older than the expiry window. Returns how many were
    /// removed.
    pub fn remove_expired(&self) -> Result<usize, CharmError> {
        self.remove_expired_at(Utc::now())
    }

    pub fn lookup(
        &self,
        artifact_id: &ArtifactId,
        resource_name: &str,
        hash: &ContentHash,
    ) -> Result<CacheEntry, CharmError> {
        self.lookup_at(artifact_id, resource_name, hash, Utc::now())
    }

    pub fn update(
        &self,
        upload_id: &str,
        artifact_id: &ArtifactId,
        resource_name: &str,
        hash: &ContentHash,
    ) -> Result<(), CharmError> {
        self.update_at(upload_id, artifact_id, resource_name, hash, Utc::now())
    }

    /// Forgets the entry for the key. Removing an absent key is not an error.
    pub fn remove(
        &self,
        artifact_id: &ArtifactId,
        resource_name: &str,
        hash: &ContentHash,
    ) -> Result<(), CharmError> {
        let mut file = self.load()?;
        let before = file.entries.len();
        file.entries
            .retain(|entry| !entry.matches(artifact_id, resource_name, hash));
        if file.entries.len() != before {
            self.store(&file)?;
        }
        Ok(())
    }

    pub(crate) fn remove_expired_at(&self, now: DateTime<Utc>) -> Result<usize, CharmError> {
        let mut file = self.load()?;
        let before = file.entries.len();
        file.entries.retain(|entry| !self.is_expired(entry, now));
        let removed = before - file.entries.len();
        if removed > 0 {
            self.store(&file)?;
        }
        Ok(removed)
    }

    pub(crate) fn lookup_at(
        &self,
        artifact_id: &ArtifactId,
        resource_name: &str,
        hash: &ContentHash,
        now: DateTime<Utc>,
    ) -> Result<CacheEntry, CharmError> {
        self.load()?
            .entries
            .into_iter()
            .find(|entry| {
                entry.matches(artifact_id, resource_name, hash) && !self.is_expired(entry, now)
            })
            .ok_or(CharmError::CacheEntryNotFound)
    }

    pub(crate) fn update_at(
        &self,
        upload_id: &str,
        artifact_id: &ArtifactId,
        resource_name: &str,
        hash: &ContentHash,
        now: DateTime<Utc>,
    ) -> Result<(), CharmError> {
        let mut file = self.load()?;
        file.entries
            .retain(|entry| !entry.matches(artifact_id, resource_name, hash));
        file.entries.push(CacheEntry {
            artifact_id: artifact_id.as_str().to_string(),
            resource_name: resource_name.to_string(),
            content_hash: hash.to_hex(),
            upload_id: upload_id.to_string(),
            created_at: now,
        });
        self.store(&file)
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.created_at) > self.expiry
    }

    fn load(&self) -> Result<CacheFile, CharmError> {
        let contents = match std::fs::read(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(CacheFile::default())
            }
            Err(err) => return Err(self.io_error("read", err)),
        };
        if contents.iter().all(u8::is_ascii_whitespace) {
            return Ok(CacheFile::default());
        }

        let file: CacheFile = serde_json::from_slice(&contents).map_err(|err| {
            CharmError::IoError(format!(
                "cannot parse upload cache {}: {err}",
                self.path.display()
            ))
        })?;
        if file.format_version != CACHE_FORMAT_VERSION {
            return Err(CharmError::IoError(format!(
                "unsupported upload cache version {} in {}",
                file.format_version,
                self.path.display()
            )));
        }
        Ok(file)
    }

    fn store(&self, file: &CacheFile) -> Result<(), CharmError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|err| self.io_error("create directory for", err))?;

        let contents = serde_json::to_vec_pretty(file)?;
        let mut temp =
            NamedTempFile::new_in(&dir).map_err(|err| self.io_error("write", err))?;
        temp.write_all(&contents)
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|err| self.io_error("write", err))?;
        temp.persist(&self.path)
            .map_err(|err| self.io_error("replace", err.error))?;
        Ok(())
    }

    fn io_error(&self, action: &str, err: std::io::Error) -> CharmError {
        CharmError::IoError(format!(
            "cannot {action} upload cache {}: {err}",
            self.path.display()
        ))
    }
}
