use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::error::CharmError;

const CONFIG_DIR_NAME: &str = ".charm";
const CONFIG_FILE_NAME: &str = "config.json";
const UPLOAD_CACHE_FILE_NAME: &str = "upload-id-cache.json";
pub const DEFAULT_API_URL: &str = "https://api.jujucharms.com/charmstore/v5";

pub fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthParseError {
    #[error("invalid auth credentials: expected \"user:passwd\"")]
    MissingSeparator,
    #[error("invalid auth credentials: empty user name")]
    EmptyUser,
}

/// HTTP basic credentials for the store, written as `user:passwd`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl FromStr for Credentials {
    type Err = AuthParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (username, password) = value
            .split_once(':')
            .ok_or(AuthParseError::MissingSeparator)?;
        if username.is_empty() {
            return Err(AuthParseError::EmptyUser);
        }
        Ok(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

/// Settings read from `~/.charm/config.json`. Never written back.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub upload_cache: Option<PathBuf>,
    #[serde(default = "default_resume")]
    pub resume: bool,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_resume() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            username: None,
            password: None,
            upload_cache: None,
            resume: default_resume(),
        }
    }
}

impl Config {
    /// Reads `~/.charm/config.json` when present and applies environment
    /// overrides on top. A missing file is not an error.
    pub fn load() -> Result<Self> {
        let mut config = match Self::load_from_file() {
            Ok(config) => config,
            Err(err) => match err.downcast_ref::<CharmError>() {
                Some(CharmError::ConfigNotFound) => Config::default(),
                _ => return Err(err),
            },
        };
        config.apply_env()?;
        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Err(CharmError::ConfigNotFound.into());
        }

        let contents = fs::read_to_string(config_path).context("Failed to read config file")?;
        serde_json::from_str(&contents).context("Failed to parse config file")
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(url) = env_var("JUJU_CHARMSTORE") {
            self.api_url = url;
        }
        if let Some(auth) = env_var("CHARM_AUTH") {
            self.set_credentials(auth.parse().context("Invalid CHARM_AUTH")?);
        }
        if let Some(path) = env_var("CHARM_UPLOAD_CACHE") {
            self.upload_cache = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn credentials(&self) -> Option<Credentials> {
        let username = self.username.clone()?;
        Some(Credentials {
            username,
            password: self.password.clone().unwrap_or_default(),
        })
    }

    pub fn set_credentials(&mut self, credentials: Credentials) {
        self.username = Some(credentials.username);
        self.password = Some(credentials.password);
    }

    /// Cache file location for resumable uploads, or `None` when resuming
    /// is turned off.
    pub fn upload_cache_path(&self) -> Result<Option<PathBuf>> {
        if !self.resume {
            return Ok(None);
        }
        match &self.upload_cache {
            Some(path) => Ok(Some(path.clone())),
            None => Ok(Some(Self::default_upload_cache_path()?)),
        }
    }

    pub fn home_dir() -> Result<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            return Ok(PathBuf::from(home));
        }
        dirs::home_dir().context(
            "Could not determine home directory. Please ensure HOME environment variable is set.",
        )
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::home_dir()?.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn default_upload_cache_path() -> Result<PathBuf> {
        Ok(Self::home_dir()?
            .join(CONFIG_DIR_NAME)
            .join(UPLOAD_CACHE_FILE_NAME))
    }
}
