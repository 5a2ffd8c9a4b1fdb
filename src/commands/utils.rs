use crate::config::Config;
use anyhow::{Context, Result};
use std::path::PathBuf;
use thiserror::Error;

pub fn expand_tilde_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResourceArgParseError {
    #[error("Invalid resource specifier '{input}'. Expected format 'name=value' (example: 'website=./site.tgz').")]
    InvalidFormat { input: String },
    #[error("Resource name is missing in '{input}'. Add a name before '='.")]
    MissingName { input: String },
    #[error("Resource value is missing in '{input}'. Add a filename or image reference after '='.")]
    MissingValue { input: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceArg {
    pub name: String,
    pub value: String,
}

pub fn parse_resource_arg(input: &str) -> Result<ResourceArg, ResourceArgParseError> {
    let trimmed = input.trim();
    let (name_raw, value_raw) =
        trimmed
            .split_once('=')
            .ok_or_else(|| ResourceArgParseError::InvalidFormat {
                input: input.to_string(),
            })?;

    let name = name_raw.trim();
    if name.is_empty() {
        return Err(ResourceArgParseError::MissingName {
            input: input.to_string(),
        });
    }

    let value = value_raw.trim();
    if value.is_empty() {
        return Err(ResourceArgParseError::MissingValue {
            input: input.to_string(),
        });
    }

    Ok(ResourceArg {
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// Flags that override what `Config::load` found.
#[derive(Debug, Default)]
pub struct ConfigOverrides {
    pub auth: Option<String>,
    pub upload_cache: Option<PathBuf>,
    pub no_resume: bool,
}

pub fn load_config(overrides: ConfigOverrides) -> Result<Config> {
    let mut config = Config::load()?;
    if let Some(auth) = overrides.auth {
        config.set_credentials(auth.parse().context("Invalid --auth value")?);
    }
    if let Some(path) = overrides.upload_cache {
        config.upload_cache = Some(PathBuf::from(expand_tilde_path(&path.to_string_lossy())));
    }
    if overrides.no_resume {
        config.resume = false;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_resource_arg_accepts_basic_pair() {
        let arg = parse_resource_arg("website=./site.tgz").unwrap();
        assert_eq!(arg.name, "website");
        assert_eq!(arg.value, "./site.tgz");
    }

    #[test]
    fn parse_resource_arg_keeps_later_equals_signs() {
        let arg = parse_resource_arg("data=weird=name.bin").unwrap();
        assert_eq!(arg.name, "data");
        assert_eq!(arg.value, "weird=name.bin");
    }

    #[test]
    fn parse_resource_arg_keeps_image_prefix() {
        let arg = parse_resource_arg("image=external::quay.io/team/app:1").unwrap();
        assert_eq!(arg.value, "external::quay.io/team/app:1");
    }

    #[test]
    fn parse_resource_arg_rejects_malformed_input() {
        assert!(matches!(
            parse_resource_arg("website"),
            Err(ResourceArgParseError::InvalidFormat { .. })
        ));
        assert!(matches!(
            parse_resource_arg("=site.tgz"),
            Err(ResourceArgParseError::MissingName { .. })
        ));
        assert!(matches!(
            parse_resource_arg("website= "),
            Err(ResourceArgParseError::MissingValue { .. })
        ));
    }

    #[test]
    fn expand_tilde_leaves_plain_paths() {
        assert_eq!(expand_tilde_path("/tmp/cache.json"), "/tmp/cache.json");
    }
}
