use anyhow::Result as AnyhowResult;
use std::fmt;
use std::str::FromStr;

pub type Result<T> = AnyhowResult<T>;

const STORE_SCHEMA: &str = "cs:";

/// Identity of a charm or bundle in the store, e.g. `cs:~bob/wordpress-3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactId(String);

impl ArtifactId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id as it appears in store API paths, without the `cs:` schema.
    pub fn path(&self) -> &str {
        self.0.strip_prefix(STORE_SCHEMA).unwrap_or(&self.0)
    }
}

impl FromStr for ArtifactId {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let path = trimmed.strip_prefix(STORE_SCHEMA).unwrap_or(trimmed);
        if path.is_empty() {
            anyhow::bail!("empty charm or bundle id");
        }
        if path.chars().any(char::is_whitespace) {
            anyhow::bail!("invalid charm or bundle id {trimmed:?}");
        }
        if path.starts_with('/') || path.ends_with('/') {
            anyhow::bail!("invalid charm or bundle id {trimmed:?}");
        }
        Ok(Self(format!("{STORE_SCHEMA}{path}")))
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_id_normalizes_schema() {
        let id: ArtifactId = "~bob/wordpress-3".parse().unwrap();
        assert_eq!(id.as_str(), "cs:~bob/wordpress-3");
        assert_eq!(id.path(), "~bob/wordpress-3");

        let id: ArtifactId = "cs:mysql".parse().unwrap();
        assert_eq!(id.to_string(), "cs:mysql");
        assert_eq!(id.path(), "mysql");
    }

    #[test]
    fn test_artifact_id_rejects_invalid() {
        assert!("".parse::<ArtifactId>().is_err());
        assert!("cs:".parse::<ArtifactId>().is_err());
        assert!("word press".parse::<ArtifactId>().is_err());
        assert!("/wordpress".parse::<ArtifactId>().is_err());
    }
}
