use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::RepodropError;

static REPOSITORY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?/[A-Za-z0-9._-]+$")
        .expect("repository regex is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositoryName(String);

impl RepositoryName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn owner(&self) -> &str {
        self.0.split_once('/').map(|(owner, _)| owner).unwrap_or("")
    }

    pub fn name(&self) -> &str {
        self.0.split_once('/').map(|(_, name)| name).unwrap_or("")
    }
}

impl fmt::Display for RepositoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RepositoryName {
    type Err = RepodropError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if !REPOSITORY_RE.is_match(trimmed) || trimmed.ends_with("/.") || trimmed.ends_with("/..")
        {
            return Err(RepodropError::InvalidRepository(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl TryFrom<String> for RepositoryName {
    type Error = RepodropError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RepositoryName> for String {
    fn from(value: RepositoryName) -> Self {
        value.0
    }
}

/// Normalizes a remote folder path: no leading/trailing slashes, no empty
/// segments. The repository root is the empty string.
pub fn normalize_folder_path(path: &str) -> Result<String, RepodropError> {
    let segments = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>();
    if segments
        .iter()
        .any(|segment| *segment == "." || *segment == "..")
    {
        return Err(RepodropError::InvalidFolderPath(path.to_string()));
    }
    Ok(segments.join("/"))
}

/// A locally chosen file. Identity is name + size only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalFile {
    pub name: String,
    pub size: u64,
    pub path: Utf8PathBuf,
}

impl LocalFile {
    pub fn from_path(path: &Utf8Path) -> Result<Self, RepodropError> {
        let metadata = std::fs::metadata(path.as_std_path())
            .map_err(|err| RepodropError::Filesystem(format!("{path}: {err}")))?;
        if !metadata.is_file() {
            return Err(RepodropError::Filesystem(format!("{path}: not a regular file")));
        }
        let name = path
            .file_name()
            .ok_or_else(|| RepodropError::Filesystem(format!("{path}: missing file name")))?
            .to_string();
        Ok(Self {
            name,
            size: metadata.len(),
            path: path.to_path_buf(),
        })
    }

    pub fn load_all(paths: &[Utf8PathBuf]) -> Result<Vec<Self>, RepodropError> {
        paths.iter().map(|path| Self::from_path(path)).collect()
    }

    pub fn size_kb(&self) -> String {
        format!("{:.1} KB", self.size as f64 / 1024.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

impl RemoteEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub full_name: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub pushed_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetLocation {
    pub repository: RepositoryName,
    pub folder_path: String,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_repository_valid() {
        let repo: RepositoryName = " alice/site ".parse().unwrap();
        assert_eq!(repo.as_str(), "alice/site");
        assert_eq!(repo.owner(), "alice");
        assert_eq!(repo.name(), "site");
    }

    #[test]
    fn parse_repository_invalid() {
        for value in ["alice", "alice/", "/site", "a/b/c", "alice/.."] {
            let err = value.parse::<RepositoryName>().unwrap_err();
            assert_matches!(err, RepodropError::InvalidRepository(_));
        }
    }

    #[test]
    fn normalize_paths() {
        assert_eq!(normalize_folder_path("").unwrap(), "");
        assert_eq!(normalize_folder_path("/").unwrap(), "");
        assert_eq!(normalize_folder_path("/src//lib/").unwrap(), "src/lib");
        assert_matches!(
            normalize_folder_path("src/../etc"),
            Err(RepodropError::InvalidFolderPath(_))
        );
    }

    #[test]
    fn entry_kind_from_api() {
        let entry: RemoteEntry =
            serde_json::from_str(r#"{"name":"mod","path":"mod","type":"submodule"}"#).unwrap();
        assert_eq!(entry.kind, EntryKind::Other);
    }
}
