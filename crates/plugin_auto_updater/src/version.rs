//! Local build identifier, read from the server's version metadata file.

use crate::error::UpdateCheckError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static PATCH_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[ \t]*PatchVersion=(?P<version>[0-9]+\.[0-9]+\.[0-9]+\.[0-9]+)(?:[^0-9.]|$)",
    )
    .expect("PatchVersion pattern is valid")
});

/// A 4-part dotted numeric build identifier such as `1.39.8.5`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalVersion(String);

impl LocalVersion {
    /// Extracts the `PatchVersion` entry from `key=value` file contents.
    ///
    /// Returns `None` when the key is absent or its value is not exactly four
    /// dot-separated numbers.
    pub fn parse(contents: &str) -> Option<Self> {
        PATCH_VERSION
            .captures(contents)
            .and_then(|caps| caps.name("version"))
            .map(|m| Self(m.as_str().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LocalVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reads the local version from the metadata file at `path`.
pub async fn read_local_version(path: &Path) -> Result<LocalVersion, UpdateCheckError> {
    let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            UpdateCheckError::LocalVersionUnavailable(format!(
                "version file not found at \"{}\"",
                path.display()
            ))
        } else {
            UpdateCheckError::LocalVersionUnavailable(format!(
                "unable to read \"{}\": {}",
                path.display(),
                e
            ))
        }
    })?;

    LocalVersion::parse(&contents).ok_or_else(|| {
        UpdateCheckError::LocalVersionUnavailable(format!(
            "no valid PatchVersion entry in \"{}\"",
            path.display()
        ))
    })
}
