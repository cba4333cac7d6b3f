//! SDK catalog handling.
//!
//! The catalog is static configuration mapping a version string to the
//! archive it is distributed in. It is loaded once, before resolution, and
//! handed to the [`Provisioner`](super::Provisioner) explicitly.
//!
//! ## Catalog Format
//!
//! ```json
//! {
//!   "sdks": {
//!     "4.6.0": {
//!       "url": "https://example.org/flex_sdk_4.6.zip",
//!       "binpath": "bin",
//!       "sha256": "abc123..."
//!     }
//!   }
//! }
//! ```
//!
//! `binpath` defaults to `bin`; `sha256` is optional and, when present, is
//! checked against the downloaded archive.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::SdkError;

/// Default location of the compiler inside an SDK tree.
pub const DEFAULT_BINPATH: &str = "bin";

fn default_binpath() -> String {
    DEFAULT_BINPATH.to_string()
}

/// Download information for one SDK version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SdkCatalogEntry {
    /// Canonical version string; filled from the map key on load.
    #[serde(default, skip_serializing)]
    pub version: String,
    /// Archive download URL.
    pub url: String,
    /// Directory holding `mxmlc`, relative to the SDK root.
    #[serde(default = "default_binpath")]
    pub binpath: String,
    /// Expected SHA256 of the archive, lowercase or uppercase hex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl SdkCatalogEntry {
    /// Extracts the archive filename from the URL (last path segment).
    ///
    /// Example: `"https://.../flex_sdk_4.6.zip?dl=1"` -> `"flex_sdk_4.6.zip"`
    #[must_use]
    pub fn filename(&self) -> &str {
        let path = self.url.split(['?', '#']).next().unwrap_or(&self.url);
        path.rsplit('/').next().unwrap_or(path)
    }
}

/// Whether a relative path has a `..` segment, with either separator.
fn escapes_root(binpath: &str) -> bool {
    binpath.split(['/', '\\']).any(|segment| segment == "..")
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    sdks: BTreeMap<String, SdkCatalogEntry>,
}

/// Read-only map of known SDK versions.
#[derive(Debug, Clone, Default)]
pub struct SdkCatalog {
    entries: BTreeMap<String, SdkCatalogEntry>,
}

impl SdkCatalog {
    /// Builds a catalog from entries, keyed by their `version` field.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = SdkCatalogEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|e| (e.version.clone(), e))
                .collect(),
        }
    }

    /// Parses a catalog from its JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Catalog`] if the JSON is malformed, a key is not
    /// a valid semantic version, or a `binpath` climbs out of the SDK root.
    pub fn from_json(content: &str) -> Result<Self, SdkError> {
        let file: CatalogFile = serde_json::from_str(content)
            .map_err(|e| SdkError::catalog(format!("failed to parse catalog: {e}")))?;

        let mut entries = BTreeMap::new();
        for (key, mut entry) in file.sdks {
            let version = semver::Version::parse(key.trim()).map_err(|e| {
                SdkError::catalog(format!("catalog key '{key}' is not a valid version: {e}"))
            })?;
            if escapes_root(&entry.binpath) {
                return Err(SdkError::catalog(format!(
                    "binpath '{}' of version {key} leaves the SDK directory",
                    entry.binpath
                )));
            }
            entry.version = version.to_string();
            entries.insert(entry.version.clone(), entry);
        }

        Ok(Self { entries })
    }

    /// Loads a catalog from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Catalog`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, SdkError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SdkError::catalog(format!("failed to read catalog {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    /// Looks up the entry for a canonical version string.
    #[must_use]
    pub fn get(&self, version: &str) -> Option<&SdkCatalogEntry> {
        self.entries.get(version)
    }

    /// Returns whether the catalog has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns entries sorted by semver (newest first).
    #[must_use]
    pub fn sorted_entries(&self) -> Vec<&SdkCatalogEntry> {
        let mut entries: Vec<&SdkCatalogEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| {
            let a_ver = semver::Version::parse(&a.version).ok();
            let b_ver = semver::Version::parse(&b.version).ok();
            match (a_ver, b_ver) {
                (Some(a), Some(b)) => b.cmp(&a),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => b.version.cmp(&a.version),
            }
        });
        entries
    }
}
