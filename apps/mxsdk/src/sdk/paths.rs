//! Path management for provisioned SDKs.
//!
//! The default root directory is `~/.mxsdk/` (`%APPDATA%\mxsdk` on Windows),
//! which can be overridden by setting the `MXSDK_HOME` environment variable.
//!
//! ## Directory Structure
//!
//! ```text
//! ~/.mxsdk/                   # Root directory (or MXSDK_HOME)
//!   catalog.json              # Default catalog location
//!   sdks/                     # Installed SDK versions
//!     4.6.0/                  # Version-specific installation
//!       bin/
//!         mxmlc               # Compiler launcher
//!       frameworks/
//!       lib/
//!   downloads/                # Temporary archives while fetching
//! ```
//!
//! The install directory of a version is a pure function of its canonical
//! string, which is what lets the presence check skip re-downloads.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable to override the default root directory.
pub const MXSDK_HOME_ENV: &str = "MXSDK_HOME";

/// Name of the compiler binary inside an SDK's bin path.
pub const COMPILER_BINARY: &str = "mxmlc";

/// Default catalog file name under the root directory.
const CATALOG_FILE: &str = "catalog.json";

/// Manages paths for SDK installations.
#[derive(Debug, Clone)]
pub struct SdkPaths {
    /// Root directory for all SDK data (`~/.mxsdk` or `MXSDK_HOME`).
    pub root: PathBuf,
    /// Directory containing installed SDK versions.
    pub sdks: PathBuf,
    /// Directory for in-flight downloads.
    pub downloads: PathBuf,
}

impl SdkPaths {
    /// Creates a new `SdkPaths` instance.
    ///
    /// The root directory is determined by:
    /// 1. The `MXSDK_HOME` environment variable if set
    /// 2. `configured` (the config file's `base_dir`) if given
    /// 3. On Windows: `%APPDATA%\mxsdk`
    /// 4. On Unix: `~/.mxsdk` in the user's home directory
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new(configured: Option<&Path>) -> Result<Self> {
        if let Ok(home) = std::env::var(MXSDK_HOME_ENV)
            && !home.is_empty()
        {
            return Ok(Self::with_root(PathBuf::from(home)));
        }

        if let Some(dir) = configured {
            return Ok(Self::with_root(dir.to_path_buf()));
        }

        #[cfg(windows)]
        let root = dirs::data_dir()
            .context("Cannot determine AppData directory. Set MXSDK_HOME environment variable.")?
            .join("mxsdk");

        #[cfg(not(windows))]
        let root = dirs::home_dir()
            .context("Cannot determine home directory. Set MXSDK_HOME environment variable.")?
            .join(".mxsdk");

        Ok(Self::with_root(root))
    }

    /// Creates a new `SdkPaths` instance with a specific root directory.
    #[must_use = "returns new paths instance without side effects"]
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            sdks: root.join("sdks"),
            downloads: root.join("downloads"),
            root,
        }
    }

    /// Returns the installation directory for a canonical version.
    #[must_use = "returns the path without side effects"]
    pub fn install_dir(&self, version: &str) -> PathBuf {
        self.sdks.join(version)
    }

    /// Returns the compiler location for a version and catalog bin path.
    #[must_use = "returns the path without side effects"]
    pub fn binary_path(&self, version: &str, binpath: &str) -> PathBuf {
        let mut path = self.install_dir(version);
        for segment in binpath.split(['/', '\\']).filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path.join(COMPILER_BINARY)
    }

    /// Returns the default catalog location under the root.
    #[must_use = "returns the path without side effects"]
    pub fn default_catalog(&self) -> PathBuf {
        self.root.join(CATALOG_FILE)
    }

    /// Returns a download path for an archive of the given version.
    ///
    /// The version is part of the name so concurrent fetches of different
    /// versions never share a temporary file.
    #[must_use = "returns the path without side effects"]
    pub fn download_path(&self, version: &str, filename: &str) -> PathBuf {
        self.downloads.join(format!("{version}-{filename}.part"))
    }

    /// Lists all installed SDK versions.
    ///
    /// Returns a semver-sorted list (oldest first) of directory names under
    /// `sdks/`. Non-directory entries are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the sdks directory cannot be read.
    pub fn list_installed_versions(&self) -> Result<Vec<String>> {
        if !self.sdks.exists() {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        let entries = std::fs::read_dir(&self.sdks)
            .with_context(|| format!("Failed to read sdks directory: {}", self.sdks.display()))?;

        for entry in entries {
            let entry = entry.with_context(|| "Failed to read directory entry")?;
            let path = entry.path();
            if path.is_dir()
                && let Some(name) = path.file_name()
                && let Some(name_str) = name.to_str()
            {
                versions.push(name_str.to_string());
            }
        }

        versions.sort_by(|a, b| {
            match (semver::Version::parse(a), semver::Version::parse(b)) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        });
        Ok(versions)
    }

    /// Checks if a specific SDK version directory exists.
    #[must_use = "returns installation status without side effects"]
    pub fn is_version_installed(&self, version: &str) -> bool {
        self.install_dir(version).is_dir()
    }
}
