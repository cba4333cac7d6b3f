//! User configuration for the `mxsdk` CLI.
//!
//! Configuration lives in an optional TOML file, by default
//! `<config_dir>/mxsdk/config.toml` (`~/.config/mxsdk/config.toml` on Linux).
//! The `MXSDK_CONFIG` environment variable points at a different file.
//!
//! ## Config Format
//!
//! ```toml
//! base_dir = "/opt/mxsdk"
//! catalog = "/etc/mxsdk/catalog.json"
//! normalize_concurrency = 100
//! download_retries = 3
//! download_timeout_secs = 300
//! ```
//!
//! Every key is optional.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::sdk::download::{DEFAULT_MAX_ATTEMPTS, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::sdk::normalize::DEFAULT_MAX_CONCURRENCY;
use crate::sdk::paths::SdkPaths;
use crate::sdk::pipeline::ProvisionerConfig;

/// Environment variable naming an explicit config file.
pub const MXSDK_CONFIG_ENV: &str = "MXSDK_CONFIG";

/// Environment variable naming the catalog file.
pub const MXSDK_CATALOG_ENV: &str = "MXSDK_CATALOG";

const fn default_normalize_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

const fn default_download_retries() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

const fn default_download_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

/// Contents of `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Root for installed SDKs; `MXSDK_HOME` takes precedence.
    #[serde(default)]
    pub base_dir: Option<PathBuf>,

    /// Catalog file; `--catalog` and `MXSDK_CATALOG` take precedence.
    #[serde(default)]
    pub catalog: Option<PathBuf>,

    /// Maximum number of files converted concurrently.
    #[serde(default = "default_normalize_concurrency")]
    pub normalize_concurrency: usize,

    /// Download attempts before giving up.
    #[serde(default = "default_download_retries")]
    pub download_retries: u32,

    /// Download stall timeout in seconds, applied to connecting and to each body read.
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: None,
            catalog: None,
            normalize_concurrency: DEFAULT_MAX_CONCURRENCY,
            download_retries: DEFAULT_MAX_ATTEMPTS,
            download_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Loads the user configuration.
    ///
    /// A missing file at the default location yields [`Config::default`].
    /// A file named by `MXSDK_CONFIG` must exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var(MXSDK_CONFIG_ENV)
            && !path.is_empty()
        {
            return Self::from_file(Path::new(&path));
        }

        match default_config_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Reads and parses a config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parses config TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not valid TOML for this schema.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid config TOML")
    }

    /// Resolves the SDK directory layout.
    ///
    /// # Errors
    ///
    /// Returns an error if no root directory can be determined.
    pub fn sdk_paths(&self) -> Result<SdkPaths> {
        SdkPaths::new(self.base_dir.as_deref())
    }

    /// Returns the pipeline tunables.
    #[must_use]
    pub fn provisioner_config(&self) -> ProvisionerConfig {
        ProvisionerConfig {
            normalize_concurrency: self.normalize_concurrency,
            download_retries: self.download_retries,
            download_timeout_secs: self.download_timeout_secs,
        }
    }

    /// Picks the catalog file.
    ///
    /// Priority: `cli_override`, `MXSDK_CATALOG`, the `catalog` key, then
    /// `catalog.json` under the SDK root.
    #[must_use]
    pub fn catalog_path(&self, cli_override: Option<&Path>, paths: &SdkPaths) -> PathBuf {
        if let Some(path) = cli_override {
            return path.to_path_buf();
        }
        if let Ok(path) = std::env::var(MXSDK_CATALOG_ENV)
            && !path.is_empty()
        {
            return PathBuf::from(path);
        }
        self.catalog
            .clone()
            .unwrap_or_else(|| paths.default_catalog())
    }
}

/// Returns the default config file location, if a config dir exists.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("mxsdk").join("config.toml"))
}
