//! Command modules for the mxsdk CLI.
//!
//! ## SDK Acquisition Commands
//!
//! - [`install`] - Install an SDK version with progress output
//! - [`path`] - Print the compiler path of an SDK version
//! - [`exec`] - Run the compiler of an SDK version
//!
//! ## SDK Management Commands
//!
//! - [`list`] - List installed SDK versions
//! - [`versions`] - List catalog versions
//! - [`uninstall`] - Remove an installed SDK version

pub mod exec;
pub mod install;
pub mod list;
pub mod path;
pub mod uninstall;
pub mod versions;

use anyhow::{Context as _, Result};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use mxsdk::config::Config;
use mxsdk::sdk::download::{ProgressState, format_bytes};
use mxsdk::sdk::{
    EventSink, ProgressEvent, ProvisionEvent, Provisioner, SdkCatalog, SdkPaths, Stage,
};

/// Settings shared by every command.
pub struct Context {
    /// User configuration.
    pub config: Config,
    /// SDK directory layout.
    pub paths: SdkPaths,
    /// Catalog file chosen by `--catalog`, env or config.
    pub catalog_path: PathBuf,
}

impl Context {
    /// Loads configuration and resolves directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file is invalid or no SDK root can be
    /// determined.
    pub fn load(catalog_override: Option<PathBuf>) -> Result<Self> {
        let config = Config::load()?;
        let paths = config.sdk_paths()?;
        let catalog_path = config.catalog_path(catalog_override.as_deref(), &paths);
        Ok(Self {
            config,
            paths,
            catalog_path,
        })
    }

    /// Reads the catalog file.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog is missing or malformed.
    pub fn catalog(&self) -> Result<SdkCatalog> {
        tracing::debug!(path = %self.catalog_path.display(), "loading catalog");
        Ok(SdkCatalog::load(&self.catalog_path)?)
    }

    /// Builds an HTTP-backed provisioner.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded.
    pub fn provisioner(&self) -> Result<Provisioner> {
        Ok(Provisioner::new(
            self.catalog()?,
            self.paths.clone(),
            self.config.provisioner_config(),
        ))
    }
}

/// Parses a user-supplied version into its canonical directory name.
pub fn canonical_version(input: &str) -> Result<String> {
    let spec = mxsdk::sdk::VersionSpec::parse(input)
        .with_context(|| format!("Cannot interpret '{input}' as an SDK version"))?;
    Ok(spec.as_str().to_string())
}

/// Returns a sink that prints pipeline progress to stderr.
///
/// Stdout is left alone so the binary path printed afterwards stays
/// machine-readable.
pub fn console_sink() -> EventSink {
    let total = Arc::new(Mutex::new(None::<u64>));
    Arc::new(move |event: ProvisionEvent| match event {
        ProvisionEvent::Stage(Stage::SkipFetch) => eprintln!("SDK already installed."),
        ProvisionEvent::Stage(Stage::Normalizing) => eprintln!("Normalizing line endings..."),
        ProvisionEvent::Stage(Stage::Fixing) => eprintln!("Checking compiler binary..."),
        ProvisionEvent::Stage(_) | ProvisionEvent::PermissionsFixed(_) => {}
        ProvisionEvent::Download(ProgressEvent::Started { url, total: size }) => {
            if let Ok(mut total) = total.lock() {
                *total = size;
            }
            eprintln!("Downloading from {url}...");
        }
        ProvisionEvent::Download(ProgressEvent::Progress {
            downloaded, speed, ..
        }) => {
            let size = total.lock().ok().and_then(|total| *total);
            print_progress(downloaded, size, speed);
        }
        ProvisionEvent::Download(ProgressEvent::Retrying {
            attempt,
            max_attempts,
        }) => {
            eprintln!();
            eprintln!("Download failed, retrying ({attempt}/{max_attempts})...");
        }
        ProvisionEvent::Download(ProgressEvent::Completed) => {
            eprintln!();
            eprintln!("Extracting...");
        }
        ProvisionEvent::Download(ProgressEvent::Failed { .. }) => eprintln!(),
        ProvisionEvent::Normalized(stats) => {
            if stats.processed > 0 {
                eprintln!("Normalized {stats}.");
            }
        }
        ProvisionEvent::RolledBack { path } => {
            eprintln!("Removed incomplete install at {}.", path.display());
        }
        ProvisionEvent::RollbackFailed { path, error } => {
            eprintln!(
                "Warning: could not remove incomplete install at {}: {error}",
                path.display()
            );
        }
    })
}

/// Prints a simple text-based progress line.
fn print_progress(downloaded: u64, total: Option<u64>, speed: u64) {
    let state = ProgressState {
        expected: total,
        received: downloaded,
    };
    let downloaded_str = format_bytes(downloaded);
    let speed_str = format!("{}/s", format_bytes(speed));

    match (state.percent(), total) {
        (Some(percent), Some(total)) => eprint!(
            "\r{downloaded_str}/{} ({percent}%) {speed_str}     ",
            format_bytes(total)
        ),
        _ => eprint!("\r{downloaded_str} {speed_str}     "),
    }
    let _ = std::io::stderr().flush();
}
