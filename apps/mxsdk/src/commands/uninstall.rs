//! Uninstall command for the mxsdk CLI.
//!
//! ## Usage
//!
//! ```bash
//! mxsdk uninstall 4.6.0
//! ```

use anyhow::{Context as _, Result, bail};
use clap::Args;

use super::{Context, canonical_version};

/// Arguments for the uninstall command.
#[derive(Args)]
pub struct UninstallArgs {
    /// Version to uninstall (e.g., "4.6.0").
    pub version: String,
}

/// Executes the uninstall command.
///
/// # Errors
///
/// Returns an error if:
/// - The version is malformed or not installed
/// - Directory removal fails
pub async fn execute(context: &Context, args: &UninstallArgs) -> Result<()> {
    let version = canonical_version(&args.version)?;

    if !context.paths.is_version_installed(&version) {
        bail!("SDK version {version} is not installed.");
    }

    println!("Uninstalling SDK version {version}...");

    let sdk_dir = context.paths.install_dir(&version);
    tokio::fs::remove_dir_all(&sdk_dir)
        .await
        .with_context(|| format!("Failed to remove SDK directory: {}", sdk_dir.display()))?;

    println!("SDK {version} uninstalled successfully.");

    Ok(())
}
