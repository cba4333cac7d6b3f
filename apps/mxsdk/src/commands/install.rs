//! Install command for the mxsdk CLI.
//!
//! Downloads and prepares an SDK version, printing progress on stderr and
//! the compiler path on stdout.
//!
//! ## Usage
//!
//! ```bash
//! mxsdk install 4.6.0
//! mxsdk install v4.16.1 --catalog ./catalog.json
//! ```

use anyhow::Result;
use clap::Args;

use super::{Context, console_sink};

/// Arguments for the install command.
#[derive(Args)]
pub struct InstallArgs {
    /// Version to install (e.g., "4.6.0").
    pub version: String,
}

/// Executes the install command.
///
/// # Process
///
/// 1. Load the catalog
/// 2. Resolve the version
/// 3. Download and extract unless already installed
/// 4. Normalize line endings and fix the compiler's execute bit
/// 5. Print the compiler path
///
/// # Errors
///
/// Returns an error if any pipeline stage fails. Partially written installs
/// are removed before the error is reported.
pub async fn execute(context: &Context, args: &InstallArgs) -> Result<()> {
    let provisioner = context.provisioner()?.with_sink(console_sink());
    let sdk = provisioner.acquire(&args.version).await?;

    if sdk.fetched {
        eprintln!("SDK {} installed successfully.", sdk.version);
    }
    println!("{}", sdk.binary_path.display());

    Ok(())
}
