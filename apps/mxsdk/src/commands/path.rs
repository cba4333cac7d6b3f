//! Path command for the mxsdk CLI.
//!
//! Prints only the compiler path, installing the SDK first if needed.
//!
//! ## Usage
//!
//! ```bash
//! MXMLC="$(mxsdk path 4.6.0)"
//! ```

use anyhow::Result;
use clap::Args;

use super::Context;

/// Arguments for the path command.
#[derive(Args)]
pub struct PathArgs {
    /// SDK version (e.g., "4.6.0").
    pub version: String,
}

/// Executes the path command.
///
/// # Errors
///
/// Returns an error if the SDK cannot be acquired.
pub async fn execute(context: &Context, args: &PathArgs) -> Result<()> {
    let sdk = context.provisioner()?.acquire(&args.version).await?;
    println!("{}", sdk.binary_path.display());
    Ok(())
}
