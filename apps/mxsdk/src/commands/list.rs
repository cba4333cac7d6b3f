//! List command for the mxsdk CLI.
//!
//! ## Usage
//!
//! ```bash
//! mxsdk list
//! ```
//!
//! ## Output Format
//!
//! ```text
//! Installed SDKs:
//!
//!   4.6.0
//!   4.16.1
//! ```

use anyhow::Result;

use super::Context;

/// Executes the list command.
///
/// # Errors
///
/// Returns an error if the sdks directory cannot be read.
pub fn execute(context: &Context) -> Result<()> {
    let versions = context.paths.list_installed_versions()?;

    if versions.is_empty() {
        println!("No SDKs installed.");
        println!();
        println!("Run 'mxsdk install <version>' to install one.");
        return Ok(());
    }

    println!("Installed SDKs:");
    println!();
    for version in &versions {
        println!("  {version}");
    }

    Ok(())
}
