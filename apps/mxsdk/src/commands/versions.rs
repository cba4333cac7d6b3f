//! Versions command for the mxsdk CLI.
//!
//! Lists the SDK versions in the catalog, newest first, and marks the ones
//! that are installed.
//!
//! ## Usage
//!
//! ```bash
//! mxsdk versions          # Human-readable list
//! mxsdk versions --json   # Output in JSON format
//! ```
//!
//! ## Output Format
//!
//! ```text
//! Available SDK versions:
//!
//!   4.16.1 *
//!   4.6.0
//!
//!   * = installed
//! ```

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::Context;

/// Arguments for the versions command.
#[derive(Args)]
pub struct VersionsArgs {
    /// Show versions in JSON format.
    #[clap(long, short = 'j')]
    pub json: bool,
}

/// Version information for JSON output.
#[derive(Debug, Clone, Serialize)]
struct VersionInfo {
    version: String,
    url: String,
    installed: bool,
}

/// Executes the versions command.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded.
pub fn execute(context: &Context, args: &VersionsArgs) -> Result<()> {
    let catalog = context.catalog()?;
    let infos: Vec<VersionInfo> = catalog
        .sorted_entries()
        .into_iter()
        .map(|entry| VersionInfo {
            version: entry.version.clone(),
            url: entry.url.clone(),
            installed: context.paths.is_version_installed(&entry.version),
        })
        .collect();

    if args.json {
        let json = serde_json::to_string_pretty(&infos)?;
        println!("{json}");
    } else {
        output_text(&infos);
    }

    Ok(())
}

fn output_text(infos: &[VersionInfo]) {
    if infos.is_empty() {
        println!("No versions available.");
        return;
    }

    println!("Available SDK versions:");
    println!();

    let mut any_installed = false;
    for info in infos {
        let marker = if info.installed {
            any_installed = true;
            " *"
        } else {
            ""
        };
        println!("  {}{marker}", info.version);
    }

    if any_installed {
        println!();
        println!("  * = installed");
    }
}
