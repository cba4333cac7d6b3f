//! Exec command for the mxsdk CLI.
//!
//! Acquires an SDK version and runs its `mxmlc` with the remaining
//! arguments. Compiler output goes straight to the terminal.
//!
//! ## Usage
//!
//! ```bash
//! mxsdk exec 4.6.0 -- -output=bin/Main.swf src/Main.mxml
//! ```

use anyhow::Result;
use clap::Args;

use super::{Context, console_sink};

/// Arguments for the exec command.
#[derive(Args)]
pub struct ExecArgs {
    /// SDK version (e.g., "4.6.0").
    pub version: String,

    /// Arguments passed to mxmlc.
    #[clap(last = true)]
    pub args: Vec<String>,
}

/// Executes the exec command.
///
/// # Errors
///
/// Returns an error if the SDK cannot be acquired or the compiler fails.
/// A compiler failure carries its exit status so the process can mirror it.
pub async fn execute(context: &Context, args: &ExecArgs) -> Result<()> {
    let provisioner = context.provisioner()?.with_sink(console_sink());
    let sdk = provisioner.acquire(&args.version).await?;
    sdk.exec(&args.args).await?;
    Ok(())
}
