#![warn(clippy::pedantic)]

//! # mxsdk
//!
//! The `mxsdk` command fetches Flex SDKs on demand and runs their `mxmlc`
//! compiler.
//!
//! ## Subcommands
//!
//! - `install` - Download and prepare an SDK version
//! - `path` - Print the `mxmlc` location of a version, installing it if needed
//! - `exec` - Run `mxmlc` of a version with the given arguments
//! - `list` - List installed SDK versions
//! - `versions` - List versions available in the catalog
//! - `uninstall` - Remove an installed SDK version
//!
//! ## Examples
//!
//! Install an SDK:
//! ```bash
//! mxsdk install 4.6.0
//! ```
//!
//! Compile with it:
//! ```bash
//! mxsdk exec 4.6.0 -- -output=bin/Main.swf src/Main.mxml
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{Context, exec, install, list, path, uninstall, versions};
use mxsdk::errors::SdkError;
use mxsdk::sdk::invoke::signal_number;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter directive.
const MXSDK_LOG_ENV: &str = "MXSDK_LOG";

/// Flex SDK provisioning and compiler launcher.
#[derive(Parser)]
#[command(
    name = "mxsdk",
    author,
    version,
    about = "Fetch Flex SDKs on demand and run mxmlc",
    after_help = "\
CATALOG RESOLUTION:
    1. --catalog <path>
    2. MXSDK_CATALOG environment variable
    3. 'catalog' key in the config file
    4. <MXSDK_HOME>/catalog.json

ENVIRONMENT VARIABLES:
    MXSDK_HOME              SDK directory (default: ~/.mxsdk)
    MXSDK_CATALOG           Catalog file
    MXSDK_CONFIG            Config file (default: <config dir>/mxsdk/config.toml)
    MXSDK_LOG               Log filter, e.g. 'mxsdk=debug'"
)]
pub struct Cli {
    /// Catalog file mapping versions to download URLs.
    #[clap(long, global = true, value_name = "PATH")]
    pub catalog: Option<PathBuf>,

    /// Enable debug logging on stderr.
    #[clap(short, long, global = true, action = clap::ArgAction::SetTrue)]
    pub verbose: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for the mxsdk CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Install an SDK version.
    ///
    /// Downloads, unpacks and prepares the SDK if it is not installed yet,
    /// then prints the path of its mxmlc binary.
    Install(install::InstallArgs),

    /// Print the mxmlc path of an SDK version.
    ///
    /// Installs the SDK first when needed. Only the path is written to
    /// stdout, which makes the command usable in scripts.
    Path(path::PathArgs),

    /// Run mxmlc of an SDK version.
    ///
    /// Arguments after `--` are passed to the compiler unchanged. The exit
    /// code of the compiler becomes the exit code of mxsdk.
    Exec(exec::ExecArgs),

    /// List installed SDK versions.
    List,

    /// List SDK versions available in the catalog.
    ///
    /// Versions are sorted newest first; installed ones are marked.
    Versions(versions::VersionsArgs),

    /// Remove an installed SDK version.
    Uninstall(uninstall::UninstallArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let exit_code = handle_error(&e);
        std::process::exit(exit_code);
    }
}

/// Handles an error and returns the appropriate exit code.
///
/// For `ProcessExecution` errors, returns the compiler's exit code (or
/// `128 + signal` when it was killed) without printing anything; the compiler
/// already reported its own failure. For all other errors, prints the error
/// and returns exit code 1.
fn handle_error(e: &anyhow::Error) -> i32 {
    if let Some(SdkError::ProcessExecution { code, signal }) = e.downcast_ref::<SdkError>() {
        return match (code, signal) {
            (Some(code), _) => *code,
            (None, Some(signal)) => signal_number(signal).map_or(1, |n| 128 + n),
            (None, None) => 1,
        };
    }
    eprintln!("Error: {e:?}");
    1
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("mxsdk=debug")
    } else {
        EnvFilter::try_from_env(MXSDK_LOG_ENV).unwrap_or_else(|_| EnvFilter::new("mxsdk=warn"))
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let context = Context::load(cli.catalog)?;

    match cli.command {
        Commands::Install(args) => install::execute(&context, &args).await,
        Commands::Path(args) => path::execute(&context, &args).await,
        Commands::Exec(args) => exec::execute(&context, &args).await,
        Commands::List => list::execute(&context),
        Commands::Versions(args) => versions::execute(&context, &args),
        Commands::Uninstall(args) => uninstall::execute(&context, &args).await,
    }
}
