//! Compiler invocation.
//!
//! The binary is spawned directly with a literal argument list (no shell) and
//! inherits the caller's stdio, so compiler diagnostics stream straight to the
//! terminal.

use std::ffi::OsStr;
use std::path::Path;
use std::process::ExitStatus;

use tokio::process::Command;

use crate::errors::SdkError;

/// Signals whose numbers are the same on Linux and the BSDs.
const SIGNAL_NAMES: &[(i32, &str)] = &[
    (1, "SIGHUP"),
    (2, "SIGINT"),
    (3, "SIGQUIT"),
    (4, "SIGILL"),
    (5, "SIGTRAP"),
    (6, "SIGABRT"),
    (8, "SIGFPE"),
    (9, "SIGKILL"),
    (11, "SIGSEGV"),
    (13, "SIGPIPE"),
    (14, "SIGALRM"),
    (15, "SIGTERM"),
];

/// Runs `binary` with `args` and waits for it to finish.
///
/// # Errors
///
/// - [`SdkError::Spawn`] if the process could not be started
/// - [`SdkError::ProcessExecution`] if it exited non-zero or was killed
pub async fn exec<I, S>(binary: &Path, args: I) -> Result<(), SdkError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    tracing::debug!(binary = %binary.display(), "spawning compiler");

    let status = Command::new(binary)
        .args(args)
        .status()
        .await
        .map_err(|source| SdkError::Spawn {
            path: binary.to_path_buf(),
            source,
        })?;

    check_status(status)
}

fn check_status(status: ExitStatus) -> Result<(), SdkError> {
    if status.success() {
        return Ok(());
    }

    if let Some(code) = status.code() {
        return Err(SdkError::exit_code(code));
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Err(SdkError::signal(signal_name(signal)));
        }
    }

    Err(SdkError::ProcessExecution {
        code: None,
        signal: None,
    })
}

/// Returns the conventional name of `signal`, e.g. `SIGKILL` for 9.
///
/// Numbers outside the portable set are rendered as `SIG<n>`.
#[must_use]
pub fn signal_name(signal: i32) -> String {
    SIGNAL_NAMES
        .iter()
        .find(|(number, _)| *number == signal)
        .map_or_else(|| format!("SIG{signal}"), |(_, name)| (*name).to_string())
}

/// Inverse of [`signal_name`].
#[must_use]
pub fn signal_number(name: &str) -> Option<i32> {
    if let Some((number, _)) = SIGNAL_NAMES.iter().find(|(_, known)| *known == name) {
        return Some(*number);
    }
    name.strip_prefix("SIG")?.parse().ok()
}
