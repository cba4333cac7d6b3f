//! Execute-bit repair for the compiler binary.
//!
//! Archive extraction and line-ending conversion can both leave `mxmlc`
//! without its execute bit, so this runs last. On Windows file-mode bits are
//! meaningless and the check is skipped.

use std::path::Path;

use crate::errors::SdkError;

/// Mode applied when the owner-execute bit is missing: `rwxr-xr-x`.
pub const EXECUTABLE_MODE: u32 = 0o755;

/// Owner-execute bit.
#[cfg(unix)]
const OWNER_EXECUTE: u32 = 0o100;

/// What [`ensure_executable`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixOutcome {
    /// The owner-execute bit was already set.
    AlreadyExecutable,
    /// The mode was changed to [`EXECUTABLE_MODE`].
    Fixed,
    /// The platform has no file-mode bits.
    NotApplicable,
}

/// Ensures the owner-execute bit is set on `binary_path` (Unix only).
///
/// # Errors
///
/// Returns [`SdkError::PermissionFix`] if the file cannot be inspected or
/// its permissions cannot be changed.
#[cfg(unix)]
pub async fn ensure_executable(binary_path: &Path) -> Result<FixOutcome, SdkError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata =
        tokio::fs::metadata(binary_path)
            .await
            .map_err(|source| SdkError::PermissionFix {
                path: binary_path.to_path_buf(),
                source,
            })?;

    if metadata.permissions().mode() & OWNER_EXECUTE != 0 {
        return Ok(FixOutcome::AlreadyExecutable);
    }

    tracing::info!(path = %binary_path.display(), "enabling execution on mxmlc binary");
    tokio::fs::set_permissions(binary_path, std::fs::Permissions::from_mode(EXECUTABLE_MODE))
        .await
        .map_err(|source| SdkError::PermissionFix {
            path: binary_path.to_path_buf(),
            source,
        })?;

    Ok(FixOutcome::Fixed)
}

/// Sets executable permissions (no-op on Windows).
///
/// # Errors
///
/// Never fails on this platform.
#[cfg(not(unix))]
#[allow(clippy::unused_async)]
pub async fn ensure_executable(_binary_path: &Path) -> Result<FixOutcome, SdkError> {
    Ok(FixOutcome::NotApplicable)
}
