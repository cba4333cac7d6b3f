//! Install presence check.

use std::io::ErrorKind;
use std::path::Path;

/// What a single metadata query found at an install path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// The path is a directory: the SDK is treated as installed.
    Installed,
    /// Nothing usable is there; the SDK must be fetched.
    Absent,
    /// Something other than a directory occupies the path.
    NotADirectory,
}

/// Inspects `path` with one `metadata` call.
///
/// Errors other than "not found" (for instance a permission problem on a
/// parent directory) are reported as [`Presence::Absent`]; the fetch that
/// follows will surface the real cause when it tries to create the path.
pub async fn check(path: &Path) -> Presence {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => Presence::Installed,
        Ok(_) => Presence::NotADirectory,
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                tracing::debug!(path = %path.display(), error = %e, "install path not accessible");
            }
            Presence::Absent
        }
    }
}
