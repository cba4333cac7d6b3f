//! Error types for SDK provisioning.
//!
//! Every stage of the acquisition pipeline collapses its failures into one
//! variant of [`SdkError`]. The variant tells the orchestrator whether a
//! rollback is due (see [`SdkError::requires_rollback`]) and tells the CLI
//! which exit code to report.

use std::path::PathBuf;
use thiserror::Error;

use crate::sdk::normalize::NormalizeStats;

/// Boxed source error carried by transport and codec failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Consolidated error type for SDK acquisition and compiler invocation.
#[derive(Debug, Error)]
pub enum SdkError {
    /// The requested version does not follow semantic-version syntax.
    #[error("invalid version '{input}' (should match SemVer syntax)")]
    InvalidVersion {
        /// The raw user input.
        input: String,
    },

    /// The version is well formed but the catalog has no entry for it.
    #[error("unknown sdk version: {version}")]
    UnknownSdkVersion {
        /// Canonical version string.
        version: String,
    },

    /// The catalog could not be located or parsed.
    #[error("catalog error: {message}")]
    Catalog {
        /// Description of the catalog problem.
        message: String,
    },

    /// The install path exists but is not a directory.
    #[error("install path is not a directory: {}", path.display())]
    CorruptInstall {
        /// The offending path.
        path: PathBuf,
    },

    /// Network, HTTP status, write or checksum failure while fetching.
    #[error("download error: {message}")]
    Download {
        /// Description of the download error.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<BoxError>,
    },

    /// The archive was corrupt, truncated or of an unsupported format.
    #[error("extraction error: {message}")]
    Extraction {
        /// Description of the extraction error.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<BoxError>,
    },

    /// One or more files failed line-ending conversion.
    #[error("line-ending normalization failed: {message} ({stats})")]
    Normalization {
        /// Aggregate counts at the time of failure.
        stats: NormalizeStats,
        /// Description of the first failure.
        message: String,
    },

    /// The compiler binary is absent or not a regular file.
    #[error("mxmlc binary unavailable in the sdk: {}", path.display())]
    BinaryMissing {
        /// Expected binary location.
        path: PathBuf,
    },

    /// The execute bit could not be inspected or set.
    #[error("unable to fix permissions for {}", path.display())]
    PermissionFix {
        /// The binary whose mode could not be changed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The compiler ran but did not exit cleanly.
    #[error("{}", describe_termination(*code, signal.as_deref()))]
    ProcessExecution {
        /// Exit code, when the process exited normally.
        code: Option<i32>,
        /// Signal name, when the process was killed by a signal.
        signal: Option<String>,
    },

    /// The compiler process could not be started at all.
    #[error("failed to execute {}", path.display())]
    Spawn {
        /// The binary that failed to start.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

fn describe_termination(code: Option<i32>, signal: Option<&str>) -> String {
    match (code, signal) {
        (_, Some(signal)) => format!("process terminated by signal {signal}"),
        (Some(code), None) => format!("process exited with code {code}"),
        (None, None) => "process exited abnormally".to_string(),
    }
}

impl SdkError {
    /// Creates a new `InvalidVersion` error.
    #[must_use]
    pub fn invalid_version(input: impl Into<String>) -> Self {
        Self::InvalidVersion {
            input: input.into(),
        }
    }

    /// Creates a new `UnknownSdkVersion` error.
    #[must_use]
    pub fn unknown_version(version: impl Into<String>) -> Self {
        Self::UnknownSdkVersion {
            version: version.into(),
        }
    }

    /// Creates a new `Catalog` error.
    #[must_use]
    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog {
            message: message.into(),
        }
    }

    /// Creates a new `Download` error.
    #[must_use]
    pub fn download(message: impl Into<String>) -> Self {
        Self::Download {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new `Download` error with a source error.
    #[must_use]
    pub fn download_with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Download {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates a new `Extraction` error.
    #[must_use]
    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new `Extraction` error with a source error.
    #[must_use]
    pub fn extraction_with_source(
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Extraction {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates a new `ProcessExecution` error for a non-zero exit code.
    #[must_use]
    pub const fn exit_code(code: i32) -> Self {
        Self::ProcessExecution {
            code: Some(code),
            signal: None,
        }
    }

    /// Creates a new `ProcessExecution` error for a signal termination.
    #[must_use]
    pub fn signal(name: impl Into<String>) -> Self {
        Self::ProcessExecution {
            code: None,
            signal: Some(name.into()),
        }
    }

    /// Returns whether the pipeline must remove the install directory
    /// before surfacing this error.
    #[must_use]
    pub fn requires_rollback(&self) -> bool {
        matches!(
            self,
            Self::Download { .. }
                | Self::Extraction { .. }
                | Self::Normalization { .. }
                | Self::BinaryMissing { .. }
                | Self::PermissionFix { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_version_displays_input() {
        let err = SdkError::invalid_version("not-a-version");
        assert_eq!(
            err.to_string(),
            "invalid version 'not-a-version' (should match SemVer syntax)"
        );
    }

    #[test]
    fn unknown_version_displays_version() {
        let err = SdkError::unknown_version("9.9.9");
        assert_eq!(err.to_string(), "unknown sdk version: 9.9.9");
    }

    #[test]
    fn download_error_displays_message() {
        let err = SdkError::download("connection refused");
        assert_eq!(err.to_string(), "download error: connection refused");
    }

    #[test]
    fn exit_code_displays_code() {
        let err = SdkError::exit_code(2);
        assert_eq!(err.to_string(), "process exited with code 2");
    }

    #[test]
    fn signal_displays_name() {
        let err = SdkError::signal("SIGKILL");
        assert_eq!(err.to_string(), "process terminated by signal SIGKILL");
    }

    #[test]
    fn normalization_error_includes_stats() {
        let err = SdkError::Normalization {
            stats: NormalizeStats {
                processed: 3,
                skipped: 1,
                errored: 2,
            },
            message: "permission denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "line-ending normalization failed: permission denied \
             (3 processed, 1 skipped, 2 errored)"
        );
    }

    #[test]
    fn only_post_creation_errors_require_rollback() {
        assert!(!SdkError::invalid_version("x").requires_rollback());
        assert!(!SdkError::unknown_version("1.0.0").requires_rollback());
        assert!(
            !SdkError::CorruptInstall {
                path: PathBuf::from("/tmp/sdk")
            }
            .requires_rollback()
        );
        assert!(SdkError::download("x").requires_rollback());
        assert!(SdkError::extraction("x").requires_rollback());
        assert!(
            SdkError::BinaryMissing {
                path: PathBuf::from("/tmp/sdk/bin/mxmlc")
            }
            .requires_rollback()
        );
        assert!(!SdkError::exit_code(1).requires_rollback());
    }
}
