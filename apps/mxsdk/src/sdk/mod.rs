//! On-demand Flex SDK provisioning.
//!
//! This module turns a version string into a runnable `mxmlc`: it resolves
//! the version against a catalog, downloads and unpacks the SDK when it is
//! not on disk yet, repairs line endings and the execute bit, and rolls the
//! install directory back if any of that fails.
//!
//! ## Module Structure
//!
//! - [`catalog`] - Version to archive mapping
//! - [`version`] - Version parsing and catalog lookup
//! - [`paths`] - Install directory layout
//! - [`presence`] - Install presence check
//! - [`download`] - HTTP download with progress tracking
//! - [`verify`] - SHA256 checksum verification
//! - [`archive`] - ZIP and tar.gz archive extraction
//! - [`normalize`] - Line-ending conversion across the SDK tree
//! - [`permissions`] - Execute-bit repair
//! - [`pipeline`] - Stage orchestration and rollback
//! - [`invoke`] - Compiler process execution
//! - [`callback`] - Callback-style wrappers

pub mod archive;
pub mod callback;
pub mod catalog;
pub mod download;
pub mod invoke;
pub mod normalize;
pub mod paths;
pub mod permissions;
pub mod pipeline;
pub mod presence;
pub mod verify;
pub mod version;

pub use callback::{acquire_with_callback, exec_with_callback};
pub use catalog::{SdkCatalog, SdkCatalogEntry};
pub use download::{Fetcher, HttpFetcher, ProgressCallback, ProgressEvent};
pub use normalize::NormalizeStats;
pub use paths::SdkPaths;
pub use permissions::FixOutcome;
pub use pipeline::{
    EventSink, HostPreparer, Preparer, ProvisionEvent, Provisioner, ProvisionerConfig,
    SdkInstallation, Stage,
};
pub use version::VersionSpec;
