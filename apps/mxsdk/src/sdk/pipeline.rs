//! SDK acquisition pipeline.
//!
//! [`Provisioner::acquire`] drives one version through
//! `Resolving -> Checking -> (SkipFetch | Fetching -> Normalizing) -> Fixing -> Ready`.
//! Any failure after the presence check removes the install directory
//! exactly once before the error is returned. A failed run never leaves a
//! tree that the next call would mistake for an installed SDK.
//!
//! Acquisitions of the same version are not serialized here; callers that
//! run several at once must do that themselves.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::SdkError;
use crate::sdk::catalog::{SdkCatalog, SdkCatalogEntry};
use crate::sdk::download::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_REQUEST_TIMEOUT_SECS, Fetcher, HttpFetcher, ProgressCallback,
    ProgressEvent,
};
use crate::sdk::invoke;
use crate::sdk::normalize::{self, DEFAULT_MAX_CONCURRENCY, NormalizeStats};
use crate::sdk::paths::SdkPaths;
use crate::sdk::permissions::{self, FixOutcome};
use crate::sdk::presence::{self, Presence};
use crate::sdk::version;

/// Pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Parsing the version and looking it up in the catalog.
    Resolving,
    /// Querying the install path.
    Checking,
    /// The SDK is already on disk; fetching is skipped.
    SkipFetch,
    /// Downloading and extracting.
    Fetching,
    /// Converting line endings.
    Normalizing,
    /// Verifying the binary and its execute bit.
    Fixing,
    /// The compiler is ready to run.
    Ready,
    /// The acquisition failed.
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resolving => "resolving",
            Self::Checking => "checking",
            Self::SkipFetch => "skip-fetch",
            Self::Fetching => "fetching",
            Self::Normalizing => "normalizing",
            Self::Fixing => "fixing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Observable pipeline event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionEvent {
    /// The pipeline entered a new stage.
    Stage(Stage),
    /// Download progress forwarded from the fetcher.
    Download(ProgressEvent),
    /// Line-ending normalization finished.
    Normalized(NormalizeStats),
    /// The execute-bit check finished.
    PermissionsFixed(FixOutcome),
    /// The install directory was removed after a failure.
    RolledBack {
        /// The removed directory.
        path: PathBuf,
    },
    /// The install directory could not be removed after a failure.
    RollbackFailed {
        /// The directory that is left behind.
        path: PathBuf,
        /// Why removal failed.
        error: String,
    },
}

/// Receiver of [`ProvisionEvent`]s.
pub type EventSink = Arc<dyn Fn(ProvisionEvent) + Send + Sync>;

/// Returns a sink that forwards every event to `tracing`.
#[must_use]
pub fn tracing_sink() -> EventSink {
    Arc::new(|event: ProvisionEvent| match event {
        ProvisionEvent::Stage(stage) => tracing::debug!(%stage, "pipeline stage"),
        ProvisionEvent::Download(ProgressEvent::Retrying {
            attempt,
            max_attempts,
        }) => tracing::info!(attempt, max_attempts, "retrying download"),
        ProvisionEvent::Download(progress) => tracing::trace!(?progress, "download"),
        ProvisionEvent::Normalized(stats) => tracing::debug!(%stats, "normalized sdk tree"),
        ProvisionEvent::PermissionsFixed(outcome) => {
            tracing::debug!(?outcome, "binary permissions checked");
        }
        ProvisionEvent::RolledBack { path } => {
            tracing::debug!(path = %path.display(), "rolled back install");
        }
        ProvisionEvent::RollbackFailed { path, error } => {
            tracing::debug!(path = %path.display(), %error, "rollback failed");
        }
    })
}

/// Tunables for a [`Provisioner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionerConfig {
    /// Maximum number of files converted concurrently.
    pub normalize_concurrency: usize,
    /// Download attempts before giving up.
    pub download_retries: u32,
    /// Download stall timeout in seconds, applied to connecting and to each body read.
    pub download_timeout_secs: u64,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            normalize_concurrency: DEFAULT_MAX_CONCURRENCY,
            download_retries: DEFAULT_MAX_ATTEMPTS,
            download_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// A ready-to-run SDK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkInstallation {
    /// Canonical version string.
    pub version: String,
    /// Root of the extracted SDK.
    pub install_path: PathBuf,
    /// Location of `mxmlc`.
    pub binary_path: PathBuf,
    /// Whether this acquisition downloaded the SDK (as opposed to reusing it).
    pub fetched: bool,
}

impl SdkInstallation {
    /// Runs the compiler with `args`.
    ///
    /// # Errors
    ///
    /// See [`invoke::exec`].
    pub async fn exec<I, S>(&self, args: I) -> Result<(), SdkError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        invoke::exec(&self.binary_path, args).await
    }
}

/// Post-fetch work on an install tree.
///
/// [`Provisioner`] calls [`normalize`](Preparer::normalize) right after a
/// fetch and [`fix_binary`](Preparer::fix_binary) on every acquisition.
/// Errors from either one roll the install directory back.
pub trait Preparer {
    /// Rewrites the text files under `install_path` to host line endings.
    fn normalize(
        &self,
        install_path: &Path,
        max_concurrency: usize,
    ) -> impl Future<Output = Result<NormalizeStats, SdkError>>;

    /// Makes sure `binary_path` can be executed.
    fn fix_binary(&self, binary_path: &Path) -> impl Future<Output = Result<FixOutcome, SdkError>>;
}

/// Preparer working on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostPreparer;

impl Preparer for HostPreparer {
    async fn normalize(
        &self,
        install_path: &Path,
        max_concurrency: usize,
    ) -> Result<NormalizeStats, SdkError> {
        normalize::normalize_tree(install_path, max_concurrency).await
    }

    async fn fix_binary(&self, binary_path: &Path) -> Result<FixOutcome, SdkError> {
        permissions::ensure_executable(binary_path).await
    }
}

/// Drives SDK acquisition for versions listed in a catalog.
pub struct Provisioner<F: Fetcher = HttpFetcher, P: Preparer = HostPreparer> {
    catalog: SdkCatalog,
    paths: SdkPaths,
    config: ProvisionerConfig,
    fetcher: F,
    preparer: P,
    sink: EventSink,
}

impl Provisioner<HttpFetcher> {
    /// Creates a provisioner that downloads over HTTP.
    #[must_use]
    pub fn new(catalog: SdkCatalog, paths: SdkPaths, config: ProvisionerConfig) -> Self {
        let fetcher = HttpFetcher::new(paths.clone())
            .with_max_attempts(config.download_retries)
            .with_timeout(Duration::from_secs(config.download_timeout_secs));
        Self::with_fetcher(catalog, paths, config, fetcher)
    }
}

impl<F: Fetcher> Provisioner<F> {
    /// Creates a provisioner with a custom fetcher.
    #[must_use]
    pub fn with_fetcher(
        catalog: SdkCatalog,
        paths: SdkPaths,
        config: ProvisionerConfig,
        fetcher: F,
    ) -> Self {
        Self {
            catalog,
            paths,
            config,
            fetcher,
            preparer: HostPreparer,
            sink: tracing_sink(),
        }
    }
}

impl<F: Fetcher, P: Preparer> Provisioner<F, P> {
    /// Replaces the post-fetch preparer.
    #[must_use]
    pub fn with_preparer<Q: Preparer>(self, preparer: Q) -> Provisioner<F, Q> {
        Provisioner {
            catalog: self.catalog,
            paths: self.paths,
            config: self.config,
            fetcher: self.fetcher,
            preparer,
            sink: self.sink,
        }
    }

    /// Replaces the event sink.
    #[must_use]
    pub fn with_sink(mut self, sink: EventSink) -> Self {
        self.sink = sink;
        self
    }

    /// The catalog versions are resolved against.
    #[must_use]
    pub fn catalog(&self) -> &SdkCatalog {
        &self.catalog
    }

    /// The directory layout installs are written to.
    #[must_use]
    pub fn paths(&self) -> &SdkPaths {
        &self.paths
    }

    /// Makes `version` available on disk and returns where its compiler is.
    ///
    /// # Errors
    ///
    /// - [`SdkError::InvalidVersion`] / [`SdkError::UnknownSdkVersion`] before
    ///   anything is touched
    /// - [`SdkError::CorruptInstall`] if a non-directory occupies the install
    ///   path; it is left in place
    /// - any fetch, normalization or permission error, after the install
    ///   directory has been rolled back
    pub async fn acquire(&self, version: &str) -> Result<SdkInstallation, SdkError> {
        self.emit(ProvisionEvent::Stage(Stage::Resolving));
        let (spec, entry) = match version::resolve(&self.catalog, version) {
            Ok(resolved) => resolved,
            Err(e) => return Err(self.fail(e)),
        };

        let install_path = self.paths.install_dir(spec.as_str());
        let binary_path = self.paths.binary_path(spec.as_str(), &entry.binpath);

        self.emit(ProvisionEvent::Stage(Stage::Checking));
        let presence = presence::check(&install_path).await;
        tracing::debug!(version = %spec, ?presence, path = %install_path.display(), "install presence");

        let result = match presence {
            Presence::NotADirectory => {
                return Err(self.fail(SdkError::CorruptInstall { path: install_path }));
            }
            Presence::Installed => {
                self.emit(ProvisionEvent::Stage(Stage::SkipFetch));
                self.finish(&binary_path).await
            }
            Presence::Absent => self.install(entry, &install_path, &binary_path).await,
        };

        if let Err(e) = result {
            if e.requires_rollback() {
                self.rollback(&install_path).await;
            }
            return Err(self.fail(e));
        }

        self.emit(ProvisionEvent::Stage(Stage::Ready));
        Ok(SdkInstallation {
            version: spec.as_str().to_string(),
            install_path,
            binary_path,
            fetched: presence == Presence::Absent,
        })
    }

    async fn install(
        &self,
        entry: &SdkCatalogEntry,
        install_path: &Path,
        binary_path: &Path,
    ) -> Result<(), SdkError> {
        self.emit(ProvisionEvent::Stage(Stage::Fetching));
        tracing::info!(version = %entry.version, url = %entry.url, "fetching sdk");
        self.fetcher
            .fetch(entry, install_path, self.download_progress())
            .await?;

        self.emit(ProvisionEvent::Stage(Stage::Normalizing));
        let stats = self
            .preparer
            .normalize(install_path, self.config.normalize_concurrency)
            .await?;
        self.emit(ProvisionEvent::Normalized(stats));

        self.finish(binary_path).await
    }

    async fn finish(&self, binary_path: &Path) -> Result<(), SdkError> {
        self.emit(ProvisionEvent::Stage(Stage::Fixing));

        let is_file = tokio::fs::metadata(binary_path)
            .await
            .is_ok_and(|meta| meta.is_file());
        if !is_file {
            return Err(SdkError::BinaryMissing {
                path: binary_path.to_path_buf(),
            });
        }

        let outcome = self.preparer.fix_binary(binary_path).await?;
        self.emit(ProvisionEvent::PermissionsFixed(outcome));
        Ok(())
    }

    async fn rollback(&self, install_path: &Path) {
        match tokio::fs::remove_dir_all(install_path).await {
            Ok(()) => {
                tracing::info!(path = %install_path.display(), "removed incomplete sdk install");
                self.emit(ProvisionEvent::RolledBack {
                    path: install_path.to_path_buf(),
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %install_path.display(), "nothing to roll back");
            }
            Err(e) => {
                tracing::warn!(
                    path = %install_path.display(),
                    error = %e,
                    "failed to remove incomplete sdk install"
                );
                self.emit(ProvisionEvent::RollbackFailed {
                    path: install_path.to_path_buf(),
                    error: e.to_string(),
                });
            }
        }
    }

    fn download_progress(&self) -> ProgressCallback {
        let sink = Arc::clone(&self.sink);
        Arc::new(move |event: ProgressEvent| sink(ProvisionEvent::Download(event)))
    }

    fn fail(&self, error: SdkError) -> SdkError {
        self.emit(ProvisionEvent::Stage(Stage::Failed));
        error
    }

    fn emit(&self, event: ProvisionEvent) {
        (self.sink)(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn temp_test_dir(name: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("mxsdk_test_{}_{}", name, rand::random::<u64>()));
        std::fs::create_dir_all(&dir).expect("Should create temp dir");
        dir
    }

    #[derive(Clone, Copy)]
    enum Behavior {
        /// Writes a complete SDK with a CRLF launcher lacking the execute bit.
        Succeed,
        /// Writes part of the tree, then fails like a dropped connection.
        FailMidDownload,
        /// Fails like a truncated archive.
        FailExtraction,
        /// Writes a tree with no compiler.
        OmitBinary,
    }

    struct FakeFetcher {
        behavior: Behavior,
        calls: Arc<AtomicUsize>,
    }

    impl FakeFetcher {
        fn new(behavior: Behavior) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    behavior,
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }
    }

    impl Fetcher for FakeFetcher {
        async fn fetch(
            &self,
            entry: &SdkCatalogEntry,
            install_path: &Path,
            progress: ProgressCallback,
        ) -> Result<(), SdkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            progress(ProgressEvent::Started {
                url: entry.url.clone(),
                total: Some(4),
            });

            let bin = install_path.join(&entry.binpath);
            std::fs::create_dir_all(&bin).expect("Should create bin dir");
            std::fs::write(install_path.join("flex-sdk-description.xml"), "<sdk/>\r\n")
                .expect("Should write");

            match self.behavior {
                Behavior::Succeed => {
                    let binary = bin.join("mxmlc");
                    std::fs::write(&binary, "#!/bin/sh\r\nexec java -jar mxmlc.jar \"$@\"\r\n")
                        .expect("Should write binary");
                    #[cfg(unix)]
                    {
                        use std::os::unix::fs::PermissionsExt;
                        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o644))
                            .expect("Should chmod");
                    }
                    progress(ProgressEvent::Completed);
                    Ok(())
                }
                Behavior::FailMidDownload => Err(SdkError::download("connection reset")),
                Behavior::FailExtraction => Err(SdkError::extraction("unexpected end of archive")),
                Behavior::OmitBinary => Ok(()),
            }
        }
    }

    #[derive(Clone, Copy)]
    enum Breakage {
        Normalize,
        Fix,
    }

    /// Runs the host preparer except for one stage, which fails.
    struct BrokenPreparer(Breakage);

    impl Preparer for BrokenPreparer {
        async fn normalize(
            &self,
            install_path: &Path,
            max_concurrency: usize,
        ) -> Result<NormalizeStats, SdkError> {
            match self.0 {
                Breakage::Normalize => Err(SdkError::Normalization {
                    stats: NormalizeStats {
                        processed: 1,
                        skipped: 0,
                        errored: 1,
                    },
                    message: "bin/mxmlc: Input/output error".to_string(),
                }),
                Breakage::Fix => HostPreparer.normalize(install_path, max_concurrency).await,
            }
        }

        async fn fix_binary(&self, binary_path: &Path) -> Result<FixOutcome, SdkError> {
            match self.0 {
                Breakage::Normalize => HostPreparer.fix_binary(binary_path).await,
                Breakage::Fix => Err(SdkError::PermissionFix {
                    path: binary_path.to_path_buf(),
                    source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                }),
            }
        }
    }

    fn catalog() -> SdkCatalog {
        SdkCatalog::from_json(
            r#"{"sdks": {
                "1.2.3": {"url": "https://example.org/sdk-1.2.3.zip"},
                "4.6.0": {"url": "https://example.org/flex_sdk_4.6.zip", "binpath": "bin"}
            }}"#,
        )
        .expect("Should parse catalog")
    }

    fn provisioner(
        root: &Path,
        behavior: Behavior,
    ) -> (Provisioner<FakeFetcher>, Arc<AtomicUsize>) {
        let (fetcher, calls) = FakeFetcher::new(behavior);
        let provisioner = Provisioner::with_fetcher(
            catalog(),
            SdkPaths::with_root(root.to_path_buf()),
            ProvisionerConfig::default(),
            fetcher,
        );
        (provisioner, calls)
    }

    fn recording_sink() -> (EventSink, Arc<Mutex<Vec<ProvisionEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&events);
        let sink: EventSink = Arc::new(move |event: ProvisionEvent| {
            recorded.lock().expect("Should lock").push(event);
        });
        (sink, events)
    }

    fn stages(events: &[ProvisionEvent]) -> Vec<Stage> {
        events
            .iter()
            .filter_map(|event| match event {
                ProvisionEvent::Stage(stage) => Some(*stage),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn fresh_install_runs_every_stage() {
        let root = temp_test_dir("pipeline_fresh");
        let (provisioner, calls) = provisioner(&root, Behavior::Succeed);
        let (sink, events) = recording_sink();
        let provisioner = provisioner.with_sink(sink);

        let sdk = provisioner.acquire("4.6.0").await.expect("Should install");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sdk.fetched);
        assert_eq!(sdk.install_path, root.join("sdks").join("4.6.0"));
        assert_eq!(sdk.binary_path, root.join("sdks").join("4.6.0").join("bin").join("mxmlc"));

        let events = events.lock().expect("Should lock");
        assert_eq!(
            stages(&events),
            vec![
                Stage::Resolving,
                Stage::Checking,
                Stage::Fetching,
                Stage::Normalizing,
                Stage::Fixing,
                Stage::Ready
            ]
        );
        assert!(events.contains(&ProvisionEvent::Download(ProgressEvent::Completed)));
        assert!(
            events
                .iter()
                .any(|e| matches!(e, ProvisionEvent::Normalized(stats) if stats.processed == 2))
        );

        let _ = std::fs::remove_dir_all(&root);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn fresh_install_normalizes_and_sets_execute_bit() {
        use std::os::unix::fs::PermissionsExt;

        let root = temp_test_dir("pipeline_exec_bit");
        let (provisioner, _) = provisioner(&root, Behavior::Succeed);

        let sdk = provisioner.acquire("v4.6.0").await.expect("Should install");

        let mode = std::fs::metadata(&sdk.binary_path)
            .expect("Should stat")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
        assert_eq!(
            std::fs::read_to_string(&sdk.binary_path).expect("Should read"),
            "#!/bin/sh\nexec java -jar mxmlc.jar \"$@\"\n"
        );

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn second_acquire_skips_fetch() {
        let root = temp_test_dir("pipeline_idempotent");
        let (provisioner, calls) = provisioner(&root, Behavior::Succeed);

        let first = provisioner.acquire("4.6.0").await.expect("Should install");
        let (sink, events) = recording_sink();
        let provisioner = provisioner.with_sink(sink);
        let second = provisioner.acquire("4.6.0").await.expect("Should reuse");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!second.fetched);
        assert_eq!(first.install_path, second.install_path);
        assert_eq!(first.binary_path, second.binary_path);
        assert_eq!(
            stages(&events.lock().expect("Should lock")),
            vec![
                Stage::Resolving,
                Stage::Checking,
                Stage::SkipFetch,
                Stage::Fixing,
                Stage::Ready
            ]
        );

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn download_failure_rolls_back_install_dir() {
        let root = temp_test_dir("pipeline_download_fail");
        let (provisioner, _) = provisioner(&root, Behavior::FailMidDownload);
        let (sink, events) = recording_sink();
        let provisioner = provisioner.with_sink(sink);

        let err = provisioner.acquire("1.2.3").await.unwrap_err();

        assert!(matches!(err, SdkError::Download { .. }));
        assert!(!root.join("sdks").join("1.2.3").exists());

        let events = events.lock().expect("Should lock");
        let rollbacks = events
            .iter()
            .filter(|e| matches!(e, ProvisionEvent::RolledBack { .. }))
            .count();
        assert_eq!(rollbacks, 1);
        assert_eq!(stages(&events).last(), Some(&Stage::Failed));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn extraction_failure_rolls_back_install_dir() {
        let root = temp_test_dir("pipeline_extract_fail");
        let (provisioner, _) = provisioner(&root, Behavior::FailExtraction);

        let err = provisioner.acquire("1.2.3").await.unwrap_err();

        assert!(matches!(err, SdkError::Extraction { .. }));
        assert!(!root.join("sdks").join("1.2.3").exists());

        let _ = std::fs::remove_dir_all(&root);
    }

    fn rollback_count(events: &[ProvisionEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, ProvisionEvent::RolledBack { .. }))
            .count()
    }

    #[tokio::test]
    async fn normalization_failure_rolls_back_install_dir() {
        let root = temp_test_dir("pipeline_normalize_fail");
        let (provisioner, calls) = provisioner(&root, Behavior::Succeed);
        let (sink, events) = recording_sink();
        let provisioner = provisioner
            .with_preparer(BrokenPreparer(Breakage::Normalize))
            .with_sink(sink);

        let err = provisioner.acquire("4.6.0").await.unwrap_err();

        assert!(matches!(err, SdkError::Normalization { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!root.join("sdks").join("4.6.0").exists());

        let events = events.lock().expect("Should lock");
        assert_eq!(rollback_count(&events), 1);
        assert_eq!(
            stages(&events),
            vec![
                Stage::Resolving,
                Stage::Checking,
                Stage::Fetching,
                Stage::Normalizing,
                Stage::Failed
            ]
        );

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn permission_fix_failure_rolls_back_install_dir() {
        let root = temp_test_dir("pipeline_fix_fail");
        let (provisioner, _) = provisioner(&root, Behavior::Succeed);
        let (sink, events) = recording_sink();
        let provisioner = provisioner
            .with_preparer(BrokenPreparer(Breakage::Fix))
            .with_sink(sink);

        let err = provisioner.acquire("4.6.0").await.unwrap_err();

        assert!(matches!(err, SdkError::PermissionFix { .. }));
        assert!(!root.join("sdks").join("4.6.0").exists());

        let events = events.lock().expect("Should lock");
        assert_eq!(rollback_count(&events), 1);
        assert!(
            events
                .iter()
                .any(|e| matches!(e, ProvisionEvent::Normalized(_)))
        );
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, ProvisionEvent::PermissionsFixed(_)))
        );
        assert_eq!(stages(&events).last(), Some(&Stage::Failed));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn missing_binary_rolls_back_and_next_acquire_refetches() {
        let root = temp_test_dir("pipeline_no_binary");
        let (provisioner, calls) = provisioner(&root, Behavior::OmitBinary);

        let err = provisioner.acquire("4.6.0").await.unwrap_err();
        assert!(matches!(err, SdkError::BinaryMissing { .. }));
        assert!(!root.join("sdks").join("4.6.0").exists());

        let _ = provisioner.acquire("4.6.0").await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn broken_existing_install_is_removed() {
        let root = temp_test_dir("pipeline_broken_existing");
        let install = root.join("sdks").join("4.6.0");
        std::fs::create_dir_all(install.join("frameworks")).expect("Should create dir");
        let (provisioner, calls) = provisioner(&root, Behavior::Succeed);

        let err = provisioner.acquire("4.6.0").await.unwrap_err();

        assert!(matches!(err, SdkError::BinaryMissing { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!install.exists());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn stray_file_is_corrupt_install_and_left_alone() {
        let root = temp_test_dir("pipeline_stray_file");
        std::fs::create_dir_all(root.join("sdks")).expect("Should create dir");
        let stray = root.join("sdks").join("4.6.0");
        std::fs::write(&stray, "not an sdk").expect("Should write");
        let (provisioner, calls) = provisioner(&root, Behavior::Succeed);

        let err = provisioner.acquire("4.6.0").await.unwrap_err();

        assert!(matches!(err, SdkError::CorruptInstall { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read_to_string(&stray).expect("Should read"), "not an sdk");

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn resolution_errors_touch_nothing() {
        let root = temp_test_dir("pipeline_resolution");
        let (provisioner, calls) = provisioner(&root, Behavior::Succeed);

        let err = provisioner.acquire("not-a-version").await.unwrap_err();
        assert!(matches!(err, SdkError::InvalidVersion { .. }));

        let err = provisioner.acquire("9.9.9").await.unwrap_err();
        assert!(matches!(err, SdkError::UnknownSdkVersion { .. }));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!root.join("sdks").exists());
        assert!(provisioner.catalog().get("1.2.3").is_some());
        assert_eq!(provisioner.paths().root, root);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn default_config_matches_stage_defaults() {
        let config = ProvisionerConfig::default();
        assert_eq!(config.normalize_concurrency, 100);
        assert_eq!(config.download_retries, 3);
        assert_eq!(config.download_timeout_secs, 300);
    }
}
