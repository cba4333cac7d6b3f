//! SDK fetching: HTTP download with progress, then extraction.
//!
//! The [`Fetcher`] trait is the seam between the pipeline and the transport.
//! [`HttpFetcher`] is the production implementation; tests substitute their
//! own to simulate network or archive failures.
//!
//! ## Features
//!
//! - Streaming downloads with progress callbacks
//! - Automatic retry with exponential backoff (3 attempts by default)
//! - Downloads to a temporary file, which is removed once extracted
//! - Configurable stall timeout: a connection or a body read that makes no
//!   progress for that long fails the attempt, however long the transfer runs
//! - Optional SHA256 verification of the archive

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use rand::Rng;
use tokio::io::AsyncWriteExt;

use crate::errors::SdkError;
use crate::sdk::archive::extract_archive;
use crate::sdk::catalog::SdkCatalogEntry;
use crate::sdk::paths::SdkPaths;
use crate::sdk::verify::verify_checksum;

/// Progress event emitted during downloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The server answered and the body is about to stream.
    Started {
        /// The URL being downloaded.
        url: String,
        /// Expected size from `Content-Length`, when the server sent one.
        total: Option<u64>,
    },
    /// More bytes arrived.
    Progress {
        /// Bytes received so far in this attempt; never decreases.
        downloaded: u64,
        /// Bytes received since the previous `Progress` event.
        increment: u64,
        /// Current download speed in bytes per second.
        speed: u64,
    },
    /// A failed attempt is about to be retried.
    Retrying {
        /// The upcoming attempt number (1-based).
        attempt: u32,
        /// Total attempts allowed.
        max_attempts: u32,
    },
    /// Download completed successfully.
    Completed,
    /// Download failed after all attempts.
    Failed {
        /// Error description.
        error: String,
    },
}

/// Callback type for receiving progress updates during downloads.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Returns a callback that discards every event.
#[must_use]
pub fn silent_progress() -> ProgressCallback {
    Arc::new(|_: ProgressEvent| {})
}

/// Byte counters for a single download attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressState {
    /// Size announced by the server, if any.
    pub expected: Option<u64>,
    /// Bytes received so far.
    pub received: u64,
}

impl ProgressState {
    /// Creates counters for a download of `expected` bytes.
    #[must_use]
    pub fn new(expected: Option<u64>) -> Self {
        Self {
            expected,
            received: 0,
        }
    }

    /// Records a received chunk and returns the new total.
    pub fn record(&mut self, len: u64) -> u64 {
        self.received = self.received.saturating_add(len);
        self.received
    }

    /// Returns completion in percent, or `None` when the size is unknown.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn percent(&self) -> Option<u8> {
        match self.expected {
            Some(0) | None => None,
            Some(total) => Some((self.received.min(total) * 100 / total) as u8),
        }
    }
}

/// Downloads an SDK archive and unpacks it into an install directory.
pub trait Fetcher {
    /// Fetches `entry` into `install_path`, creating the directory.
    ///
    /// On success `install_path` holds the fully extracted SDK tree. On
    /// failure the directory may be partially populated; removing it is the
    /// caller's job.
    fn fetch(
        &self,
        entry: &SdkCatalogEntry,
        install_path: &Path,
        progress: ProgressCallback,
    ) -> impl Future<Output = Result<(), SdkError>>;
}

/// Default number of download attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default stall timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Base delay between retries in milliseconds.
const BASE_RETRY_DELAY_MS: u64 = 1000;

/// Minimum interval between progress callback invocations in milliseconds.
const PROGRESS_CALLBACK_INTERVAL_MS: u128 = 100;

/// User-Agent header for HTTP requests.
const USER_AGENT: &str = concat!("mxsdk/", env!("CARGO_PKG_VERSION"));

/// Production fetcher backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    paths: SdkPaths,
    max_attempts: u32,
    timeout: Duration,
}

impl HttpFetcher {
    /// Creates a fetcher that stages archives under `paths.downloads`.
    #[must_use]
    pub fn new(paths: SdkPaths) -> Self {
        Self {
            paths,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Sets the number of download attempts (at least one).
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the stall timeout for connecting and for each body read.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn download_and_extract(
        &self,
        entry: &SdkCatalogEntry,
        archive_path: &Path,
        install_path: &Path,
        progress: ProgressCallback,
    ) -> Result<(), SdkError> {
        download_file(
            &entry.url,
            archive_path,
            self.max_attempts,
            self.timeout,
            progress,
        )
        .await?;

        if let Some(expected) = entry.sha256.clone() {
            let path = archive_path.to_path_buf();
            tokio::task::spawn_blocking(move || verify_checksum(&path, &expected))
                .await
                .map_err(|e| SdkError::download_with_source("checksum task failed", e))??;
            tracing::debug!(version = %entry.version, "archive checksum verified");
        }

        let archive = archive_path.to_path_buf();
        let dest = install_path.to_path_buf();
        let hint = entry.filename().to_string();
        tokio::task::spawn_blocking(move || extract_archive(&archive, &dest, &hint))
            .await
            .map_err(|e| SdkError::extraction_with_source("extraction task failed", e))?
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        entry: &SdkCatalogEntry,
        install_path: &Path,
        progress: ProgressCallback,
    ) -> Result<(), SdkError> {
        let archive_path = self.paths.download_path(&entry.version, entry.filename());

        let result = self
            .download_and_extract(entry, &archive_path, install_path, progress)
            .await;

        if let Err(e) = tokio::fs::remove_file(&archive_path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(
                path = %archive_path.display(),
                error = %e,
                "failed to remove temporary archive"
            );
        }

        result
    }
}

/// Downloads `url` to `dest`, retrying failed attempts.
///
/// The parent directory of `dest` is created if needed. A partially written
/// `dest` is removed after each failed attempt.
///
/// # Errors
///
/// Returns [`SdkError::Download`] with the last attempt's failure once all
/// attempts are exhausted. An attempt fails when connecting, or any single
/// read of the body, takes longer than `timeout`; a body that keeps arriving
/// is never cut off.
pub async fn download_file(
    url: &str,
    dest: &Path,
    max_attempts: u32,
    timeout: Duration,
    progress: ProgressCallback,
) -> Result<(), SdkError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            SdkError::download_with_source(
                format!("failed to create directory {}", parent.display()),
                e,
            )
        })?;
    }

    let client = reqwest::Client::builder()
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| SdkError::download_with_source("failed to create HTTP client", e))?;

    let max_attempts = max_attempts.max(1);
    let mut last_error = None;

    for attempt in 0..max_attempts {
        if attempt > 0 {
            progress(ProgressEvent::Retrying {
                attempt: attempt + 1,
                max_attempts,
            });
            tracing::info!(url, attempt = attempt + 1, max_attempts, "retrying download");
            tokio::time::sleep(Duration::from_millis(calculate_retry_delay(attempt))).await;
        }

        match download_attempt(&client, url, dest, &progress).await {
            Ok(()) => {
                progress(ProgressEvent::Completed);
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(url, attempt = attempt + 1, error = %e, "download attempt failed");
                let _ = tokio::fs::remove_file(dest).await;
                last_error = Some(e);
            }
        }
    }

    let error = last_error.unwrap_or_else(|| {
        SdkError::download(format!("download failed after {max_attempts} attempts"))
    });
    progress(ProgressEvent::Failed {
        error: error.to_string(),
    });
    Err(error)
}

/// Performs one streaming GET into `dest`.
async fn download_attempt(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    progress: &ProgressCallback,
) -> Result<(), SdkError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| SdkError::download_with_source(format!("failed to connect to {url}"), e))?;

    if !response.status().is_success() {
        return Err(SdkError::download(format!(
            "HTTP error {}: {url}",
            response.status()
        )));
    }

    let mut state = ProgressState::new(response.content_length());
    progress(ProgressEvent::Started {
        url: url.to_string(),
        total: state.expected,
    });

    let mut file = tokio::fs::File::create(dest).await.map_err(|e| {
        SdkError::download_with_source(format!("failed to create file {}", dest.display()), e)
    })?;

    let mut stream = response.bytes_stream();
    let start_time = Instant::now();
    let mut last_callback_time = Instant::now();
    let mut reported: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            SdkError::download_with_source(format!("failed to read chunk from {url}"), e)
        })?;
        file.write_all(&chunk).await.map_err(|e| {
            SdkError::download_with_source(format!("failed to write to {}", dest.display()), e)
        })?;

        let downloaded = state.record(chunk.len() as u64);

        let now = Instant::now();
        if now.duration_since(last_callback_time).as_millis() >= PROGRESS_CALLBACK_INTERVAL_MS {
            progress(ProgressEvent::Progress {
                downloaded,
                increment: downloaded - reported,
                speed: bytes_per_second(downloaded, start_time),
            });
            reported = downloaded;
            last_callback_time = now;
        }
    }

    file.flush().await.map_err(|e| {
        SdkError::download_with_source(format!("failed to flush {}", dest.display()), e)
    })?;

    if let Some(expected) = state.expected
        && state.received < expected
    {
        return Err(SdkError::download(format!(
            "incomplete download from {url}: received {} of {expected} bytes",
            state.received
        )));
    }

    if state.received > reported || state.received == 0 {
        progress(ProgressEvent::Progress {
            downloaded: state.received,
            increment: state.received - reported,
            speed: bytes_per_second(state.received, start_time),
        });
    }

    Ok(())
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn bytes_per_second(downloaded: u64, start: Instant) -> u64 {
    let elapsed_secs = start.elapsed().as_secs_f64();
    if elapsed_secs > 0.0 {
        (downloaded as f64 / elapsed_secs) as u64
    } else {
        0
    }
}

/// Calculates the retry delay with exponential backoff and jitter.
///
/// The delay doubles with each attempt (1s, 2s, 4s) with +/- 25% jitter.
fn calculate_retry_delay(attempt: u32) -> u64 {
    let base_delay = BASE_RETRY_DELAY_MS * 2u64.pow(attempt);
    let jitter_range = base_delay / 4;
    let jitter = rand::rng().random_range(0..=jitter_range * 2);
    base_delay - jitter_range + jitter
}

/// Formats bytes into a human-readable string (KB, MB, GB).
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    #[allow(clippy::cast_precision_loss)]
    let bytes_f = bytes as f64;

    if bytes_f >= GB {
        format!("{:.2} GB", bytes_f / GB)
    } else if bytes_f >= MB {
        format!("{:.2} MB", bytes_f / MB)
    } else if bytes_f >= KB {
        format!("{:.2} KB", bytes_f / KB)
    } else {
        format!("{bytes} B")
    }
}
