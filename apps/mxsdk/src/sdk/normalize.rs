//! Line-ending normalization of an unpacked SDK tree.
//!
//! SDK archives are often built on Windows and carry CRLF line endings in
//! their launcher scripts, which breaks `#!` interpreters on unix. Every text
//! file under the tree is rewritten to the host convention. Binary files are
//! detected the way `dos2unix` does it (a NUL byte near the start) and left
//! alone.

use std::fmt;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use futures_util::stream;
use tokio::io::AsyncReadExt;
use walkdir::WalkDir;

use crate::errors::SdkError;

/// Default cap on files converted concurrently.
pub const DEFAULT_MAX_CONCURRENCY: usize = 100;

/// How many leading bytes are inspected for binary detection.
const BINARY_SNIFF_LEN: usize = 8000;

/// Aggregate result of a normalization run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    /// Text files examined (rewritten or already in host form).
    pub processed: usize,
    /// Files left untouched because they look binary.
    pub skipped: usize,
    /// Files that could not be read, written or walked.
    pub errored: usize,
}

impl fmt::Display for NormalizeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed, {} skipped, {} errored",
            self.processed, self.skipped, self.errored
        )
    }
}

/// Line terminator convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    /// `\n`
    Lf,
    /// `\r\n`
    CrLf,
}

impl LineEnding {
    /// The convention of the platform this binary was built for.
    #[must_use]
    pub const fn host() -> Self {
        if cfg!(windows) { Self::CrLf } else { Self::Lf }
    }
}

#[derive(Debug)]
enum FileOutcome {
    Processed,
    Skipped,
    Failed(String),
}

/// Returns whether `content` looks like a binary file.
#[must_use]
pub fn is_binary(content: &[u8]) -> bool {
    content[..content.len().min(BINARY_SNIFF_LEN)].contains(&0)
}

/// Converts line endings in `content` to `target`.
///
/// Returns `None` when the content is already in the target form, so callers
/// can skip the write.
#[must_use]
pub fn convert_line_endings(content: &[u8], target: LineEnding) -> Option<Vec<u8>> {
    match target {
        LineEnding::Lf => {
            if !content.windows(2).any(|w| w == b"\r\n") {
                return None;
            }
            let mut out = Vec::with_capacity(content.len());
            let mut iter = content.iter().peekable();
            while let Some(&byte) = iter.next() {
                if byte == b'\r' && iter.peek() == Some(&&b'\n') {
                    continue;
                }
                out.push(byte);
            }
            Some(out)
        }
        LineEnding::CrLf => {
            let needs_conversion = content
                .iter()
                .enumerate()
                .any(|(i, &b)| b == b'\n' && (i == 0 || content[i - 1] != b'\r'));
            if !needs_conversion {
                return None;
            }
            let mut out = Vec::with_capacity(content.len() + content.len() / 16);
            let mut previous = None;
            for &byte in content {
                if byte == b'\n' && previous != Some(b'\r') {
                    out.push(b'\r');
                }
                out.push(byte);
                previous = Some(byte);
            }
            Some(out)
        }
    }
}

async fn normalize_file(path: PathBuf, target: LineEnding) -> FileOutcome {
    match rewrite_file(&path, target).await {
        Ok(outcome) => outcome,
        Err(e) => FileOutcome::Failed(format!("{}: {e}", path.display())),
    }
}

/// Binary files are only read as far as the sniff window.
async fn rewrite_file(path: &Path, target: LineEnding) -> std::io::Result<FileOutcome> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut content = Vec::with_capacity(BINARY_SNIFF_LEN);
    (&mut file)
        .take(BINARY_SNIFF_LEN as u64)
        .read_to_end(&mut content)
        .await?;

    if is_binary(&content) {
        return Ok(FileOutcome::Skipped);
    }

    file.read_to_end(&mut content).await?;
    drop(file);

    let Some(converted) = convert_line_endings(&content, target) else {
        return Ok(FileOutcome::Processed);
    };

    // Writing through the existing inode keeps its permission bits.
    tokio::fs::write(path, converted).await?;
    tracing::trace!(path = %path.display(), "converted line endings");
    Ok(FileOutcome::Processed)
}

/// Lists regular files under `root`; walk errors are returned separately.
fn collect_files(root: &Path) -> (Vec<PathBuf>, Vec<String>) {
    let mut files = Vec::new();
    let mut errors = Vec::new();
    for entry in WalkDir::new(root) {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
            Ok(_) => {}
            Err(e) => errors.push(e.to_string()),
        }
    }
    (files, errors)
}

/// Rewrites every text file under `root` to the host line-ending convention.
///
/// At most `max_concurrency` files are open at once; `0` is treated as `1`.
///
/// # Errors
///
/// Returns [`SdkError::Normalization`] if any file could not be converted.
/// The error carries the aggregate counts of the whole run.
pub async fn normalize_tree(root: &Path, max_concurrency: usize) -> Result<NormalizeStats, SdkError> {
    normalize_tree_to(root, LineEnding::host(), max_concurrency).await
}

/// Same as [`normalize_tree`] with an explicit target convention.
///
/// # Errors
///
/// See [`normalize_tree`].
pub async fn normalize_tree_to(
    root: &Path,
    target: LineEnding,
    max_concurrency: usize,
) -> Result<NormalizeStats, SdkError> {
    let walk_root = root.to_path_buf();
    let (files, walk_errors) = tokio::task::spawn_blocking(move || collect_files(&walk_root))
        .await
        .map_err(|e| SdkError::Normalization {
            stats: NormalizeStats::default(),
            message: format!("directory walk failed: {e}"),
        })?;

    let mut stats = NormalizeStats {
        errored: walk_errors.len(),
        ..NormalizeStats::default()
    };
    let mut first_error = walk_errors.into_iter().next();

    let mut outcomes = stream::iter(files)
        .map(|path| normalize_file(path, target))
        .buffer_unordered(max_concurrency.max(1));

    while let Some(outcome) = outcomes.next().await {
        match outcome {
            FileOutcome::Processed => stats.processed += 1,
            FileOutcome::Skipped => stats.skipped += 1,
            FileOutcome::Failed(message) => {
                tracing::warn!(error = %message, "line-ending conversion failed");
                stats.errored += 1;
                first_error.get_or_insert(message);
            }
        }
    }

    tracing::debug!(
        root = %root.display(),
        processed = stats.processed,
        skipped = stats.skipped,
        errored = stats.errored,
        "line endings normalized"
    );

    match first_error {
        Some(message) => Err(SdkError::Normalization { stats, message }),
        None => Ok(stats),
    }
}
