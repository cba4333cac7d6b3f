//! Checksum verification for downloaded SDK archives.

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::errors::SdkError;

/// Verifies that a file matches the expected SHA256 checksum.
///
/// The comparison is case-insensitive on `expected`.
///
/// # Errors
///
/// Returns [`SdkError::Download`] if the file cannot be read or the computed
/// checksum does not match.
pub fn verify_checksum(file_path: &Path, expected: &str) -> Result<(), SdkError> {
    let computed = compute_sha256(file_path).map_err(|e| {
        SdkError::download_with_source(
            format!("failed to read {} for checksum", file_path.display()),
            e,
        )
    })?;

    let expected = expected.trim().to_lowercase();
    if computed != expected {
        return Err(SdkError::download(format!(
            "checksum mismatch for {}: expected {expected}, got {computed}",
            file_path.display()
        )));
    }

    Ok(())
}

/// Computes the SHA256 hash of a file as a lowercase hex string.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn compute_sha256(file_path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(file_path)?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}
