//! Archive extraction for SDK downloads.
//!
//! SDKs ship as ZIP or tar.gz archives. The format is detected from the
//! file's magic bytes rather than its name, since the staged download has a
//! `.part` suffix; the original filename is only a fallback hint.

use anyhow::{Context, Result, bail};
use flate2::read::GzDecoder;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tar::Archive;

use crate::errors::SdkError;

/// Archive container formats understood by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// PKZIP archive.
    Zip,
    /// Gzip-compressed tarball.
    TarGz,
}

impl ArchiveFormat {
    /// Detects the format from leading bytes, falling back to `name_hint`.
    #[must_use]
    pub fn detect(magic: &[u8], name_hint: &str) -> Option<Self> {
        if magic.starts_with(b"PK\x03\x04") || magic.starts_with(b"PK\x05\x06") {
            return Some(Self::Zip);
        }
        if magic.starts_with(&[0x1f, 0x8b]) {
            return Some(Self::TarGz);
        }

        let name = name_hint.to_ascii_lowercase();
        if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else {
            None
        }
    }
}

/// Extracts an archive (ZIP or tar.gz) into `dest_dir`, creating it.
///
/// If all archive entries share a common root folder, it is stripped
/// (e.g., `flex_sdk_4.6/bin/mxmlc` becomes `bin/mxmlc`).
///
/// # Errors
///
/// Returns [`SdkError::Extraction`] if the format is unknown, the archive is
/// corrupt or truncated, an entry escapes `dest_dir`, or writing fails.
pub fn extract_archive(archive_path: &Path, dest_dir: &Path, name_hint: &str) -> Result<(), SdkError> {
    let mut magic = [0u8; 4];
    let read = std::fs::File::open(archive_path)
        .and_then(|mut f| f.read(&mut magic))
        .map_err(|e| {
            SdkError::extraction_with_source(
                format!("failed to open archive {}", archive_path.display()),
                e,
            )
        })?;

    let format = ArchiveFormat::detect(&magic[..read], name_hint).ok_or_else(|| {
        SdkError::extraction(format!("unsupported archive format: {name_hint}"))
    })?;

    let result = match format {
        ArchiveFormat::Zip => extract_zip(archive_path, dest_dir),
        ArchiveFormat::TarGz => extract_tar_gz(archive_path, dest_dir),
    };

    result.map_err(|e| {
        SdkError::extraction_with_source(
            format!("failed to extract {}", archive_path.display()),
            e,
        )
    })
}

/// Rejects entry paths that would land outside the destination.
fn ensure_contained(entry_path: &Path) -> Result<()> {
    if entry_path.is_absolute()
        || entry_path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
    {
        bail!(
            "Refusing to extract path with parent directory or absolute reference: {}",
            entry_path.display()
        );
    }
    Ok(())
}

/// Maps an archive entry to its path relative to the destination.
///
/// Returns `None` for the stripped root folder itself.
fn relative_entry_path(entry_path: &Path, strip_prefix: Option<&Path>) -> Option<PathBuf> {
    match strip_prefix.map(|prefix| entry_path.strip_prefix(prefix)) {
        Some(Ok(p)) if p.as_os_str().is_empty() => None,
        Some(Ok(p)) => Some(p.to_path_buf()),
        Some(Err(_)) | None => Some(entry_path.to_path_buf()),
    }
}

/// Extracts a ZIP archive to the destination directory.
fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let file = std::fs::File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;

    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read ZIP archive: {}", archive_path.display()))?;

    std::fs::create_dir_all(dest_dir)
        .with_context(|| format!("Failed to create directory: {}", dest_dir.display()))?;

    let strip_prefix = find_common_root_folder(
        (0..archive.len()).filter_map(|i| archive.by_index(i).ok()?.enclosed_name()),
    );

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to read archive entry {i}"))?;

        let entry_path = entry
            .enclosed_name()
            .with_context(|| format!("Invalid entry path in archive: {}", entry.name()))?;
        ensure_contained(&entry_path)?;

        let Some(relative_path) = relative_entry_path(&entry_path, strip_prefix.as_deref()) else {
            continue;
        };
        let output_path = dest_dir.join(&relative_path);

        if entry.is_dir() {
            std::fs::create_dir_all(&output_path).with_context(|| {
                format!("Failed to create directory: {}", output_path.display())
            })?;
            continue;
        }

        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let mut outfile = std::fs::File::create(&output_path)
            .with_context(|| format!("Failed to create file: {}", output_path.display()))?;
        std::io::copy(&mut entry, &mut outfile)
            .with_context(|| format!("Failed to extract: {}", output_path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                let perms = std::fs::Permissions::from_mode(mode & 0o777);
                std::fs::set_permissions(&output_path, perms).with_context(|| {
                    format!("Failed to set permissions: {}", output_path.display())
                })?;
            }
        }
    }

    Ok(())
}

/// Extracts a tar.gz archive to the destination directory.
fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dest_dir)
        .with_context(|| format!("Failed to create directory: {}", dest_dir.display()))?;

    let strip_prefix = find_common_root_folder_tar(archive_path)?;

    let file = std::fs::File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    let mut archive = Archive::new(GzDecoder::new(file));

    for entry in archive
        .entries()
        .with_context(|| format!("Failed to read tar entries: {}", archive_path.display()))?
    {
        let mut entry = entry
            .with_context(|| format!("Failed to read tar entry: {}", archive_path.display()))?;

        let entry_path = entry
            .path()
            .with_context(|| "Failed to get entry path")?
            .into_owned();
        ensure_contained(&entry_path)?;

        let Some(relative_path) = relative_entry_path(&entry_path, strip_prefix.as_deref()) else {
            continue;
        };
        let output_path = dest_dir.join(&relative_path);

        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            std::fs::create_dir_all(&output_path).with_context(|| {
                format!("Failed to create directory: {}", output_path.display())
            })?;
            continue;
        }

        // A link could point outside the tree and let later entries write through it.
        if entry_type.is_symlink() || entry_type.is_hard_link() {
            tracing::warn!(path = %relative_path.display(), "skipping link entry in sdk archive");
            continue;
        }

        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        entry
            .unpack(&output_path)
            .with_context(|| format!("Failed to extract: {}", output_path.display()))?;
    }

    Ok(())
}

/// Collects tar entry paths and finds their common root folder.
fn find_common_root_folder_tar(archive_path: &Path) -> Result<Option<PathBuf>> {
    let file = std::fs::File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    let mut archive = Archive::new(GzDecoder::new(file));

    let mut paths = Vec::new();
    for entry in archive
        .entries()
        .with_context(|| format!("Failed to read tar entries: {}", archive_path.display()))?
    {
        let entry = entry
            .with_context(|| format!("Failed to read tar entry: {}", archive_path.display()))?;
        paths.push(
            entry
                .path()
                .with_context(|| "Failed to get entry path")?
                .into_owned(),
        );
    }

    Ok(find_common_root_folder(paths))
}

/// Finds a common root folder shared by all archive entries.
///
/// Returns `Some(prefix)` if all entries start with the same folder name
/// AND at least one entry is nested below it. Flat files at the archive
/// root are never treated as a containing folder.
fn find_common_root_folder(paths: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
    let mut common_root: Option<PathBuf> = None;
    let mut has_nested_entries = false;

    for path in paths {
        if path.components().count() > 1 {
            has_nested_entries = true;
        }

        let first_component = path.components().next()?;
        let root = PathBuf::from(first_component.as_os_str());

        match &common_root {
            None => common_root = Some(root),
            Some(existing) if existing != &root => return None,
            Some(_) => {}
        }
    }

    if has_nested_entries { common_root } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tar::Builder;

    fn temp_test_dir(name: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("mxsdk_test_{}_{}", name, rand::random::<u64>()));
        std::fs::create_dir_all(&dir).expect("Should create temp dir");
        dir
    }

    fn append(builder: &mut Builder<GzEncoder<std::fs::File>>, path: &str, data: &[u8], mode: u32) {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(mode);
        header.set_cksum();
        builder
            .append_data(&mut header, path, data)
            .expect("Should append file");
    }

    fn create_tar_gz(archive_path: &Path, files: &[(&str, &[u8], u32)]) {
        let file = std::fs::File::create(archive_path).expect("Should create file");
        let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
        for (path, data, mode) in files {
            append(&mut builder, path, data, *mode);
        }
        builder
            .into_inner()
            .expect("Should finish tar")
            .finish()
            .expect("Should finish gzip");
    }

    fn create_zip(archive_path: &Path, files: &[(&str, &[u8])]) {
        let file = std::fs::File::create(archive_path).expect("Should create file");
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (path, data) in files {
            zip.start_file(*path, options).expect("Should start file");
            zip.write_all(data).expect("Should write");
        }
        zip.finish().expect("Should finish");
    }

    #[test]
    fn detect_prefers_magic_bytes_over_name() {
        assert_eq!(
            ArchiveFormat::detect(b"PK\x03\x04".as_slice(), "sdk.tar.gz"),
            Some(ArchiveFormat::Zip)
        );
        assert_eq!(
            ArchiveFormat::detect(&[0x1f, 0x8b, 0x08, 0x00], "sdk.zip"),
            Some(ArchiveFormat::TarGz)
        );
        assert_eq!(
            ArchiveFormat::detect(b"".as_slice(), "SDK.TGZ"),
            Some(ArchiveFormat::TarGz)
        );
        assert_eq!(ArchiveFormat::detect(b"<htm".as_slice(), "download"), None);
    }

    #[test]
    fn zip_common_root_is_stripped() {
        let dir = temp_test_dir("zip_strip");
        let archive = dir.join("sdk.part");
        let dest = dir.join("out");
        create_zip(
            &archive,
            &[
                ("flex_sdk_4.6/bin/mxmlc", b"launcher".as_slice()),
                ("flex_sdk_4.6/frameworks/flex-config.xml", b"<flex-config/>".as_slice()),
            ],
        );

        extract_archive(&archive, &dest, "flex_sdk_4.6.zip").expect("Should extract");

        assert!(dest.join("bin").join("mxmlc").is_file());
        assert!(dest.join("frameworks").join("flex-config.xml").is_file());
        assert!(!dest.join("flex_sdk_4.6").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn zip_without_common_root_keeps_layout() {
        let dir = temp_test_dir("zip_preserve");
        let archive = dir.join("sdk.part");
        let dest = dir.join("out");
        create_zip(
            &archive,
            &[("bin/mxmlc", b"launcher".as_slice()), ("lib/mxmlc.jar", b"jar".as_slice())],
        );

        extract_archive(&archive, &dest, "sdk.zip").expect("Should extract");

        assert!(dest.join("bin").join("mxmlc").is_file());
        assert!(dest.join("lib").join("mxmlc.jar").is_file());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn tar_gz_common_root_is_stripped_and_modes_kept() {
        let dir = temp_test_dir("tar_strip");
        let archive = dir.join("sdk.part");
        let dest = dir.join("out");
        create_tar_gz(
            &archive,
            &[
                ("apache-flex-sdk/bin/mxmlc", b"launcher".as_slice(), 0o755),
                ("apache-flex-sdk/lib/mxmlc.jar", b"jar".as_slice(), 0o644),
            ],
        );

        extract_archive(&archive, &dest, "apache-flex-sdk-bin.tar.gz").expect("Should extract");

        let binary = dest.join("bin").join("mxmlc");
        assert!(binary.is_file());
        assert!(dest.join("lib").join("mxmlc.jar").is_file());
        assert!(!dest.join("apache-flex-sdk").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&binary).expect("Should stat").permissions().mode();
            assert_eq!(mode & 0o100, 0o100);
        }

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn flat_single_file_is_not_stripped() {
        let dir = temp_test_dir("tar_flat");
        let archive = dir.join("sdk.tar.gz");
        let dest = dir.join("out");
        create_tar_gz(&archive, &[("mxmlc", b"launcher".as_slice(), 0o755)]);

        extract_archive(&archive, &dest, "sdk.tar.gz").expect("Should extract");

        assert!(dest.join("mxmlc").is_file());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn truncated_zip_is_an_extraction_error() {
        let dir = temp_test_dir("zip_truncated");
        let archive = dir.join("sdk.part");
        create_zip(&archive, &[("bin/mxmlc", b"launcher".as_slice())]);
        let bytes = std::fs::read(&archive).expect("Should read");
        std::fs::write(&archive, &bytes[..bytes.len() / 2]).expect("Should write");

        let err = extract_archive(&archive, &dir.join("out"), "sdk.zip").unwrap_err();
        assert!(matches!(err, SdkError::Extraction { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unknown_format_is_an_extraction_error() {
        let dir = temp_test_dir("unknown_format");
        let archive = dir.join("sdk.part");
        std::fs::write(&archive, b"<html>not found</html>".as_slice()).expect("Should write");

        let err = extract_archive(&archive, &dir.join("out"), "download").unwrap_err();
        assert!(matches!(err, SdkError::Extraction { .. }));
        assert!(err.to_string().contains("unsupported archive format"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn tar_link_entries_are_not_followed() {
        let dir = temp_test_dir("extract_tar_links");
        let outside = dir.join("outside");
        std::fs::create_dir_all(&outside).expect("Should create dir");
        let archive = dir.join("sdk.tar.gz");

        let file = std::fs::File::create(&archive).expect("Should create file");
        let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
        append(&mut builder, "flex_sdk/bin/mxmlc", b"#!/bin/sh\n", 0o755);
        let mut link = tar::Header::new_gnu();
        link.set_entry_type(tar::EntryType::Symlink);
        link.set_size(0);
        link.set_mode(0o777);
        builder
            .append_link(&mut link, "flex_sdk/lib", &outside)
            .expect("Should append link");
        append(&mut builder, "flex_sdk/lib/planted.txt", b"planted", 0o644);
        builder
            .into_inner()
            .expect("Should finish tar")
            .finish()
            .expect("Should finish gzip");

        let dest = dir.join("sdk");
        extract_archive(&archive, &dest, "sdk.tar.gz").expect("Should extract");

        let lib = std::fs::symlink_metadata(dest.join("lib")).expect("Should stat");
        assert!(lib.is_dir());
        assert!(dest.join("lib").join("planted.txt").is_file());
        assert!(!outside.join("planted.txt").exists());
        assert!(dest.join("bin").join("mxmlc").is_file());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn tar_path_traversal_is_rejected() {
        assert!(ensure_contained(Path::new("../../etc/passwd")).is_err());
        assert!(ensure_contained(Path::new("/etc/passwd")).is_err());
        assert!(ensure_contained(Path::new("bin/mxmlc")).is_ok());
    }
}
