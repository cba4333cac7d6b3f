//! Version resolution.
//!
//! Turns free-form user input into a canonical [`VersionSpec`] and finds its
//! catalog entry. Resolution is pure: it never touches the filesystem or the
//! network, so a bad version is rejected before anything is created.

use std::fmt;

use crate::errors::SdkError;
use crate::sdk::catalog::{SdkCatalog, SdkCatalogEntry};

/// A validated semantic version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionSpec {
    /// Major component.
    pub major: u64,
    /// Minor component.
    pub minor: u64,
    /// Patch component.
    pub patch: u64,
    /// Canonical rendering used for catalog lookup and install paths.
    pub canonical: String,
}

impl VersionSpec {
    /// Parses user input as a semantic version.
    ///
    /// Surrounding whitespace and a single leading `v`/`=` are tolerated, so
    /// `v1.2.3` and `1.2.3` resolve to the same canonical `1.2.3`.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::InvalidVersion`] if the input is not a full
    /// `major.minor.patch` version.
    pub fn parse(input: &str) -> Result<Self, SdkError> {
        let trimmed = input.trim();
        let stripped = trimmed
            .strip_prefix(['v', 'V', '='])
            .unwrap_or(trimmed)
            .trim_start();

        let version =
            semver::Version::parse(stripped).map_err(|_| SdkError::invalid_version(input))?;

        Ok(Self {
            major: version.major,
            minor: version.minor,
            patch: version.patch,
            canonical: version.to_string(),
        })
    }

    /// Returns the canonical version string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.canonical
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// Validates `input` and looks it up in `catalog`.
///
/// # Errors
///
/// - [`SdkError::InvalidVersion`] if `input` is not semver
/// - [`SdkError::UnknownSdkVersion`] if the catalog has no such version
pub fn resolve<'a>(
    catalog: &'a SdkCatalog,
    input: &str,
) -> Result<(VersionSpec, &'a SdkCatalogEntry), SdkError> {
    let spec = VersionSpec::parse(input)?;
    let entry = catalog
        .get(spec.as_str())
        .ok_or_else(|| SdkError::unknown_version(spec.as_str()))?;
    Ok((spec, entry))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> SdkCatalog {
        SdkCatalog::from_entries([SdkCatalogEntry {
            version: "1.2.3".to_string(),
            url: "https://example.org/sdk-1.2.3.zip".to_string(),
            binpath: "bin".to_string(),
            sha256: None,
        }])
    }

    #[test]
    fn parse_extracts_components() {
        let spec = VersionSpec::parse("4.16.1").expect("Should parse");
        assert_eq!((spec.major, spec.minor, spec.patch), (4, 16, 1));
        assert_eq!(spec.as_str(), "4.16.1");
    }

    #[test]
    fn parse_canonicalizes_loose_input() {
        for input in ["v1.2.3", " 1.2.3 ", "=1.2.3", "V1.2.3"] {
            let spec = VersionSpec::parse(input).expect("Should parse");
            assert_eq!(spec.as_str(), "1.2.3", "input {input:?}");
        }
    }

    #[test]
    fn parse_keeps_prerelease() {
        let spec = VersionSpec::parse("2.0.0-beta.1").expect("Should parse");
        assert_eq!(spec.as_str(), "2.0.0-beta.1");
    }

    #[test]
    fn parse_rejects_malformed_versions() {
        for input in ["", "latest", "1", "1.2", "1.2.3.4", "a.b.c", "01.2.3", "1.2.x"] {
            let result = VersionSpec::parse(input);
            assert!(
                matches!(result, Err(SdkError::InvalidVersion { .. })),
                "expected InvalidVersion for {input:?}"
            );
        }
    }

    #[test]
    fn resolve_finds_catalog_entry() {
        let catalog = catalog();
        let (spec, entry) = resolve(&catalog, "v1.2.3").expect("Should resolve");
        assert_eq!(spec.as_str(), "1.2.3");
        assert_eq!(entry.url, "https://example.org/sdk-1.2.3.zip");
    }

    #[test]
    fn resolve_reports_unknown_version() {
        let catalog = catalog();
        let err = resolve(&catalog, "9.9.9").unwrap_err();
        assert!(matches!(err, SdkError::UnknownSdkVersion { ref version } if version == "9.9.9"));
    }

    #[test]
    fn resolve_reports_invalid_before_lookup() {
        let err = resolve(&SdkCatalog::default(), "nope").unwrap_err();
        assert!(matches!(err, SdkError::InvalidVersion { .. }));
    }
}
