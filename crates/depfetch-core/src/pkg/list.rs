//! Package list files: one `name@version` per line.

use super::error::PkgError;
use super::resolve::ResolvedPackage;
use super::spec::PackageSpec;
use depfetch_util::fs::{atomic_write, read_to_string_lossy};
use semver::Version;
use std::path::Path;

/// Default list file name.
pub const DEFAULT_LIST_FILE: &str = "package-list.txt";

/// Render packages as list file content.
#[must_use]
pub fn format_list(packages: &[ResolvedPackage]) -> String {
    packages.iter().fold(String::new(), |mut out, pkg| {
        out.push_str(&pkg.id());
        out.push('\n');
        out
    })
}

/// Write a list file atomically.
///
/// # Errors
/// `PKG_WRITE_FAILED` if the file cannot be written.
pub fn write_list(path: &Path, packages: &[ResolvedPackage]) -> Result<(), PkgError> {
    atomic_write(path, format_list(packages).as_bytes()).map_err(|e| {
        PkgError::write_failed(format!("Failed to write '{}': {e}", path.display()))
    })
}

/// Read a list file into `(name, version)` pairs.
///
/// # Errors
/// `PKG_LIST_INVALID` if the file cannot be read or a line is not
/// `name@<exact version>`.
pub fn read_list(path: &Path) -> Result<Vec<(String, String)>, PkgError> {
    let content = read_to_string_lossy(path).map_err(|e| {
        PkgError::list_invalid(format!("Failed to read '{}': {e}", path.display()))
    })?;
    parse_list(&content)
}

/// Parse list file content. Blank lines and `#` comments are ignored.
///
/// # Errors
/// See [`read_list`].
pub fn parse_list(content: &str) -> Result<Vec<(String, String)>, PkgError> {
    let mut entries = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let invalid = |why: &str| PkgError::list_invalid(format!("line {}: {why}: '{line}'", idx + 1));

        let spec = PackageSpec::parse(line).map_err(|e| invalid(e.message()))?;
        let Some(version) = spec.range else {
            return Err(invalid("missing version"));
        };
        if Version::parse(&version).is_err() {
            return Err(invalid("version must be exact"));
        }
        entries.push((spec.name, version));
    }

    Ok(entries)
}
