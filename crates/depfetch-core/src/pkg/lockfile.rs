//! npm `package-lock.json` reader.
//!
//! Turns an existing lockfile into the same flat package list the resolver
//! produces, so locked trees can be downloaded without resolving ranges.
//!
//! ## Supported formats
//!
//! - `lockfileVersion` 2 and 3: the flat `packages` map keyed by install
//!   path (`node_modules/a/node_modules/b`)
//! - `lockfileVersion` 1: the nested `dependencies` tree
//!
//! A package's level is its nesting depth: top-level `node_modules` entries
//! are level 1.

use super::error::PkgError;
use super::resolve::{dedup, ResolvedPackage};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Default lockfile name.
pub const NPM_LOCKFILE_NAME: &str = "package-lock.json";

const NODE_MODULES: &str = "node_modules/";

#[derive(Debug, Deserialize)]
struct NpmLockfile {
    #[serde(default)]
    packages: BTreeMap<String, PackagesEntry>,
    #[serde(default)]
    dependencies: BTreeMap<String, DependencyEntry>,
}

/// Entry of the v2/v3 `packages` map.
#[derive(Debug, Deserialize)]
struct PackagesEntry {
    /// Real package name when installed under an alias.
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    resolved: Option<String>,
    #[serde(default)]
    link: bool,
}

/// Entry of the v1 nested `dependencies` tree.
#[derive(Debug, Deserialize)]
struct DependencyEntry {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    resolved: Option<String>,
    #[serde(default)]
    dependencies: BTreeMap<String, DependencyEntry>,
}

/// Read a `package-lock.json` into resolved packages, shallowest first.
///
/// # Errors
/// `PKG_LOCK_NOT_FOUND` if the file does not exist, `PKG_LOCK_INVALID` if it
/// cannot be read or parsed.
pub fn read_npm_lockfile(path: &Path) -> Result<Vec<ResolvedPackage>, PkgError> {
    if !path.exists() {
        return Err(PkgError::lock_not_found(path));
    }
    let content = fs::read_to_string(path)
        .map_err(|e| PkgError::lock_invalid(format!("Failed to read '{}': {e}", path.display())))?;
    parse_npm_lockfile(&content)
}

/// Parse `package-lock.json` content. See [`read_npm_lockfile`].
///
/// # Errors
/// `PKG_LOCK_INVALID` if the content is not a lockfile.
pub fn parse_npm_lockfile(content: &str) -> Result<Vec<ResolvedPackage>, PkgError> {
    let lock: NpmLockfile = serde_json::from_str(content)
        .map_err(|e| PkgError::lock_invalid(format!("Invalid package-lock.json: {e}")))?;

    // v2 carries both layouts; `packages` is authoritative when present.
    let mut packages = if lock.packages.is_empty() {
        let mut out = Vec::new();
        collect_nested(&lock.dependencies, 1, &mut out);
        out
    } else {
        collect_flat(&lock.packages)
    };

    // Stable: keeps key order within a level.
    packages.sort_by_key(|p| p.level);
    Ok(dedup(packages))
}

fn collect_flat(entries: &BTreeMap<String, PackagesEntry>) -> Vec<ResolvedPackage> {
    entries
        .iter()
        .filter_map(|(key, entry)| {
            if entry.link {
                return None;
            }
            // "" is the project itself; other keys outside node_modules are
            // workspace folders.
            let level = key.matches(NODE_MODULES).count();
            if level == 0 || !key.starts_with(NODE_MODULES) {
                return None;
            }
            let version = entry.version.as_deref()?;
            let name = entry
                .name
                .clone()
                .or_else(|| key.rsplit_once(NODE_MODULES).map(|(_, n)| n.to_string()))?;

            Some(ResolvedPackage::new(name, version, level).with_url(entry.resolved.clone()))
        })
        .collect()
}

fn collect_nested(
    entries: &BTreeMap<String, DependencyEntry>,
    level: usize,
    out: &mut Vec<ResolvedPackage>,
) {
    for (name, entry) in entries {
        if let Some(version) = entry.version.as_deref() {
            // v1 records links as "file:" versions.
            if !version.starts_with("file:") {
                out.push(
                    ResolvedPackage::new(name.clone(), version, level)
                        .with_url(entry.resolved.clone()),
                );
            }
        }
        collect_nested(&entry.dependencies, level + 1, out);
    }
}
