//! Tarball downloads for resolved packages.
//!
//! Each package lands at `<out>/<name>@<version>.tgz` (scoped names encode
//! `/` as `%2F`). Existing files are not fetched again unless they fail the
//! published shasum, so re-running a download only fetches what is missing.

use super::error::PkgError;
use super::registry::RegistryClient;
use super::resolve::ResolvedPackage;
use super::spec::encode_name;
use super::tarball::{download_tarball, unpack_tgz, MAX_TARBALL_SIZE};
use crate::config::DEFAULT_DOWNLOAD_CONCURRENCY;
use depfetch_util::fs::atomic_write;
use depfetch_util::hash::{sha1_hex, sha1_matches};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default output directory for downloaded tarballs.
pub const DEFAULT_OUT_DIR: &str = "packages";

/// Options for [`download_packages`].
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Concurrent downloads.
    pub concurrency: usize,
    /// Also unpack each tarball into `<out>/<name>@<version>/`.
    pub extract: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_DOWNLOAD_CONCURRENCY,
            extract: false,
        }
    }
}

/// A package that could not be downloaded.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadFailure {
    /// `name@version`.
    pub package: String,
    pub code: &'static str,
    pub message: String,
}

/// Outcome of a download run, in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadReport {
    /// Packages fetched by this run.
    pub downloaded: Vec<String>,
    /// Packages whose tarball was already present.
    pub existing: Vec<String>,
    pub failed: Vec<DownloadFailure>,
}

impl DownloadReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fetched {
    Downloaded,
    Existing,
}

/// Tarball file name for a package.
#[must_use]
pub fn tarball_file_name(name: &str, version: &str) -> String {
    format!("{}@{version}.tgz", encode_name(name))
}

/// Path a package's tarball is stored at.
#[must_use]
pub fn target_path(out_dir: &Path, name: &str, version: &str) -> PathBuf {
    out_dir.join(tarball_file_name(name, version))
}

/// Directory a package is unpacked into when extraction is on.
#[must_use]
pub fn unpack_path(out_dir: &Path, name: &str, version: &str) -> PathBuf {
    out_dir.join(format!("{}@{version}", encode_name(name)))
}

/// Download every package into `out_dir`.
///
/// Failures are per package and collected in the report; they never stop
/// the remaining downloads.
pub async fn download_packages(
    client: &RegistryClient,
    packages: &[ResolvedPackage],
    out_dir: &Path,
    options: &DownloadOptions,
) -> DownloadReport {
    let results: Vec<(usize, Result<Fetched, PkgError>)> = stream::iter(packages.iter().enumerate())
        .map(|(idx, pkg)| async move { (idx, download_one(client, pkg, out_dir, options.extract).await) })
        .buffer_unordered(options.concurrency.max(1))
        .collect()
        .await;

    let mut ordered: Vec<Option<Result<Fetched, PkgError>>> = vec![None; packages.len()];
    for (idx, result) in results {
        ordered[idx] = Some(result);
    }

    let mut report = DownloadReport::default();
    for (pkg, result) in packages.iter().zip(ordered) {
        match result {
            Some(Ok(Fetched::Downloaded)) => report.downloaded.push(pkg.id()),
            Some(Ok(Fetched::Existing)) => report.existing.push(pkg.id()),
            Some(Err(err)) => {
                warn!(package = %pkg.id(), code = err.code(), "download failed: {}", err.message());
                report.failed.push(DownloadFailure {
                    package: pkg.id(),
                    code: err.code(),
                    message: err.message().to_string(),
                });
            }
            None => {}
        }
    }

    info!(
        downloaded = report.downloaded.len(),
        existing = report.existing.len(),
        failed = report.failed.len(),
        "downloads complete"
    );
    report
}

async fn download_one(
    client: &RegistryClient,
    pkg: &ResolvedPackage,
    out_dir: &Path,
    extract: bool,
) -> Result<Fetched, PkgError> {
    let target = target_path(out_dir, &pkg.name, &pkg.version);

    if target.is_file() {
        let bytes = std::fs::read(&target)?;
        match pkg.shasum.as_deref() {
            Some(expected) if !sha1_matches(&bytes, expected) => {
                warn!(
                    package = %pkg.id(),
                    path = %target.display(),
                    "existing tarball does not match shasum, downloading again"
                );
            }
            _ => {
                debug!(package = %pkg.id(), path = %target.display(), "already downloaded");
                if extract {
                    unpack_tgz(&bytes, &unpack_path(out_dir, &pkg.name, &pkg.version))?;
                }
                return Ok(Fetched::Existing);
            }
        }
    }

    let url = pkg
        .url
        .as_deref()
        .ok_or_else(|| PkgError::download_failed(format!("No tarball URL for {}", pkg.id())))?;

    debug!(package = %pkg.id(), url, "downloading");
    let bytes = download_tarball(client.http(), url, MAX_TARBALL_SIZE, client.auth_token_for(url)).await?;

    if let Some(expected) = pkg.shasum.as_deref() {
        if !sha1_matches(&bytes, expected) {
            return Err(PkgError::integrity_mismatch(url, expected, &sha1_hex(&bytes)));
        }
    }

    atomic_write(&target, &bytes).map_err(|e| {
        PkgError::write_failed(format!("Failed to write '{}': {e}", target.display()))
    })?;

    if extract {
        unpack_tgz(&bytes, &unpack_path(out_dir, &pkg.name, &pkg.version))?;
    }

    Ok(Fetched::Downloaded)
}
