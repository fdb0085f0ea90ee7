//! Tarball fetch and unpacking.

use super::error::PkgError;
use bytes::Bytes;
use flate2::read::GzDecoder;
use reqwest::Client;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tar::Archive;

/// Largest tarball accepted (200 MB).
pub const MAX_TARBALL_SIZE: u64 = 200 * 1024 * 1024;

/// Per-request timeout for tarball downloads.
const DOWNLOAD_TIMEOUT_SECS: u64 = 30;

static UNPACK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Fetch a tarball into memory.
///
/// # Errors
/// `PKG_DOWNLOAD_FAILED` on transport errors, non-success status, or a body
/// larger than `max_bytes`.
pub async fn download_tarball(
    client: &Client,
    url: &str,
    max_bytes: u64,
    auth_token: Option<&str>,
) -> Result<Bytes, PkgError> {
    let mut request = client
        .get(url)
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS));
    if let Some(token) = auth_token {
        request = request.bearer_auth(token);
    }

    let response = request
        .send()
        .await
        .map_err(|e| PkgError::download_failed(format!("Failed to download '{url}': {e}")))?;

    if !response.status().is_success() {
        return Err(PkgError::download_failed(format!(
            "Download failed with status {} for '{url}'",
            response.status()
        )));
    }

    if let Some(len) = response.content_length() {
        if len > max_bytes {
            return Err(PkgError::download_failed(format!(
                "Tarball too large: {len} bytes (max: {max_bytes})"
            )));
        }
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| PkgError::download_failed(format!("Failed to read body of '{url}': {e}")))?;

    if bytes.len() as u64 > max_bytes {
        return Err(PkgError::download_failed(format!(
            "Tarball too large: {} bytes (max: {max_bytes})",
            bytes.len()
        )));
    }

    Ok(bytes)
}

/// Unpack a gzipped tarball so that its single top-level directory becomes `dest`.
///
/// npm tarballs wrap everything in `package/` (a few use another name, e.g.
/// `node/` for `@types/node`). Unpacking happens in a sibling temp directory
/// that is renamed into place, so `dest` is either complete or absent. An
/// existing `dest` is left untouched.
///
/// # Errors
/// `PKG_EXTRACT_FAILED` if the archive is corrupt, holds unsafe paths, or
/// does not have exactly one top-level directory.
pub fn unpack_tgz(bytes: &[u8], dest: &Path) -> Result<(), PkgError> {
    if dest.exists() {
        return Ok(());
    }

    let parent = dest
        .parent()
        .ok_or_else(|| PkgError::extract_failed("Destination has no parent"))?;
    fs::create_dir_all(parent)?;

    let staging = parent.join(format!(
        ".unpack-{}-{}",
        std::process::id(),
        UNPACK_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    fs::create_dir_all(&staging)?;

    let result = unpack_into(bytes, &staging)
        .and_then(|()| top_level_dir(&staging))
        .and_then(|root| move_into_place(&root, dest));

    let _ = fs::remove_dir_all(&staging);
    result
}

fn move_into_place(root: &Path, dest: &Path) -> Result<(), PkgError> {
    match fs::rename(root, dest) {
        Ok(()) => Ok(()),
        // Another download of the same package finished first.
        Err(_) if dest.exists() => Ok(()),
        Err(rename_err) => copy_dir_all(root, dest).map_err(|copy_err| {
            PkgError::extract_failed(format!(
                "Failed to move unpacked package: rename={rename_err}, copy={copy_err}"
            ))
        }),
    }
}

/// The single non-hidden directory at the top of an unpacked archive.
fn top_level_dir(staging: &Path) -> Result<PathBuf, PkgError> {
    let package_dir = staging.join("package");
    if package_dir.is_dir() {
        return Ok(package_dir);
    }

    let dirs: Vec<PathBuf> = fs::read_dir(staging)
        .map_err(|e| PkgError::extract_failed(format!("Failed to read unpacked dir: {e}")))?
        .filter_map(Result::ok)
        .filter(|e| {
            e.file_type().is_ok_and(|ft| ft.is_dir())
                && !e.file_name().to_string_lossy().starts_with('.')
        })
        .map(|e| e.path())
        .collect();

    match dirs.as_slice() {
        [single] => Ok(single.clone()),
        [] => Err(PkgError::extract_failed(
            "Tarball does not contain a top-level directory",
        )),
        many => Err(PkgError::extract_failed(format!(
            "Tarball contains {} top-level directories, expected 1",
            many.len()
        ))),
    }
}

fn unpack_into(bytes: &[u8], dest: &Path) -> Result<(), PkgError> {
    let mut archive = Archive::new(GzDecoder::new(bytes));
    let entries = archive
        .entries()
        .map_err(|e| PkgError::extract_failed(format!("Failed to read tarball entries: {e}")))?;

    for entry in entries {
        let mut entry = entry
            .map_err(|e| PkgError::extract_failed(format!("Failed to read tarball entry: {e}")))?;
        let path = entry
            .path()
            .map_err(|e| PkgError::extract_failed(format!("Failed to read entry path: {e}")))?
            .into_owned();

        if path.is_absolute() || path.components().any(|c| c == Component::ParentDir) {
            return Err(PkgError::extract_failed(format!(
                "Tarball entry escapes destination: {}",
                path.display()
            )));
        }

        let target = dest.join(&path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let kind = entry.header().entry_type();
        if kind.is_dir() {
            fs::create_dir_all(&target)?;
        } else if kind.is_file() {
            let mut file = File::create(&target)?;
            io::copy(&mut entry, &mut file)?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Ok(mode) = entry.header().mode() {
                    let _ = fs::set_permissions(&target, fs::Permissions::from_mode(mode));
                }
            }
        }
        // Links and special files are not unpacked.
    }

    Ok(())
}

fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let ty = entry.file_type()?;
        let dst_path = dst.join(entry.file_name());

        if ty.is_dir() {
            copy_dir_all(&entry.path(), &dst_path)?;
        } else if ty.is_file() {
            fs::copy(entry.path(), &dst_path)?;
        }
    }

    Ok(())
}
