//! `depfetch lock-file`: download every package pinned by a package-lock.json.

use super::download::{finish, DownloadResult};
use super::resolve::registry_client;
use super::{exit_with, Failure};
use depfetch_core::pkg::{
    download_packages, read_npm_lockfile, resolve_exact, DownloadOptions, ResolveOptions,
    ResolvedPackage,
};
use depfetch_core::Config;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use tracing::info;

/// Lock-file command action.
#[derive(Debug, Clone)]
pub struct LockFileAction {
    pub lockfile: PathBuf,
    pub out_dir: PathBuf,
    pub extract: bool,
}

pub fn run(config: &Config, action: LockFileAction, json: bool) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    let outcome = runtime.block_on(async {
        let locked = read_npm_lockfile(&action.lockfile).map_err(Failure::input)?;
        let client = registry_client(config)?;
        info!(lockfile = %action.lockfile.display(), packages = locked.len(), "read lockfile");

        // Entries without a `resolved` URL are looked up in the registry.
        let (mut packages, missing): (Vec<ResolvedPackage>, Vec<ResolvedPackage>) =
            locked.into_iter().partition(|p| p.url.is_some());
        let mut skipped = Vec::new();

        if !missing.is_empty() {
            let entries: Vec<(String, String)> = missing
                .iter()
                .map(|p| (p.name.clone(), p.version.clone()))
                .collect();
            let options = ResolveOptions {
                concurrency: config.fetch_concurrency,
                ..ResolveOptions::default()
            };
            let found = resolve_exact(&client, &entries, &options).await;

            for mut pkg in found.packages {
                if let Some(entry) = missing.iter().find(|m| m.id() == pkg.id()) {
                    pkg.level = entry.level;
                }
                packages.push(pkg);
            }
            skipped = found.skipped;
            packages.sort_by_key(|p| p.level);
        }

        let options = DownloadOptions {
            concurrency: config.download_concurrency,
            extract: action.extract,
        };
        let report = download_packages(&client, &packages, &action.out_dir, &options).await;
        Ok::<_, Failure>((packages.len(), skipped, report))
    });

    match outcome {
        Ok((count, skipped, report)) => finish(&action.out_dir, count, skipped, report, json),
        Err(failure) => exit_with(
            &failure,
            json,
            &DownloadResult::failed(&action.out_dir, &failure),
        ),
    }
}
