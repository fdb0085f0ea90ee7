//! `depfetch download`: resolve (or read a list file) and download tarballs.

use super::resolve::{registry_client, resolve_request, ResolveRequest};
use super::{exit_with, print_json, print_skipped, Failure, EXIT_FAILURE};
use depfetch_core::pkg::{
    download_packages, read_list, resolve_exact, BranchError, DownloadFailure, DownloadOptions,
    DownloadReport, RegistryClient, ResolveOptions, ResolvedPackage,
};
use depfetch_core::Config;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Where the package list comes from.
#[derive(Debug, Clone)]
pub enum Source {
    Resolve(ResolveRequest),
    ListFile(PathBuf),
}

/// Download command action.
#[derive(Debug, Clone)]
pub struct DownloadAction {
    pub source: Source,
    pub out_dir: PathBuf,
    pub extract: bool,
}

/// Download result for JSON output (shared with `lock-file`).
#[derive(Serialize, Default)]
pub(super) struct DownloadResult {
    ok: bool,
    out_dir: String,
    packages: usize,
    downloaded: Vec<String>,
    existing: Vec<String>,
    failed: Vec<DownloadFailure>,
    skipped: Vec<BranchError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl DownloadResult {
    pub(super) fn failed(out_dir: &Path, failure: &Failure) -> Self {
        Self {
            out_dir: out_dir.display().to_string(),
            error: Some(failure.error.to_string()),
            ..Self::default()
        }
    }
}

pub fn run(config: &Config, action: DownloadAction, json: bool) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    let outcome = runtime.block_on(async {
        let client = registry_client(config)?;
        let resolution = match &action.source {
            Source::Resolve(request) => resolve_request(&client, request).await?,
            Source::ListFile(path) => {
                let entries = read_list(path).map_err(Failure::input)?;
                let options = ResolveOptions {
                    concurrency: config.fetch_concurrency,
                    ..ResolveOptions::default()
                };
                resolve_exact(&client, &entries, &options).await
            }
        };
        let report = fetch_all(config, &client, &resolution.packages, &action).await;
        Ok::<_, Failure>((resolution, report))
    });

    match outcome {
        Ok((resolution, report)) => finish(
            &action.out_dir,
            resolution.packages.len(),
            resolution.skipped,
            report,
            json,
        ),
        Err(failure) => exit_with(
            &failure,
            json,
            &DownloadResult::failed(&action.out_dir, &failure),
        ),
    }
}

async fn fetch_all(
    config: &Config,
    client: &RegistryClient,
    packages: &[ResolvedPackage],
    action: &DownloadAction,
) -> DownloadReport {
    let options = DownloadOptions {
        concurrency: config.download_concurrency,
        extract: action.extract,
    };
    download_packages(client, packages, &action.out_dir, &options).await
}

/// Print a download report; exits 1 if any package failed.
pub(super) fn finish(
    out_dir: &Path,
    packages: usize,
    skipped: Vec<BranchError>,
    report: DownloadReport,
    json: bool,
) -> Result<()> {
    let ok = report.is_success();

    if json {
        print_json(&DownloadResult {
            ok,
            out_dir: out_dir.display().to_string(),
            packages,
            downloaded: report.downloaded,
            existing: report.existing,
            failed: report.failed,
            skipped,
            error: None,
        })?;
    } else {
        for id in &report.downloaded {
            println!("+ {id}");
        }
        for id in &report.existing {
            println!("= {id} (already downloaded)");
        }
        for failure in &report.failed {
            eprintln!("! {}: {} {}", failure.package, failure.code, failure.message);
        }
        print_skipped(&skipped);
        println!(
            "Downloaded {}, already present {}, failed {} -> {}",
            report.downloaded.len(),
            report.existing.len(),
            report.failed.len(),
            out_dir.display()
        );
    }

    if !ok {
        std::process::exit(EXIT_FAILURE);
    }
    Ok(())
}
