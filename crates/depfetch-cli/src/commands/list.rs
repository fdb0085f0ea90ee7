//! `depfetch list`: resolve and print the dependency list.

use super::resolve::{registry_client, resolve_request, ResolveRequest};
use super::{exit_with, print_json, print_skipped};
use depfetch_core::pkg::{BranchError, ResolvedPackage};
use depfetch_core::Config;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

/// List result for JSON output.
#[derive(Serialize, Default)]
struct ListResult {
    ok: bool,
    packages: Vec<ResolvedPackage>,
    skipped: Vec<BranchError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn run(config: &Config, request: &ResolveRequest, json: bool) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    let outcome = runtime.block_on(async {
        let client = registry_client(config)?;
        resolve_request(&client, request).await
    });

    let resolution = match outcome {
        Ok(resolution) => resolution,
        Err(failure) => {
            let result = ListResult {
                error: Some(failure.error.to_string()),
                ..ListResult::default()
            };
            exit_with(&failure, json, &result);
        }
    };

    if json {
        return print_json(&ListResult {
            ok: true,
            packages: resolution.packages,
            skipped: resolution.skipped,
            error: None,
        });
    }

    if resolution.packages.is_empty() {
        println!("No packages resolved");
    }
    for pkg in &resolution.packages {
        println!("{}@{} (level {})", pkg.name, pkg.version, pkg.level);
    }
    print_skipped(&resolution.skipped);
    Ok(())
}
