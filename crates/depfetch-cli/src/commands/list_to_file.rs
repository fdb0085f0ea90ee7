//! `depfetch list-to-file`: resolve and write a `name@version` list file.

use super::resolve::{registry_client, resolve_request, ResolveRequest};
use super::{exit_with, print_json, print_skipped, Failure};
use depfetch_core::pkg::{write_list, BranchError};
use depfetch_core::Config;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::Path;

/// List-to-file result for JSON output.
#[derive(Serialize, Default)]
struct ListToFileResult {
    ok: bool,
    path: String,
    count: usize,
    skipped: Vec<BranchError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn run(config: &Config, request: &ResolveRequest, output: &Path, json: bool) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    let outcome = runtime.block_on(async {
        let client = registry_client(config)?;
        let resolution = resolve_request(&client, request).await?;
        write_list(output, &resolution.packages).map_err(Failure::runtime)?;
        Ok::<_, Failure>(resolution)
    });

    let path = output.display().to_string();
    let resolution = match outcome {
        Ok(resolution) => resolution,
        Err(failure) => {
            let result = ListToFileResult {
                path,
                error: Some(failure.error.to_string()),
                ..ListToFileResult::default()
            };
            exit_with(&failure, json, &result);
        }
    };

    if json {
        return print_json(&ListToFileResult {
            ok: true,
            path,
            count: resolution.packages.len(),
            skipped: resolution.skipped,
            error: None,
        });
    }

    println!("Wrote {} packages to {path}", resolution.packages.len());
    print_skipped(&resolution.skipped);
    Ok(())
}
