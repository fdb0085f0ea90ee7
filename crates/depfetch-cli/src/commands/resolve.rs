//! Shared resolution step for `list`, `download` and `list-to-file`.

use super::Failure;
use depfetch_core::pkg::{
    read_manifest, resolve, resolve_many, PackageSpec, RegistryClient, Resolution,
    ResolveOptions,
};
use depfetch_core::Config;
use std::path::PathBuf;
use tracing::{info, warn};

/// What to resolve and how.
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    /// package.json whose dependency sections are the roots.
    pub manifest: PathBuf,
    /// Single root `name[@range]`; takes precedence over `manifest`.
    pub package: Option<String>,
    pub options: ResolveOptions,
}

pub fn registry_client(config: &Config) -> Result<RegistryClient, Failure> {
    RegistryClient::from_config(config).map_err(Failure::input)
}

/// Run the walk described by `request`.
pub async fn resolve_request(
    client: &RegistryClient,
    request: &ResolveRequest,
) -> Result<Resolution, Failure> {
    if let Some(package) = &request.package {
        let spec = PackageSpec::parse(package).map_err(Failure::input)?;
        info!(package = %spec, registry = %client.base_url(), "resolving");
        return resolve(client, &spec.name, spec.range.as_deref(), &request.options)
            .await
            .map_err(Failure::runtime);
    }

    let manifest = read_manifest(&request.manifest).map_err(Failure::input)?;
    for err in &manifest.errors {
        warn!(name = %err.name, code = err.code, "ignoring dependency: {}", err.message);
    }

    info!(
        manifest = %request.manifest.display(),
        roots = manifest.edges.len(),
        registry = %client.base_url(),
        "resolving"
    );
    Ok(resolve_many(client, &manifest.edges, &request.options).await)
}
