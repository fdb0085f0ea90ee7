//! npm registry client.
//!
//! The resolver only sees the [`PackageSource`] trait; [`RegistryClient`] is
//! the HTTP implementation used by the CLI.

use super::deps::{DependencyEdge, EdgeKind};
use super::error::PkgError;
use super::npmrc::{load_npmrc_files, NpmrcConfig};
use super::spec::encode_name;
use crate::config::Config;
use crate::version::USER_AGENT;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use url::Url;

/// Default npm registry URL.
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org/";

/// Environment variable to override registry URL.
pub const REGISTRY_ENV: &str = "DEPFETCH_NPM_REGISTRY";

/// Registry metadata for one package name (the npm "packument").
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryInfo {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "dist-tags", default, deserialize_with = "string_map")]
    pub dist_tags: BTreeMap<String, String>,
    /// Every published version, keyed by version string.
    #[serde(default)]
    pub versions: BTreeMap<String, VersionManifest>,
}

impl RegistryInfo {
    /// The `latest` dist-tag.
    #[must_use]
    pub fn latest_version(&self) -> Option<&str> {
        self.dist_tags.get("latest").map(String::as_str)
    }

    /// Metadata for one published version.
    #[must_use]
    pub fn version(&self, version: &str) -> Option<&VersionManifest> {
        self.versions.get(version)
    }

    /// All published version strings.
    pub fn version_keys(&self) -> impl Iterator<Item = &str> {
        self.versions.keys().map(String::as_str)
    }
}

/// Metadata for a single published version.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionManifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, deserialize_with = "string_map")]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "string_map")]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "string_map")]
    pub peer_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub dist: Option<Dist>,
}

impl VersionManifest {
    /// Tarball URL from `dist.tarball`.
    #[must_use]
    pub fn tarball(&self) -> Option<&str> {
        self.dist.as_ref()?.tarball.as_deref()
    }

    /// Hex SHA-1 from `dist.shasum`.
    #[must_use]
    pub fn shasum(&self) -> Option<&str> {
        self.dist.as_ref()?.shasum.as_deref()
    }

    /// All dependency edges in traversal order: runtime, then dev, then peer.
    ///
    /// A name declared in several sections yields one edge per section.
    #[must_use]
    pub fn edges(&self) -> Vec<DependencyEdge> {
        let sections = [
            (EdgeKind::Runtime, &self.dependencies),
            (EdgeKind::Dev, &self.dev_dependencies),
            (EdgeKind::Peer, &self.peer_dependencies),
        ];

        sections
            .into_iter()
            .flat_map(|(kind, map)| {
                map.iter()
                    .map(move |(name, range)| DependencyEdge::new(name, Some(range), kind))
            })
            .collect()
    }
}

/// `dist` section of a version manifest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Dist {
    #[serde(default)]
    pub tarball: Option<String>,
    #[serde(default)]
    pub shasum: Option<String>,
    #[serde(default)]
    pub integrity: Option<String>,
}

/// Accept a JSON object of strings, dropping entries that are not strings.
///
/// Old packuments carry arrays or nulls in dependency sections; those become
/// an empty map instead of failing the whole document.
fn string_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Object(obj) => obj
            .into_iter()
            .filter_map(|(k, v)| match v {
                Value::String(s) => Some((k, s)),
                _ => None,
            })
            .collect(),
        _ => BTreeMap::new(),
    })
}

/// Capability to fetch registry metadata for a package name.
///
/// Implementations must be safe to call concurrently for different names.
pub trait PackageSource {
    /// Fetch the packument for `name`.
    ///
    /// # Errors
    /// `PKG_NOT_FOUND` when the registry does not know the name,
    /// `PKG_REGISTRY_ERROR` on transport or decoding failures.
    fn fetch_package_info(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<RegistryInfo, PkgError>> + Send;
}

/// Registry client for fetching package metadata.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: Url,
    npmrc: NpmrcConfig,
    http: Client,
}

impl RegistryClient {
    /// Create a new registry client with the given base URL.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be created.
    pub fn new(base_url: &str) -> Result<Self, PkgError> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| PkgError::registry(format!("Invalid registry URL '{base_url}': {e}")))?;

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PkgError::registry(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            npmrc: NpmrcConfig::default(),
            http,
        })
    }

    /// Create a client for the given config.
    ///
    /// Registry precedence: `config.registry`, then `DEPFETCH_NPM_REGISTRY`,
    /// then `registry=` from `.npmrc`, then the public npm registry. Scoped
    /// registries and auth tokens always come from `.npmrc`.
    ///
    /// # Errors
    /// Returns an error if the chosen URL is invalid.
    pub fn from_config(config: &Config) -> Result<Self, PkgError> {
        let npmrc = load_npmrc_files(&config.cwd);

        let url = config
            .registry
            .clone()
            .or_else(|| std::env::var(REGISTRY_ENV).ok())
            .or_else(|| npmrc.registry.as_ref().map(ToString::to_string))
            .unwrap_or_else(|| DEFAULT_REGISTRY.to_string());

        Ok(Self::new(&url)?.with_npmrc(npmrc))
    }

    /// Attach `.npmrc` settings for scoped registries and tokens.
    #[must_use]
    pub fn with_npmrc(mut self, npmrc: NpmrcConfig) -> Self {
        self.npmrc = npmrc;
        self
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Get the HTTP client (for reuse in tarball downloads).
    #[must_use]
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Registry serving `name`: its scope's registry, else the base URL.
    #[must_use]
    pub fn registry_for(&self, name: &str) -> &Url {
        self.npmrc.registry_for(name).unwrap_or(&self.base_url)
    }

    /// Bearer token to send with a request to `url`, if `.npmrc` has one.
    #[must_use]
    pub fn auth_token_for(&self, url: &str) -> Option<&str> {
        let url = Url::parse(url).ok()?;
        self.npmrc.token_for(&url)
    }

    /// Fetch the packument (package metadata) for a package.
    ///
    /// # Errors
    /// Returns an error if the request fails or the package is not found.
    pub async fn fetch_packument(&self, name: &str) -> Result<RegistryInfo, PkgError> {
        let registry = self.registry_for(name);
        let url = registry
            .join(&encode_name(name))
            .map_err(|e| PkgError::registry(format!("Failed to build URL for '{name}': {e}")))?;

        let mut request = self
            .http
            .get(url.as_str())
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = self.npmrc.token_for(registry) {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PkgError::not_found(name));
        }

        if !response.status().is_success() {
            return Err(PkgError::registry(format!(
                "Registry returned status {} for '{name}'",
                response.status()
            )));
        }

        let bytes = response.bytes().await?;
        let info: RegistryInfo = serde_json::from_slice(&bytes)?;
        Ok(info)
    }
}

impl PackageSource for RegistryClient {
    async fn fetch_package_info(&self, name: &str) -> Result<RegistryInfo, PkgError> {
        self.fetch_packument(name).await
    }
}
