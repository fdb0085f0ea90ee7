//! Dependency walk.
//!
//! Discovers the flat set of `(name, version)` pairs reachable from one or
//! more roots, down to a depth limit. The walk processes an explicit queue in
//! waves (one wave per level): packuments for the names in a wave are fetched
//! in parallel, then the wave is applied in queue order so the output is
//! deterministic.
//!
//! Per edge, the highest version satisfying the range is recorded and walked
//! further. When the lowest satisfying version differs, it is recorded too,
//! at the same level, but not walked.

use super::deps::{DependencyEdge, EdgeKinds};
use super::error::PkgError;
use super::registry::{PackageSource, RegistryInfo};
use super::version::{max_satisfying, min_satisfying};
use crate::config::DEFAULT_FETCH_CONCURRENCY;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Options for a dependency walk.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Walk into dependencies at all. When false only roots are recorded.
    pub deep: bool,
    /// Deepest level whose dependencies are still walked (roots are level 1).
    pub max_level: usize,
    /// Package names never walked or recorded.
    pub excludes: BTreeSet<String>,
    /// Edge kinds to follow.
    pub kinds: EdgeKinds,
    /// Concurrent packument fetches per wave.
    pub concurrency: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            deep: false,
            max_level: 1,
            excludes: BTreeSet::new(),
            kinds: EdgeKinds::all(),
            concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }
}

/// One resolved package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPackage {
    pub name: String,
    pub version: String,
    /// Tarball URL; `None` when the registry metadata has no `dist.tarball`.
    pub url: Option<String>,
    /// Depth at which the package was first discovered.
    pub level: usize,
    /// Hex SHA-1 from `dist.shasum`, used to verify downloads.
    #[serde(skip)]
    pub shasum: Option<String>,
}

impl ResolvedPackage {
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>, level: usize) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            url: None,
            level,
            shasum: None,
        }
    }

    #[must_use]
    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }

    #[must_use]
    pub fn with_shasum(mut self, shasum: Option<String>) -> Self {
        self.shasum = shasum;
        self
    }

    /// `name@version`.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

/// Why a branch contributed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The registry does not know the name.
    NotFound,
    /// Transport, status or decoding failure.
    Network,
    /// The packument has no published versions.
    NoVersions,
    /// No published version satisfies the range.
    NoMatch,
    /// The range could not be parsed.
    InvalidRange,
}

impl SkipReason {
    fn from_fetch_error(err: &PkgError) -> Self {
        if err.is_not_found() {
            Self::NotFound
        } else {
            Self::Network
        }
    }
}

/// A skipped branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchError {
    pub name: String,
    pub range: Option<String>,
    /// Level the package would have been recorded at.
    pub level: usize,
    pub reason: SkipReason,
    pub message: String,
}

/// Output of a walk: the deduplicated packages plus every skipped branch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Resolution {
    pub packages: Vec<ResolvedPackage>,
    pub skipped: Vec<BranchError>,
}

/// Resolve a single root package and, when `options.deep` is set, its
/// dependencies.
///
/// # Errors
/// Returns `PKG_RESOLUTION_FAILED` (with the fetch error as its cause) when
/// the root's metadata cannot be fetched. Every other failure is recorded in
/// [`Resolution::skipped`].
pub async fn resolve<S: PackageSource>(
    source: &S,
    name: &str,
    range: Option<&str>,
    options: &ResolveOptions,
) -> Result<Resolution, PkgError> {
    let root = Pending {
        name: name.to_string(),
        range: range.map(str::to_string),
        depth: 0,
    };

    let mut walk = Walk::new(source, options);
    walk.prefetch(std::slice::from_ref(&root)).await;
    if let Some(Err(err)) = walk.cache.get(name) {
        return Err(PkgError::resolution_failed(name, err.clone()));
    }

    walk.run(vec![root]).await;
    Ok(walk.finish())
}

/// Resolve every root edge of a manifest.
///
/// Root edges go through the same kind and exclude filters as any other
/// edge. A failing root is recorded as skipped; it never fails the call.
pub async fn resolve_many<S: PackageSource>(
    source: &S,
    roots: &[DependencyEdge],
    options: &ResolveOptions,
) -> Resolution {
    let mut walk = Walk::new(source, options);
    let wave = roots
        .iter()
        .filter(|edge| walk.follows(edge))
        .map(|edge| Pending {
            name: edge.name.clone(),
            range: edge.range.clone(),
            depth: 0,
        })
        .collect();

    walk.run(wave).await;
    walk.finish()
}

/// Look up tarball locations for an already flattened `(name, version)` list.
///
/// Entries are recorded at level 1. Unknown names or versions are skipped.
pub async fn resolve_exact<S: PackageSource>(
    source: &S,
    entries: &[(String, String)],
    options: &ResolveOptions,
) -> Resolution {
    let mut walk = Walk::new(source, options);
    let wave: Vec<Pending> = entries
        .iter()
        .map(|(name, version)| Pending {
            name: name.clone(),
            range: Some(version.clone()),
            depth: 0,
        })
        .collect();
    walk.prefetch(&wave).await;

    for dep in &wave {
        let Some(info) = walk.packument(dep) else {
            continue;
        };
        let version = dep.range.as_deref().unwrap_or_default();
        if info.version(version).is_some() {
            walk.record(&info, &dep.name, version, 1);
        } else {
            let err = PkgError::version_not_found(&dep.name, version);
            walk.skip(dep, SkipReason::NoMatch, err.to_string());
        }
    }

    walk.finish()
}

/// Drop repeated `(name, version)` pairs, keeping the first occurrence.
#[must_use]
pub fn dedup(packages: Vec<ResolvedPackage>) -> Vec<ResolvedPackage> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    packages
        .into_iter()
        .filter(|pkg| seen.insert((pkg.name.clone(), pkg.version.clone())))
        .collect()
}

/// A queued edge. `depth` is the level of the node that declared it.
#[derive(Debug, Clone)]
struct Pending {
    name: String,
    range: Option<String>,
    depth: usize,
}

type FetchResult = Result<Arc<RegistryInfo>, PkgError>;

struct Walk<'a, S> {
    source: &'a S,
    options: &'a ResolveOptions,
    /// Packuments (or the fetch error) by name; each name is fetched once.
    cache: HashMap<String, FetchResult>,
    /// `(name, range)` pairs already visited. A later visit can only
    /// produce the same records at a deeper level.
    visited: HashSet<(String, Option<String>)>,
    /// `(name, version)` pairs whose dependencies were already queued.
    expanded: HashSet<(String, String)>,
    packages: Vec<ResolvedPackage>,
    skipped: Vec<BranchError>,
}

impl<'a, S: PackageSource> Walk<'a, S> {
    fn new(source: &'a S, options: &'a ResolveOptions) -> Self {
        Self {
            source,
            options,
            cache: HashMap::new(),
            visited: HashSet::new(),
            expanded: HashSet::new(),
            packages: Vec::new(),
            skipped: Vec::new(),
        }
    }

    async fn run(&mut self, mut wave: Vec<Pending>) {
        while !wave.is_empty() {
            self.prefetch(&wave).await;

            let mut next = Vec::new();
            for dep in wave {
                self.visit(dep, &mut next);
            }
            wave = next;
        }
    }

    /// Fetch every not yet cached name in `wave`.
    async fn prefetch(&mut self, wave: &[Pending]) {
        let mut seen = HashSet::new();
        let names: Vec<String> = wave
            .iter()
            .filter(|dep| !self.cache.contains_key(&dep.name) && seen.insert(dep.name.as_str()))
            .map(|dep| dep.name.clone())
            .collect();

        if names.is_empty() {
            return;
        }

        let source = self.source;
        let fetched: Vec<(String, Result<RegistryInfo, PkgError>)> = stream::iter(names)
            .map(|name| async move {
                debug!(name = %name, "fetching packument");
                let result = source.fetch_package_info(&name).await;
                (name, result)
            })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;

        for (name, result) in fetched {
            self.cache.insert(name, result.map(Arc::new));
        }
    }

    fn visit(&mut self, dep: Pending, next: &mut Vec<Pending>) {
        if !self.visited.insert((dep.name.clone(), dep.range.clone())) {
            return;
        }

        let level = dep.depth + 1;
        let Some(info) = self.packument(&dep) else {
            return;
        };

        if info.versions.is_empty() {
            self.skip(&dep, SkipReason::NoVersions, "no published versions".to_string());
            return;
        }

        let range = dep.range.as_deref();
        let best = match max_satisfying(&info, range) {
            Ok(Some(version)) => version,
            Ok(None) => {
                let err = PkgError::version_not_found(&dep.name, range.unwrap_or("latest"));
                self.skip(&dep, SkipReason::NoMatch, err.to_string());
                return;
            }
            Err(err) => {
                self.skip(&dep, SkipReason::InvalidRange, err.message().to_string());
                return;
            }
        };

        self.record(&info, &dep.name, &best, level);

        match min_satisfying(&info, range) {
            Ok(Some(floor)) if floor != best => self.record(&info, &dep.name, &floor, level),
            Ok(_) => {}
            Err(err) => warn!(name = %dep.name, "could not compute range floor: {err}"),
        }

        if !self.options.deep || level > self.options.max_level {
            return;
        }
        if !self.expanded.insert((dep.name.clone(), best.clone())) {
            return;
        }

        let Some(manifest) = info.version(&best) else {
            return;
        };
        for edge in manifest.edges() {
            if self.follows(&edge) {
                next.push(Pending {
                    name: edge.name,
                    range: edge.range,
                    depth: level,
                });
            }
        }
    }

    fn follows(&self, edge: &DependencyEdge) -> bool {
        self.options.kinds.contains(edge.kind) && !self.options.excludes.contains(&edge.name)
    }

    /// Cached packument for `dep`; a cached fetch error is recorded as a skip.
    fn packument(&mut self, dep: &Pending) -> Option<Arc<RegistryInfo>> {
        match self.cache.get(&dep.name) {
            Some(Ok(info)) => Some(Arc::clone(info)),
            Some(Err(err)) => {
                let (reason, message) = (SkipReason::from_fetch_error(err), err.to_string());
                self.skip(dep, reason, message);
                None
            }
            None => None,
        }
    }

    fn record(&mut self, info: &RegistryInfo, name: &str, version: &str, level: usize) {
        let manifest = info.version(version);
        let url = manifest.and_then(|m| m.tarball()).map(str::to_string);
        let shasum = manifest.and_then(|m| m.shasum()).map(str::to_string);

        debug!(name, version, level, "resolved");
        self.packages.push(
            ResolvedPackage::new(name, version, level)
                .with_url(url)
                .with_shasum(shasum),
        );
    }

    fn skip(&mut self, dep: &Pending, reason: SkipReason, message: String) {
        warn!(
            name = %dep.name,
            range = dep.range.as_deref().unwrap_or("latest"),
            level = dep.depth + 1,
            ?reason,
            "skipping branch: {message}"
        );
        self.skipped.push(BranchError {
            name: dep.name.clone(),
            range: dep.range.clone(),
            level: dep.depth + 1,
            reason,
            message,
        });
    }

    fn finish(self) -> Resolution {
        let packages = dedup(self.packages);
        info!(
            packages = packages.len(),
            skipped = self.skipped.len(),
            fetched = self.cache.len(),
            "resolution complete"
        );
        Resolution {
            packages,
            skipped: self.skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::deps::EdgeKind;
    use crate::pkg::registry::{Dist, VersionManifest};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MemoryRegistry {
        packages: HashMap<String, RegistryInfo>,
        broken: HashSet<String>,
        fetches: AtomicUsize,
    }

    impl MemoryRegistry {
        fn publish(&mut self, name: &str, version: &str, deps: &[(&str, &str)]) -> &mut Self {
            self.publish_manifest(
                name,
                VersionManifest {
                    dependencies: map(deps),
                    ..VersionManifest::default()
                },
                version,
            )
        }

        fn publish_manifest(
            &mut self,
            name: &str,
            mut manifest: VersionManifest,
            version: &str,
        ) -> &mut Self {
            manifest.name = name.to_string();
            manifest.version = version.to_string();
            manifest.dist = Some(Dist {
                tarball: Some(format!("https://registry.test/{name}/-/{name}-{version}.tgz")),
                shasum: Some(format!("sha-{name}-{version}")),
                integrity: None,
            });

            let info = self
                .packages
                .entry(name.to_string())
                .or_insert_with(|| RegistryInfo {
                    name: name.to_string(),
                    ..RegistryInfo::default()
                });
            info.versions.insert(version.to_string(), manifest);
            info.dist_tags
                .insert("latest".to_string(), version.to_string());
            self
        }

        fn empty(&mut self, name: &str) -> &mut Self {
            self.packages.insert(
                name.to_string(),
                RegistryInfo {
                    name: name.to_string(),
                    ..RegistryInfo::default()
                },
            );
            self
        }

        fn broken(&mut self, name: &str) -> &mut Self {
            self.broken.insert(name.to_string());
            self
        }
    }

    impl PackageSource for MemoryRegistry {
        async fn fetch_package_info(&self, name: &str) -> Result<RegistryInfo, PkgError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.broken.contains(name) {
                return Err(PkgError::registry("connection reset"));
            }
            self.packages
                .get(name)
                .cloned()
                .ok_or_else(|| PkgError::not_found(name))
        }
    }

    fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn deep(max_level: usize) -> ResolveOptions {
        ResolveOptions {
            deep: true,
            max_level,
            ..ResolveOptions::default()
        }
    }

    fn ids(resolution: &Resolution) -> Vec<(String, usize)> {
        resolution
            .packages
            .iter()
            .map(|p| (p.id(), p.level))
            .collect()
    }

    fn pairs(items: &[(&str, usize)]) -> Vec<(String, usize)> {
        items.iter().map(|(id, l)| ((*id).to_string(), *l)).collect()
    }

    #[tokio::test]
    async fn test_max_satisfying_and_floor_at_same_level() {
        let mut registry = MemoryRegistry::default();
        registry
            .publish("a", "1.0.0", &[])
            .publish("a", "1.2.0", &[])
            .publish("a", "2.0.0", &[]);

        let resolution = resolve(&registry, "a", Some("^1.0.0"), &ResolveOptions::default())
            .await
            .unwrap();

        assert_eq!(ids(&resolution), pairs(&[("a@1.2.0", 1), ("a@1.0.0", 1)]));
        assert!(resolution.skipped.is_empty());
    }

    #[tokio::test]
    async fn test_root_without_range_uses_latest() {
        let mut registry = MemoryRegistry::default();
        registry.publish("a", "1.0.0", &[]).publish("a", "1.5.0", &[]);

        let resolution = resolve(&registry, "a", None, &ResolveOptions::default())
            .await
            .unwrap();

        assert_eq!(ids(&resolution), pairs(&[("a@1.5.0", 1)]));
        let root = &resolution.packages[0];
        assert_eq!(
            root.url.as_deref(),
            Some("https://registry.test/a/-/a-1.5.0.tgz")
        );
        assert_eq!(root.shasum.as_deref(), Some("sha-a-1.5.0"));
    }

    #[tokio::test]
    async fn test_depth_bound() {
        let mut registry = MemoryRegistry::default();
        registry
            .publish("a", "1.0.0", &[("b", "1.0.0")])
            .publish("b", "1.0.0", &[("c", "1.0.0")])
            .publish("c", "1.0.0", &[("d", "1.0.0")])
            .publish("d", "1.0.0", &[]);

        let one = resolve(&registry, "a", None, &deep(1)).await.unwrap();
        assert_eq!(ids(&one), pairs(&[("a@1.0.0", 1), ("b@1.0.0", 2)]));

        let two = resolve(&registry, "a", None, &deep(2)).await.unwrap();
        assert_eq!(
            ids(&two),
            pairs(&[("a@1.0.0", 1), ("b@1.0.0", 2), ("c@1.0.0", 3)])
        );
        assert!(two.packages.iter().all(|p| p.level <= 3));
    }

    #[tokio::test]
    async fn test_shallow_walk_records_only_root() {
        let mut registry = MemoryRegistry::default();
        registry
            .publish("a", "1.0.0", &[("b", "1.0.0")])
            .publish("b", "1.0.0", &[]);

        let options = ResolveOptions {
            deep: false,
            max_level: 5,
            ..ResolveOptions::default()
        };
        let resolution = resolve(&registry, "a", None, &options).await.unwrap();

        assert_eq!(ids(&resolution), pairs(&[("a@1.0.0", 1)]));
        assert_eq!(registry.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exclusion() {
        let mut registry = MemoryRegistry::default();
        registry
            .publish("root", "1.0.0", &[("a", "1.0.0"), ("b", "1.0.0")])
            .publish("a", "1.0.0", &[("b", "1.0.0")])
            .publish("b", "1.0.0", &[]);

        let options = ResolveOptions {
            excludes: BTreeSet::from(["b".to_string()]),
            ..deep(3)
        };
        let resolution = resolve(&registry, "root", None, &options).await.unwrap();

        assert_eq!(ids(&resolution), pairs(&[("root@1.0.0", 1), ("a@1.0.0", 2)]));
        assert!(resolution.packages.iter().all(|p| p.name != "b"));
    }

    #[tokio::test]
    async fn test_no_match_terminates_branch() {
        let mut registry = MemoryRegistry::default();
        registry.publish("a", "1.0.0", &[]).publish("a", "2.0.0", &[]);

        let resolution = resolve(&registry, "a", Some("^9.0.0"), &deep(3))
            .await
            .unwrap();

        assert!(resolution.packages.is_empty());
        assert_eq!(resolution.skipped.len(), 1);
        assert_eq!(resolution.skipped[0].reason, SkipReason::NoMatch);
        assert_eq!(resolution.skipped[0].level, 1);
    }

    #[tokio::test]
    async fn test_empty_registry_terminates_branch() {
        let mut registry = MemoryRegistry::default();
        registry
            .publish("root", "1.0.0", &[("ghost", "^1.0.0")])
            .empty("ghost");

        let resolution = resolve(&registry, "root", None, &deep(2)).await.unwrap();

        assert_eq!(ids(&resolution), pairs(&[("root@1.0.0", 1)]));
        assert_eq!(resolution.skipped[0].name, "ghost");
        assert_eq!(resolution.skipped[0].reason, SkipReason::NoVersions);
    }

    #[tokio::test]
    async fn test_dedup_keeps_first_occurrence() {
        let mut registry = MemoryRegistry::default();
        registry
            .publish("a", "1.0.0", &[("b", "^1.0.0"), ("c", "^1.0.0")])
            .publish("b", "1.0.0", &[("c", "1.0.0")])
            .publish("c", "1.0.0", &[]);

        let resolution = resolve(&registry, "a", None, &deep(5)).await.unwrap();

        assert_eq!(
            ids(&resolution),
            pairs(&[("a@1.0.0", 1), ("b@1.0.0", 2), ("c@1.0.0", 2)])
        );
    }

    #[tokio::test]
    async fn test_duplicate_edges_across_kinds_are_each_walked() {
        let mut registry = MemoryRegistry::default();
        registry.publish_manifest(
            "a",
            VersionManifest {
                dependencies: map(&[("b", "^1.0.0")]),
                peer_dependencies: map(&[("b", "1.0.0")]),
                dev_dependencies: map(&[("c", "1.0.0")]),
                ..VersionManifest::default()
            },
            "1.0.0",
        );
        registry
            .publish("b", "1.0.0", &[])
            .publish("b", "1.1.0", &[])
            .publish("c", "1.0.0", &[]);

        let resolution = resolve(&registry, "a", None, &deep(1)).await.unwrap();

        assert_eq!(
            ids(&resolution),
            pairs(&[("a@1.0.0", 1), ("b@1.1.0", 2), ("b@1.0.0", 2), ("c@1.0.0", 2)])
        );
    }

    #[tokio::test]
    async fn test_edge_kind_filter() {
        let mut registry = MemoryRegistry::default();
        registry.publish_manifest(
            "a",
            VersionManifest {
                dependencies: map(&[("b", "1.0.0")]),
                dev_dependencies: map(&[("c", "1.0.0")]),
                peer_dependencies: map(&[("d", "1.0.0")]),
                ..VersionManifest::default()
            },
            "1.0.0",
        );
        registry
            .publish("b", "1.0.0", &[])
            .publish("c", "1.0.0", &[])
            .publish("d", "1.0.0", &[]);

        let options = ResolveOptions {
            kinds: EdgeKinds {
                dev: false,
                peer: false,
                ..EdgeKinds::all()
            },
            ..deep(1)
        };
        let resolution = resolve(&registry, "a", None, &options).await.unwrap();

        assert_eq!(ids(&resolution), pairs(&[("a@1.0.0", 1), ("b@1.0.0", 2)]));
    }

    #[tokio::test]
    async fn test_root_not_found_fails_resolution() {
        let registry = MemoryRegistry::default();

        let err = resolve(&registry, "missing", None, &deep(1))
            .await
            .unwrap_err();

        assert_eq!(err.code(), crate::pkg::error::codes::PKG_RESOLUTION_FAILED);
        assert!(err.cause().is_some_and(PkgError::is_not_found));
    }

    #[tokio::test]
    async fn test_root_network_error_fails_resolution() {
        let mut registry = MemoryRegistry::default();
        registry.broken("a");

        let err = resolve(&registry, "a", None, &deep(1)).await.unwrap_err();

        assert_eq!(err.code(), crate::pkg::error::codes::PKG_RESOLUTION_FAILED);
        assert_eq!(
            err.cause().map(PkgError::code),
            Some(crate::pkg::error::codes::PKG_REGISTRY_ERROR)
        );
    }

    #[tokio::test]
    async fn test_failing_dependencies_are_skipped() {
        let mut registry = MemoryRegistry::default();
        registry
            .publish("a", "1.0.0", &[("gone", "1.0.0"), ("flaky", "1.0.0"), ("ok", "1.0.0")])
            .publish("ok", "1.0.0", &[])
            .broken("flaky");

        let resolution = resolve(&registry, "a", None, &deep(1)).await.unwrap();

        assert_eq!(ids(&resolution), pairs(&[("a@1.0.0", 1), ("ok@1.0.0", 2)]));
        let reasons: Vec<(&str, SkipReason)> = resolution
            .skipped
            .iter()
            .map(|s| (s.name.as_str(), s.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![("flaky", SkipReason::Network), ("gone", SkipReason::NotFound)]
        );
    }

    #[tokio::test]
    async fn test_unknown_dist_tag_is_no_match() {
        let mut registry = MemoryRegistry::default();
        registry
            .publish("a", "1.0.0", &[("b", "next")])
            .publish("b", "1.0.0", &[]);

        let resolution = resolve(&registry, "a", None, &deep(1)).await.unwrap();

        assert_eq!(ids(&resolution), pairs(&[("a@1.0.0", 1)]));
        assert_eq!(resolution.skipped[0].name, "b");
        assert_eq!(resolution.skipped[0].reason, SkipReason::NoMatch);
    }

    #[tokio::test]
    async fn test_hyphen_range_dependency_records_floor() {
        let mut registry = MemoryRegistry::default();
        registry
            .publish("a", "1.0.0", &[("b", "1.0 - 2")])
            .publish("b", "0.9.0", &[])
            .publish("b", "1.0.0", &[])
            .publish("b", "2.4.0", &[])
            .publish("b", "3.0.0", &[]);

        let resolution = resolve(&registry, "a", None, &deep(1)).await.unwrap();

        assert_eq!(
            ids(&resolution),
            pairs(&[("a@1.0.0", 1), ("b@2.4.0", 2), ("b@1.0.0", 2)])
        );
        assert!(resolution.skipped.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_range_is_skipped() {
        let mut registry = MemoryRegistry::default();
        registry
            .publish("a", "1.0.0", &[("b", "not a range!!")])
            .publish("b", "1.0.0", &[]);

        let resolution = resolve(&registry, "a", None, &deep(1)).await.unwrap();

        assert_eq!(ids(&resolution), pairs(&[("a@1.0.0", 1)]));
        assert_eq!(resolution.skipped[0].reason, SkipReason::InvalidRange);
    }

    #[tokio::test]
    async fn test_cycle_is_bounded_and_fetched_once() {
        let mut registry = MemoryRegistry::default();
        registry
            .publish("a", "1.0.0", &[("b", "1.0.0")])
            .publish("b", "1.0.0", &[("a", "1.0.0")]);

        let resolution = resolve(&registry, "a", None, &deep(10)).await.unwrap();

        assert_eq!(ids(&resolution), pairs(&[("a@1.0.0", 1), ("b@1.0.0", 2)]));
        assert_eq!(registry.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dist_tag_range() {
        let mut registry = MemoryRegistry::default();
        registry
            .publish("a", "1.0.0", &[])
            .publish("a", "2.0.0-beta.1", &[]);
        registry
            .packages
            .get_mut("a")
            .unwrap()
            .dist_tags
            .insert("latest".to_string(), "1.0.0".to_string());
        registry
            .packages
            .get_mut("a")
            .unwrap()
            .dist_tags
            .insert("next".to_string(), "2.0.0-beta.1".to_string());

        let resolution = resolve(&registry, "a", Some("next"), &ResolveOptions::default())
            .await
            .unwrap();

        assert_eq!(ids(&resolution), pairs(&[("a@2.0.0-beta.1", 1)]));
    }

    #[tokio::test]
    async fn test_resolve_many_filters_roots_and_never_fails() {
        let mut registry = MemoryRegistry::default();
        registry
            .publish("a", "1.0.0", &[("c", "1.0.0")])
            .publish("b", "1.0.0", &[])
            .publish("c", "1.0.0", &[])
            .publish("jest", "29.0.0", &[]);

        let roots = vec![
            DependencyEdge::new("a", Some("^1.0.0"), EdgeKind::Runtime),
            DependencyEdge::new("b", None, EdgeKind::Runtime),
            DependencyEdge::new("missing", Some("1.0.0"), EdgeKind::Runtime),
            DependencyEdge::new("jest", Some("^29.0.0"), EdgeKind::Dev),
        ];
        let options = ResolveOptions {
            excludes: BTreeSet::from(["b".to_string()]),
            kinds: EdgeKinds {
                dev: false,
                ..EdgeKinds::all()
            },
            ..deep(1)
        };

        let resolution = resolve_many(&registry, &roots, &options).await;

        assert_eq!(ids(&resolution), pairs(&[("a@1.0.0", 1), ("c@1.0.0", 2)]));
        assert_eq!(resolution.skipped.len(), 1);
        assert_eq!(resolution.skipped[0].name, "missing");
        assert_eq!(resolution.skipped[0].reason, SkipReason::NotFound);
    }

    #[tokio::test]
    async fn test_resolve_exact() {
        let mut registry = MemoryRegistry::default();
        registry
            .publish("a", "1.0.0", &[("b", "1.0.0")])
            .publish("a", "2.0.0", &[])
            .publish("b", "1.0.0", &[]);

        let entries = vec![
            ("a".to_string(), "1.0.0".to_string()),
            ("a".to_string(), "3.0.0".to_string()),
            ("b".to_string(), "1.0.0".to_string()),
            ("a".to_string(), "1.0.0".to_string()),
        ];
        let resolution = resolve_exact(&registry, &entries, &deep(5)).await;

        assert_eq!(ids(&resolution), pairs(&[("a@1.0.0", 1), ("b@1.0.0", 1)]));
        assert_eq!(resolution.skipped.len(), 1);
        assert_eq!(resolution.skipped[0].reason, SkipReason::NoMatch);
        assert_eq!(registry.fetches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dedup() {
        let packages = vec![
            ResolvedPackage::new("a", "1.0.0", 1),
            ResolvedPackage::new("b", "1.0.0", 2),
            ResolvedPackage::new("a", "1.0.0", 3),
            ResolvedPackage::new("a", "2.0.0", 3),
        ];

        let deduped = dedup(packages);

        assert_eq!(deduped.len(), 3);
        assert_eq!(deduped[0].level, 1);
        assert_eq!(deduped[2].id(), "a@2.0.0");
    }

    #[test]
    fn test_resolved_package_json_shape() {
        let pkg = ResolvedPackage::new("@scope/a", "1.0.0", 2)
            .with_url(Some("https://registry.test/a.tgz".to_string()))
            .with_shasum(Some("abc".to_string()));

        let json = serde_json::to_value(&pkg).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "name": "@scope/a",
                "version": "1.0.0",
                "url": "https://registry.test/a.tgz",
                "level": 2
            })
        );
    }
}
