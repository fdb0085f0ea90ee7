//! Package functionality.
//!
//! Provides:
//! - Parsing package specifications (name@range)
//! - Fetching package metadata from npm registries (`.npmrc` aware)
//! - Matching npm version ranges with semver
//! - Walking dependency graphs down to a depth limit
//! - Reading dependencies from package.json
//! - Reading npm `package-lock.json` files
//! - Reading and writing `name@version` list files
//! - Downloading, verifying and unpacking tarballs

pub mod deps;
pub mod download;
pub mod error;
pub mod list;
pub mod lockfile;
pub mod npmrc;
pub mod registry;
pub mod resolve;
pub mod spec;
pub mod tarball;
pub mod version;

pub use deps::{read_manifest, DependencyEdge, EdgeKind, EdgeKinds, Manifest, PkgDepError};
pub use download::{
    download_packages, target_path, DownloadFailure, DownloadOptions, DownloadReport,
    DEFAULT_OUT_DIR,
};
pub use error::{codes as pkg_codes, PkgError};
pub use list::{format_list, read_list, write_list, DEFAULT_LIST_FILE};
pub use lockfile::{read_npm_lockfile, NPM_LOCKFILE_NAME};
pub use npmrc::NpmrcConfig;
pub use registry::{PackageSource, RegistryClient, RegistryInfo, DEFAULT_REGISTRY, REGISTRY_ENV};
pub use resolve::{
    resolve, resolve_exact, resolve_many, BranchError, Resolution, ResolveOptions,
    ResolvedPackage, SkipReason,
};
pub use spec::PackageSpec;
pub use version::{max_satisfying, min_satisfying};
