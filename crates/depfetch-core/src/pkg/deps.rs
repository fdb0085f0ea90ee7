//! Dependency edges and package.json reading.
//!
//! A manifest's `dependencies`, `devDependencies` and `peerDependencies`
//! become a flat list of [`DependencyEdge`]s that the resolver walks from.

use super::error::{codes, PkgError};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Which manifest section declared an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Runtime,
    Dev,
    Peer,
}

impl EdgeKind {
    /// The manifest section this kind is read from.
    #[must_use]
    pub fn section(self) -> &'static str {
        match self {
            Self::Runtime => "dependencies",
            Self::Dev => "devDependencies",
            Self::Peer => "peerDependencies",
        }
    }
}

/// A declared dependency: target name, optional range, and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub name: String,
    /// `None` means "latest".
    pub range: Option<String>,
    pub kind: EdgeKind,
}

impl DependencyEdge {
    #[must_use]
    pub fn new(name: impl Into<String>, range: Option<&str>, kind: EdgeKind) -> Self {
        Self {
            name: name.into(),
            range: range.map(str::to_string),
            kind,
        }
    }
}

/// Set of edge kinds the walk follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeKinds {
    pub runtime: bool,
    pub dev: bool,
    pub peer: bool,
}

impl Default for EdgeKinds {
    fn default() -> Self {
        Self::all()
    }
}

impl EdgeKinds {
    #[must_use]
    pub fn all() -> Self {
        Self {
            runtime: true,
            dev: true,
            peer: true,
        }
    }

    #[must_use]
    pub fn contains(self, kind: EdgeKind) -> bool {
        match kind {
            EdgeKind::Runtime => self.runtime,
            EdgeKind::Dev => self.dev,
            EdgeKind::Peer => self.peer,
        }
    }
}

/// Root package.json contents relevant to resolution.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub name: Option<String>,
    pub version: Option<String>,
    /// Edges in section order (runtime, dev, peer), each section sorted by name.
    pub edges: Vec<DependencyEdge>,
    /// Entries that could not be turned into edges.
    pub errors: Vec<PkgDepError>,
}

/// Error encountered while extracting a dependency.
#[derive(Debug, Clone)]
pub struct PkgDepError {
    /// Package name, or the section name for section-level errors.
    pub name: String,
    /// Error code.
    pub code: &'static str,
    /// Error message.
    pub message: String,
}

impl PkgDepError {
    /// Create a new dependency error.
    #[must_use]
    pub fn new(name: impl Into<String>, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code,
            message: message.into(),
        }
    }

    /// Create an invalid range error.
    #[must_use]
    pub fn invalid_range(name: &str, actual_type: &str) -> Self {
        Self::new(
            name,
            codes::PKG_DEP_RANGE_INVALID,
            format!("expected string, got {actual_type}"),
        )
    }

    /// Create an invalid section error.
    #[must_use]
    pub fn invalid_section(section: &str, actual_type: &str) -> Self {
        Self::new(
            section,
            codes::PKG_PACKAGE_JSON_INVALID,
            format!("'{section}' must be an object, got {actual_type}"),
        )
    }
}

/// Read a package.json and extract its dependency edges.
///
/// # Errors
/// Returns `PkgError` if the file is missing, unreadable, or not a JSON object.
/// Per-entry problems are collected in [`Manifest::errors`].
pub fn read_manifest(package_json_path: &Path) -> Result<Manifest, PkgError> {
    if !package_json_path.exists() {
        return Err(PkgError::package_json_not_found(package_json_path));
    }

    let content = fs::read_to_string(package_json_path)
        .map_err(|e| PkgError::package_json_invalid(format!("Failed to read: {e}")))?;

    parse_manifest(&content)
}

/// Parse package.json content. See [`read_manifest`].
pub fn parse_manifest(content: &str) -> Result<Manifest, PkgError> {
    let pkg_json: Value = serde_json::from_str(content)
        .map_err(|e| PkgError::package_json_invalid(format!("Invalid JSON: {e}")))?;

    let root = pkg_json
        .as_object()
        .ok_or_else(|| PkgError::package_json_invalid("package.json must be a JSON object"))?;

    let mut manifest = Manifest {
        name: root.get("name").and_then(Value::as_str).map(String::from),
        version: root.get("version").and_then(Value::as_str).map(String::from),
        ..Manifest::default()
    };

    for kind in [EdgeKind::Runtime, EdgeKind::Dev, EdgeKind::Peer] {
        extract_section(root, kind, &mut manifest);
    }

    Ok(manifest)
}

/// Extract edges from one section of package.json.
fn extract_section(root: &serde_json::Map<String, Value>, kind: EdgeKind, manifest: &mut Manifest) {
    let section = kind.section();
    let Some(section_value) = root.get(section) else {
        return;
    };

    let Some(section_obj) = section_value.as_object() else {
        manifest.errors.push(PkgDepError::invalid_section(
            section,
            json_type_name(section_value),
        ));
        return;
    };

    let mut entries: Vec<(&String, &Value)> = section_obj.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    for (name, range_value) in entries {
        if let Some(range) = range_value.as_str() {
            let range = if range.trim().is_empty() { None } else { Some(range) };
            manifest.edges.push(DependencyEdge::new(name.clone(), range, kind));
        } else {
            manifest.errors.push(PkgDepError::invalid_range(
                name,
                json_type_name(range_value),
            ));
        }
    }
}

/// Get a human-readable type name for a JSON value.
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
