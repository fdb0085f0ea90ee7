//! Package layer error types.

use std::fmt;
use std::io;

/// Package layer error codes.
pub mod codes {
    pub const PKG_SPEC_INVALID: &str = "PKG_SPEC_INVALID";
    pub const PKG_NOT_FOUND: &str = "PKG_NOT_FOUND";
    pub const PKG_VERSION_NOT_FOUND: &str = "PKG_VERSION_NOT_FOUND";
    pub const PKG_REGISTRY_ERROR: &str = "PKG_REGISTRY_ERROR";
    pub const PKG_RESOLUTION_FAILED: &str = "PKG_RESOLUTION_FAILED";
    pub const PKG_DOWNLOAD_FAILED: &str = "PKG_DOWNLOAD_FAILED";
    pub const PKG_INTEGRITY_MISMATCH: &str = "PKG_INTEGRITY_MISMATCH";
    pub const PKG_EXTRACT_FAILED: &str = "PKG_EXTRACT_FAILED";
    pub const PKG_WRITE_FAILED: &str = "PKG_WRITE_FAILED";

    // Input files and arguments
    pub const PKG_ARGS_INVALID: &str = "PKG_ARGS_INVALID";
    pub const PKG_PACKAGE_JSON_NOT_FOUND: &str = "PKG_PACKAGE_JSON_NOT_FOUND";
    pub const PKG_PACKAGE_JSON_INVALID: &str = "PKG_PACKAGE_JSON_INVALID";
    pub const PKG_DEP_RANGE_INVALID: &str = "PKG_DEP_RANGE_INVALID";
    pub const PKG_LOCK_NOT_FOUND: &str = "PKG_LOCK_NOT_FOUND";
    pub const PKG_LOCK_INVALID: &str = "PKG_LOCK_INVALID";
    pub const PKG_LIST_INVALID: &str = "PKG_LIST_INVALID";
}

/// Package layer error.
#[derive(Debug, Clone)]
pub struct PkgError {
    code: &'static str,
    message: String,
    source: Option<Box<PkgError>>,
}

impl PkgError {
    /// Create a new error with the given code and message.
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Get the error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Get the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the wrapped cause, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&PkgError> {
        self.source.as_deref()
    }

    /// True for "the registry does not know this name".
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.code == codes::PKG_NOT_FOUND
    }

    /// Create a spec invalid error.
    pub fn spec_invalid(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_SPEC_INVALID, msg)
    }

    /// Create a package not found error.
    #[must_use]
    pub fn not_found(name: &str) -> Self {
        Self::new(codes::PKG_NOT_FOUND, format!("Package not found: {name}"))
    }

    /// Create a version not found error.
    #[must_use]
    pub fn version_not_found(name: &str, range: &str) -> Self {
        Self::new(
            codes::PKG_VERSION_NOT_FOUND,
            format!("No version of {name} satisfies range: {range}"),
        )
    }

    /// Create a registry error.
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_REGISTRY_ERROR, msg)
    }

    /// Wrap a failed root lookup.
    #[must_use]
    pub fn resolution_failed(name: &str, cause: PkgError) -> Self {
        Self {
            code: codes::PKG_RESOLUTION_FAILED,
            message: format!("Failed to resolve root package '{name}': {}", cause.message),
            source: Some(Box::new(cause)),
        }
    }

    /// Create a download failed error.
    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_DOWNLOAD_FAILED, msg)
    }

    /// Create an integrity mismatch error.
    #[must_use]
    pub fn integrity_mismatch(url: &str, expected: &str, actual: &str) -> Self {
        Self::new(
            codes::PKG_INTEGRITY_MISMATCH,
            format!("shasum mismatch for {url}: expected {expected}, got {actual}"),
        )
    }

    /// Create an extraction failed error.
    pub fn extract_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_EXTRACT_FAILED, msg)
    }

    /// Create a write failed error.
    pub fn write_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_WRITE_FAILED, msg)
    }

    /// Create an args invalid error.
    pub fn args_invalid(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_ARGS_INVALID, msg)
    }

    /// Create a package.json not found error.
    #[must_use]
    pub fn package_json_not_found(path: &std::path::Path) -> Self {
        Self::new(
            codes::PKG_PACKAGE_JSON_NOT_FOUND,
            format!("package.json not found: {}", path.display()),
        )
    }

    /// Create a package.json invalid error.
    pub fn package_json_invalid(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_PACKAGE_JSON_INVALID, msg)
    }

    /// Create a lockfile not found error.
    #[must_use]
    pub fn lock_not_found(path: &std::path::Path) -> Self {
        Self::new(
            codes::PKG_LOCK_NOT_FOUND,
            format!("lockfile not found: {}", path.display()),
        )
    }

    /// Create a lockfile invalid error.
    pub fn lock_invalid(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_LOCK_INVALID, msg)
    }

    /// Create a package list invalid error.
    pub fn list_invalid(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_LIST_INVALID, msg)
    }
}

impl fmt::Display for PkgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PkgError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<io::Error> for PkgError {
    fn from(e: io::Error) -> Self {
        Self::new(codes::PKG_WRITE_FAILED, e.to_string())
    }
}

impl From<reqwest::Error> for PkgError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::new(codes::PKG_REGISTRY_ERROR, format!("Request timed out: {e}"))
        } else if e.is_connect() {
            Self::new(codes::PKG_REGISTRY_ERROR, format!("Connection failed: {e}"))
        } else {
            Self::new(codes::PKG_REGISTRY_ERROR, e.to_string())
        }
    }
}

impl From<serde_json::Error> for PkgError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(codes::PKG_REGISTRY_ERROR, format!("Invalid JSON: {e}"))
    }
}
