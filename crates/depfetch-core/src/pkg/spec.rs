//! Package spec parsing.
//!
//! Parses the `name[@range]` strings accepted by `--package` and found in
//! package list files:
//! - `react`
//! - `react@18.2.0`
//! - `react@^18.0.0`
//! - `@types/node`
//! - `@types/node@^20`

use super::error::PkgError;
use std::fmt;

/// A parsed package specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    /// Full package name (e.g., "@scope/name" or "name").
    pub name: String,
    /// Scope without the @ prefix, if scoped.
    pub scope: Option<String>,
    /// Version range or tag (None means latest).
    pub range: Option<String>,
}

impl PackageSpec {
    /// Parse a package specification string.
    ///
    /// # Errors
    /// Returns an error if the spec is invalid.
    pub fn parse(input: &str) -> Result<Self, PkgError> {
        let input = input.trim();

        if input.is_empty() {
            return Err(PkgError::spec_invalid("Empty package spec"));
        }

        // A leading @ is a scope marker, so the version separator is the
        // first @ after the slash.
        let (scope, name_end) = if let Some(rest) = input.strip_prefix('@') {
            let Some(slash_pos) = rest.find('/') else {
                return Err(PkgError::spec_invalid(format!(
                    "Invalid scoped package: missing '/' in '{input}'"
                )));
            };
            if slash_pos == 0 {
                return Err(PkgError::spec_invalid(format!(
                    "Invalid scoped package: empty scope in '{input}'"
                )));
            }
            let after_slash = slash_pos + 2;
            let end = input[after_slash..]
                .find('@')
                .map_or(input.len(), |at| after_slash + at);
            (Some(rest[..slash_pos].to_string()), end)
        } else {
            (None, input.find('@').unwrap_or(input.len()))
        };

        let name = &input[..name_end];
        let unscoped = match &scope {
            Some(s) => &name[s.len() + 2..],
            None => name,
        };
        if unscoped.is_empty() {
            return Err(PkgError::spec_invalid(format!(
                "Invalid package spec: empty name in '{input}'"
            )));
        }
        Self::validate_name(unscoped)?;

        let range = if name_end < input.len() {
            let range = &input[name_end + 1..];
            if range.is_empty() {
                return Err(PkgError::spec_invalid(format!(
                    "Invalid package spec: empty version range in '{input}'"
                )));
            }
            Some(range.to_string())
        } else {
            None
        };

        Ok(Self {
            name: name.to_string(),
            scope,
            range,
        })
    }

    fn validate_name(name: &str) -> Result<(), PkgError> {
        for c in name.chars() {
            if !c.is_alphanumeric() && c != '-' && c != '_' && c != '.' {
                return Err(PkgError::spec_invalid(format!(
                    "Invalid character '{c}' in package name '{name}'"
                )));
            }
        }

        Ok(())
    }

    /// Check if this is a scoped package.
    #[must_use]
    pub fn is_scoped(&self) -> bool {
        self.scope.is_some()
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.range {
            Some(range) => write!(f, "{}@{range}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// URL-encode a package name for registry requests and file names.
///
/// For scoped packages, encodes the `/` as `%2F`.
#[must_use]
pub fn encode_name(name: &str) -> String {
    name.replace('/', "%2F")
}
