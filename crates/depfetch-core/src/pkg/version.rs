//! Version selection using semver with npm range syntax.
//!
//! Two selectors work over a packument's published versions:
//! [`max_satisfying`] (the version the walk continues from) and
//! [`min_satisfying`] (the floor of a range, reported next to it).

use super::error::PkgError;
use super::registry::RegistryInfo;
use semver::{Version, VersionReq};

/// A parsed npm range: one or more `||` alternatives.
#[derive(Debug, Clone)]
pub struct VersionRange {
    raw: String,
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    /// Parse an npm range.
    ///
    /// Handles:
    /// - Standard semver ranges: `^1.0.0`, `~1.0.0`, `>=1.0.0`
    /// - Bare versions: `1.2.3` is exact, `1.2` and `1` are x-ranges
    /// - Hyphen ranges: `1.0.0 - 2.0.0`
    /// - X-ranges: `1.x`, `1.0.x`, `*`, `^1.x`
    /// - Space-separated comparators: `>= 2.1.2 < 3.0.0`
    /// - OR ranges: `^1.0.0 || ^2.0.0` (invalid alternatives are skipped
    ///   as long as one alternative parses)
    ///
    /// # Errors
    /// Returns `PKG_SPEC_INVALID` if no alternative parses.
    pub fn parse(range: &str) -> Result<Self, PkgError> {
        let raw = range.trim();
        let mut alternatives = Vec::new();
        let mut last_error = None;

        for alt in raw.split("||").map(str::trim) {
            if alt.is_empty() && raw.contains("||") {
                continue;
            }
            match parse_alternative(alt) {
                Ok(req) => alternatives.push(req),
                Err(e) => last_error = Some(e),
            }
        }

        if alternatives.is_empty() {
            return Err(last_error.unwrap_or_else(|| {
                PkgError::spec_invalid(format!("Invalid version range '{raw}': no valid alternatives"))
            }));
        }

        Ok(Self {
            raw: raw.to_string(),
            alternatives,
        })
    }

    /// The range as written.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whether `version` satisfies any alternative.
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }
}

/// Map a declared range onto the range actually matched.
///
/// - `None` or empty: the `latest` dist-tag (or `*` without one)
/// - a dist-tag name such as `next`: that tag's version
/// - anything else: unchanged
#[must_use]
pub fn effective_range<'a>(info: &'a RegistryInfo, range: Option<&'a str>) -> &'a str {
    match range.map(str::trim) {
        None | Some("") => info.latest_version().unwrap_or("*"),
        Some(r) => info.dist_tags.get(r).map_or(r, String::as_str),
    }
}

/// Highest published version satisfying `range`.
///
/// Returns `Ok(None)` when the packument has no versions, nothing matches,
/// or `range` names a dist-tag the package does not have.
///
/// # Errors
/// Returns an error if the range cannot be parsed.
pub fn max_satisfying(info: &RegistryInfo, range: Option<&str>) -> Result<Option<String>, PkgError> {
    let Some(range) = parse_effective(info, range)? else {
        return Ok(None);
    };
    Ok(sorted_versions(info)
        .into_iter()
        .rev()
        .find(|v| range.matches(v))
        .map(|v| v.to_string()))
}

/// Lowest published version satisfying `range` (the range's floor).
///
/// # Errors
/// Returns an error if the range cannot be parsed.
pub fn min_satisfying(info: &RegistryInfo, range: Option<&str>) -> Result<Option<String>, PkgError> {
    let Some(range) = parse_effective(info, range)? else {
        return Ok(None);
    };
    Ok(sorted_versions(info)
        .into_iter()
        .find(|v| range.matches(v))
        .map(|v| v.to_string()))
}

/// Parse the effective range; `None` for an unknown dist-tag.
fn parse_effective(info: &RegistryInfo, range: Option<&str>) -> Result<Option<VersionRange>, PkgError> {
    let effective = effective_range(info, range);
    match VersionRange::parse(effective) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(_) if is_tag_name(effective) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Whether `s` has the shape of a dist-tag name (`latest`, `next`, `beta-2`).
fn is_tag_name(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Published versions in ascending precedence; unparsable keys are skipped.
fn sorted_versions(info: &RegistryInfo) -> Vec<Version> {
    let mut parsed: Vec<Version> = info
        .version_keys()
        .filter_map(|v| Version::parse(v).ok())
        .collect();
    parsed.sort();
    parsed
}

/// Parse one `||` alternative into a `VersionReq`.
fn parse_alternative(range: &str) -> Result<VersionReq, PkgError> {
    let invalid = |e: semver::Error| {
        PkgError::spec_invalid(format!("Invalid version range '{range}': {e}"))
    };

    // "1.0.0 - 2.0.0" -> ">=1.0.0, <=2.0.0". Partial bounds keep their
    // partial form: semver reads "<=2" as "<3.0.0". A wildcard bound is open.
    if let Some((start, end)) = parse_hyphen_range(range) {
        let bounds: Vec<String> = [(">=", start), ("<=", end)]
            .into_iter()
            .filter_map(|(op, bound)| strip_wildcards(&bound).map(|v| format!("{op}{v}")))
            .collect();
        if bounds.is_empty() {
            return Ok(VersionReq::STAR);
        }
        return VersionReq::parse(&bounds.join(", ")).map_err(invalid);
    }

    let comparators: Vec<String> = split_comparators(range)
        .iter()
        .map(|c| normalize_comparator(c))
        .collect();

    if comparators.is_empty() {
        return Ok(VersionReq::STAR);
    }

    VersionReq::parse(&comparators.join(", ")).map_err(invalid)
}

/// Parse a hyphen range like "1.0.0 - 2.0.0".
fn parse_hyphen_range(range: &str) -> Option<(String, String)> {
    let (start, end) = range.split_once(" - ")?;
    let start = start.trim();
    let end = end.trim();
    if start.is_empty() || end.is_empty() {
        return None;
    }
    Some((start.to_string(), end.to_string()))
}

/// Split a range into comparator tokens.
///
/// npm allows whitespace between an operator and its version (`>= 1.2.3`)
/// and whitespace or commas between comparators.
fn split_comparators(range: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut pending_op = String::new();

    for word in range.split(|c: char| c.is_whitespace() || c == ',') {
        if word.is_empty() {
            continue;
        }
        if word.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^')) {
            pending_op.push_str(word);
            continue;
        }
        tokens.push(format!("{pending_op}{word}"));
        pending_op.clear();
    }

    if !pending_op.is_empty() {
        tokens.push(pending_op);
    }

    tokens
}

/// Rewrite one npm comparator into the syntax the `semver` crate expects.
///
/// - a leading `v` on the version is dropped
/// - trailing `x`/`X`/`*` components are dropped (`^1.x` -> `^1`)
/// - bare full versions become exact (`1.2.3` -> `=1.2.3`)
/// - bare partial versions become tilde ranges (`1.2` -> `~1.2`)
/// - a bare wildcard becomes `*`
fn normalize_comparator(token: &str) -> String {
    let op_len = token
        .find(|c: char| !matches!(c, '<' | '>' | '=' | '~' | '^'))
        .unwrap_or(token.len());
    let (op, version) = token.split_at(op_len);

    let Some(version) = strip_wildcards(version) else {
        return if op.is_empty() || op == "=" {
            "*".to_string()
        } else {
            // ">=*" and friends match everything.
            ">=0.0.0".to_string()
        };
    };

    let core_parts = version
        .split(['-', '+'])
        .next()
        .map_or(0, |core| core.split('.').count());
    let op = match (op, core_parts) {
        ("", 3) => "=",
        ("", _) => "~",
        (op, _) => op,
    };
    format!("{op}{version}")
}

/// Drop a leading `v` and any wildcard components from a version.
///
/// Returns `None` when nothing but wildcards remains (`*`, `x`, empty).
fn strip_wildcards(version: &str) -> Option<String> {
    let version = version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('V'))
        .unwrap_or(version);

    // Keep prerelease/build metadata intact; only the core may hold wildcards.
    let (core, suffix) = match version.find(['-', '+']) {
        Some(idx) => version.split_at(idx),
        None => (version, ""),
    };

    let parts: Vec<&str> = core
        .split('.')
        .take_while(|p| !matches!(*p, "x" | "X" | "*" | ""))
        .collect();

    if parts.is_empty() {
        return None;
    }
    Some(format!("{}{suffix}", parts.join(".")))
}
