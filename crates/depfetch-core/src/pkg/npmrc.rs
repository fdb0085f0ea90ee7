//! `.npmrc` parsing for registry selection.
//!
//! Extracts:
//! - `registry=URL` for the default registry
//! - `@scope:registry=URL` directives for routing scoped packages
//! - `//host/:_authToken=TOKEN` directives for registry authentication
//! - `${ENV_VAR}` expansion in token values

use std::collections::HashMap;
use std::path::Path;
use url::Url;

/// Parsed `.npmrc` configuration.
#[derive(Debug, Clone, Default)]
pub struct NpmrcConfig {
    /// Default registry (`registry=`), if set.
    pub registry: Option<Url>,
    /// Scope → registry URL mapping (e.g., `@acme` → `https://npm.acme.dev/`).
    pub scoped_registries: HashMap<String, Url>,
    /// Host (optionally with path) → auth token mapping.
    pub auth_tokens: HashMap<String, String>,
}

impl NpmrcConfig {
    /// Registry URL for a package name, if a scope directive covers it.
    #[must_use]
    pub fn registry_for(&self, name: &str) -> Option<&Url> {
        let (scope, _) = name.split_once('/')?;
        if !scope.starts_with('@') {
            return None;
        }
        self.scoped_registries.get(scope)
    }

    /// Auth token configured for the registry serving `url`.
    ///
    /// Tries `host/path` first, then the bare host.
    #[must_use]
    pub fn token_for(&self, url: &Url) -> Option<&str> {
        let host = url.host_str()?;
        let path = url.path().trim_end_matches('/');
        let host_with_path = if path.is_empty() {
            host.to_string()
        } else {
            format!("{host}{path}")
        };

        self.auth_tokens
            .get(&host_with_path)
            .or_else(|| self.auth_tokens.get(host))
            .map(String::as_str)
    }
}

/// Parse a single `.npmrc` file's content.
///
/// Ignores comments (`#`, `;`), blank lines, and keys it does not know.
#[must_use]
pub fn parse_npmrc(content: &str) -> NpmrcConfig {
    let mut config = NpmrcConfig::default();

    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        if key == "registry" {
            config.registry = parse_registry_url(value);
        } else if key.starts_with('@') {
            if let Some((scope, "registry")) = key.split_once(':') {
                if let Some(url) = parse_registry_url(value) {
                    config.scoped_registries.insert(scope.to_string(), url);
                }
            }
        } else if key.starts_with("//") && key.ends_with(":_authToken") {
            let host_part = key
                .strip_prefix("//")
                .unwrap_or(key)
                .strip_suffix(":_authToken")
                .unwrap_or(key)
                .trim_end_matches('/');

            let token = expand_env_vars(value);
            if !token.is_empty() {
                config.auth_tokens.insert(host_part.to_string(), token);
            }
        }
    }

    config
}

/// Parse a registry URL, adding the trailing slash that `Url::join` needs.
fn parse_registry_url(value: &str) -> Option<Url> {
    if value.ends_with('/') {
        Url::parse(value).ok()
    } else {
        Url::parse(&format!("{value}/")).ok()
    }
}

/// Load and merge `.npmrc` files from `project_dir` upward, then the home directory.
///
/// The closest file wins for every key.
#[must_use]
pub fn load_npmrc_files(project_dir: &Path) -> NpmrcConfig {
    let mut merged = NpmrcConfig::default();

    let mut dir = Some(project_dir.to_path_buf());
    while let Some(d) = dir {
        merge_file(&mut merged, &d.join(".npmrc"));
        dir = d.parent().map(Path::to_path_buf);
    }

    // Covers projects that do not live under $HOME.
    if let Some(home) = dirs_next::home_dir() {
        merge_file(&mut merged, &home.join(".npmrc"));
    }

    merged
}

fn merge_file(target: &mut NpmrcConfig, path: &Path) {
    if !path.is_file() {
        return;
    }
    if let Ok(content) = std::fs::read_to_string(path) {
        merge_config(target, &parse_npmrc(&content));
    }
}

/// Merge `source` into `target`, keeping existing entries (first wins).
fn merge_config(target: &mut NpmrcConfig, source: &NpmrcConfig) {
    if target.registry.is_none() {
        target.registry.clone_from(&source.registry);
    }
    for (scope, url) in &source.scoped_registries {
        target
            .scoped_registries
            .entry(scope.clone())
            .or_insert_with(|| url.clone());
    }
    for (host, token) in &source.auth_tokens {
        target
            .auth_tokens
            .entry(host.clone())
            .or_insert_with(|| token.clone());
    }
}

/// Expand `${ENV_VAR}` patterns in a string. Unset variables expand to nothing.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
            if let Ok(val) = std::env::var(&var_name) {
                result.push_str(&val);
            }
        } else {
            result.push(ch);
        }
    }

    result
}
