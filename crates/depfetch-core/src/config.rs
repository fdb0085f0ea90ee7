use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default number of concurrent packument fetches during a walk.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 16;

/// Default number of concurrent tarball downloads.
pub const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 8;

/// Runtime configuration for the depfetch CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory. Relative input/output paths resolve against it.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,

    /// Registry URL given on the command line. Overrides env and `.npmrc`.
    pub registry: Option<String>,

    /// Concurrent packument fetches per resolution wave.
    pub fetch_concurrency: usize,

    /// Concurrent tarball downloads.
    pub download_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
            registry: None,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            download_concurrency: DEFAULT_DOWNLOAD_CONCURRENCY,
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }

    /// Set the registry override.
    #[must_use]
    pub fn with_registry(mut self, registry: Option<String>) -> Self {
        self.registry = registry;
        self
    }

    /// Set the packument fetch concurrency.
    #[must_use]
    pub fn with_fetch_concurrency(mut self, n: usize) -> Self {
        self.fetch_concurrency = n;
        self
    }

    /// Set the download concurrency.
    #[must_use]
    pub fn with_download_concurrency(mut self, n: usize) -> Self {
        self.download_concurrency = n;
        self
    }

    /// Resolve `path` against the working directory unless it is already absolute.
    #[must_use]
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }

    /// Reject settings that would stall or misbehave at runtime.
    pub fn validate(&self) -> Result<(), Error> {
        if self.fetch_concurrency == 0 {
            return Err(Error::invalid_config("fetch concurrency must be at least 1"));
        }
        if self.download_concurrency == 0 {
            return Err(Error::invalid_config(
                "download concurrency must be at least 1",
            ));
        }
        if let Some(registry) = &self.registry {
            url::Url::parse(registry).map_err(|e| {
                Error::invalid_config(format!("invalid registry URL '{registry}': {e}"))
            })?;
        }
        Ok(())
    }
}
