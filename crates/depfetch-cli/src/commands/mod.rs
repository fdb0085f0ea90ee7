//! Command implementations.
//!
//! Exit codes: 0 on success, 1 when resolution or a download fails, 2 for
//! invalid arguments and unreadable input files.

pub mod download;
pub mod list;
pub mod list_to_file;
pub mod lock_file;
pub mod resolve;
pub mod version;

use depfetch_core::pkg::{BranchError, PkgError};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

/// Resolution or download failed.
pub const EXIT_FAILURE: i32 = 1;

/// Invalid arguments or unreadable input files.
pub const EXIT_INVALID_INPUT: i32 = 2;

/// A failed command: the error to report and the process exit code.
#[derive(Debug)]
pub struct Failure {
    pub exit_code: i32,
    pub error: PkgError,
}

impl Failure {
    /// Bad arguments or input files (exit 2).
    pub fn input(error: PkgError) -> Self {
        Self {
            exit_code: EXIT_INVALID_INPUT,
            error,
        }
    }

    /// Resolution, registry or filesystem failure (exit 1).
    pub fn runtime(error: PkgError) -> Self {
        Self {
            exit_code: EXIT_FAILURE,
            error,
        }
    }
}

/// Minimal JSON result for failures outside any command.
#[derive(Serialize)]
struct ErrorResult {
    ok: bool,
    error: String,
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

/// Print an error and its causes to stderr.
pub fn print_error(err: &PkgError) {
    eprintln!("error: {err}");
    let mut cause = err.cause();
    while let Some(c) = cause {
        eprintln!("  caused by: {c}");
        cause = c.cause();
    }
}

/// Print skipped branches to stderr.
pub fn print_skipped(skipped: &[BranchError]) {
    for branch in skipped {
        eprintln!(
            "! {}@{}: {}",
            branch.name,
            branch.range.as_deref().unwrap_or("latest"),
            branch.message
        );
    }
}

/// Report `failure` (as `result` in JSON mode) and exit.
pub fn exit_with<T: Serialize>(failure: &Failure, json: bool, result: &T) -> ! {
    if json {
        if let Ok(out) = serde_json::to_string_pretty(result) {
            println!("{out}");
        }
    } else {
        print_error(&failure.error);
    }
    std::process::exit(failure.exit_code);
}

/// Report an invalid configuration and exit with code 2.
pub fn exit_with_config_error(err: &depfetch_core::Error, json: bool) -> ! {
    if json {
        let result = ErrorResult {
            ok: false,
            error: format!("{}: {err}", depfetch_core::pkg::pkg_codes::PKG_ARGS_INVALID),
        };
        if let Ok(out) = serde_json::to_string_pretty(&result) {
            println!("{out}");
        }
    } else {
        eprintln!("error: {err}");
    }
    std::process::exit(EXIT_INVALID_INPUT);
}
