#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

mod commands;
mod logging;

use clap::Parser;
use depfetch_core::pkg::{
    EdgeKinds, ResolveOptions, DEFAULT_LIST_FILE, DEFAULT_OUT_DIR, NPM_LOCKFILE_NAME,
};
use depfetch_core::Config;
use miette::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "depfetch")]
#[command(author, version, about = "Resolve npm dependency trees and download their tarballs", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    /// Registry URL (overrides DEPFETCH_NPM_REGISTRY and .npmrc)
    #[arg(long, global = true, value_name = "URL")]
    registry: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Options shared by every command that resolves a dependency tree.
#[derive(clap::Args, Debug, Clone)]
struct ResolveArgs {
    /// package.json to read root dependencies from
    #[arg(short, long, default_value = "package.json", value_name = "PATH")]
    file: PathBuf,

    /// Resolve a single package (name[@range]) instead of a package.json
    #[arg(short, long, value_name = "SPEC")]
    package: Option<String>,

    /// Walk into dependencies of dependencies
    #[arg(short, long)]
    deep: bool,

    /// Deepest level whose dependencies are still walked
    #[arg(short, long, default_value_t = 1, value_name = "N")]
    max_level: usize,

    /// Package names to skip (comma separated)
    #[arg(short = 'x', long, value_delimiter = ',', value_name = "NAME")]
    exclude: Vec<String>,

    /// Skip devDependencies
    #[arg(long)]
    no_dev: bool,

    /// Skip peerDependencies
    #[arg(long)]
    no_peer: bool,

    /// Concurrent registry requests
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Resolve and print the dependency list
    List {
        #[command(flatten)]
        resolve: ResolveArgs,
    },

    /// Resolve (or read a list file) and download every tarball
    Download {
        #[command(flatten)]
        resolve: ResolveArgs,

        /// Download the packages named in a list file instead of resolving
        #[arg(short, long, value_name = "PATH")]
        list_file: Option<PathBuf>,

        /// Directory tarballs are written to
        #[arg(short, long, default_value = DEFAULT_OUT_DIR, value_name = "PATH")]
        out_dir: PathBuf,

        /// Also unpack each tarball next to it
        #[arg(long)]
        extract: bool,

        /// Concurrent downloads
        #[arg(long, value_name = "N")]
        download_concurrency: Option<usize>,
    },

    /// Resolve and write name@version lines to a file
    ListToFile {
        #[command(flatten)]
        resolve: ResolveArgs,

        /// List file to write
        #[arg(short, long, default_value = DEFAULT_LIST_FILE, value_name = "PATH")]
        output: PathBuf,
    },

    /// Download every package recorded in a package-lock.json
    LockFile {
        /// package-lock.json to read
        #[arg(short, long, default_value = NPM_LOCKFILE_NAME, value_name = "PATH")]
        file: PathBuf,

        /// Directory tarballs are written to
        #[arg(short, long, default_value = DEFAULT_OUT_DIR, value_name = "PATH")]
        out_dir: PathBuf,

        /// Also unpack each tarball next to it
        #[arg(long)]
        extract: bool,

        /// Concurrent downloads
        #[arg(long, value_name = "N")]
        download_concurrency: Option<usize>,
    },
}

impl ResolveArgs {
    fn into_request(self, config: &Config) -> commands::resolve::ResolveRequest {
        commands::resolve::ResolveRequest {
            manifest: config.resolve_path(&self.file),
            package: self.package,
            options: ResolveOptions {
                deep: self.deep,
                max_level: self.max_level,
                excludes: self.exclude.into_iter().filter(|n| !n.is_empty()).collect(),
                kinds: EdgeKinds {
                    runtime: true,
                    dev: !self.no_dev,
                    peer: !self.no_peer,
                },
                concurrency: config.fetch_concurrency,
            },
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let mut config = Config::new(cwd)
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json)
        .with_registry(cli.registry);

    if let Some(
        Commands::List { resolve }
        | Commands::Download { resolve, .. }
        | Commands::ListToFile { resolve, .. },
    ) = &cli.command
    {
        if let Some(n) = resolve.concurrency {
            config = config.with_fetch_concurrency(n);
        }
    }
    if let Some(Commands::Download {
        download_concurrency: Some(n),
        ..
    }
    | Commands::LockFile {
        download_concurrency: Some(n),
        ..
    }) = &cli.command
    {
        config = config.with_download_concurrency(*n);
    }

    if matches!(cli.command, Some(Commands::Version) | None) {
        return commands::version::run();
    }

    logging::init(config.verbosity, config.json_logs);

    if let Err(e) = config.validate() {
        commands::exit_with_config_error(&e, cli.json);
    }

    match cli.command {
        Some(Commands::List { resolve }) => {
            let request = resolve.into_request(&config);
            commands::list::run(&config, &request, cli.json)
        }
        Some(Commands::Download {
            resolve,
            list_file,
            out_dir,
            extract,
            ..
        }) => {
            let action = commands::download::DownloadAction {
                source: match list_file {
                    Some(path) => commands::download::Source::ListFile(config.resolve_path(&path)),
                    None => commands::download::Source::Resolve(resolve.into_request(&config)),
                },
                out_dir: config.resolve_path(&out_dir),
                extract,
            };
            commands::download::run(&config, action, cli.json)
        }
        Some(Commands::ListToFile { resolve, output }) => {
            let output = config.resolve_path(&output);
            let request = resolve.into_request(&config);
            commands::list_to_file::run(&config, &request, &output, cli.json)
        }
        Some(Commands::LockFile {
            file,
            out_dir,
            extract,
            ..
        }) => {
            let action = commands::lock_file::LockFileAction {
                lockfile: config.resolve_path(&file),
                out_dir: config.resolve_path(&out_dir),
                extract,
            };
            commands::lock_file::run(&config, action, cli.json)
        }
        Some(Commands::Version) | None => commands::version::run(),
    }
}
