mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use snapline_core::config::Config;
use snapline_vcs::{CommitHistory, Git2CommitHistory};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "snapline",
    version,
    about = "Baseline selection and change-impact tracing for visual test runs",
    long_about = "Snapline decides which earlier builds a visual test run should be compared\n\
        against and which stories are affected by the changes since then.\n\n\
        Results are printed to stdout as JSON; logs go to stderr.\n\n\
        Quick start:\n  \
        snapline baselines\n  \
        snapline plan --stats-file storybook-static/preview-stats.json\n  \
        snapline trace src/Button.js --stats-file storybook-static/preview-stats.json"
)]
struct Cli {
    /// Enable verbose logging (set log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file (default: .snapline/config.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Path inside the repository (default: current directory)
    #[arg(short, long, global = true)]
    path: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: baselines, changed files, affected stories
    ///
    /// Never fails on an untrustworthy trace; the reason is reported in the
    /// `outcome` field instead.
    ///
    /// Examples:
    ///   snapline plan
    ///   snapline plan --stats-file dist/preview-stats.json
    ///   snapline plan --index-fixture index.json
    Plan {
        /// Module stats file written by the Storybook build
        #[arg(long)]
        stats_file: Option<String>,

        /// Answer index queries from a JSON snapshot instead of the network
        #[arg(long)]
        index_fixture: Option<String>,

        /// Do not seed the search with the branch's latest build
        #[arg(long)]
        ignore_last_build_on_branch: bool,
    },
    /// Resolve the parent commits and baseline builds for HEAD
    Baselines {
        /// Answer index queries from a JSON snapshot instead of the network
        #[arg(long)]
        index_fixture: Option<String>,

        /// Do not seed the search with the branch's latest build
        #[arg(long)]
        ignore_last_build_on_branch: bool,
    },
    /// Trace explicit changed files through a stats file
    ///
    /// Example: snapline trace src/Button.js src/theme.js
    Trace {
        /// Repository-relative paths of changed files
        #[arg(required = true)]
        files: Vec<String>,

        /// Module stats file written by the Storybook build
        #[arg(long)]
        stats_file: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let path = resolve_path(cli.path)?;
    let history = Git2CommitHistory::open(&path)
        .with_context(|| format!("failed to open repository at {}", path.display()))?;
    let config_file = cli.config.as_deref().map(Path::new);

    // The configured level is not known yet, so config loading logs at warn.
    let bootstrap_level = if cli.verbose { "debug" } else { "warn" };
    let mut config = tracing::subscriber::with_default(stderr_logger(bootstrap_level), || {
        Config::load_with_file(Some(history.repository_root()), config_file)
    })?;

    let level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    tracing::subscriber::set_global_default(stderr_logger(level))
        .context("failed to install logger")?;

    if config.trace.base_dir.is_none() {
        config.trace.base_dir = Some(relative_dir(history.repository_root(), &path));
    }

    match cli.command {
        Commands::Plan {
            stats_file,
            index_fixture,
            ignore_last_build_on_branch,
        } => {
            config.baseline.ignore_last_build_on_branch |= ignore_last_build_on_branch;
            let stats_file = resolve_stats_file(&path, stats_file);
            commands::plan::run(
                &history,
                &config,
                &stats_file,
                index_fixture.as_deref().map(Path::new),
            )?;
        }
        Commands::Baselines {
            index_fixture,
            ignore_last_build_on_branch,
        } => {
            config.baseline.ignore_last_build_on_branch |= ignore_last_build_on_branch;
            commands::baselines::run(&history, &config, index_fixture.as_deref().map(Path::new))?;
        }
        Commands::Trace { files, stats_file } => {
            let stats_file = resolve_stats_file(&path, stats_file);
            commands::trace::run(&history, &config, &stats_file, &files)?;
        }
    }

    Ok(())
}

/// Log to stderr so stdout stays JSON. `RUST_LOG` overrides `level`.
fn stderr_logger(level: &str) -> impl tracing::Subscriber + Send + Sync + use<> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish()
}

fn resolve_path(path: Option<String>) -> anyhow::Result<PathBuf> {
    let path = match path {
        Some(p) => PathBuf::from(p),
        None => std::env::current_dir()?,
    };
    path.canonicalize()
        .with_context(|| format!("failed to resolve path {}", path.display()))
}

fn resolve_stats_file(path: &Path, stats_file: Option<String>) -> PathBuf {
    match stats_file {
        Some(file) => path.join(file),
        None => path.join(commands::DEFAULT_STATS_FILE),
    }
}

/// `dir` relative to `root` as a POSIX path; empty when they are the same.
fn relative_dir(root: &Path, dir: &Path) -> String {
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    dir.strip_prefix(&root)
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default()
}
