//! dirtygit - Finds git repositories in need of commitment.
//!
//! Usage:
//!   dirtygit [PATHS...]       Scan configured (or given) roots and list dirty repositories
//!   dirtygit scan [PATHS...]  Same as above
//!   dirtygit config           Print the resolved configuration
//!   dirtygit --help           Show help

mod config;

use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, eyre};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use dirtygit_scan::{ScanConfig, ScanCoordinator, ScanResult, StatusBackend};

use crate::config::ConfigFile;

#[derive(Parser)]
#[command(
    name = "dirtygit",
    version,
    about = "Finds git repositories in need of commitment",
    long_about = "dirtygit walks your source directories, finds every git working tree \
                  and lists the ones with uncommitted or untracked changes.\n\n\
                  Roots and filters come from ~/.dirtygit.yml unless overridden.",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// Location of config file (defaults to ~/.dirtygit.yml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    scan: ScanArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Scan and list dirty repositories
    Scan(ScanArgs),

    /// Print the resolved configuration as YAML
    Config(Overrides),
}

#[derive(Args, Debug, Clone, Default)]
struct Overrides {
    /// Directories to scan (replaces the configured include list)
    paths: Vec<PathBuf>,

    /// Directory to skip entirely (repeatable)
    #[arg(short, long)]
    exclude: Vec<PathBuf>,

    /// Follow symbolic links while walking
    #[arg(long)]
    follow_symlinks: bool,

    /// How repository status is read
    #[arg(long)]
    backend: Option<Backend>,
}

#[derive(Args, Debug, Clone, Default)]
struct ScanArgs {
    #[command(flatten)]
    overrides: Overrides,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Exit with status 1 if any repository is dirty
    #[arg(long)]
    fail_on_dirty: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    Git,
    Libgit2,
}

impl From<Backend> for StatusBackend {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Git => StatusBackend::Git,
            Backend::Libgit2 => StatusBackend::Libgit2,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Command::Config(overrides)) => {
            let config = resolve_config(cli.config, &overrides)?;
            print!("{}", serde_yaml::to_string(&config)?);
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::Scan(args)) => run_scan(cli.config, args).await,
        None => run_scan(cli.config, cli.scan).await,
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Config file plus command line overrides.
fn resolve_config(path: Option<PathBuf>, overrides: &Overrides) -> Result<ScanConfig> {
    let mut file = ConfigFile::resolve(path.as_deref())?;

    if !overrides.paths.is_empty() {
        file.scandirs.include = overrides.paths.clone();
    }
    if file.scandirs.include.is_empty() {
        file.scandirs.include.push(PathBuf::from("."));
    }
    file.scandirs.exclude.extend(overrides.exclude.iter().cloned());
    file.followsymlinks |= overrides.follow_symlinks;
    if let Some(backend) = overrides.backend {
        file.backend = Some(backend.into());
    }

    file.to_scan_config(dirs::home_dir().as_deref())
}

/// Run one scan and print the dirty repositories.
async fn run_scan(path: Option<PathBuf>, args: ScanArgs) -> Result<ExitCode> {
    let config = resolve_config(path, &args.overrides)?;
    let coordinator = ScanCoordinator::from_config(&config).wrap_err("Failed to start scan")?;

    let progress = std::io::stderr().is_terminal().then(|| {
        let mut progress_rx = coordinator.subscribe_progress();
        tokio::spawn(async move {
            while let Ok(progress) = progress_rx.recv().await {
                eprint!(
                    "\rScanning... {} found, {} checked, {} dirty",
                    progress.repos_found, progress.repos_probed, progress.repos_dirty
                );
                let _ = std::io::stderr().flush();
            }
        })
    });

    let state = coordinator.scan_and_wait().await;
    coordinator.shutdown().await;
    if let Some(progress) = progress {
        progress.abort();
        eprint!("\r\x1b[2K");
    }

    if let Some(err) = state.last_error {
        return Err(eyre!("Scan failed: {err}"));
    }
    let result = state.last_result;

    match args.format {
        OutputFormat::Text => print_text(&result),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&*result)?),
    }

    if args.fail_on_dirty && !result.is_empty() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn print_text(result: &ScanResult) {
    for (repo, status) in result.repositories.iter() {
        println!("{}", repo.display());
        for (path, code) in status.iter() {
            println!("  {code} {path}");
        }
    }

    let stats = &result.stats;
    eprintln!(
        "{} dirty of {} repositories (walk {:.2}s, status {:.2}s)",
        stats.repos_dirty,
        stats.repos_found,
        stats.walk_duration.as_secs_f64(),
        stats.probe_duration.as_secs_f64()
    );
    if !stats.warnings.is_empty() {
        eprintln!("{} warning(s) during scan", stats.warnings.len());
        for warning in &stats.warnings {
            tracing::info!(path = %warning.path.display(), "{}", warning.message);
        }
    }
}
