//! tpo - Two-tier build cache for embedded toolchains
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use std::path::PathBuf;
use std::process::ExitCode;
use tpo::cli::{commands, Cli, Commands};
use tpo::config::{Config, ConfigManager};
use tpo::error::{TpoError, TpoResult};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> TpoResult<()> {
    let cli = Cli::parse();

    // Completions need neither config nor logging
    if let Commands::Completions { shell } = cli.command {
        return commands::completions(shell);
    }

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config);
    tpo::ui::init_theme();
    debug!(config = %config_manager.path().display(), "Configuration loaded");

    let project_dir = match cli.project_dir {
        Some(dir) => dir,
        None => current_dir()?,
    };

    match cli.command {
        Commands::Completions { .. } => unreachable!("Completions handled above"),
        Commands::Fingerprint(args) => commands::fingerprint(args, &project_dir).await,
        Commands::Entry(args) => commands::entry(args, &config, &project_dir).await,
        Commands::Cache(args) => commands::cache(args, &config, &project_dir).await,
        Commands::Global(args) => commands::global(args, &config).await,
        Commands::Deps(args) => commands::deps(args, &config, &project_dir).await,
        Commands::Purge { yes } => commands::purge(yes, &config, &project_dir).await,
        Commands::Config(args) => commands::config(args, &config, &config_manager).await,
    }
}

/// 0 = warn, 1 = info, 2+ = debug. Logs go to stderr so JSON output stays clean.
fn init_logging(verbose: u8, config: &Config) {
    let level = match verbose {
        0 if config.general.verbose => 1,
        n => n,
    };
    let filter = match level {
        0 => EnvFilter::new("tpo=warn"),
        1 => EnvFilter::new("tpo=info"),
        _ => EnvFilter::new("tpo=debug"),
    };

    if config.general.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr)
            .init();
    }
}

fn current_dir() -> TpoResult<PathBuf> {
    std::env::current_dir().map_err(|e| TpoError::io("getting current directory", e))
}
