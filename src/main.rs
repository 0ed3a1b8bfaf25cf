//! Bender CLI entry point that dispatches to subcommands.

use bender::cli::{Cli, Commands};
use bender::config::ConfigManager;
use bender::error::BenderResult;
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> BenderResult<()> {
    let cli = Cli::parse();

    // Initialize logging: 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("bender=warn"),
        1 => EnvFilter::new("bender=info"),
        _ => EnvFilter::new("bender=debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };

    let config = if cli.no_local {
        debug!("Local config discovery disabled (--no-local)");
        config_manager.load_global()?
    } else {
        config_manager.load()?
    };

    match cli.command {
        Commands::Resolve(args) => bender::cli::commands::resolve(args, &config),
        Commands::Scaffold(args) => bender::cli::commands::scaffold(args, &config),
        Commands::Snapshot(args) => bender::cli::commands::snapshot(args, &config),
        Commands::Invalidate(args) => bender::cli::commands::invalidate(args, &config),
        Commands::Config(args) => bender::cli::commands::config(args, &config),
    }
}
