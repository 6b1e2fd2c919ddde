//! Keepsake CLI - Per-user backup and restore
//!
//! This is the main entry point for the Keepsake command-line interface.

mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI args
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose, cli.quiet);

    // Run command
    let config = cli.config.as_deref();
    match cli.command {
        Commands::Backup(cmd) => commands::backup::run(cmd, config).await,
        Commands::Restore(args) => commands::restore::run(args, config).await,
        Commands::Settings(cmd) => commands::settings::run(cmd, config).await,
        Commands::Config(cmd) => commands::config::run(cmd, config),
        Commands::Db(cmd) => commands::db::run(cmd, config),
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            // Stage logs are shown by default; -v/-vv for per-table detail
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
