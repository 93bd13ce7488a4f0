//! devscan CLI - command-line interface for device discovery and configuration.
//!
//! Listens to multicast device announcements, picks reachable device addresses
//! and sends network configuration requests, for use from scripts and
//! headless hosts.

mod cli;
mod commands;
mod device;
mod error;
mod interfaces;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use device::session::load_settings;
use error::{exit_codes, CliError};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = run(cli).await;

    match result {
        Ok(()) => std::process::exit(exit_codes::SUCCESS),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

/// Log to stderr so stdout stays clean for table and JSON output.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let settings = load_settings(cli.settings.as_deref(), cli.timeout)?;

    match cli.command {
        Commands::Discover(args) => commands::run_discover(args, settings, cli.json).await,
        Commands::Connect(args) => commands::run_connect(args, settings, cli.json).await,
        Commands::Configure(args) => commands::run_configure(args, settings, cli.json).await,
    }
}
