//! Add-on composer CLI
//!
//! Plans, renders and deploys the add-ons declared in a deployment
//! manifest.

mod cli;
mod commands;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cli::{Cli, Commands};
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Plan { manifest, json } => commands::run_plan(&manifest, json),
        Commands::Render {
            manifest,
            values,
            addon,
        } => commands::run_render(&manifest, &values, addon.as_deref()),
        Commands::Deploy {
            manifest,
            values,
            dry_run,
            json,
        } => commands::run_deploy(&manifest, &values, dry_run, json),
    }
}

/// Logs go to stderr so JSON on stdout stays parseable.
fn init_tracing(verbose: bool) {
    let result = if verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_target(true)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    } else if let Ok(filter) = EnvFilter::try_from_default_env() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    } else {
        return;
    };

    if let Err(e) = result {
        eprintln!("{}: could not install logger: {e}", "warning".yellow().bold());
    }
    tracing::debug!("Verbose mode enabled");
}
