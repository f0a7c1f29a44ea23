//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Add-on composer - plan, render and deploy cluster add-ons
#[derive(Parser, Debug)]
#[command(name = "addons")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Validate the manifest and show the deployment order
    Plan {
        /// Deployment manifest (TOML)
        manifest: PathBuf,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Print the flattened values each add-on would be deployed with
    ///
    /// Examples:
    ///   addons render deployment.toml
    ///   addons render deployment.toml -f prod.yaml --addon backstage
    Render {
        /// Deployment manifest (TOML)
        manifest: PathBuf,

        /// Value files layered over the manifest, later files win
        #[arg(short = 'f', long = "values")]
        values: Vec<PathBuf>,

        /// Only render this add-on
        #[arg(long)]
        addon: Option<String>,
    },

    /// Deploy every add-on in dependency order
    Deploy {
        /// Deployment manifest (TOML)
        manifest: PathBuf,

        /// Value files layered over the manifest, later files win
        #[arg(short = 'f', long = "values")]
        values: Vec<PathBuf>,

        /// Log what would be installed instead of installing
        #[arg(long)]
        dry_run: bool,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
}
