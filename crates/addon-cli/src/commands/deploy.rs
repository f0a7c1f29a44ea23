//! Deploy command: run the scheduler

use std::path::{Path, PathBuf};
use std::sync::Arc;

use addon_core::{AddOnState, DeploymentReport, DryRunDeployer};
use colored::Colorize;

use super::resolve;
use crate::error::{CliError, Result};

/// Run the deploy command
///
/// Only dry runs are possible from the command line; installing charts
/// needs a cluster-connected deployer supplied by the embedding program.
pub fn run_deploy(manifest: &Path, values: &[PathBuf], dry_run: bool, json: bool) -> Result<()> {
    if !dry_run {
        return Err(CliError::user(
            "No chart deployer is configured; rerun with --dry-run",
        ));
    }

    let resolved = resolve(manifest, values)?;
    let scheduler = resolved.scheduler();
    let deployer = Arc::new(DryRunDeployer::new());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(scheduler.run(&resolved.registry, deployer))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.is_success() {
        Ok(())
    } else {
        Err(CliError::user(format!(
            "{} add-on(s) failed: {}",
            report.failed().len(),
            report.failed().join(", ")
        )))
    }
}

fn print_report(report: &DeploymentReport) {
    println!("{} {}", "Deployment".bold(), report.run_id.to_string().dimmed());
    println!();
    for outcome in &report.outcomes {
        let state = match outcome.state {
            AddOnState::Completed => "completed".green(),
            AddOnState::Failed => "failed".red(),
            other => other.to_string().yellow(),
        };
        match &outcome.failure {
            Some(reason) => println!("  {:<24} {} ({})", outcome.name, state, reason),
            None => println!(
                "  {:<24} {} ({} value(s))",
                outcome.name,
                state,
                outcome.values.as_ref().map_or(0, |v| v.len())
            ),
        }
    }
    println!();
    println!(
        "{} completed, {} failed",
        report.completed().len(),
        report.failed().len()
    );
}
