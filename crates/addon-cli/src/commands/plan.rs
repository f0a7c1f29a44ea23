//! Plan command: validate the manifest and print the deployment order

use std::path::Path;

use colored::Colorize;

use super::resolve;
use crate::error::Result;

/// Run the plan command
pub fn run_plan(manifest: &Path, json: bool) -> Result<()> {
    let resolved = resolve(manifest, &[])?;
    let plan = resolved.scheduler().plan()?;

    if json {
        let output = serde_json::json!({
            "mode": resolved.options.mode,
            "order": plan.entries,
            "waves": plan.waves(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", "Deployment plan".bold());
    println!();
    for (i, entry) in plan.entries.iter().enumerate() {
        if entry.prerequisites.is_empty() {
            println!("  {:>2}. {}", i + 1, entry.name.green());
        } else {
            println!(
                "  {:>2}. {} {}",
                i + 1,
                entry.name.green(),
                format!("(after {})", entry.prerequisites.join(", ")).dimmed()
            );
        }
    }

    println!();
    println!("{}", "Waves".bold());
    for (i, wave) in plan.waves().iter().enumerate() {
        println!("  {}: {}", (i + 1).to_string().cyan(), wave.join(", "));
    }

    println!();
    println!(
        "{} add-on(s), {:?} mode",
        plan.len(),
        resolved.options.mode
    );
    Ok(())
}
