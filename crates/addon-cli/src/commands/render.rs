//! Render command: print composed values as JSON

use std::path::{Path, PathBuf};

use addon_core::ConfigCompositor;
use serde_json::{Map, Value};

use super::resolve;
use crate::error::{CliError, Result};

/// Run the render command
///
/// Prints one JSON object keyed by add-on name, each value the flattened
/// configuration that add-on would be deployed with.
pub fn run_render(manifest: &Path, values: &[PathBuf], addon: Option<&str>) -> Result<()> {
    let resolved = resolve(manifest, values)?;

    let selected: Vec<_> = match addon {
        Some(name) => {
            let found = resolved
                .addon(name)
                .ok_or_else(|| CliError::user(format!("No add-on named '{name}' in manifest")))?;
            vec![found]
        }
        None => resolved.addons.iter().collect(),
    };

    let compositor = ConfigCompositor::new(&resolved.registry);
    let mut output = Map::new();
    for descriptor in selected {
        tracing::debug!(addon = %descriptor.name, "Rendering values");
        let flat = compositor.compose_addon(descriptor)?;
        output.insert(descriptor.name.clone(), Value::Object(flat));
    }

    println!("{}", serde_json::to_string_pretty(&Value::Object(output))?);
    Ok(())
}
