//! Command implementations for addon-cli

pub mod deploy;
pub mod plan;
pub mod render;

pub use deploy::run_deploy;
pub use plan::run_plan;
pub use render::run_render;

use std::path::{Path, PathBuf};

use addon_core::{ManifestResolver, ResolvedDeployment};

use crate::error::Result;

/// Load a manifest and layer value files over it.
fn resolve(manifest: &Path, values: &[PathBuf]) -> Result<ResolvedDeployment> {
    Ok(ManifestResolver::new(manifest)
        .with_values_files(values.iter().cloned())
        .resolve()?)
}
