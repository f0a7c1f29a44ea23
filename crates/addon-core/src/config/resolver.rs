//! Manifest resolution with layered value files
//!
//! The `ManifestResolver` loads a deployment manifest, then merges any
//! number of user value files on top of each add-on's overrides, with later
//! files overriding earlier ones. A value file is a mapping keyed by add-on
//! name:
//!
//! ```yaml
//! backstage:
//!   image:
//!     tag: "1.21"
//! ```

use std::path::{Path, PathBuf};

use addon_resources::InMemoryRegistry;
use addon_values::{ConfigNode, merge_into};
use serde_json::Value;

use super::manifest::DeploymentManifest;
use crate::descriptor::AddOnDescriptor;
use crate::error::{Error, Result};
use crate::scheduler::{DependencyScheduler, SchedulerOptions};

/// Everything needed to plan or run a deployment.
#[derive(Debug, Clone)]
pub struct ResolvedDeployment {
    /// Add-ons in declaration order
    pub addons: Vec<AddOnDescriptor>,
    pub registry: InMemoryRegistry,
    pub options: SchedulerOptions,
}

impl ResolvedDeployment {
    pub fn addon(&self, name: &str) -> Option<&AddOnDescriptor> {
        self.addons.iter().find(|a| a.name == name)
    }

    pub fn scheduler(&self) -> DependencyScheduler {
        DependencyScheduler::new(self.addons.clone()).with_options(self.options.clone())
    }
}

/// Resolves a manifest plus value files into a [`ResolvedDeployment`].
///
/// Layers, later winning:
/// 1. Manifest (`overrides` of each add-on, or the typed view's `values`)
/// 2. Value files, in the order given
pub struct ManifestResolver {
    manifest: PathBuf,
    values_files: Vec<PathBuf>,
}

impl ManifestResolver {
    pub fn new(manifest: impl Into<PathBuf>) -> Self {
        Self {
            manifest: manifest.into(),
            values_files: Vec::new(),
        }
    }

    pub fn with_values_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.values_files.push(path.into());
        self
    }

    pub fn with_values_files<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.values_files.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Load the manifest and apply every value file.
    ///
    /// # Errors
    ///
    /// Missing files, parse errors, unsupported value file extensions and
    /// value files naming undeclared add-ons.
    pub fn resolve(&self) -> Result<ResolvedDeployment> {
        let manifest = DeploymentManifest::load(&self.manifest)?;
        let mut addons = manifest.descriptors()?;

        for path in &self.values_files {
            tracing::debug!(?path, "Applying values file");
            let layer = load_values_file(path)?;
            apply_values(&mut addons, &layer, path)?;
        }

        tracing::debug!(
            addons = addons.len(),
            resources = manifest.resources.len(),
            values_files = self.values_files.len(),
            "Resolved deployment"
        );

        Ok(ResolvedDeployment {
            addons,
            registry: manifest.registry(),
            options: manifest.deployment,
        })
    }
}

/// Read a value file, choosing the parser by extension.
///
/// # Errors
///
/// [`Error::UnsupportedFormat`] for anything but `.yaml`, `.yml`, `.json`
/// or `.toml`, and [`Error::InvalidManifest`] if the top level is not a
/// mapping.
pub fn load_values_file(path: &Path) -> Result<ConfigNode> {
    if !path.is_file() {
        return Err(Error::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let tree: ConfigNode = match extension.as_deref() {
        Some("yaml" | "yml") => serde_yaml::from_str(&content)?,
        Some("json") => serde_json::from_str(&content)?,
        Some("toml") => toml::from_str(&content)?,
        _ => {
            return Err(Error::UnsupportedFormat {
                path: path.to_path_buf(),
            });
        }
    };

    match tree {
        Value::Object(_) => Ok(tree),
        // An empty YAML document
        Value::Null => Ok(Value::Object(Default::default())),
        _ => Err(Error::invalid_manifest(format!(
            "values file {} must contain a mapping keyed by add-on name",
            path.display()
        ))),
    }
}

fn apply_values(addons: &mut [AddOnDescriptor], layer: &ConfigNode, source: &Path) -> Result<()> {
    let Some(entries) = layer.as_object() else {
        return Ok(());
    };
    for (name, values) in entries {
        let Some(addon) = addons.iter_mut().find(|a| &a.name == name) else {
            return Err(Error::invalid_manifest(format!(
                "values file {} sets values for undeclared add-on '{name}'",
                source.display()
            )));
        };
        tracing::debug!(addon = %name, source = %source.display(), "Merging user values");
        merge_into(&mut addon.overrides, values);
    }
    Ok(())
}
