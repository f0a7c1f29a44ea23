//! Deployment manifest parsing
//!
//! A manifest is one TOML file declaring scheduler options, the resources
//! computed values are read from, and the add-ons to deploy in declaration
//! order.

use std::collections::BTreeMap;
use std::path::Path;

use addon_resources::{InMemoryRegistry, ResourceHandle};
use addon_values::{ConfigPath, merge_into};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::addons::{BackstageAddOn, BackstageOptions};
use crate::chart::ChartSpec;
use crate::descriptor::{AddOnDescriptor, ComputedValues, Requirement, ValueBinding, empty_tree};
use crate::error::{Error, Result};
use crate::scheduler::SchedulerOptions;

fn default_true() -> bool {
    true
}

fn default_kind() -> String {
    HELM.to_string()
}

/// Plain chart add-on: layers come straight from the manifest.
pub const HELM: &str = "helm";
/// Backstage typed view: layers are built from `options`.
pub const BACKSTAGE: &str = "backstage";

/// `[resources.NAME]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    #[serde(default)]
    pub kind: String,
    #[serde(default = "empty_tree")]
    pub attributes: Value,
}

/// `[[addons.bindings]]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingSpec {
    /// Where the value goes in the add-on's tree
    pub path: ConfigPath,
    pub resource: String,
    /// Attribute on the resource; omitted binds all attributes
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(default = "default_true")]
    pub required: bool,
}

impl From<&BindingSpec> for ValueBinding {
    fn from(spec: &BindingSpec) -> Self {
        ValueBinding {
            path: spec.path.clone(),
            resource: spec.resource.clone(),
            attribute: spec.attribute.clone(),
            requirement: if spec.required {
                Requirement::Required
            } else {
                Requirement::Optional
            },
        }
    }
}

/// `[[addons]]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddOnSpec {
    pub name: String,

    /// `helm` (default) or `backstage`
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,

    #[serde(default)]
    pub prerequisites: Vec<String>,

    /// Required for `helm`; replaces the built-in chart for typed views
    #[serde(default)]
    pub chart: Option<ChartSpec>,

    #[serde(default = "empty_tree")]
    pub defaults: Value,

    /// Static part of the computed layer
    #[serde(default = "empty_tree")]
    pub computed: Value,

    #[serde(default = "empty_tree")]
    pub overrides: Value,

    #[serde(default)]
    pub bindings: Vec<BindingSpec>,

    /// Typed view options
    #[serde(default)]
    pub options: Option<Value>,
}

impl AddOnSpec {
    /// Build the descriptor this entry declares.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownAddOnType`] for an unrecognised `type`
    /// - [`Error::InvalidManifest`] for a `helm` add-on without a chart or
    ///   typed options that do not fit the view
    pub fn descriptor(&self) -> Result<AddOnDescriptor> {
        let base = match self.kind.as_str() {
            HELM => {
                let chart = self.chart.clone().ok_or_else(|| {
                    Error::invalid_manifest(format!("add-on '{}' has no [addons.chart]", self.name))
                })?;
                AddOnDescriptor::new(&self.name, chart)
            }
            BACKSTAGE => {
                let options: BackstageOptions = match &self.options {
                    Some(options) => serde_json::from_value(options.clone()).map_err(|e| {
                        Error::invalid_manifest(format!(
                            "add-on '{}' has invalid options: {e}",
                            self.name
                        ))
                    })?,
                    None => BackstageOptions::default(),
                };
                let mut descriptor = BackstageAddOn::named(&self.name, options).descriptor()?;
                if let Some(chart) = &self.chart {
                    descriptor.chart = chart.clone();
                }
                descriptor
            }
            other => {
                return Err(Error::UnknownAddOnType {
                    addon: self.name.clone(),
                    kind: other.to_string(),
                });
            }
        };

        Ok(self.layer_onto(base))
    }

    /// Apply the manifest's own layers on top of a base descriptor.
    fn layer_onto(&self, mut descriptor: AddOnDescriptor) -> AddOnDescriptor {
        merge_into(&mut descriptor.defaults, &self.defaults);
        merge_into(&mut descriptor.computed.values, &self.computed);
        merge_into(&mut descriptor.overrides, &self.overrides);

        let computed = std::mem::take(&mut descriptor.computed);
        descriptor.computed = self
            .bindings
            .iter()
            .map(ValueBinding::from)
            .fold(computed, ComputedValues::with_binding);

        descriptor.with_prerequisites(self.prerequisites.iter().cloned())
    }
}

/// A parsed deployment manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentManifest {
    #[serde(default)]
    pub deployment: SchedulerOptions,

    #[serde(default)]
    pub resources: BTreeMap<String, ResourceSpec>,

    #[serde(default)]
    pub addons: Vec<AddOnSpec>,
}

impl DeploymentManifest {
    /// Parse a manifest from TOML content.
    ///
    /// ```
    /// use addon_core::config::DeploymentManifest;
    ///
    /// let manifest = DeploymentManifest::parse(r#"
    /// [[addons]]
    /// name = "ebs-csi-driver"
    /// [addons.chart]
    /// name = "aws-ebs-csi-driver"
    /// "#).unwrap();
    ///
    /// assert_eq!(manifest.addons[0].name, "ebs-csi-driver");
    /// ```
    pub fn parse(content: &str) -> Result<Self> {
        let manifest: DeploymentManifest = toml::from_str(content)?;
        Ok(manifest)
    }

    /// Read and parse a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        tracing::debug!(?path, "Loaded deployment manifest");
        Self::parse(&content)
    }

    pub fn addon(&self, name: &str) -> Option<&AddOnSpec> {
        self.addons.iter().find(|a| a.name == name)
    }

    /// Descriptors for every add-on, in declaration order.
    pub fn descriptors(&self) -> Result<Vec<AddOnDescriptor>> {
        self.addons.iter().map(AddOnSpec::descriptor).collect()
    }

    /// Registry holding every declared resource.
    pub fn registry(&self) -> InMemoryRegistry {
        self.resources
            .iter()
            .map(|(name, spec)| {
                ResourceHandle::with_attributes(name, &spec.kind, spec.attributes.clone())
            })
            .collect()
    }
}
