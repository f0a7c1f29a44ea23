//! Add-on declarations
//!
//! An [`AddOnDescriptor`] is everything the scheduler and compositor need
//! to know about one add-on: its identity, the add-ons it must wait for,
//! the chart it installs and its three configuration layers.

use addon_values::{ConfigNode, ConfigPath};
use serde_json::{Map, Value};

use crate::chart::ChartSpec;

/// Whether a computed value must resolve for the add-on to deploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Requirement {
    /// Missing value aborts this add-on's deployment
    #[default]
    Required,
    /// Missing value is skipped; defaults apply
    Optional,
}

/// "Put attribute `attribute` of resource `resource` at `path`."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueBinding {
    pub path: ConfigPath,
    pub resource: String,
    /// Attribute path on the handle; `None` binds the whole attribute tree
    pub attribute: Option<String>,
    pub requirement: Requirement,
}

impl ValueBinding {
    /// A required binding of one attribute.
    pub fn required(path: ConfigPath, resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            path,
            resource: resource.into(),
            attribute: Some(attribute.into()),
            requirement: Requirement::Required,
        }
    }

    /// An optional binding of one attribute.
    pub fn optional(path: ConfigPath, resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            requirement: Requirement::Optional,
            ..Self::required(path, resource, attribute)
        }
    }

    /// Bind the handle's whole attribute tree instead of one attribute.
    pub fn whole_resource(mut self) -> Self {
        self.attribute = None;
        self
    }

    pub fn is_required(&self) -> bool {
        self.requirement == Requirement::Required
    }
}

/// The computed layer before resolution: a static tree plus resource
/// bindings that are resolved against the registry at compose time.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedValues {
    pub values: ConfigNode,
    pub bindings: Vec<ValueBinding>,
}

impl Default for ComputedValues {
    fn default() -> Self {
        Self {
            values: empty_tree(),
            bindings: Vec::new(),
        }
    }
}

impl ComputedValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: ConfigNode) -> Self {
        Self {
            values,
            bindings: Vec::new(),
        }
    }

    pub fn with_binding(mut self, binding: ValueBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.values.as_object().is_none_or(Map::is_empty)
    }
}

pub(crate) fn empty_tree() -> ConfigNode {
    Value::Object(Map::new())
}

/// One deployable add-on.
///
/// # Example
///
/// ```
/// use addon_core::{AddOnDescriptor, ChartSpec};
/// use serde_json::json;
///
/// let addon = AddOnDescriptor::new("backstage", ChartSpec::new("backstage"))
///     .with_prerequisites(["ebs-csi-driver"])
///     .with_defaults(json!({"image": {"tag": "latest"}}))
///     .with_overrides(json!({"image": {"tag": "v2"}}));
///
/// assert_eq!(addon.prerequisites, vec!["ebs-csi-driver"]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AddOnDescriptor {
    /// Unique identity; prerequisites refer to add-ons by this name
    pub name: String,
    /// Add-ons that must complete before this one runs, in declaration order
    pub prerequisites: Vec<String>,
    pub chart: ChartSpec,
    /// Built-in defaults (immutable template)
    pub defaults: ConfigNode,
    /// Values derived from provisioned resources
    pub computed: ComputedValues,
    /// User-supplied overrides; always win
    pub overrides: ConfigNode,
}

impl AddOnDescriptor {
    pub fn new(name: impl Into<String>, chart: ChartSpec) -> Self {
        Self {
            name: name.into(),
            prerequisites: Vec::new(),
            chart,
            defaults: empty_tree(),
            computed: ComputedValues::default(),
            overrides: empty_tree(),
        }
    }

    /// Append prerequisites, skipping names already listed.
    pub fn with_prerequisites<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.prerequisites.contains(&name) {
                self.prerequisites.push(name);
            }
        }
        self
    }

    pub fn with_defaults(mut self, defaults: ConfigNode) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_computed(mut self, computed: ComputedValues) -> Self {
        self.computed = computed;
        self
    }

    pub fn with_overrides(mut self, overrides: ConfigNode) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn depends_on(&self, name: &str) -> bool {
        self.prerequisites.iter().any(|p| p == name)
    }
}
