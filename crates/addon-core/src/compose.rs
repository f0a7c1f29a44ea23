//! Configuration composition
//!
//! An add-on's final values are built from three layers, merged left to
//! right so later layers win:
//!
//! 1. built-in defaults
//! 2. computed values (static values plus resolved resource bindings)
//! 3. user overrides
//!
//! The merged tree is then flattened into the dotted-path form the chart
//! deployer consumes. Keys are escaped as they become path strings, so a
//! user key such as `eks.amazonaws.com/role-arn` stays one segment.
//! Inputs are never modified.

use addon_resources::ResourceRegistry;
use addon_values::{ConfigNode, FlatValues, flatten, get_path, merge_all, set_path};
use serde_json::Value;

use crate::descriptor::{AddOnDescriptor, ValueBinding};
use crate::error::{Error, Result};

/// Merge three layers and flatten the result.
///
/// ```
/// use addon_core::compose::compose;
/// use serde_json::{json, Value};
///
/// let flat = compose(
///     &json!({"image": {"tag": "latest"}, "ingress": {"enabled": false}}),
///     &json!({"ingress": {"host": "svc.example.com"}}),
///     &json!({"image": {"tag": "v2"}}),
/// ).unwrap();
///
/// assert_eq!(
///     Value::Object(flat),
///     json!({"image.tag": "v2", "ingress.enabled": false, "ingress.host": "svc.example.com"})
/// );
/// ```
pub fn compose(
    defaults: &ConfigNode,
    computed: &ConfigNode,
    overrides: &ConfigNode,
) -> Result<FlatValues> {
    let merged = merge_all([defaults, computed, overrides]);
    Ok(flatten(&merged)?)
}

/// Builds add-on configuration, resolving computed values against a
/// resource registry.
pub struct ConfigCompositor<'a> {
    registry: &'a dyn ResourceRegistry,
}

impl<'a> ConfigCompositor<'a> {
    pub fn new(registry: &'a dyn ResourceRegistry) -> Self {
        Self { registry }
    }

    /// Resolve the computed layer of `addon`.
    ///
    /// Bindings whose resource or attribute is absent are skipped when
    /// optional, or when the overrides already supply that path. A missing
    /// required value is an error naming the path.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingRequiredValue`] for an unresolved required binding
    /// - [`Error::Values`] if a binding path runs through a scalar
    pub fn computed_layer(&self, addon: &AddOnDescriptor) -> Result<ConfigNode> {
        let mut computed = addon.computed.values.clone();

        for binding in &addon.computed.bindings {
            match self.lookup(binding) {
                Some(value) => {
                    tracing::debug!(
                        addon = %addon.name,
                        path = %binding.path,
                        resource = %binding.resource,
                        "Resolved computed value"
                    );
                    set_path(&mut computed, &binding.path, value)?;
                }
                None if binding.is_required() && !supplies(&addon.overrides, binding) => {
                    tracing::warn!(
                        addon = %addon.name,
                        path = %binding.path,
                        resource = %binding.resource,
                        "Required computed value is missing"
                    );
                    return Err(Error::MissingRequiredValue {
                        addon: addon.name.clone(),
                        path: binding.path.to_string(),
                    });
                }
                None => {
                    tracing::debug!(
                        addon = %addon.name,
                        path = %binding.path,
                        resource = %binding.resource,
                        "Computed value unavailable, falling back"
                    );
                }
            }
        }

        Ok(computed)
    }

    /// The fully merged (unflattened) tree of `addon`.
    pub fn compose_tree(&self, addon: &AddOnDescriptor) -> Result<ConfigNode> {
        let computed = self.computed_layer(addon)?;
        Ok(merge_all([&addon.defaults, &computed, &addon.overrides]))
    }

    /// The flattened values of `addon`, ready for deployment.
    pub fn compose_addon(&self, addon: &AddOnDescriptor) -> Result<FlatValues> {
        let computed = self.computed_layer(addon)?;
        compose(&addon.defaults, &computed, &addon.overrides)
    }

    fn lookup(&self, binding: &ValueBinding) -> Option<Value> {
        let handle = self.registry.get(&binding.resource)?;
        match &binding.attribute {
            Some(attribute) => handle.attribute(attribute).cloned(),
            None => Some(handle.attributes().clone()),
        }
    }
}

fn supplies(overrides: &ConfigNode, binding: &ValueBinding) -> bool {
    get_path(overrides, &binding.path).is_some_and(|v| !v.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartSpec;
    use crate::descriptor::{ComputedValues, ValueBinding};
    use addon_resources::{InMemoryRegistry, ResourceHandle};
    use addon_values::ConfigPath;
    use serde_json::json;

    fn path(s: &str) -> ConfigPath {
        s.parse().unwrap()
    }

    fn registry() -> InMemoryRegistry {
        InMemoryRegistry::new().with(ResourceHandle::with_attributes(
            "hosted-zone",
            "route53-zone",
            json!({"name": "svc.example.com", "zoneId": "Z123"}),
        ))
    }

    fn addon() -> AddOnDescriptor {
        AddOnDescriptor::new("web", ChartSpec::new("web"))
            .with_defaults(json!({"image": {"tag": "latest"}, "ingress": {"enabled": false}}))
            .with_overrides(json!({"image": {"tag": "v2"}}))
    }

    #[test]
    fn test_compose_three_layers() {
        let flat = compose(
            &json!({"image": {"tag": "latest"}, "ingress": {"enabled": false}}),
            &json!({"ingress": {"host": "svc.example.com"}}),
            &json!({"image": {"tag": "v2"}}),
        )
        .unwrap();
        assert_eq!(
            Value::Object(flat),
            json!({"image.tag": "v2", "ingress.enabled": false, "ingress.host": "svc.example.com"})
        );
    }

    #[test]
    fn test_binding_resolved_into_computed_layer() {
        let registry = registry();
        let addon = addon().with_computed(ComputedValues::new().with_binding(
            ValueBinding::required(path("ingress.host"), "hosted-zone", "name"),
        ));

        let flat = ConfigCompositor::new(&registry).compose_addon(&addon).unwrap();
        assert_eq!(flat["ingress.host"], json!("svc.example.com"));
        assert_eq!(flat["image.tag"], json!("v2"));
    }

    #[test]
    fn test_missing_required_value_names_path() {
        let registry = InMemoryRegistry::new();
        let addon = addon().with_computed(ComputedValues::new().with_binding(
            ValueBinding::required(path("ingress.host"), "hosted-zone", "name"),
        ));

        let err = ConfigCompositor::new(&registry).compose_addon(&addon).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingRequiredValue { ref addon, ref path } if addon == "web" && path == "ingress.host"
        ));
    }

    #[test]
    fn test_missing_required_value_supplied_by_override() {
        let registry = InMemoryRegistry::new();
        let addon = addon()
            .with_overrides(json!({"ingress": {"host": "manual.example.com"}}))
            .with_computed(ComputedValues::new().with_binding(ValueBinding::required(
                path("ingress.host"),
                "hosted-zone",
                "name",
            )));

        let flat = ConfigCompositor::new(&registry).compose_addon(&addon).unwrap();
        assert_eq!(flat["ingress.host"], json!("manual.example.com"));
    }

    #[test]
    fn test_missing_optional_value_falls_back_to_default() {
        let registry = registry();
        let addon = addon()
            .with_defaults(json!({"certificate": {"arn": ""}}))
            .with_computed(ComputedValues::new().with_binding(ValueBinding::optional(
                path("certificate.arn"),
                "app-cert",
                "arn",
            )));

        let flat = ConfigCompositor::new(&registry).compose_addon(&addon).unwrap();
        assert_eq!(flat["certificate.arn"], json!(""));
    }

    #[test]
    fn test_whole_resource_binding() {
        let registry = registry();
        let addon = addon().with_computed(ComputedValues::new().with_binding(
            ValueBinding::required(path("dns"), "hosted-zone", "").whole_resource(),
        ));

        let tree = ConfigCompositor::new(&registry).compose_tree(&addon).unwrap();
        assert_eq!(tree["dns"], json!({"name": "svc.example.com", "zoneId": "Z123"}));
    }

    #[test]
    fn test_inputs_not_mutated() {
        let registry = registry();
        let addon = addon().with_computed(
            ComputedValues::from_values(json!({"replicas": 2})).with_binding(
                ValueBinding::required(path("ingress.host"), "hosted-zone", "name"),
            ),
        );
        let before = addon.clone();

        let _ = ConfigCompositor::new(&registry).compose_addon(&addon).unwrap();
        assert_eq!(addon, before);
    }

    #[test]
    fn test_overrides_beat_computed() {
        let registry = registry();
        let addon = addon()
            .with_overrides(json!({"ingress": {"host": "override.example.com"}}))
            .with_computed(ComputedValues::new().with_binding(ValueBinding::required(
                path("ingress.host"),
                "hosted-zone",
                "name",
            )));

        let flat = ConfigCompositor::new(&registry).compose_addon(&addon).unwrap();
        assert_eq!(flat["ingress.host"], json!("override.example.com"));
    }
}
