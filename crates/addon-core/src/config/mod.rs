//! Deployment manifests and value files
//!
//! A deployment is declared in one TOML manifest:
//!
//! - `[deployment]`: execution mode and retry policy
//! - `[resources.NAME]`: provisioned resources computed values read from
//! - `[[addons]]`: add-ons in declaration order, each with a chart, layers
//!   and resource bindings
//!
//! User value files (YAML, JSON or TOML) are layered over each add-on's
//! overrides by [`ManifestResolver`].

mod manifest;
mod resolver;

pub use manifest::{AddOnSpec, BACKSTAGE, BindingSpec, DeploymentManifest, HELM, ResourceSpec};
pub use resolver::{ManifestResolver, ResolvedDeployment, load_values_file};
