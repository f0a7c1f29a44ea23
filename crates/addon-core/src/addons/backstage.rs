//! Backstage developer portal
//!
//! Installs the `backstage` chart from <https://backstage.github.io/charts>.
//! Options map onto chart paths in the computed layer; `values` passed by
//! the user are the overrides layer and win over everything.

use std::collections::BTreeMap;

use addon_resources::{ResourceHandle, handle};
use addon_values::{ConfigNode, ConfigPath, set_path};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::chart::ChartSpec;
use crate::descriptor::{AddOnDescriptor, ComputedValues, ValueBinding, empty_tree};
use crate::error::{Error, Result};

use super::{EBS_CSI_DRIVER, SECRETS_STORE};

pub const DEFAULT_NAME: &str = "backstage";
pub const CHART_NAME: &str = "backstage";
pub const CHART_REPOSITORY: &str = "https://backstage.github.io/charts";
pub const CHART_VERSION: &str = "0.21.0";
pub const NAMESPACE: &str = "backstage";
pub const RELEASE: &str = "blueprints-addon-backstage";

/// Registry attributes read from an external database resource.
pub const DATABASE_ATTRIBUTE: &str = "database";
pub const USER_ATTRIBUTE: &str = "user";

const PASSWORD_ENV: &str = "${POSTGRES_PASSWORD}";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageOptions {
    pub registry: Option<String>,
    pub repository: Option<String>,
    pub tag: Option<String>,
    pub pull_policy: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceOptions {
    pub port: Option<u16>,
    pub target_port: Option<u16>,
    #[serde(rename = "type")]
    pub service_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceAccountOptions {
    pub name: Option<String>,
    /// Passed through verbatim; keys like `eks.amazonaws.com/role-arn` stay
    /// single keys
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngressOptions {
    pub enabled: bool,
    pub class_name: Option<String>,
    /// Secret holding the TLS certificate; enables TLS when set
    pub tls_secret: Option<String>,
}

impl Default for IngressOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            class_name: None,
            tls_secret: None,
        }
    }
}

/// Where Backstage keeps its catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PostgresOptions {
    /// In-memory catalog; no database
    #[default]
    Disabled,
    /// PostgreSQL deployed alongside by the chart
    Internal {
        storage_size: Option<String>,
        cpu_request: Option<String>,
        cpu_limit: Option<String>,
        memory_request: Option<String>,
        memory_limit: Option<String>,
    },
    /// An existing database provisioned elsewhere
    External {
        /// Registry resource exposing `host`, `port`, `database` and `user`
        resource: String,
        /// Kubernetes secret with the password, exposed as
        /// `POSTGRES_PASSWORD`
        password_secret: String,
    },
}

/// User-facing options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackstageOptions {
    /// URL users reach Backstage at (required)
    pub base_url: String,
    pub catalog_location: Option<String>,
    pub image: ImageOptions,
    pub image_pull_secrets: Vec<String>,
    pub replicas: Option<u32>,
    pub service: ServiceOptions,
    pub service_account: ServiceAccountOptions,
    pub ingress: Option<IngressOptions>,
    pub postgres: PostgresOptions,
    /// Raw chart values; the overrides layer
    pub values: Option<Value>,
}

/// Typed view producing a Backstage [`AddOnDescriptor`].
///
/// ```
/// use addon_core::addons::backstage::{BackstageAddOn, BackstageOptions};
///
/// let addon = BackstageAddOn::new(BackstageOptions {
///     base_url: "https://backstage.example.com".into(),
///     ..Default::default()
/// });
/// let descriptor = addon.descriptor().unwrap();
/// assert_eq!(descriptor.prerequisites, vec!["ebs-csi-driver"]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BackstageAddOn {
    name: String,
    options: BackstageOptions,
}

impl BackstageAddOn {
    pub fn new(options: BackstageOptions) -> Self {
        Self::named(DEFAULT_NAME, options)
    }

    pub fn named(name: impl Into<String>, options: BackstageOptions) -> Self {
        Self {
            name: name.into(),
            options,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &BackstageOptions {
        &self.options
    }

    pub fn chart() -> ChartSpec {
        ChartSpec::new(CHART_NAME)
            .repository(CHART_REPOSITORY)
            .version(CHART_VERSION)
            .namespace(NAMESPACE)
            .release(RELEASE)
    }

    /// The chart's built-in defaults.
    pub fn default_values() -> ConfigNode {
        json!({
            "backstage": {
                "containerPorts": {"backend": 7007},
                "image": {
                    "debug": false,
                    "registry": "public.ecr.aws",
                    "repository": "a0m0j3q7/backstage-tester",
                    "tag": "latest"
                },
                "installDir": "/app"
            },
            "clusterDomain": "cluster.local",
            "diagnosticMode": {"enabled": false},
            "ingress": {"enabled": false},
            "metrics": {"serviceMonitor": {"enabled": false}},
            "networkPolicy": {"enabled": false},
            "postgres": {"enabled": false},
            "service": {
                "nodePorts": {"backend": 7007},
                "ports": {
                    "name": "http-backend",
                    "targetPort": "backend",
                    "sessionAffinity": "None"
                },
                "type": "ClusterIP"
            }
        })
    }

    pub fn prerequisites(&self) -> Vec<&'static str> {
        let mut prerequisites = vec![EBS_CSI_DRIVER];
        let external_db = matches!(self.options.postgres, PostgresOptions::External { .. });
        if external_db || !self.options.image_pull_secrets.is_empty() {
            prerequisites.push(SECRETS_STORE);
        }
        prerequisites
    }

    /// Build the descriptor.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidManifest`] if `base_url` is empty or an external
    /// database names no resource or password secret.
    pub fn descriptor(&self) -> Result<AddOnDescriptor> {
        let options = &self.options;
        if options.base_url.trim().is_empty() {
            return Err(Error::invalid_manifest(format!(
                "add-on '{}': base_url is required",
                self.name
            )));
        }

        let computed = self.computed()?;
        let overrides = options.values.clone().unwrap_or_else(empty_tree);

        tracing::debug!(
            addon = %self.name,
            bindings = computed.bindings.len(),
            "Built Backstage descriptor"
        );

        Ok(AddOnDescriptor::new(&self.name, Self::chart())
            .with_prerequisites(self.prerequisites())
            .with_defaults(Self::default_values())
            .with_computed(computed)
            .with_overrides(overrides))
    }

    fn computed(&self) -> Result<ComputedValues> {
        let options = &self.options;
        let mut tree = empty_tree();

        put(&mut tree, "backstage.appConfig.app.baseUrl", json!(options.base_url))?;
        put(&mut tree, "backstage.appConfig.backend.baseUrl", json!(options.base_url))?;

        if let Some(location) = &options.catalog_location {
            put(
                &mut tree,
                "backstage.appConfig.catalog.locations",
                json!([{"type": "url", "target": location}]),
            )?;
        }

        let image = &options.image;
        put_opt(&mut tree, "backstage.image.registry", image.registry.as_deref())?;
        put_opt(&mut tree, "backstage.image.repository", image.repository.as_deref())?;
        put_opt(&mut tree, "backstage.image.tag", image.tag.as_deref())?;
        put_opt(&mut tree, "backstage.image.pullPolicy", image.pull_policy.as_deref())?;
        if !options.image_pull_secrets.is_empty() {
            put(&mut tree, "global.imagePullSecrets", json!(options.image_pull_secrets))?;
        }
        if let Some(replicas) = options.replicas {
            put(&mut tree, "backstage.replicas", json!(replicas))?;
        }

        if let Some(port) = options.service.port {
            put(&mut tree, "service.ports.backend", json!(port))?;
        }
        if let Some(target) = options.service.target_port {
            put(&mut tree, "backstage.containerPorts.backend", json!(target))?;
        }
        put_opt(&mut tree, "service.type", options.service.service_type.as_deref())?;

        let account = &options.service_account;
        if let Some(name) = &account.name {
            put(&mut tree, "serviceAccount.create", json!(true))?;
            put(&mut tree, "serviceAccount.name", json!(name))?;
        }
        if !account.annotations.is_empty() {
            put(&mut tree, "serviceAccount.annotations", json!(account.annotations))?;
        }

        if let Some(ingress) = &options.ingress {
            put(&mut tree, "ingress.enabled", json!(ingress.enabled))?;
            put(&mut tree, "ingress.host", json!(host_of(&options.base_url)))?;
            put_opt(&mut tree, "ingress.className", ingress.class_name.as_deref())?;
            if let Some(secret) = &ingress.tls_secret {
                put(&mut tree, "ingress.tls", json!({"enabled": true, "secretName": secret}))?;
            }
        }

        let mut bindings = Vec::new();
        match &options.postgres {
            PostgresOptions::Disabled => {}
            PostgresOptions::Internal {
                storage_size,
                cpu_request,
                cpu_limit,
                memory_request,
                memory_limit,
            } => {
                put(&mut tree, "postgres.enabled", json!(true))?;
                put(&mut tree, "postgres.storage.enabled", json!(true))?;
                put_opt(&mut tree, "postgres.storage.size", storage_size.as_deref())?;
                put_opt(&mut tree, "postgres.resources.requests.cpu", cpu_request.as_deref())?;
                put_opt(&mut tree, "postgres.resources.limits.cpu", cpu_limit.as_deref())?;
                put_opt(&mut tree, "postgres.resources.requests.memory", memory_request.as_deref())?;
                put_opt(&mut tree, "postgres.resources.limits.memory", memory_limit.as_deref())?;
            }
            PostgresOptions::External {
                resource,
                password_secret,
            } => {
                if resource.trim().is_empty() || password_secret.trim().is_empty() {
                    return Err(Error::invalid_manifest(format!(
                        "add-on '{}': external postgres needs a resource and a password_secret",
                        self.name
                    )));
                }
                let connection = "backstage.appConfig.backend.database.connection";
                put(&mut tree, "backstage.appConfig.backend.database.client", json!("pg"))?;
                put(&mut tree, &format!("{connection}.password"), json!(PASSWORD_ENV))?;
                put(&mut tree, "backstage.extraEnvVarsSecrets", json!([password_secret]))?;

                for (key, attribute) in [
                    ("host", handle::HOST),
                    ("port", handle::PORT),
                    ("database", DATABASE_ATTRIBUTE),
                    ("user", USER_ATTRIBUTE),
                ] {
                    bindings.push(ValueBinding::required(
                        format!("{connection}.{key}").parse()?,
                        resource.as_str(),
                        attribute,
                    ));
                }
            }
        }

        let computed = ComputedValues::from_values(tree);
        Ok(bindings.into_iter().fold(computed, ComputedValues::with_binding))
    }
}

/// Describe an external database as a registry resource.
pub fn database_resource(
    name: &str,
    host: &str,
    port: u16,
    database: &str,
    user: &str,
) -> Result<ResourceHandle> {
    Ok(ResourceHandle::new(name, "postgres")
        .attribute_set(handle::HOST, host)?
        .attribute_set(handle::PORT, port)?
        .attribute_set(DATABASE_ATTRIBUTE, database)?
        .attribute_set(USER_ATTRIBUTE, user)?)
}

fn put(tree: &mut ConfigNode, path: &str, value: Value) -> Result<()> {
    let path: ConfigPath = path.parse()?;
    Ok(set_path(tree, &path, value)?)
}

fn put_opt(tree: &mut ConfigNode, path: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(value) => put(tree, path, json!(value)),
        None => Ok(()),
    }
}

fn host_of(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.split(['/', ':']).next().unwrap_or(rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::ConfigCompositor;
    use addon_resources::InMemoryRegistry;
    use pretty_assertions::assert_eq;

    fn options() -> BackstageOptions {
        BackstageOptions {
            base_url: "https://backstage.example.com/portal".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_base_url_required() {
        let err = BackstageAddOn::new(BackstageOptions::default())
            .descriptor()
            .unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn test_minimal_descriptor_uses_chart_defaults() {
        let descriptor = BackstageAddOn::new(options()).descriptor().unwrap();
        assert_eq!(descriptor.name, "backstage");
        assert_eq!(descriptor.chart.release_name(), RELEASE);
        assert_eq!(descriptor.chart.version.as_deref(), Some(CHART_VERSION));

        let flat = ConfigCompositor::new(&InMemoryRegistry::new())
            .compose_addon(&descriptor)
            .unwrap();
        assert_eq!(flat["backstage.image.tag"], json!("latest"));
        assert_eq!(flat["service.type"], json!("ClusterIP"));
        assert_eq!(
            flat["backstage.appConfig.app.baseUrl"],
            json!("https://backstage.example.com/portal")
        );
    }

    #[test]
    fn test_prerequisites_follow_options() {
        assert_eq!(BackstageAddOn::new(options()).prerequisites(), vec![EBS_CSI_DRIVER]);

        let with_secrets = BackstageOptions {
            image_pull_secrets: vec!["regcred".into()],
            ..options()
        };
        assert_eq!(
            BackstageAddOn::new(with_secrets).prerequisites(),
            vec![EBS_CSI_DRIVER, SECRETS_STORE]
        );
    }

    #[test]
    fn test_annotation_keys_are_escaped() {
        let mut annotations = BTreeMap::new();
        annotations.insert(
            "eks.amazonaws.com/role-arn".to_string(),
            "arn:aws:iam::123456789012:role/backstage".to_string(),
        );
        let addon = BackstageAddOn::new(BackstageOptions {
            service_account: ServiceAccountOptions {
                name: Some("backstage".into()),
                annotations,
            },
            ..options()
        });

        let flat = ConfigCompositor::new(&InMemoryRegistry::new())
            .compose_addon(&addon.descriptor().unwrap())
            .unwrap();
        assert_eq!(
            flat[r"serviceAccount.annotations.eks\.amazonaws\.com/role-arn"],
            json!("arn:aws:iam::123456789012:role/backstage")
        );
        assert_eq!(flat["serviceAccount.create"], json!(true));
    }

    #[test]
    fn test_ingress_host_from_base_url() {
        let addon = BackstageAddOn::new(BackstageOptions {
            ingress: Some(IngressOptions {
                tls_secret: Some("backstage-tls".into()),
                ..Default::default()
            }),
            ..options()
        });
        let tree = addon.descriptor().unwrap().computed.values;
        assert_eq!(tree["ingress"]["host"], json!("backstage.example.com"));
        assert_eq!(tree["ingress"]["tls"]["secretName"], json!("backstage-tls"));
    }

    #[test]
    fn test_user_values_override_options() {
        let addon = BackstageAddOn::new(BackstageOptions {
            image: ImageOptions {
                tag: Some("1.20".into()),
                ..Default::default()
            },
            values: Some(json!({"backstage": {"image": {"tag": "1.21"}}})),
            ..options()
        });

        let flat = ConfigCompositor::new(&InMemoryRegistry::new())
            .compose_addon(&addon.descriptor().unwrap())
            .unwrap();
        assert_eq!(flat["backstage.image.tag"], json!("1.21"));
    }

    #[test]
    fn test_internal_postgres() {
        let addon = BackstageAddOn::new(BackstageOptions {
            postgres: PostgresOptions::Internal {
                storage_size: Some("2Gi".into()),
                cpu_request: Some("100m".into()),
                cpu_limit: None,
                memory_request: None,
                memory_limit: Some("596Mi".into()),
            },
            ..options()
        });
        let tree = addon.descriptor().unwrap().computed.values;
        assert_eq!(tree["postgres"]["enabled"], json!(true));
        assert_eq!(tree["postgres"]["storage"]["size"], json!("2Gi"));
        assert_eq!(tree["postgres"]["resources"]["limits"]["memory"], json!("596Mi"));
    }

    #[test]
    fn test_external_postgres_resolves_from_registry() {
        let addon = BackstageAddOn::new(BackstageOptions {
            postgres: PostgresOptions::External {
                resource: "backstage-db".into(),
                password_secret: "backstage-db-password".into(),
            },
            ..options()
        });
        let descriptor = addon.descriptor().unwrap();
        assert!(descriptor.depends_on(SECRETS_STORE));

        let registry = InMemoryRegistry::new().with(
            database_resource("backstage-db", "db.internal", 5432, "backstage", "portal").unwrap(),
        );
        let flat = ConfigCompositor::new(&registry).compose_addon(&descriptor).unwrap();
        assert_eq!(
            flat["backstage.appConfig.backend.database.connection.host"],
            json!("db.internal")
        );
        assert_eq!(
            flat["backstage.appConfig.backend.database.connection.port"],
            json!(5432)
        );
    }

    #[test]
    fn test_external_postgres_missing_resource_fails() {
        let addon = BackstageAddOn::new(BackstageOptions {
            postgres: PostgresOptions::External {
                resource: "backstage-db".into(),
                password_secret: "pw".into(),
            },
            ..options()
        });
        let err = ConfigCompositor::new(&InMemoryRegistry::new())
            .compose_addon(&addon.descriptor().unwrap())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::MissingRequiredValue { ref path, .. }
                if path == "backstage.appConfig.backend.database.connection.host"
        ));
    }

    #[test]
    fn test_options_from_toml() {
        let options: BackstageOptions = toml::from_str(
            r#"
            base_url = "https://portal.example.com"
            replicas = 2

            [image]
            tag = "1.21"

            [postgres]
            mode = "internal"
            storage_size = "4Gi"
            "#,
        )
        .unwrap();
        assert_eq!(options.replicas, Some(2));
        assert!(matches!(options.postgres, PostgresOptions::Internal { .. }));
    }
}
