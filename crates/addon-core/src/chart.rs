//! Helm chart coordinates for an add-on

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Which chart an add-on installs and how.
///
/// Everything the deploy collaborator needs besides the values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChartSpec {
    /// Chart name within the repository (e.g. `backstage`)
    pub name: String,

    /// Chart repository URL
    #[serde(default)]
    pub repository: Option<String>,

    /// Chart version; `None` means the repository's latest
    #[serde(default)]
    pub version: Option<String>,

    /// Target namespace
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Release name; defaults to the chart name
    #[serde(default)]
    pub release: Option<String>,

    /// Create the namespace if it does not exist
    #[serde(default = "default_true")]
    pub create_namespace: bool,

    /// Wait for the release's resources to become ready
    #[serde(default = "default_true")]
    pub wait: bool,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl ChartSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repository: None,
            version: None,
            namespace: default_namespace(),
            release: None,
            create_namespace: true,
            wait: true,
        }
    }

    pub fn repository(mut self, url: impl Into<String>) -> Self {
        self.repository = Some(url.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn release(mut self, release: impl Into<String>) -> Self {
        self.release = Some(release.into());
        self
    }

    pub fn create_namespace(mut self, create: bool) -> Self {
        self.create_namespace = create;
        self
    }

    pub fn wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }

    /// The release name actually used.
    pub fn release_name(&self) -> &str {
        self.release.as_deref().unwrap_or(&self.name)
    }
}
