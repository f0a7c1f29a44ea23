//! Descriptor builders and on-disk manifest fixtures.

use std::fs;
use std::path::{Path, PathBuf};

use addon_core::{AddOnDescriptor, ChartSpec};
use serde_json::Value;
use tempfile::TempDir;

/// A chart add-on with no configuration.
pub fn addon(name: &str, prerequisites: &[&str]) -> AddOnDescriptor {
    AddOnDescriptor::new(name, ChartSpec::new(name).namespace("addons"))
        .with_prerequisites(prerequisites.iter().copied())
}

/// A chart add-on with defaults and overrides.
pub fn addon_with_values(
    name: &str,
    prerequisites: &[&str],
    defaults: Value,
    overrides: Value,
) -> AddOnDescriptor {
    addon(name, prerequisites)
        .with_defaults(defaults)
        .with_overrides(overrides)
}

/// A temporary directory holding a deployment manifest and value files.
///
/// # Example
///
/// ```rust,no_run
/// use addon_test_utils::TestManifest;
///
/// let fixture = TestManifest::new("[[addons]]\nname = \"web\"\n[addons.chart]\nname = \"web\"\n");
/// let values = fixture.write("values.yaml", "web:\n  replicas: 2\n");
/// assert!(values.exists());
/// ```
pub struct TestManifest {
    temp_dir: TempDir,
}

impl TestManifest {
    /// Write `content` as `deployment.toml` in a fresh directory.
    pub fn new(content: &str) -> Self {
        let fixture = Self {
            temp_dir: TempDir::new().unwrap(),
        };
        fixture.write("deployment.toml", content);
        fixture
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root().join("deployment.toml")
    }

    /// Write a file relative to the root and return its path.
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.root().join(name);
        fs::write(&path, content)
            .unwrap_or_else(|e| panic!("Could not write {}: {e}", path.display()));
        path
    }
}
