//! Error types for addon-core

use std::path::PathBuf;

/// Result type for addon-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while composing or scheduling add-ons
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required computed value could not be resolved and no override
    /// supplies it
    #[error("Add-on '{addon}' is missing required value '{path}'")]
    MissingRequiredValue { addon: String, path: String },

    /// An add-on names a prerequisite that was never declared
    #[error("Add-on '{addon}' depends on undeclared add-on '{prerequisite}'")]
    UnresolvedDependency { addon: String, prerequisite: String },

    /// Prerequisites form a cycle
    #[error("Dependency cycle between add-ons: {}", participants.join(" -> "))]
    DependencyCycle { participants: Vec<String> },

    /// Two add-ons were declared under the same name
    #[error("Add-on '{name}' is declared more than once")]
    DuplicateAddOn { name: String },

    /// The deploy collaborator reported a failure
    #[error("Deploying add-on '{addon}' failed: {message}")]
    DeployFailure { addon: String, message: String },

    /// Manifest names an add-on type that has no typed view
    #[error("Unknown add-on type '{kind}' for add-on '{addon}'")]
    UnknownAddOnType { addon: String, kind: String },

    /// Manifest content is structurally valid but semantically wrong
    #[error("Invalid manifest: {message}")]
    InvalidManifest { message: String },

    /// Configuration file not found at expected path
    #[error("Configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// Value file extension not recognised
    #[error("Unsupported values format for {path} (expected .yaml, .yml, .json or .toml)")]
    UnsupportedFormat { path: PathBuf },

    /// I/O error reading a configuration file
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // Transparent wrappers for underlying crate errors
    /// Tree error from addon-values (invalid paths, key collisions)
    #[error(transparent)]
    Values(#[from] addon_values::Error),

    /// Resource lookup error from addon-resources
    #[error(transparent)]
    Resources(#[from] addon_resources::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML deserialization error
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// TOML deserialization error
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_manifest(message: impl Into<String>) -> Self {
        Self::InvalidManifest {
            message: message.into(),
        }
    }

    /// True for errors that abort a deployment run before any add-on starts.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::UnresolvedDependency { .. }
                | Self::DependencyCycle { .. }
                | Self::DuplicateAddOn { .. }
        )
    }
}
