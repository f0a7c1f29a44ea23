//! Error types for addon-resources

/// Result type for addon-resources operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised when reading resources
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// No resource registered under the name
    #[error("Resource not found: {name}")]
    ResourceNotFound { name: String },

    /// The resource exists but has no such attribute
    #[error("Resource '{resource}' has no attribute '{attribute}'")]
    AttributeMissing { resource: String, attribute: String },

    /// The attribute exists but has the wrong shape
    #[error("Attribute '{attribute}' of resource '{resource}' is not {expected}")]
    AttributeType {
        resource: String,
        attribute: String,
        expected: &'static str,
    },

    /// Attribute path could not be parsed or written
    #[error(transparent)]
    Values(#[from] addon_values::Error),
}
