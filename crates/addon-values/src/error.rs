//! Error types for addon-values

/// Result type for addon-values operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while addressing, merging or flattening trees
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A dotted path string does not follow the escaped path grammar
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// A path walks through a value that is not a mapping
    #[error("Cannot set '{path}': '{blocked_at}' holds a non-mapping value")]
    PathConflict { path: String, blocked_at: String },

    /// Two distinct keys in one mapping escape to the same segment
    #[error("Keys '{first}' and '{second}' under '{parent}' both escape to '{escaped}'")]
    KeyCollision {
        parent: String,
        first: String,
        second: String,
        escaped: String,
    },

    /// An operation that needs a mapping was given something else
    #[error("Expected a mapping at '{path}'")]
    NotAMapping { path: String },
}

impl Error {
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
