//! Configuration trees for Add-on Composer
//!
//! A configuration tree is a `serde_json::Value`: scalars, ordered
//! sequences and string-keyed mappings. This crate provides the pure
//! operations the compositor is built from:
//!
//! - [`path`]: dotted, escaped paths and get/set/remove by path
//! - [`escape`]: key escaping so keys containing `.` survive as one segment
//! - [`merge`]: deep merge with overlay precedence
//! - [`flatten`]: tree to dotted-path map and back

pub mod error;
pub mod escape;
pub mod flatten;
pub mod merge;
pub mod path;

/// A node of a configuration tree.
pub type ConfigNode = serde_json::Value;

pub use error::{Error, Result};
pub use escape::{escape_key, escape_keys, unescape_key};
pub use flatten::{FlatValues, flatten, unflatten};
pub use merge::{deep_merge, merge_all, merge_into};
pub use path::{ConfigPath, contains_path, get_path, remove_path, set_path};
