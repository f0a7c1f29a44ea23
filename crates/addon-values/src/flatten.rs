//! Flattening trees into dotted-path maps and back
//!
//! The flattened form is what gets handed to chart deployment: one entry per
//! leaf, keyed by its escaped dotted path. Scalars and sequences are leaves;
//! mappings are descended into and empty mappings produce no entry.
//!
//! ```
//! use addon_values::flatten::{flatten, unflatten};
//! use serde_json::json;
//!
//! let tree = json!({"image": {"tag": "v2"}, "args": ["--debug"]});
//! let flat = flatten(&tree).unwrap();
//! assert_eq!(flat["image.tag"], json!("v2"));
//! assert_eq!(flat["args"], json!(["--debug"]));
//! assert_eq!(unflatten(&flat).unwrap(), tree);
//! ```

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::escape::{SEPARATOR, SiblingKeys};
use crate::path::{ConfigPath, set_path};

/// Dotted path → leaf value.
pub type FlatValues = Map<String, Value>;

/// Flatten a tree into one entry per leaf.
///
/// A root that is not a mapping is stored under the empty key.
///
/// # Errors
///
/// Returns [`Error::KeyCollision`] if two keys in one mapping escape to the
/// same segment.
pub fn flatten(tree: &Value) -> Result<FlatValues> {
    let mut flat = FlatValues::new();
    match tree {
        Value::Object(_) => flatten_into(tree, "", &mut flat)?,
        leaf => {
            flat.insert(String::new(), leaf.clone());
        }
    }
    Ok(flat)
}

fn flatten_into(node: &Value, prefix: &str, flat: &mut FlatValues) -> Result<()> {
    let Value::Object(map) = node else {
        flat.insert(prefix.to_string(), node.clone());
        return Ok(());
    };

    let mut siblings = SiblingKeys::new(prefix);
    for (key, child) in map {
        let segment = siblings.claim(key)?;
        let path = if prefix.is_empty() {
            segment
        } else {
            format!("{prefix}{SEPARATOR}{segment}")
        };
        flatten_into(child, &path, flat)?;
    }
    Ok(())
}

/// Rebuild a tree from a flattened map.
///
/// # Errors
///
/// Returns [`Error::InvalidPath`] for a malformed key, or
/// [`Error::PathConflict`] if one key is a prefix of another
/// (`a = 1` next to `a.b = 2`).
pub fn unflatten(flat: &FlatValues) -> Result<Value> {
    let mut tree = Value::Object(Map::new());
    for (key, value) in flat {
        let path = ConfigPath::parse(key)?;
        set_path(&mut tree, &path, value.clone())?;
    }
    Ok(tree)
}

/// Sorted `path=value` lines, handy for logs and diffs.
pub fn to_lines(flat: &FlatValues) -> Vec<String> {
    let mut lines: Vec<String> = flat.iter().map(|(k, v)| format!("{k}={v}")).collect();
    lines.sort();
    lines
}
