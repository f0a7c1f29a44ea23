//! Path parsing and path-addressed access to configuration trees
//!
//! A [`ConfigPath`] is an ordered list of raw (unescaped) mapping keys.
//! Its string form joins escaped segments with `.`.
//!
//! # Examples
//!
//! ```
//! use addon_values::path::{ConfigPath, get_path, set_path};
//! use serde_json::json;
//!
//! let path = ConfigPath::parse(r"serviceAccount.annotations.eks\.amazonaws\.com/role-arn").unwrap();
//! assert_eq!(path.segments()[2], "eks.amazonaws.com/role-arn");
//!
//! let mut tree = json!({});
//! set_path(&mut tree, &ConfigPath::parse("image.tag").unwrap(), json!("v2")).unwrap();
//! assert_eq!(get_path(&tree, &ConfigPath::parse("image.tag").unwrap()), Some(&json!("v2")));
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::escape::{ESCAPE, SEPARATOR, escape_key, unescape_key};

/// A path into a configuration tree.
///
/// The empty path addresses the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConfigPath {
    segments: Vec<String>,
}

impl ConfigPath {
    /// The root path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from raw segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse an escaped dotted path.
    ///
    /// An empty string is the root path. Empty segments (`a..b`, a leading
    /// or trailing `.`) are rejected; the empty key is spelled `\_`.
    pub fn parse(dotted: &str) -> Result<Self> {
        if dotted.is_empty() {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = dotted.chars();

        while let Some(ch) = chars.next() {
            match ch {
                ESCAPE => {
                    current.push(ch);
                    match chars.next() {
                        Some(next) => current.push(next),
                        None => return Err(Error::invalid_path(dotted, "dangling escape")),
                    }
                }
                SEPARATOR => {
                    segments.push(Self::finish_segment(dotted, &current)?);
                    current.clear();
                }
                _ => current.push(ch),
            }
        }
        segments.push(Self::finish_segment(dotted, &current)?);

        Ok(Self { segments })
    }

    fn finish_segment(dotted: &str, raw: &str) -> Result<String> {
        if raw.is_empty() {
            return Err(Error::invalid_path(dotted, "empty segment"));
        }
        unescape_key(raw).map_err(|e| match e {
            Error::InvalidPath { reason, .. } => Error::invalid_path(dotted, reason),
            other => other,
        })
    }

    /// The raw segments of this path.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Return a new path with `key` appended.
    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(key.into());
        Self { segments }
    }

    /// The path without its last segment, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.segments.split_last()?;
        Some(Self {
            segments: rest.to_vec(),
        })
    }

    /// The last segment, or `None` for the root.
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// True if `self` equals `other` or is an ancestor of it.
    pub fn is_prefix_of(&self, other: &ConfigPath) -> bool {
        other.segments.starts_with(&self.segments)
    }
}

impl fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{SEPARATOR}")?;
            }
            f.write_str(&escape_key(segment))?;
        }
        Ok(())
    }
}

impl FromStr for ConfigPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ConfigPath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for ConfigPath {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<ConfigPath> for String {
    fn from(path: ConfigPath) -> Self {
        path.to_string()
    }
}

/// Get the value at `path`.
///
/// Returns `None` if any segment is missing or walks through a non-mapping.
pub fn get_path<'a>(tree: &'a Value, path: &ConfigPath) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(tree, |node, key| node.as_object()?.get(key))
}

/// True if a value (including `null`) exists at `path`.
pub fn contains_path(tree: &Value, path: &ConfigPath) -> bool {
    get_path(tree, path).is_some()
}

/// Set `value` at `path`, creating intermediate mappings as needed.
///
/// Whatever sits at the exact path (scalar, sequence or subtree) is
/// replaced; siblings are left alone. Setting the root path replaces the
/// whole tree.
///
/// # Errors
///
/// Returns [`Error::PathConflict`] if an intermediate segment already holds
/// a scalar or sequence.
pub fn set_path(tree: &mut Value, path: &ConfigPath, value: Value) -> Result<()> {
    let Some((last, parents)) = path.segments().split_last() else {
        *tree = value;
        return Ok(());
    };

    let mut node = tree;
    for (depth, key) in parents.iter().enumerate() {
        let map = as_mapping_mut(node, path, depth)?;
        node = map
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    let map = as_mapping_mut(node, path, parents.len())?;
    map.insert(last.clone(), value);
    Ok(())
}

fn as_mapping_mut<'a>(
    node: &'a mut Value,
    path: &ConfigPath,
    depth: usize,
) -> Result<&'a mut Map<String, Value>> {
    match node {
        Value::Object(map) => Ok(map),
        _ => Err(Error::PathConflict {
            path: path.to_string(),
            blocked_at: ConfigPath::from_segments(path.segments()[..depth].iter().cloned())
                .to_string(),
        }),
    }
}

/// Remove the value at `path` and return it.
///
/// Returns `None` if the path does not exist. The root cannot be removed.
pub fn remove_path(tree: &mut Value, path: &ConfigPath) -> Option<Value> {
    let (last, parents) = path.segments().split_last()?;
    let parent = parents
        .iter()
        .try_fold(tree, |node, key| node.as_object_mut()?.get_mut(key))?;
    parent.as_object_mut()?.remove(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(s: &str) -> ConfigPath {
        ConfigPath::parse(s).unwrap()
    }

    #[test]
    fn test_parse_simple() {
        assert_eq!(p("name").segments(), ["name"]);
    }

    #[test]
    fn test_parse_dotted() {
        assert_eq!(
            p("config.database.host").segments(),
            ["config", "database", "host"]
        );
    }

    #[test]
    fn test_parse_escaped_separator() {
        assert_eq!(p(r"a\.b.c").segments(), ["a.b", "c"]);
    }

    #[test]
    fn test_parse_empty_key_token() {
        assert_eq!(p(r"a.\_.c").segments(), ["a", "", "c"]);
    }

    #[test]
    fn test_parse_empty_is_root() {
        assert!(p("").is_root());
    }

    #[test]
    fn test_parse_rejects_empty_segments() {
        assert!(ConfigPath::parse("a..b").is_err());
        assert!(ConfigPath::parse(".a").is_err());
        assert!(ConfigPath::parse("a.").is_err());
    }

    #[test]
    fn test_parse_rejects_unescaped_brackets() {
        assert!(ConfigPath::parse("items[0]").is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        for s in ["a", r"a\.b.c", r"x.\_.y", r"list\[0\].k", r"back\\slash"] {
            assert_eq!(p(s).to_string(), s);
        }
    }

    #[test]
    fn test_child_and_parent() {
        let path = p("a.b").child("c.d");
        assert_eq!(path.to_string(), r"a.b.c\.d");
        assert_eq!(path.parent().unwrap(), p("a.b"));
        assert_eq!(path.last(), Some("c.d"));
        assert!(p("a").is_prefix_of(&path));
        assert!(!p("b").is_prefix_of(&path));
        assert!(ConfigPath::root().parent().is_none());
    }

    #[test]
    fn test_get_path_nested() {
        let value = json!({"config": {"database": {"host": "localhost"}}});
        assert_eq!(
            get_path(&value, &p("config.database.host")),
            Some(&json!("localhost"))
        );
        assert_eq!(get_path(&value, &p("config.missing")), None);
        assert_eq!(get_path(&value, &p("config.database.host.deeper")), None);
    }

    #[test]
    fn test_set_path_creates_intermediates() {
        let mut value = json!({});
        set_path(&mut value, &p("a.b.c"), json!(5)).unwrap();
        assert_eq!(value, json!({"a": {"b": {"c": 5}}}));
    }

    #[test]
    fn test_set_path_keeps_siblings() {
        let mut value = json!({"a": {"x": 1, "b": {"y": 2}}});
        set_path(&mut value, &p("a.b.c"), json!(3)).unwrap();
        assert_eq!(value, json!({"a": {"x": 1, "b": {"y": 2, "c": 3}}}));
    }

    #[test]
    fn test_set_path_replaces_subtree() {
        let mut value = json!({"a": {"b": {"deep": true}}});
        set_path(&mut value, &p("a.b"), json!("flat")).unwrap();
        assert_eq!(value, json!({"a": {"b": "flat"}}));
    }

    #[test]
    fn test_set_path_through_scalar_conflicts() {
        let mut value = json!({"a": 1});
        let err = set_path(&mut value, &p("a.b"), json!(2)).unwrap_err();
        assert_eq!(
            err,
            Error::PathConflict {
                path: "a.b".to_string(),
                blocked_at: "a".to_string()
            }
        );
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_set_root_replaces_tree() {
        let mut value = json!({"a": 1});
        set_path(&mut value, &ConfigPath::root(), json!({"b": 2})).unwrap();
        assert_eq!(value, json!({"b": 2}));
    }

    #[test]
    fn test_remove_path() {
        let mut value = json!({"name": "test", "nested": {"version": "1.0"}});
        assert_eq!(remove_path(&mut value, &p("nested.version")), Some(json!("1.0")));
        assert_eq!(value, json!({"name": "test", "nested": {}}));
        assert_eq!(remove_path(&mut value, &p("missing.key")), None);
    }

    #[test]
    fn test_serde_as_string() {
        let path: ConfigPath = serde_json::from_value(json!(r"a.b\.c")).unwrap();
        assert_eq!(path.segments(), ["a", "b.c"]);
        assert_eq!(serde_json::to_value(&path).unwrap(), json!(r"a.b\.c"));
    }
}
