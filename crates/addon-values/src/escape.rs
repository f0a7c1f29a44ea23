//! Key escaping for path segments
//!
//! Chart values are addressed by dotted paths, so a mapping key that itself
//! contains a `.` would otherwise be read back as two segments. Every key
//! is escaped when it becomes part of a path string.
//!
//! # Rules
//!
//! - `.`, `\`, `[` and `]` are prefixed with `\`
//! - the empty key becomes the token `\_`
//! - any other key is returned unchanged
//!
//! ```
//! use addon_values::escape::{escape_key, unescape_key};
//!
//! assert_eq!(escape_key("eks.amazonaws.com/role-arn"), r"eks\.amazonaws\.com/role-arn");
//! assert_eq!(escape_key("plain"), "plain");
//! assert_eq!(escape_key(""), r"\_");
//! assert_eq!(unescape_key(r"x\.y").unwrap(), "x.y");
//! ```

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Separator between path segments.
pub const SEPARATOR: char = '.';

/// Escape prefix.
pub const ESCAPE: char = '\\';

/// Token standing in for the empty key.
pub const EMPTY_KEY_TOKEN: &str = "\\_";

/// Characters that must be escaped inside a segment.
pub const RESERVED: [char; 4] = [SEPARATOR, ESCAPE, '[', ']'];

/// Returns true if `key` would be changed by [`escape_key`].
pub fn needs_escape(key: &str) -> bool {
    key.is_empty() || key.contains(RESERVED)
}

/// Escape a single mapping key so it is safe to use as one path segment.
pub fn escape_key(key: &str) -> String {
    if key.is_empty() {
        return EMPTY_KEY_TOKEN.to_string();
    }
    if !key.contains(RESERVED) {
        return key.to_string();
    }

    let mut escaped = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if RESERVED.contains(&ch) {
            escaped.push(ESCAPE);
        }
        escaped.push(ch);
    }
    escaped
}

/// Reverse [`escape_key`] for a single segment.
///
/// The segment must not contain an unescaped separator; dangling or
/// unknown escapes are rejected.
pub fn unescape_key(segment: &str) -> Result<String> {
    if segment == EMPTY_KEY_TOKEN {
        return Ok(String::new());
    }
    if segment.is_empty() {
        return Err(Error::invalid_path(
            segment,
            "empty segment (use \\_ for the empty key)",
        ));
    }

    let mut key = String::with_capacity(segment.len());
    let mut chars = segment.chars();
    while let Some(ch) = chars.next() {
        match ch {
            ESCAPE => match chars.next() {
                Some(next) if RESERVED.contains(&next) => key.push(next),
                Some('_') => {
                    return Err(Error::invalid_path(
                        segment,
                        "the empty-key token must stand alone",
                    ));
                }
                Some(other) => {
                    return Err(Error::invalid_path(
                        segment,
                        format!("unknown escape '\\{other}'"),
                    ));
                }
                None => return Err(Error::invalid_path(segment, "dangling escape")),
            },
            SEPARATOR | '[' | ']' => {
                return Err(Error::invalid_path(
                    segment,
                    format!("unescaped '{ch}' inside a segment"),
                ));
            }
            _ => key.push(ch),
        }
    }
    Ok(key)
}

/// Return a copy of `tree` with every mapping key escaped.
///
/// Sequences are treated as opaque leaves and keep their contents as-is.
///
/// # Errors
///
/// Returns [`Error::KeyCollision`] if two distinct keys in one mapping
/// escape to the same segment.
pub fn escape_keys(tree: &Value) -> Result<Value> {
    escape_keys_at(tree, "")
}

fn escape_keys_at(tree: &Value, parent: &str) -> Result<Value> {
    let Value::Object(map) = tree else {
        return Ok(tree.clone());
    };

    let mut escaped_map = Map::with_capacity(map.len());
    let mut siblings = SiblingKeys::new(parent);

    for (key, child) in map {
        let escaped = siblings.claim(key)?;
        let child_path = if parent.is_empty() {
            escaped.clone()
        } else {
            format!("{parent}{SEPARATOR}{escaped}")
        };
        escaped_map.insert(escaped, escape_keys_at(child, &child_path)?);
    }

    Ok(Value::Object(escaped_map))
}

/// Escaped segments already taken within one mapping.
#[derive(Debug)]
pub(crate) struct SiblingKeys<'a> {
    parent: &'a str,
    taken: HashMap<String, &'a str>,
}

impl<'a> SiblingKeys<'a> {
    pub(crate) fn new(parent: &'a str) -> Self {
        Self {
            parent,
            taken: HashMap::new(),
        }
    }

    /// Escape `key` and record it, failing if a sibling already owns the segment.
    pub(crate) fn claim(&mut self, key: &'a str) -> Result<String> {
        let escaped = escape_key(key);
        match self.taken.entry(escaped.clone()) {
            Entry::Occupied(first) => Err(Error::KeyCollision {
                parent: self.parent.to_string(),
                first: (*first.get()).to_string(),
                second: key.to_string(),
                escaped,
            }),
            Entry::Vacant(slot) => {
                slot.insert(key);
                Ok(escaped)
            }
        }
    }
}
