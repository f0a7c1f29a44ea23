//! Deep merge of configuration trees
//!
//! The overlay always wins, except where both sides are mappings: those are
//! merged key by key. Sequences are replaced wholesale, never concatenated.
//! A `null` overlay is a scalar like any other and replaces the base value,
//! which is how a chart default gets unset. Only a key missing from the
//! overlay leaves the base alone.

use serde_json::Value;

/// Merge `overlay` into `base` in place.
pub fn merge_into(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                if let Some(base_val) = base_map.get_mut(key) {
                    merge_into(base_val, overlay_val);
                } else {
                    base_map.insert(key.clone(), overlay_val.clone());
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

/// Merge two trees into a new one; neither input is modified.
///
/// ```
/// use addon_values::merge::deep_merge;
/// use serde_json::json;
///
/// let base = json!({"image": {"tag": "latest", "pullPolicy": "Always"}});
/// let overlay = json!({"image": {"tag": "v2"}});
/// assert_eq!(
///     deep_merge(&base, &overlay),
///     json!({"image": {"tag": "v2", "pullPolicy": "Always"}})
/// );
/// ```
pub fn deep_merge(base: &Value, overlay: &Value) -> Value {
    let mut merged = base.clone();
    merge_into(&mut merged, overlay);
    merged
}

/// Fold `layers` left to right, later layers taking precedence.
///
/// An empty iterator yields an empty mapping.
pub fn merge_all<'a, I>(layers: I) -> Value
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut merged = Value::Object(Default::default());
    for (index, layer) in layers.into_iter().enumerate() {
        tracing::trace!(layer = index, "Merging layer");
        merge_into(&mut merged, layer);
    }
    merged
}
