//! Dotted-path assignment into JSON objects.
//!
//! `a.b.c` creates `a` and `a.b` as objects when missing and sets `c`.
//! Segments are used verbatim (no trimming; empty segments are valid keys).

use serde_json::{Map, Value};

/// What to do when an intermediate segment already holds a non-object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionPolicy {
    /// Replace the scalar with a fresh object and continue.
    #[default]
    Replace,
    /// Keep the existing value and drop the write.
    Skip,
}

/// Policy used by [`transform`](super::executor::transform).
pub const DEFAULT_COLLISION_POLICY: CollisionPolicy = CollisionPolicy::Replace;

/// Set `value` at `path` inside `doc`.
///
/// The final segment is always overwritten. Returns false only when the write
/// was dropped under [`CollisionPolicy::Skip`].
pub fn assign_path(
    doc: &mut Map<String, Value>,
    path: &str,
    value: Value,
    policy: CollisionPolicy,
) -> bool {
    let mut segments: Vec<&str> = path.split('.').collect();
    // split always yields at least one segment
    let leaf = segments.pop().unwrap_or_default();

    let mut current = doc;
    for segment in segments {
        let slot = current
            .entry(segment)
            .or_insert_with(|| Value::Object(Map::new()));

        if !slot.is_object() {
            match policy {
                CollisionPolicy::Replace => *slot = Value::Object(Map::new()),
                CollisionPolicy::Skip => return false,
            }
        }

        current = match slot {
            Value::Object(map) => map,
            _ => return false,
        };
    }

    current.insert(leaf.to_string(), value);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assign(doc: &mut Value, path: &str, value: Value, policy: CollisionPolicy) -> bool {
        let map = doc.as_object_mut().unwrap();
        assign_path(map, path, value, policy)
    }

    #[test]
    fn test_flat_key() {
        let mut doc = json!({});
        assert!(assign(&mut doc, "name", json!("x"), CollisionPolicy::Replace));
        assert_eq!(doc, json!({ "name": "x" }));
    }

    #[test]
    fn test_nested_creates_objects() {
        let mut doc = json!({});
        assign(&mut doc, "user.address.city", json!("Paris"), CollisionPolicy::Replace);
        assign(&mut doc, "user.address.zip", json!("75001"), CollisionPolicy::Replace);
        assign(&mut doc, "user.name", json!("Ann"), CollisionPolicy::Replace);

        assert_eq!(
            doc,
            json!({ "user": { "address": { "city": "Paris", "zip": "75001" }, "name": "Ann" } })
        );
    }

    #[test]
    fn test_leaf_overwritten() {
        let mut doc = json!({ "a": { "b": 1 } });
        assign(&mut doc, "a.b", json!(2), CollisionPolicy::Skip);
        assign(&mut doc, "a", json!("scalar"), CollisionPolicy::Skip);
        assert_eq!(doc, json!({ "a": "scalar" }));
    }

    #[test]
    fn test_collision_replace() {
        let mut doc = json!({ "a": "scalar" });
        assert!(assign(&mut doc, "a.b", json!(1), CollisionPolicy::Replace));
        assert_eq!(doc, json!({ "a": { "b": 1 } }));
    }

    #[test]
    fn test_collision_replace_null_and_array() {
        let mut doc = json!({ "a": null, "t": ["x"] });
        assign(&mut doc, "a.b", json!(1), CollisionPolicy::Replace);
        assign(&mut doc, "t.first", json!("x"), CollisionPolicy::Replace);
        assert_eq!(doc, json!({ "a": { "b": 1 }, "t": { "first": "x" } }));
    }

    #[test]
    fn test_collision_skip() {
        let mut doc = json!({ "a": "scalar" });
        assert!(!assign(&mut doc, "a.b", json!(1), CollisionPolicy::Skip));
        assert_eq!(doc, json!({ "a": "scalar" }));
    }

    #[test]
    fn test_empty_segments_are_keys() {
        let mut doc = json!({});
        assign(&mut doc, "a..b", json!(1), CollisionPolicy::Replace);
        assign(&mut doc, "c.", json!(2), CollisionPolicy::Replace);
        assert_eq!(doc, json!({ "a": { "": { "b": 1 } }, "c": { "": 2 } }));
    }

    #[test]
    fn test_default_policy_is_replace() {
        assert_eq!(DEFAULT_COLLISION_POLICY, CollisionPolicy::Replace);
        assert_eq!(CollisionPolicy::default(), CollisionPolicy::Replace);
    }
}
