//! Structural patches for undo/redo
//!
//! A [`Patch`] is one atomic change to the persisted (JSON) form of a rule
//! tree: an operation, a slash-delimited path (RFC 6901 escaping) and an
//! optional value. A command's effect is recorded as a [`PatchPair`]:
//!
//! - `redo`: every change as it happened, applied in order
//! - `undo`: every change reversed, in reverse chronological order
//!
//! Pairs are produced by [`diff`] from a before/after snapshot and replayed
//! with [`apply`].
//!
//! # Arrays
//!
//! Arrays are diffed element-by-element, never replaced wholesale. Elements
//! carrying an `"id"` are matched by id, so a reordered or edited rule keeps
//! its identity. For one array the redo list holds removals in descending
//! index order, then insertions in ascending index order, then edits inside
//! surviving elements at their new index. Each patch is therefore valid when
//! the list is replayed sequentially, with indices already shifted by the
//! patches before it.

use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use similar::{Algorithm, DiffOp};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub op: PatchOp,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Patch {
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOp::Add,
            path: path.into(),
            value: Some(value),
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Remove,
            path: path.into(),
            value: None,
        }
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOp::Replace,
            path: path.into(),
            value: Some(value),
        }
    }
}

/// The reversible record of one command
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PatchPair {
    pub undo: Vec<Patch>,
    pub redo: Vec<Patch>,
}

impl PatchPair {
    pub fn is_empty(&self) -> bool {
        self.undo.is_empty() && self.redo.is_empty()
    }
}

/// One observed change and its inverse
struct Change {
    redo: Patch,
    undo: Patch,
}

/// Escapes one path segment (`~` -> `~0`, `/` -> `~1`)
pub fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn unescape_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

fn child_path(parent: &str, segment: &str) -> String {
    format!("{parent}/{}", escape_segment(segment))
}

/// Matching key for array elements: the `id` of tree nodes, the JSON text otherwise
fn identity(value: &Value) -> String {
    match value.get("id").and_then(Value::as_str) {
        Some(id) => format!("#{id}"),
        None => value.to_string(),
    }
}

/// Derives the patch pair that turns `before` into `after`
pub fn diff(before: &Value, after: &Value) -> PatchPair {
    let mut changes = Vec::new();
    diff_value("", before, after, &mut changes);

    let (redo, mut undo): (Vec<Patch>, Vec<Patch>) =
        changes.into_iter().map(|c| (c.redo, c.undo)).unzip();
    undo.reverse();
    PatchPair { undo, redo }
}

fn diff_value(path: &str, before: &Value, after: &Value, out: &mut Vec<Change>) {
    match (before, after) {
        (Value::Object(a), Value::Object(b)) => diff_object(path, a, b, out),
        (Value::Array(a), Value::Array(b)) => diff_array(path, a, b, out),
        _ if before == after => {}
        _ => out.push(Change {
            redo: Patch::replace(path, after.clone()),
            undo: Patch::replace(path, before.clone()),
        }),
    }
}

fn diff_object(path: &str, before: &Map<String, Value>, after: &Map<String, Value>, out: &mut Vec<Change>) {
    for (key, old) in before {
        let key_path = child_path(path, key);
        match after.get(key) {
            Some(new) => diff_value(&key_path, old, new, out),
            None => out.push(Change {
                redo: Patch::remove(key_path.clone()),
                undo: Patch::add(key_path, old.clone()),
            }),
        }
    }
    for (key, new) in after {
        if !before.contains_key(key) {
            let key_path = child_path(path, key);
            out.push(Change {
                redo: Patch::add(key_path.clone(), new.clone()),
                undo: Patch::remove(key_path),
            });
        }
    }
}

fn diff_array(path: &str, before: &[Value], after: &[Value], out: &mut Vec<Change>) {
    let old_keys: Vec<String> = before.iter().map(identity).collect();
    let new_keys: Vec<String> = after.iter().map(identity).collect();

    let mut removed = Vec::new();
    let mut inserted = Vec::new();
    let mut matched = Vec::new();

    for op in similar::capture_diff_slices(Algorithm::Myers, &old_keys, &new_keys) {
        match op {
            DiffOp::Equal {
                old_index,
                new_index,
                len,
            } => matched.extend((0..len).map(|i| (old_index + i, new_index + i))),
            DiffOp::Delete {
                old_index, old_len, ..
            } => removed.extend(old_index..old_index + old_len),
            DiffOp::Insert {
                new_index, new_len, ..
            } => inserted.extend(new_index..new_index + new_len),
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => {
                removed.extend(old_index..old_index + old_len);
                inserted.extend(new_index..new_index + new_len);
            }
        }
    }

    for &index in removed.iter().rev() {
        let index_path = format!("{path}/{index}");
        out.push(Change {
            redo: Patch::remove(index_path.clone()),
            undo: Patch::add(index_path, before[index].clone()),
        });
    }
    for &index in &inserted {
        let index_path = format!("{path}/{index}");
        out.push(Change {
            redo: Patch::add(index_path.clone(), after[index].clone()),
            undo: Patch::remove(index_path),
        });
    }
    for (old_index, new_index) in matched {
        diff_value(
            &format!("{path}/{new_index}"),
            &before[old_index],
            &after[new_index],
            out,
        );
    }
}

/// Applies patches to `target` in order.
///
/// Stops at the first patch that does not fit; earlier patches stay applied,
/// so callers apply to a scratch copy.
pub fn apply(target: &mut Value, patches: &[Patch]) -> Result<()> {
    for patch in patches {
        apply_one(target, patch)?;
    }
    Ok(())
}

fn parse_index(segment: &str, path: &str) -> Result<usize> {
    segment
        .parse::<usize>()
        .map_err(|_| Error::invalid_patch(path, format!("'{segment}' is not an array index")))
}

fn apply_one(target: &mut Value, patch: &Patch) -> Result<()> {
    let path = patch.path.as_str();
    let value = || patch.value.clone().unwrap_or(Value::Null);

    if path.is_empty() {
        *target = match patch.op {
            PatchOp::Add | PatchOp::Replace => value(),
            PatchOp::Remove => Value::Null,
        };
        return Ok(());
    }

    let split = path
        .rfind('/')
        .ok_or_else(|| Error::invalid_patch(path, "path must start with '/'"))?;
    let (parent_path, last) = (&path[..split], unescape_segment(&path[split + 1..]));
    let parent = target
        .pointer_mut(parent_path)
        .ok_or_else(|| Error::invalid_patch(path, "parent does not exist"))?;

    match parent {
        Value::Object(map) => match patch.op {
            PatchOp::Add => {
                map.insert(last, value());
            }
            PatchOp::Replace => {
                let slot = map
                    .get_mut(&last)
                    .ok_or_else(|| Error::invalid_patch(path, "no value to replace"))?;
                *slot = value();
            }
            PatchOp::Remove => {
                map.remove(&last)
                    .ok_or_else(|| Error::invalid_patch(path, "no value to remove"))?;
            }
        },
        Value::Array(items) => match patch.op {
            PatchOp::Add => {
                let index = if last == "-" {
                    items.len()
                } else {
                    parse_index(&last, path)?
                };
                if index > items.len() {
                    return Err(Error::invalid_patch(path, "index past end of array"));
                }
                items.insert(index, value());
            }
            PatchOp::Replace => {
                let index = parse_index(&last, path)?;
                let slot = items
                    .get_mut(index)
                    .ok_or_else(|| Error::invalid_patch(path, "index out of bounds"))?;
                *slot = value();
            }
            PatchOp::Remove => {
                let index = parse_index(&last, path)?;
                if index >= items.len() {
                    return Err(Error::invalid_patch(path, "index out of bounds"));
                }
                items.remove(index);
            }
        },
        _ => return Err(Error::invalid_patch(path, "parent is not a container")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn roundtrip(before: &Value, after: &Value) -> PatchPair {
        let pair = diff(before, after);

        let mut forward = before.clone();
        apply(&mut forward, &pair.redo).unwrap();
        assert_eq!(&forward, after, "redo must reproduce the new state");

        let mut backward = after.clone();
        apply(&mut backward, &pair.undo).unwrap();
        assert_eq!(&backward, before, "undo must restore the old state");
        pair
    }

    #[test]
    fn test_identical_values_produce_no_patches() {
        let value = json!({"a": [1, 2, {"id": "x", "b": true}]});
        assert!(diff(&value, &value).is_empty());
    }

    #[test]
    fn test_field_change_is_single_replace() {
        let before = json!({"children": [{"id": "a", "enabled": true}, {"id": "b", "enabled": true}]});
        let after = json!({"children": [{"id": "a", "enabled": true}, {"id": "b", "enabled": false}]});
        let pair = roundtrip(&before, &after);
        assert_eq!(pair.redo, vec![Patch::replace("/children/1/enabled", json!(false))]);
        assert_eq!(pair.undo, vec![Patch::replace("/children/1/enabled", json!(true))]);
    }

    #[test]
    fn test_insert_in_middle_is_per_index_add() {
        let before = json!([{"id": "a"}, {"id": "c"}]);
        let after = json!([{"id": "a"}, {"id": "b"}, {"id": "c"}]);
        let pair = roundtrip(&before, &after);
        assert_eq!(pair.redo, vec![Patch::add("/1", json!({"id": "b"}))]);
        assert_eq!(pair.undo, vec![Patch::remove("/1")]);
    }

    #[test]
    fn test_multi_removal_lists_descending_indices() {
        let before = json!(["a", "b", "c", "d", "e"]);
        let after = json!(["a", "c", "e"]);
        let pair = roundtrip(&before, &after);
        let paths: Vec<_> = pair.redo.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, ["/3", "/1"]);
        assert!(pair.redo.iter().all(|p| p.op == PatchOp::Remove));
        // undo re-adds in ascending order
        let undo_paths: Vec<_> = pair.undo.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(undo_paths, ["/1", "/3"]);
    }

    #[test]
    fn test_multi_insert_lists_ascending_indices() {
        let before = json!([1, 4]);
        let after = json!([0, 1, 2, 3, 4]);
        let pair = roundtrip(&before, &after);
        let paths: Vec<_> = pair.redo.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, ["/0", "/2", "/3"]);
    }

    #[test]
    fn test_reorder_with_nested_edit() {
        let before = json!([{"id": "a", "n": 1}, {"id": "b", "n": 2}, {"id": "c", "n": 3}]);
        let after = json!([{"id": "c", "n": 3}, {"id": "a", "n": 1}, {"id": "b", "n": 20}]);
        roundtrip(&before, &after);
    }

    #[test]
    fn test_object_key_add_and_remove() {
        let before = json!({"actions": {"text": [1, 2, 3], "font_size": 40}});
        let after = json!({"actions": {"text": [1, 2, 3], "border": [4, 5, 6]}});
        let pair = roundtrip(&before, &after);
        assert!(pair.redo.contains(&Patch::remove("/actions/font_size")));
        assert!(pair.redo.contains(&Patch::add("/actions/border", json!([4, 5, 6]))));
    }

    #[test]
    fn test_keys_with_slashes_are_escaped() {
        let before = json!({"a/b": 1, "c~d": 1});
        let after = json!({"a/b": 2, "c~d": 2});
        let pair = roundtrip(&before, &after);
        assert!(pair.redo.iter().any(|p| p.path == "/a~1b"));
        assert!(pair.redo.iter().any(|p| p.path == "/c~0d"));
    }

    #[test]
    fn test_type_change_is_replace() {
        let before = json!({"value": [1]});
        let after = json!({"value": "x"});
        let pair = roundtrip(&before, &after);
        assert_eq!(pair.redo.len(), 1);
        assert_eq!(pair.redo[0].op, PatchOp::Replace);
    }

    #[test]
    fn test_apply_rejects_out_of_bounds_remove() {
        let mut value = json!([1, 2]);
        let result = apply(&mut value, &[Patch::remove("/5")]);
        assert!(matches!(result, Err(Error::InvalidPatch { .. })));
        assert_eq!(value, json!([1, 2]));
    }

    #[test]
    fn test_apply_sequential_removes_shift_indices() {
        let mut value = json!(["a", "b", "c"]);
        apply(&mut value, &[Patch::remove("/0"), Patch::remove("/0")]).unwrap();
        assert_eq!(value, json!(["c"]));
    }

    #[test]
    fn test_apply_append_marker() {
        let mut value = json!({"list": [1]});
        apply(&mut value, &[Patch::add("/list/-", json!(2))]).unwrap();
        assert_eq!(value, json!({"list": [1, 2]}));
    }

    #[test]
    fn test_patch_serializes_like_json_patch() {
        let patch = Patch::replace("/children/0/enabled", json!(false));
        let text = serde_json::to_string(&patch).unwrap();
        assert_eq!(text, r#"{"op":"replace","path":"/children/0/enabled","value":false}"#);
        let remove = serde_json::to_string(&Patch::remove("/0")).unwrap();
        assert_eq!(remove, r#"{"op":"remove","path":"/0"}"#);
    }
}
