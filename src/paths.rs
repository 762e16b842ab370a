//! List paths and fact document reshaping.
//!
//! A list path names a collection and its identity fields with bracketed
//! segments: `vlan[name]` or `interfaces[name]/addresses[ip]`. Before two
//! fact documents are compared, every collection on a registered path is
//! expanded from an array into a map keyed by its composite identity
//! (`name=10`, or `src=a|dst=b` for multiple keys); after synthesis the
//! documents are compressed back.

use serde_json::{Map, Value};
use tracing::debug;

use crate::grammar::annotation::KEY_SEPARATOR;

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '/';
/// Separator between a key name and its value inside a composite key.
pub const KEY_VALUE_SEPARATOR: char = '=';
const KEY_OPEN: char = '[';
const KEY_CLOSE: char = ']';

/// True when a path segment carries bracketed keys.
pub fn is_list_path_syntax(segment: &str) -> bool {
    segment.contains(KEY_OPEN) && segment.contains(KEY_CLOSE)
}

/// Splits `name[key1|key2]` into the collection name and its key fields.
pub fn parse_list_path(segment: &str) -> Option<(&str, Vec<&str>)> {
    let (name, rest) = segment.split_once(KEY_OPEN)?;
    let keys = rest.split(KEY_CLOSE).next()?;
    if name.is_empty() || keys.is_empty() {
        return None;
    }
    Some((name, keys.split(KEY_SEPARATOR).collect()))
}

/// Renders a scalar fact value as composite-key text.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Builds the composite identity of a collection entry. Missing key fields
/// are skipped, which is valid for optional keys.
pub fn composite_key(entry: &Value, keys: &[&str]) -> String {
    let mut parts = Vec::new();
    for key in keys {
        let Some(value) = entry.get(*key) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let text = scalar_text(value);
        if text.is_empty() {
            continue;
        }
        parts.push(format!("{key}{KEY_VALUE_SEPARATOR}{text}"));
    }
    parts.join(&KEY_SEPARATOR.to_string())
}

/// Splits a composite key back into its name/value pairs.
pub fn split_composite_key(key: &str) -> Vec<(&str, &str)> {
    key.split(KEY_SEPARATOR)
        .filter_map(|pair| pair.split_once(KEY_VALUE_SEPARATOR))
        .collect()
}

/// Strips empty containers, empty strings and nulls out of a fact document,
/// bottom-up, so a field spelled `vlan: []` compares the same as an absent
/// field. The top-level document itself is kept even when everything
/// underneath goes.
pub fn remove_empties(facts: &mut Value) {
    match facts {
        Value::Object(object) => {
            for value in object.values_mut() {
                remove_empties(value);
            }
            object.retain(|_, value| !is_empty_value(value));
        }
        Value::Array(entries) => {
            for entry in entries.iter_mut() {
                remove_empties(entry);
            }
            entries.retain(|entry| !is_empty_value(entry));
        }
        _ => {}
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Object(object) => object.is_empty(),
        Value::Array(entries) => entries.is_empty(),
        _ => false,
    }
}

/// Expands every collection on the registered paths from an array into a
/// map keyed by composite identity.
pub fn expand_facts(facts: &mut Value, list_paths: &[String]) {
    for path in list_paths {
        let segments: Vec<&str> = path.split(PATH_SEPARATOR).collect();
        expand_segment(facts, &segments);
    }
}

fn expand_segment(node: &mut Value, segments: &[&str]) {
    let Some(segment) = segments.first() else {
        return;
    };

    if !is_list_path_syntax(segment) {
        if let Some(child) = node.as_object_mut().and_then(|o| o.get_mut(*segment)) {
            expand_segment(child, &segments[1..]);
        }
        return;
    }

    let Some((list_name, keys)) = parse_list_path(segment) else {
        debug!(segment = %segment, "unparseable list path segment");
        return;
    };
    let Some(object) = node.as_object_mut() else {
        return;
    };
    if !object.contains_key(list_name) {
        return;
    }

    if object.get(list_name).map(Value::is_array).unwrap_or(false) {
        let Some(Value::Array(entries)) = object.remove(list_name) else {
            return;
        };
        let mut expanded = Map::new();
        for entry in entries {
            expanded.insert(composite_key(&entry, &keys), entry);
        }
        object.insert(list_name.to_string(), Value::Object(expanded));
    }

    if let Some(Value::Object(expanded)) = object.get_mut(list_name) {
        for entry in expanded.values_mut() {
            expand_segment(entry, &segments[1..]);
        }
    }
}

/// Compresses every collection on the registered paths back from a keyed
/// map into an array, preserving map order.
pub fn compress_facts(facts: &mut Value, list_paths: &[String]) {
    for path in list_paths {
        let segments: Vec<&str> = path.split(PATH_SEPARATOR).collect();
        compress_segment(facts, &segments);
    }
}

fn compress_segment(node: &mut Value, segments: &[&str]) {
    let Some(segment) = segments.first() else {
        return;
    };

    if !is_list_path_syntax(segment) {
        if let Some(child) = node.as_object_mut().and_then(|o| o.get_mut(*segment)) {
            compress_segment(child, &segments[1..]);
        }
        return;
    }

    let Some((list_name, _)) = parse_list_path(segment) else {
        return;
    };
    let Some(object) = node.as_object_mut() else {
        return;
    };
    if !object.contains_key(list_name) {
        return;
    }

    if object.get(list_name).map(Value::is_object).unwrap_or(false) {
        let Some(Value::Object(expanded)) = object.remove(list_name) else {
            return;
        };
        let entries: Vec<Value> = expanded.into_iter().map(|(_, v)| v).collect();
        object.insert(list_name.to_string(), Value::Array(entries));
    }

    if let Some(Value::Array(entries)) = object.get_mut(list_name) {
        for entry in entries {
            compress_segment(entry, &segments[1..]);
        }
    }
}
