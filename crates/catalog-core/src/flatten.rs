//! `allOf` schema flattening
//!
//! Collapses composed JSON Schemas into one object schema with a single
//! `properties` map and a single `required` list:
//!
//! - sub-schemas are flattened first, then merged left to right
//! - on a property name collision the later definition wins verbatim, even
//!   when its type differs
//! - `required` lists are unioned in first-seen order
//! - every other top-level key is merged last-wins
//! - empty `properties` / `required` are dropped rather than emitted
//!
//! Malformed input never panics: the result is the empty schema `{}`.

use serde_json::{Map, Value};

const COMPOSITION_KEY: &str = "allOf";

/// Nesting bound; deeper schemas are treated as malformed
const MAX_DEPTH: usize = 64;

/// Flatten a possibly composed schema.
///
/// Returns `{}` for `null`, non-object schemas and malformed compositions.
#[must_use]
pub fn flatten_schema(schema: &Value) -> Value {
    flatten_at(schema, 0).unwrap_or_else(|| Value::Object(Map::new()))
}

fn flatten_at(schema: &Value, depth: usize) -> Option<Value> {
    if depth > MAX_DEPTH {
        return None;
    }

    let object = schema.as_object()?;

    if object.contains_key(COMPOSITION_KEY) {
        flatten_composition(object, depth)
    } else {
        flatten_plain(object, depth).map(Value::Object)
    }
}

/// Schema without composition: only nested object properties are touched
fn flatten_plain(object: &Map<String, Value>, depth: usize) -> Option<Map<String, Value>> {
    let mut result = object.clone();

    if let Some(Value::Object(properties)) = result.get_mut("properties") {
        for property in properties.values_mut() {
            if is_nested_object_schema(property) {
                *property = flatten_at(property, depth + 1)?;
            }
        }
    }

    Some(result)
}

fn flatten_composition(object: &Map<String, Value>, depth: usize) -> Option<Value> {
    let branches = object.get(COMPOSITION_KEY)?.as_array()?;

    // Keys written beside `allOf` act as the left-most branch
    let mut base = object.clone();
    base.remove(COMPOSITION_KEY);

    let mut flattened = Vec::with_capacity(branches.len() + 1);
    flattened.push(flatten_plain(&base, depth)?);
    for branch in branches {
        if !branch.is_object() {
            return None;
        }
        match flatten_at(branch, depth + 1)? {
            Value::Object(map) => flattened.push(map),
            _ => return None,
        }
    }

    let mut merged = Map::new();
    let mut properties = Map::new();
    let mut required: Vec<Value> = Vec::new();

    for branch in flattened {
        for (key, value) in branch {
            match key.as_str() {
                "properties" => {
                    if let Value::Object(props) = value {
                        for (name, definition) in props {
                            properties.insert(name, definition);
                        }
                    }
                }
                "required" => {
                    if let Value::Array(names) = value {
                        for name in names.into_iter().filter(Value::is_string) {
                            if !required.contains(&name) {
                                required.push(name);
                            }
                        }
                    }
                }
                COMPOSITION_KEY => {}
                _ => {
                    merged.insert(key, value);
                }
            }
        }
    }

    if !properties.is_empty() {
        merged.insert("properties".to_string(), Value::Object(properties));
    }
    if !required.is_empty() {
        merged.insert("required".to_string(), Value::Array(required));
    }

    Some(Value::Object(merged))
}

fn is_nested_object_schema(value: &Value) -> bool {
    value.as_object().is_some_and(|map| {
        map.contains_key(COMPOSITION_KEY)
            || map.contains_key("properties")
            || map.get("type").and_then(Value::as_str) == Some("object")
    })
}
