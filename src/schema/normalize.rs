//! OpenAPI schema dialect normalization.
//!
//! OpenAPI 3.0 schemas deviate from JSON Schema in a few places (`nullable`,
//! boolean `exclusiveMinimum`/`exclusiveMaximum`, extra annotation keywords).
//! OpenAPI 3.1 schemas are plain JSON Schema 2020-12. This pass rewrites both
//! into the 2020-12 shape so the evaluator never has to know which version a
//! contract was written against.

use serde_json::{Map, Value};

/// OpenAPI-only keywords with no JSON Schema meaning.
const OPENAPI_ANNOTATIONS: &[&str] = &["discriminator", "xml", "externalDocs", "example"];

/// Keywords whose value is a map of name -> subschema.
const SCHEMA_MAPS: &[&str] = &[
    "properties",
    "patternProperties",
    "dependentSchemas",
    "$defs",
    "definitions",
];

/// Keywords whose value is a list of subschemas.
const SCHEMA_LISTS: &[&str] = &["allOf", "anyOf", "oneOf", "prefixItems"];

/// Keywords whose value is a single subschema.
const SCHEMA_SINGLES: &[&str] = &[
    "items",
    "additionalProperties",
    "additionalItems",
    "not",
    "contains",
    "if",
    "then",
    "else",
    "propertyNames",
    "unevaluatedProperties",
    "unevaluatedItems",
];

/// Rewrite an OpenAPI 3.0 or 3.1 schema into canonical JSON Schema 2020-12.
///
/// The input is never mutated. Non-object schemas (`true`/`false`) pass through.
pub fn normalize(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(normalize_object(map)),
        other => other.clone(),
    }
}

fn normalize_object(map: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::with_capacity(map.len());

    for (key, value) in map {
        let key_str = key.as_str();
        if OPENAPI_ANNOTATIONS.contains(&key_str) {
            continue;
        }

        let value = if SCHEMA_MAPS.contains(&key_str) {
            match value {
                Value::Object(children) => Value::Object(
                    children
                        .iter()
                        .map(|(name, child)| (name.clone(), normalize(child)))
                        .collect(),
                ),
                other => other.clone(),
            }
        } else if SCHEMA_LISTS.contains(&key_str) {
            normalize_list(value)
        } else if SCHEMA_SINGLES.contains(&key_str) {
            // draft-04 style tuple `items` arrays are still lists of schemas
            normalize_list(value)
        } else {
            value.clone()
        };

        out.insert(key.clone(), value);
    }

    apply_nullable(&mut out);
    convert_exclusive_bound(&mut out, "exclusiveMinimum", "minimum");
    convert_exclusive_bound(&mut out, "exclusiveMaximum", "maximum");
    out
}

fn normalize_list(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        other => normalize(other),
    }
}

/// `nullable: true` becomes an extra `null` type option.
fn apply_nullable(schema: &mut Map<String, Value>) {
    if !matches!(schema.remove("nullable"), Some(Value::Bool(true))) {
        return;
    }

    let null = Value::String("null".to_string());
    match schema.get_mut("type") {
        Some(Value::String(single)) => {
            let single = Value::String(std::mem::take(single));
            schema.insert("type".to_string(), Value::Array(vec![single, null]));
        }
        Some(Value::Array(types)) if !types.contains(&null) => types.push(null),
        _ => {}
    }

    if let Some(Value::Array(options)) = schema.get_mut("enum") {
        if !options.contains(&Value::Null) {
            options.push(Value::Null);
        }
    }
}

/// OpenAPI 3.0 `exclusiveMinimum: true` + `minimum: n` becomes `exclusiveMinimum: n`.
/// Numeric (3.1) forms are kept as they are.
fn convert_exclusive_bound(schema: &mut Map<String, Value>, exclusive: &str, inclusive: &str) {
    match schema.get(exclusive) {
        Some(Value::Bool(true)) => match schema.remove(inclusive) {
            Some(bound) => {
                schema.insert(exclusive.to_string(), bound);
            }
            None => {
                schema.remove(exclusive);
            }
        },
        Some(Value::Bool(false)) => {
            schema.remove(exclusive);
        }
        _ => {}
    }
}
