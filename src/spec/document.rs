//! Raw contract documents.
//!
//! `openapiv3` models the structure of a contract (paths, operations,
//! parameters, responses) but only understands OpenAPI 3.0 schema objects.
//! Before the structural model is parsed, every schema position is swapped
//! for a `$ref` to its own JSON pointer. The schemas themselves are read from
//! a normalized copy of the raw document, which is also the registry root, so
//! OpenAPI 3.0 and 3.1 schemas take the same path to the evaluator.

use crate::error::ContractError;
use crate::schema::normalize;
use openapiv3::OpenAPI;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde_json::{json, Value};

const METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Characters escaped when a JSON pointer becomes a URI fragment.
const FRAGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

type Visit<'a> = dyn FnMut(&str, &mut Value) + 'a;

/// A contract split into its structural model and its schema root.
#[derive(Debug, Clone)]
pub struct SplitDocument {
    /// Structure with every inline schema replaced by a pointer `$ref`.
    pub model: OpenAPI,
    /// The raw document with every schema normalized in place.
    pub schema_root: Value,
}

/// Escapes one reference token of a JSON pointer.
pub fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// `$ref` text for a JSON pointer into the document root.
pub fn pointer_ref(pointer: &str) -> String {
    format!("#{}", utf8_percent_encode(pointer, FRAGMENT))
}

fn is_reference(value: &Value) -> bool {
    value.get("$ref").is_some()
}

fn is_plain_reference(schema: &Value) -> bool {
    schema
        .as_object()
        .is_some_and(|map| map.len() == 1 && map.contains_key("$ref"))
}

fn each_entry(value: &mut Value, key: &str, base: &str, mut f: impl FnMut(&str, &mut Value)) {
    let Some(entries) = value.get_mut(key).and_then(Value::as_object_mut) else {
        return;
    };
    for (name, child) in entries.iter_mut() {
        f(&format!("{}/{}/{}", base, key, escape_token(name)), child);
    }
}

fn each_item(value: &mut Value, key: &str, base: &str, mut f: impl FnMut(&str, &mut Value)) {
    let Some(items) = value.get_mut(key).and_then(Value::as_array_mut) else {
        return;
    };
    for (index, child) in items.iter_mut().enumerate() {
        f(&format!("{}/{}/{}", base, key, index), child);
    }
}

fn visit_document(document: &mut Value, visit: &mut Visit<'_>) {
    if let Some(components) = document.get_mut("components") {
        each_entry(components, "schemas", "/components", |pointer, schema| {
            visit(pointer, schema)
        });
        each_entry(components, "parameters", "/components", |pointer, parameter| {
            visit_parameter(parameter, pointer, visit)
        });
        each_entry(components, "headers", "/components", |pointer, header| {
            visit_parameter(header, pointer, visit)
        });
        each_entry(components, "requestBodies", "/components", |pointer, body| {
            visit_content(body, pointer, visit)
        });
        each_entry(components, "responses", "/components", |pointer, response| {
            visit_response(response, pointer, visit)
        });
        each_entry(components, "pathItems", "/components", |pointer, item| {
            visit_path_item(item, pointer, visit)
        });
        each_entry(components, "callbacks", "/components", |pointer, callback| {
            visit_callback(callback, pointer, visit)
        });
    }

    each_entry(document, "paths", "", |pointer, item| {
        visit_path_item(item, pointer, visit)
    });
    each_entry(document, "webhooks", "", |pointer, item| {
        visit_path_item(item, pointer, visit)
    });
}

fn visit_path_item(item: &mut Value, pointer: &str, visit: &mut Visit<'_>) {
    if is_reference(item) {
        return;
    }
    each_item(item, "parameters", pointer, |pointer, parameter| {
        visit_parameter(parameter, pointer, visit)
    });
    for method in METHODS {
        if let Some(operation) = item.get_mut(method) {
            visit_operation(operation, &format!("{}/{}", pointer, method), visit);
        }
    }
}

fn visit_operation(operation: &mut Value, pointer: &str, visit: &mut Visit<'_>) {
    each_item(operation, "parameters", pointer, |pointer, parameter| {
        visit_parameter(parameter, pointer, visit)
    });
    if let Some(body) = operation.get_mut("requestBody") {
        visit_content(body, &format!("{}/requestBody", pointer), visit);
    }
    each_entry(operation, "responses", pointer, |pointer, response| {
        visit_response(response, pointer, visit)
    });
    each_entry(operation, "callbacks", pointer, |pointer, callback| {
        visit_callback(callback, pointer, visit)
    });
}

fn visit_callback(callback: &mut Value, pointer: &str, visit: &mut Visit<'_>) {
    if is_reference(callback) {
        return;
    }
    let Some(expressions) = callback.as_object_mut() else {
        return;
    };
    for (expression, item) in expressions.iter_mut() {
        visit_path_item(item, &format!("{}/{}", pointer, escape_token(expression)), visit);
    }
}

/// Parameters and headers share the `schema` / `content` pair.
fn visit_parameter(parameter: &mut Value, pointer: &str, visit: &mut Visit<'_>) {
    if is_reference(parameter) {
        return;
    }
    if let Some(schema) = parameter.get_mut("schema") {
        visit(&format!("{}/schema", pointer), schema);
    }
    visit_content(parameter, pointer, visit);
}

fn visit_response(response: &mut Value, pointer: &str, visit: &mut Visit<'_>) {
    if is_reference(response) {
        return;
    }
    each_entry(response, "headers", pointer, |pointer, header| {
        visit_parameter(header, pointer, visit)
    });
    visit_content(response, pointer, visit);
}

fn visit_content(holder: &mut Value, pointer: &str, visit: &mut Visit<'_>) {
    if is_reference(holder) {
        return;
    }
    each_entry(holder, "content", pointer, |pointer, media_type| {
        if let Some(schema) = media_type.get_mut("schema") {
            visit(&format!("{}/schema", pointer), schema);
        }
        each_entry(media_type, "encoding", pointer, |pointer, encoding| {
            each_entry(encoding, "headers", pointer, |pointer, header| {
                visit_parameter(header, pointer, visit)
            });
        });
    });
}

/// Splits a raw OpenAPI 3.0 or 3.1 document.
pub fn split_document(raw: &Value) -> Result<SplitDocument, ContractError> {
    if !raw.is_object() {
        return Err(ContractError::Parse(
            "the document root must be a mapping".to_string(),
        ));
    }

    let mut structural = raw.clone();
    visit_document(&mut structural, &mut |pointer, schema| {
        if !is_plain_reference(schema) {
            *schema = json!({ "$ref": pointer_ref(pointer) });
        }
    });
    // 3.1 makes `paths` optional
    if let Some(root) = structural.as_object_mut() {
        root.entry("paths").or_insert_with(|| json!({}));
    }
    let model: OpenAPI =
        serde_json::from_value(structural).map_err(|e| ContractError::Parse(e.to_string()))?;

    let mut schema_root = raw.clone();
    visit_document(&mut schema_root, &mut |pointer, schema| {
        // a structural model serialized back carries references to itself
        if schema.get("$ref").and_then(Value::as_str) == Some(pointer_ref(pointer).as_str()) {
            tracing::warn!(pointer, "schema refers to itself, treating it as unconstrained");
            *schema = json!({});
        } else {
            *schema = normalize(schema);
        }
    });

    Ok(SplitDocument { model, schema_root })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::parse_document;
    use openapiv3::{ParameterSchemaOrContent, ReferenceOr};

    const SPEC: &str = r##"
openapi: 3.1.0
info: { title: burgers, version: "1" }
paths:
  /burgers/{burgerId}:
    parameters:
      - name: burgerId
        in: path
        required: true
        schema: { type: [integer, string] }
    post:
      requestBody:
        content:
          application/json:
            schema:
              type: object
              properties:
                name: { type: [string, "null"] }
                patties: { type: integer, exclusiveMinimum: 0 }
      responses:
        "200":
          description: ok
          headers:
            X-Rate:
              schema: { type: integer, minimum: 0 }
          content:
            application/json:
              schema:
                $ref: "#/components/schemas/Burger"
components:
  schemas:
    Burger:
      type: object
      nullable: true
"##;

    fn split() -> SplitDocument {
        split_document(&parse_document(SPEC).unwrap()).unwrap()
    }

    #[test]
    fn inline_schemas_become_pointer_references() {
        let document = split();
        let item = document.model.paths.paths["/burgers/{burgerId}"]
            .as_item()
            .unwrap();

        let parameter = item.parameters[0].as_item().unwrap();
        let ParameterSchemaOrContent::Schema(ReferenceOr::Reference { reference }) =
            &parameter.parameter_data_ref().format
        else {
            panic!("expected a schema reference");
        };
        assert_eq!(reference, "#/paths/~1burgers~1%7BburgerId%7D/parameters/0/schema");
    }

    #[test]
    fn plain_references_are_kept() {
        let document = split();
        let response = document.model.paths.paths["/burgers/{burgerId}"]
            .as_item()
            .unwrap()
            .post
            .as_ref()
            .unwrap()
            .responses
            .responses
            .values()
            .next()
            .unwrap()
            .as_item()
            .unwrap();
        let schema = response.content["application/json"].schema.as_ref().unwrap();
        assert!(matches!(
            schema,
            ReferenceOr::Reference { reference } if reference == "#/components/schemas/Burger"
        ));
    }

    #[test]
    fn schema_root_is_normalized_in_place() {
        let root = split().schema_root;
        let body = root
            .pointer("/paths/~1burgers~1{burgerId}/post/requestBody/content/application~1json/schema")
            .unwrap();
        assert_eq!(body["properties"]["patties"]["exclusiveMinimum"], 0);
        assert_eq!(body["properties"]["name"]["type"], json!(["string", "null"]));
        assert_eq!(
            root.pointer("/components/schemas/Burger/type"),
            Some(&json!(["object", "null"]))
        );
    }

    #[test]
    fn tokens_are_escaped() {
        assert_eq!(escape_token("application/json"), "application~1json");
        assert_eq!(escape_token("a~b"), "a~0b");
        assert_eq!(pointer_ref("/paths/~1a|b"), "#/paths/~1a%7Cb");
    }

    #[test]
    fn non_mapping_root_is_rejected() {
        assert!(matches!(
            split_document(&json!(["not", "a", "contract"])),
            Err(ContractError::Parse(_))
        ));
    }
}
