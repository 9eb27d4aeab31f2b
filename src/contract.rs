use crate::config::ValidatorOptions;
use crate::error::ContractError;
use crate::resolver::{self, RouteTemplate, ValidationContext};
use crate::schema::{CompiledSchema, SchemaCache};
use crate::spec::{build_contract, load_document, parse_document};
use crate::validation_error::ValidationError;
use http::Method;
use jsonschema::Registry;
use openapiv3::{OpenAPI, PathItem};
use percent_encoding::percent_decode_str;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

const MAX_REF_DEPTH: usize = 32;

/// The immutable context shared by every validator built over one document.
///
/// Holds the structural model, the normalized raw document with its schema
/// registry, the route table and the compile-once schema cache. Share it as
/// `Arc<Contract>`.
pub struct Contract {
    pub(crate) document: OpenAPI,
    pub(crate) registry: Registry,
    pub(crate) root: Value,
    pub(crate) routes: Vec<(RouteTemplate, PathItem)>,
    pub(crate) schemas: SchemaCache,
    pub(crate) options: ValidatorOptions,
    pub(crate) server_prefixes: Vec<String>,
}

impl fmt::Debug for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contract")
            .field("title", &self.document.info.title)
            .field("routes", &self.routes.len())
            .field("cached_schemas", &self.schemas.len())
            .field("options", &self.options)
            .finish()
    }
}

impl Contract {
    /// Builds a contract from an in-memory OpenAPI 3.0 model with inline schemas.
    ///
    /// Documents read from text should go through [`Contract::parse`] or
    /// [`Contract::from_value`], which also accept OpenAPI 3.1 schemas.
    pub fn new(document: OpenAPI) -> Result<Self, ContractError> {
        Self::with_options(document, ValidatorOptions::default())
    }

    pub fn with_options(document: OpenAPI, options: ValidatorOptions) -> Result<Self, ContractError> {
        let raw = serde_json::to_value(&document).map_err(|e| ContractError::SchemaConversion {
            context: "document".to_string(),
            message: e.to_string(),
        })?;
        Self::from_value(&raw, options)
    }

    /// Builds a contract from a raw OpenAPI 3.0 or 3.1 document.
    pub fn from_value(raw: &Value, options: ValidatorOptions) -> Result<Self, ContractError> {
        build_contract(raw, options)
    }

    /// Parses a YAML or JSON document from a string.
    pub fn parse(contents: &str) -> Result<Self, ContractError> {
        Self::from_value(&parse_document(contents)?, ValidatorOptions::default())
    }

    pub fn from_path(path: &Path) -> Result<Self, ContractError> {
        Self::from_value(&load_document(path)?, ValidatorOptions::default())
    }

    pub fn document(&self) -> &OpenAPI {
        &self.document
    }

    pub fn options(&self) -> &ValidatorOptions {
        &self.options
    }

    pub fn server_prefixes(&self) -> &[String] {
        &self.server_prefixes
    }

    pub fn routes(&self) -> impl Iterator<Item = (&RouteTemplate, &PathItem)> {
        self.routes.iter().map(|(route, item)| (route, item))
    }

    /// Number of distinct schemas compiled so far.
    pub fn cached_schemas(&self) -> usize {
        self.schemas.len()
    }

    /// Compiles `schema` once, resolving `$ref`s against the components.
    pub fn compile(&self, schema: &Value) -> Result<Arc<CompiledSchema>, ContractError> {
        self.schemas.get_or_compile(schema, |schema| {
            CompiledSchema::compile(schema, Some(&self.registry), &self.options)
        })
    }

    /// Finds the operation targeted by `method` and `path`.
    pub fn resolve(&self, method: &Method, path: &str) -> Result<ValidationContext<'_>, ValidationError> {
        resolver::resolve(self, method, path)
    }

    /// Follows local `$ref`s until a concrete schema is reached.
    pub fn resolve_schema<'a>(&'a self, schema: &'a Value) -> &'a Value {
        let mut current = schema;
        for _ in 0..MAX_REF_DEPTH {
            let Some(reference) = current.get("$ref").and_then(Value::as_str) else {
                return current;
            };
            let pointer = reference
                .strip_prefix('#')
                .and_then(|fragment| percent_decode_str(fragment).decode_utf8().ok());
            match pointer.and_then(|pointer| self.root.pointer(&pointer)) {
                Some(target) => current = target,
                None => {
                    tracing::warn!(reference, "schema reference cannot be resolved");
                    return current;
                }
            }
        }
        current
    }

    /// A shallow copy of `schema` with its own `$ref` and those of its direct
    /// `items` and `properties` resolved. Enough to decide how a parameter is
    /// serialized and which primitive types its values coerce to.
    pub fn schema_view(&self, schema: &Value) -> Value {
        let mut view = self.resolve_schema(schema).clone();

        if let Some(items) = view.get("items") {
            let resolved = self.resolve_schema(items).clone();
            view["items"] = resolved;
        }

        if let Some(Value::Object(properties)) = view.get("properties") {
            let resolved: serde_json::Map<String, Value> = properties
                .iter()
                .map(|(name, property)| (name.clone(), self.resolve_schema(property).clone()))
                .collect();
            view["properties"] = Value::Object(resolved);
        }

        view
    }
}
