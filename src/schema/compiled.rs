use crate::config::ValidatorOptions;
use crate::error::ContractError;
use crate::schema::normalize::normalize;
use crate::validation_error::SchemaViolation;
use jsonschema::error::{TypeKind, ValidationErrorKind};
use jsonschema::{Registry, Validator};
use serde_json::Value;

/// Base URI the contract document is registered under, so that local
/// `#/...` references resolve inside compiled schemas.
pub const SPEC_BASE_URI: &str = "urn:oas:spec";

/// A schema normalized and compiled once, ready to validate any number of instances.
#[derive(Debug)]
pub struct CompiledSchema {
    validator: Validator,
}

impl CompiledSchema {
    /// Normalizes `schema` and compiles it.
    ///
    /// With a registry, `$ref`s are resolved against the contract document.
    pub fn compile(
        schema: &Value,
        registry: Option<&Registry>,
        options: &ValidatorOptions,
    ) -> Result<Self, ContractError> {
        let normalized = normalize(schema);

        let mut builder = jsonschema::options().should_validate_formats(options.validate_formats);
        if let Some(registry) = registry {
            builder = builder
                .with_registry(registry.clone())
                .with_base_uri(SPEC_BASE_URI.to_string());
        }

        let validator = builder
            .build(&normalized)
            .map_err(|e| ContractError::SchemaCompilationError(e.to_string()))?;

        Ok(Self { validator })
    }

    pub fn is_valid(&self, instance: &Value) -> bool {
        self.validator.is_valid(instance)
    }

    /// Lazily yields every violation of `instance`.
    pub fn validate<'a>(
        &'a self,
        instance: &'a Value,
    ) -> impl Iterator<Item = SchemaViolation> + 'a {
        self.validator
            .iter_errors(instance)
            .map(|error| describe(&error))
    }
}

fn describe(error: &jsonschema::ValidationError<'_>) -> SchemaViolation {
    let schema_location = error.schema_path.to_string();
    let keyword = schema_location
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();

    let reason = match &error.kind {
        ValidationErrorKind::Type { kind } => format!(
            "expected {}, but got {}",
            expected_types(kind),
            json_type_name(&error.instance)
        ),
        ValidationErrorKind::Required { property } => {
            format!("missing properties: '{}'", plain_text(property))
        }
        ValidationErrorKind::Enum { options } => {
            format!("value must be one of {}", options)
        }
        ValidationErrorKind::AdditionalProperties { unexpected } => format!(
            "additional properties {} not allowed",
            unexpected
                .iter()
                .map(|name| format!("'{}'", name))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        _ => error.to_string(),
    };

    SchemaViolation {
        reason,
        location: error.instance_path.to_string(),
        keyword,
        schema_location,
    }
}

fn expected_types(kind: &TypeKind) -> String {
    match kind {
        TypeKind::Single(ty) => ty.to_string(),
        TypeKind::Multiple(types) => types
            .iter()
            .map(|ty| ty.to_string())
            .collect::<Vec<_>>()
            .join(" or "),
    }
}

/// JSON type name of a decoded value, distinguishing integers from other numbers.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Renders a JSON value the way it would appear on the wire: strings unquoted.
pub fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
