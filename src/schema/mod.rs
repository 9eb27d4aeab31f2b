//! Schema adapter: OpenAPI schema normalization, compilation and evaluation.

pub mod cache;
pub mod compiled;
pub mod normalize;

pub use cache::SchemaCache;
pub use compiled::{json_type_name, plain_text, CompiledSchema, SPEC_BASE_URI};
pub use normalize::normalize;

use crate::aggregate::outcome;
use crate::contract::Contract;
use crate::validation_error::{ValidationError, ValidationType, ViolationKind};
use serde_json::Value;
use std::sync::Arc;

/// Stand-alone schema validation against the contract's components.
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    contract: Arc<Contract>,
}

impl SchemaValidator {
    pub fn new(contract: Arc<Contract>) -> Self {
        Self { contract }
    }

    /// Validates `instance` against `schema`, which may use `$ref`s into the contract.
    pub fn validate_schema(&self, schema: &Value, instance: &Value) -> (bool, Vec<ValidationError>) {
        let compiled = match self.contract.compile(schema) {
            Ok(compiled) => compiled,
            Err(e) => {
                return outcome(vec![ValidationError::from_contract(
                    "schema cannot be compiled",
                    &e,
                )])
            }
        };

        let violations: Vec<_> = compiled.validate(instance).collect();
        if violations.is_empty() {
            return outcome(Vec::new());
        }

        outcome(vec![ValidationError::new(
            ValidationType::Schema,
            ViolationKind::Schema,
            "value failed to validate against the schema",
        )
        .with_reason(format!(
            "The value is {} but does not meet the schema requirements",
            json_type_name(instance)
        ))
        .with_schema_violations(violations)])
    }
}
