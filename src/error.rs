use crate::validation_error::ViolationKind;
use thiserror::Error;

/// Fatal problems with the contract itself, raised while loading or building it.
///
/// Validation calls never return these directly: anything that goes wrong while
/// validating traffic is reported as a [`crate::ValidationError`] with a
/// configuration category instead.
#[derive(Error, Debug)]
pub enum ContractError {
    #[error("Failed to open spec file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse OpenAPI spec: {0}")]
    Parse(String),

    #[error("Invalid reference: {reference}. Expected prefix: {prefix}")]
    InvalidReference { reference: String, prefix: String },

    #[error("Reference not found: {0}")]
    ReferenceNotFound(String),

    #[error("Content-based parameter '{0}' declares no schema")]
    ParameterWithoutSchema(String),

    #[error("Failed to convert {context} schema to JSON: {message}")]
    SchemaConversion { context: String, message: String },

    #[error("Failed to compile JSON schema: {0}")]
    SchemaCompilationError(String),

    #[error("Failed to build schema registry: {0}")]
    Registry(String),
}

impl ContractError {
    /// The violation kind a validation call reports when it runs into this error.
    pub fn violation_kind(&self) -> ViolationKind {
        match self {
            Self::InvalidReference { .. } | Self::ReferenceNotFound(_) => {
                ViolationKind::UnresolvedReference
            }
            _ => ViolationKind::SchemaCompilation,
        }
    }
}
