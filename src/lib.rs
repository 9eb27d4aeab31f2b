pub mod aggregate;
pub mod api_validator;
pub mod config;
pub mod contract;
pub mod error;
pub mod media;
pub mod params;
pub mod resolver;
pub mod schema;
pub mod spec;
pub mod validation_error;
pub mod validators;

pub use aggregate::{aggregate, format_instance_location, outcome, ValidationReport};
pub use api_validator::Validator;
pub use config::ValidatorOptions;
pub use contract::Contract;
pub use error::ContractError;
pub use params::{ParameterLocation, ParameterSpec, ParameterStyle};
pub use resolver::{normalize_path, RouteTemplate, ValidationContext};
pub use schema::{CompiledSchema, SchemaValidator};
pub use spec::{
    build_contract, load_document, load_openapi_spec, parse_document, parse_openapi_spec,
    ResolveReference,
};
pub use validation_error::{SchemaViolation, ValidationError, ValidationType, ViolationKind};
pub use validators::{ParameterValidator, RequestBodyValidator, ResponseBodyValidator};
