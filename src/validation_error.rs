use crate::error::ContractError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Where in the HTTP exchange a violation was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationType {
    Query,
    Header,
    Cookie,
    Path,
    RequestBody,
    ResponseBody,
    ResponseCode,
    ResponseContentType,
    /// A value checked directly against a schema, outside of any HTTP exchange.
    Schema,
    /// The request could not be tied to a declared path or method.
    Operation,
    /// The contract itself is unusable for this call (e.g. a schema that does not compile).
    Configuration,
}

impl ValidationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Header => "header",
            Self::Cookie => "cookie",
            Self::Path => "path",
            Self::RequestBody => "request-body",
            Self::ResponseBody => "response-body",
            Self::ResponseCode => "response-code",
            Self::ResponseContentType => "response-content-type",
            Self::Schema => "schema",
            Self::Operation => "operation",
            Self::Configuration => "configuration",
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Operation | Self::Configuration)
    }
}

impl fmt::Display for ValidationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable sub-type of a [`ValidationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationKind {
    Missing,
    EnumMismatch,
    ReservedCharacters,
    ExplodeMismatch,
    EmptyValue,
    InvalidShape,
    Schema,
    ContentType,
    BodyMissing,
    BodyUnparsable,
    StatusCode,
    PathNotFound,
    MethodNotAllowed,
    SchemaCompilation,
    /// A `$ref` in the contract points nowhere.
    UnresolvedReference,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "MISSING",
            Self::EnumMismatch => "ENUM_MISMATCH",
            Self::ReservedCharacters => "RESERVED_CHARACTERS",
            Self::ExplodeMismatch => "EXPLODE_MISMATCH",
            Self::EmptyValue => "EMPTY_VALUE",
            Self::InvalidShape => "INVALID_SHAPE",
            Self::Schema => "SCHEMA",
            Self::ContentType => "CONTENT_TYPE",
            Self::BodyMissing => "BODY_MISSING",
            Self::BodyUnparsable => "BODY_UNPARSABLE",
            Self::StatusCode => "STATUS_CODE",
            Self::PathNotFound => "PATH_NOT_FOUND",
            Self::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            Self::SchemaCompilation => "SCHEMA_COMPILATION",
            Self::UnresolvedReference => "UNRESOLVED_REFERENCE",
        }
    }
}

/// A single localized mismatch between an instance and a schema keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaViolation {
    /// Human readable reason, e.g. `expected integer, but got boolean`.
    pub reason: String,
    /// JSON pointer into the validated instance.
    pub location: String,
    /// The schema keyword that failed (`type`, `required`, `enum`, ...).
    pub keyword: String,
    /// JSON pointer into the schema, following any `$ref`s taken.
    pub schema_location: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.location.is_empty() {
            f.write_str(&self.reason)
        } else {
            write!(f, "{} at {}", self.reason, self.location)
        }
    }
}

/// The user-facing unit of reported non-conformance.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{message}")]
pub struct ValidationError {
    pub validation_type: ValidationType,
    pub kind: ViolationKind,
    pub message: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub schema_validation_errors: Vec<SchemaViolation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub how_to_fix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter_name: Option<String>,
}

impl ValidationError {
    pub fn new(
        validation_type: ValidationType,
        kind: ViolationKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            validation_type,
            kind,
            message: message.into(),
            reason: String::new(),
            schema_validation_errors: Vec::new(),
            how_to_fix: None,
            parameter_name: None,
        }
    }

    /// Shorthand for a configuration-class error caused by a broken contract.
    pub fn configuration(
        kind: ViolationKind,
        message: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(ValidationType::Configuration, kind, message).with_reason(reason)
    }

    /// A configuration-class error carrying a contract failure as its reason.
    pub fn from_contract(message: impl Into<String>, error: &ContractError) -> Self {
        Self::configuration(error.violation_kind(), message, error.to_string())
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_how_to_fix(mut self, how_to_fix: impl Into<String>) -> Self {
        self.how_to_fix = Some(how_to_fix.into());
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>) -> Self {
        self.parameter_name = Some(name.into());
        self
    }

    pub fn with_schema_violations(mut self, violations: Vec<SchemaViolation>) -> Self {
        self.schema_validation_errors = violations;
        self
    }

    pub fn is_configuration(&self) -> bool {
        self.validation_type.is_configuration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_categories() {
        assert!(ValidationType::Operation.is_configuration());
        assert!(ValidationType::Configuration.is_configuration());
        assert!(!ValidationType::Query.is_configuration());
        assert!(!ValidationType::ResponseCode.is_configuration());
    }

    #[test]
    fn display_uses_message() {
        let error = ValidationError::new(
            ValidationType::Query,
            ViolationKind::Missing,
            "Query parameter 'cheese' is missing",
        );
        assert_eq!(error.to_string(), "Query parameter 'cheese' is missing");
    }

    #[test]
    fn violation_display_includes_location() {
        let violation = SchemaViolation {
            reason: "expected integer, but got boolean".into(),
            location: "/patties".into(),
            keyword: "type".into(),
            schema_location: "/properties/patties/type".into(),
        };
        assert_eq!(
            violation.to_string(),
            "expected integer, but got boolean at /patties"
        );
    }

    #[test]
    fn serializes_kebab_case_tags() {
        let error = ValidationError::new(
            ValidationType::ResponseContentType,
            ViolationKind::ContentType,
            "bad",
        );
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["validation_type"], "response-content-type");
        assert_eq!(json["kind"], "content-type");

        let unresolved = ValidationError::from_contract(
            "GET request body for '/burgers' cannot be resolved",
            &ContractError::ReferenceNotFound("#/components/requestBodies/Nope".into()),
        );
        assert_eq!(unresolved.kind, ViolationKind::UnresolvedReference);
        assert!(unresolved.is_configuration());
        assert_eq!(
            serde_json::to_value(&unresolved).unwrap()["kind"],
            "unresolved-reference"
        );
        assert!(json.get("how_to_fix").is_none());
    }
}
