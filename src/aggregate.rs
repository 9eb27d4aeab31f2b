use crate::schema::json_type_name;
use crate::validation_error::{SchemaViolation, ValidationError, ValidationType, ViolationKind};
use serde::Serialize;
use serde_json::Value;

/// The `(valid, errors)` pair every validator returns; valid iff `errors` is empty.
pub fn outcome(errors: Vec<ValidationError>) -> (bool, Vec<ValidationError>) {
    (errors.is_empty(), errors)
}

/// Concatenates violation sources in the order given. Nothing is deduplicated.
pub fn aggregate<I>(sources: I) -> Vec<ValidationError>
where
    I: IntoIterator<Item = Vec<ValidationError>>,
{
    sources.into_iter().flatten().collect()
}

/// Wraps the schema violations of one instance in a single human-oriented error.
pub fn schema_failure(
    validation_type: ValidationType,
    message: impl Into<String>,
    instance: &Value,
    violations: Vec<SchemaViolation>,
) -> ValidationError {
    let reason = match violations.as_slice() {
        [only] => format!("The {} value failed schema validation: {}", json_type_name(instance), only),
        many => format!(
            "The {} value failed schema validation with {} violations",
            json_type_name(instance),
            many.len()
        ),
    };

    ValidationError::new(validation_type, ViolationKind::Schema, message)
        .with_reason(reason)
        .with_schema_violations(violations)
}

/// Formats instance path from a schema violation
pub fn format_instance_location(instance_path: &str, prefix: &str) -> String {
    if instance_path.is_empty() {
        prefix.to_string()
    } else {
        format!("{}{}", prefix, instance_path)
    }
}

/// JSON rendering of a validation outcome, for logs and command line output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: bool,
    pub title: String,
    pub error_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ReportEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    #[serde(rename = "type")]
    pub validation_type: ValidationType,
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub how_to_fix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<String>,
}

impl From<&ValidationError> for ReportEntry {
    fn from(error: &ValidationError) -> Self {
        let prefix = match error.validation_type {
            ValidationType::RequestBody => "request",
            ValidationType::ResponseBody => "response",
            _ => error.parameter_name.as_deref().unwrap_or(""),
        };

        Self {
            validation_type: error.validation_type,
            kind: error.kind.as_str(),
            message: error.message.clone(),
            reason: error.reason.clone(),
            how_to_fix: error.how_to_fix.clone(),
            parameter: error.parameter_name.clone(),
            violations: error
                .schema_validation_errors
                .iter()
                .map(|violation| {
                    format!(
                        "{}: {}",
                        format_instance_location(&violation.location, prefix),
                        violation.reason
                    )
                })
                .collect(),
        }
    }
}

impl ValidationReport {
    pub fn new(valid: bool, errors: &[ValidationError]) -> Self {
        let title = if valid {
            "Traffic conforms to the contract".to_string()
        } else if errors.iter().any(ValidationError::is_configuration) {
            "Traffic could not be checked against the contract".to_string()
        } else {
            "Traffic does not conform to the contract".to_string()
        };

        Self {
            valid,
            title,
            error_count: errors.len(),
            errors: errors.iter().map(ReportEntry::from).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
