pub mod parameter;
pub mod request;
pub mod response;

pub use parameter::{check_parameter, ParameterValidator};
pub use request::RequestBodyValidator;
pub use response::ResponseBodyValidator;

use crate::aggregate::schema_failure;
use crate::contract::Contract;
use crate::media;
use crate::resolver::ValidationContext;
use crate::validation_error::{ValidationError, ValidationType, ViolationKind};
use openapiv3::Content;
use serde_json::Value;

/// Which side of the exchange a body belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BodySide {
    Request,
    Response,
}

impl BodySide {
    fn noun(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Response => "response",
        }
    }

    fn body_type(&self) -> ValidationType {
        match self {
            Self::Request => ValidationType::RequestBody,
            Self::Response => ValidationType::ResponseBody,
        }
    }

    fn content_type_type(&self) -> ValidationType {
        match self {
            Self::Request => ValidationType::RequestBody,
            Self::Response => ValidationType::ResponseContentType,
        }
    }
}

fn declared_types(content: &Content) -> String {
    content.keys().cloned().collect::<Vec<_>>().join(", ")
}

/// Negotiates the content type, decodes the body and validates it against
/// the declared schema. Media types that are neither JSON nor text are not
/// inspected beyond negotiation.
pub(crate) fn validate_body(
    contract: &Contract,
    context: &ValidationContext<'_>,
    side: BodySide,
    content: &Content,
    content_type: Option<&str>,
    body: &[u8],
) -> Vec<ValidationError> {
    let method = &context.method;
    let noun = side.noun();

    let Some(content_type) = content_type else {
        return vec![ValidationError::new(
            side.content_type_type(),
            ViolationKind::ContentType,
            format!("{} {} body has no content type", method, noun),
        )
        .with_reason(format!(
            "The {} body for '{}' is sent without a Content-Type header",
            noun, context.template
        ))
        .with_how_to_fix(format!(
            "Set the Content-Type header to one of: '{}'",
            declared_types(content)
        ))];
    };

    let essence = media::essence(content_type);
    let Some((_, media_type)) = content
        .iter()
        .find(|(declared, _)| media::essence(declared) == essence)
    else {
        return vec![ValidationError::new(
            side.content_type_type(),
            ViolationKind::ContentType,
            format!(
                "{} operation {} content type '{}' does not exist",
                method, noun, essence
            ),
        )
        .with_reason(format!(
            "The content type '{}' of the {} {} has not been defined for '{}'",
            essence, method, noun, context.template
        ))
        .with_how_to_fix(format!(
            "Use one of the declared content types: '{}'",
            declared_types(content)
        ))];
    };

    let Some(schema) = &media_type.schema else {
        return Vec::new();
    };

    let instance: Value = if media::is_json(&essence) {
        match serde_json::from_slice(body) {
            Ok(instance) => instance,
            Err(e) => {
                return vec![ValidationError::new(
                    side.body_type(),
                    ViolationKind::BodyUnparsable,
                    format!(
                        "{} {} body for '{}' cannot be decoded",
                        method, noun, context.template
                    ),
                )
                .with_reason(format!("The body is not valid JSON: {}", e))
                .with_how_to_fix(format!("Send a well-formed '{}' document", essence))]
            }
        }
    } else if media::is_text(&essence) {
        Value::String(String::from_utf8_lossy(body).into_owned())
    } else {
        tracing::debug!(content_type = %essence, "body media type is not inspected");
        return Vec::new();
    };

    let schema = match serde_json::to_value(schema) {
        Ok(schema) => schema,
        Err(e) => {
            return vec![ValidationError::configuration(
                ViolationKind::SchemaCompilation,
                format!("{} {} body schema for '{}' cannot be read", method, noun, context.template),
                e.to_string(),
            )]
        }
    };

    let compiled = match contract.compile(&schema) {
        Ok(compiled) => compiled,
        Err(e) => {
            return vec![ValidationError::from_contract(
                format!(
                    "{} {} body schema for '{}' cannot be compiled",
                    method, noun, context.template
                ),
                &e,
            )]
        }
    };

    let violations: Vec<_> = compiled.validate(&instance).collect();
    if violations.is_empty() {
        return Vec::new();
    }

    vec![schema_failure(
        side.body_type(),
        format!(
            "{} {} body for '{}' failed to validate schema",
            method, noun, context.template
        ),
        &instance,
        violations,
    )]
}
