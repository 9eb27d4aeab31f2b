use super::{validate_body, BodySide};
use crate::aggregate::outcome;
use crate::contract::Contract;
use crate::params::header_value;
use crate::resolver::{resolve_with, PinnedPath, ValidationContext};
use crate::spec::ResolveReference;
use crate::validation_error::{ValidationError, ValidationType, ViolationKind};
use http::{HeaderMap, Request, Response};
use openapiv3::{PathItem, ReferenceOr, Responses, StatusCode};
use std::sync::Arc;

/// Response declaration for `code`: exact code, then its `nXX` range, then `default`.
fn declared_response(responses: &Responses, code: u16) -> Option<&ReferenceOr<openapiv3::Response>> {
    responses
        .responses
        .get(&StatusCode::Code(code))
        .or_else(|| responses.responses.get(&StatusCode::Range(code / 100)))
        .or(responses.default.as_ref())
}

fn declared_codes(responses: &Responses) -> String {
    let mut codes: Vec<String> = responses.responses.keys().map(ToString::to_string).collect();
    if responses.default.is_some() {
        codes.push("default".to_string());
    }
    codes.join(", ")
}

/// Checks the status code, content type and body of a response.
pub(crate) fn check_response(
    contract: &Contract,
    context: &ValidationContext<'_>,
    status: http::StatusCode,
    headers: &HeaderMap,
    body: &[u8],
) -> Vec<ValidationError> {
    let code = status.as_u16();
    let responses = &context.operation.responses;

    let Some(declared) = declared_response(responses, code) else {
        return vec![ValidationError::new(
            ValidationType::ResponseCode,
            ViolationKind::StatusCode,
            format!(
                "{} operation request response code '{}' does not exist",
                context.method, code
            ),
        )
        .with_reason(format!(
            "The service is responding with a code that is not defined in the contract for the response to {} '{}'",
            context.method, context.template
        ))
        .with_how_to_fix(format!(
            "Add '{}' to the response codes of the operation, or respond with one of: '{}'",
            code,
            declared_codes(responses)
        ))];
    };

    let response = match declared.resolve(contract.document()) {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, code, template = context.template, "response reference cannot be resolved");
            return vec![ValidationError::from_contract(
                format!(
                    "{} response '{}' for '{}' cannot be resolved",
                    context.method, code, context.template
                ),
                &e,
            )];
        }
    };

    if response.content.is_empty() || body.is_empty() {
        return Vec::new();
    }

    let content_type = header_value(headers, http::header::CONTENT_TYPE.as_str());
    validate_body(
        contract,
        context,
        BodySide::Response,
        &response.content,
        content_type.as_deref(),
        body,
    )
}

/// Validates responses against the operation targeted by their request.
#[derive(Debug, Clone)]
pub struct ResponseBodyValidator {
    contract: Arc<Contract>,
    pinned: Option<PinnedPath>,
}

impl ResponseBodyValidator {
    pub fn new(contract: Arc<Contract>) -> Self {
        Self {
            contract,
            pinned: None,
        }
    }

    /// Pins resolution to one path item. Not for instances shared across threads.
    pub fn set_path_item(&mut self, path_item: PathItem, path_value: &str) {
        self.pinned = Some(PinnedPath::new(path_item, path_value));
    }

    pub fn clear_path_item(&mut self) {
        self.pinned = None;
    }

    pub fn validate_response_body<Q, B>(
        &self,
        request: &Request<Q>,
        response: &Response<B>,
    ) -> (bool, Vec<ValidationError>)
    where
        B: AsRef<[u8]>,
    {
        let context = match resolve_with(
            &self.contract,
            self.pinned.as_ref(),
            request.method(),
            request.uri().path(),
        ) {
            Ok(context) => context,
            Err(error) => return outcome(vec![error]),
        };

        outcome(check_response(
            &self.contract,
            &context,
            response.status(),
            response.headers(),
            response.body().as_ref(),
        ))
    }
}
