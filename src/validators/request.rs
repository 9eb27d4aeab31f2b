use super::{validate_body, BodySide};
use crate::aggregate::outcome;
use crate::contract::Contract;
use crate::params::header_value;
use crate::resolver::{resolve_with, PinnedPath, ValidationContext};
use crate::spec::ResolveReference;
use crate::validation_error::{ValidationError, ValidationType, ViolationKind};
use http::{HeaderMap, Request};
use openapiv3::PathItem;
use std::sync::Arc;

/// Checks a request body against the operation's declared request body.
pub(crate) fn check_request_body(
    contract: &Contract,
    context: &ValidationContext<'_>,
    headers: &HeaderMap,
    body: &[u8],
) -> Vec<ValidationError> {
    let Some(request_body) = &context.operation.request_body else {
        return Vec::new();
    };

    let request_body = match request_body.resolve(contract.document()) {
        Ok(request_body) => request_body,
        Err(e) => {
            tracing::warn!(error = %e, template = context.template, "request body reference cannot be resolved");
            return vec![ValidationError::from_contract(
                format!(
                    "{} request body for '{}' cannot be resolved",
                    context.method, context.template
                ),
                &e,
            )];
        }
    };

    if body.is_empty() {
        if !request_body.required {
            return Vec::new();
        }
        return vec![ValidationError::new(
            ValidationType::RequestBody,
            ViolationKind::BodyMissing,
            format!(
                "{} request body for '{}' is missing",
                context.method, context.template
            ),
        )
        .with_reason(format!(
            "The {} operation for '{}' requires a request body, however none was sent",
            context.method, context.template
        ))
        .with_how_to_fix("Send a request body matching one of the declared content types")];
    }

    let content_type = header_value(headers, http::header::CONTENT_TYPE.as_str());
    validate_body(
        contract,
        context,
        BodySide::Request,
        &request_body.content,
        content_type.as_deref(),
        body,
    )
}

/// Validates request bodies on their own.
#[derive(Debug, Clone)]
pub struct RequestBodyValidator {
    contract: Arc<Contract>,
    pinned: Option<PinnedPath>,
}

impl RequestBodyValidator {
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

    pub fn validate_request_body<B>(&self, request: &Request<B>) -> (bool, Vec<ValidationError>)
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

        outcome(check_request_body(
            &self.contract,
            &context,
            request.headers(),
            request.body().as_ref(),
        ))
    }
}
