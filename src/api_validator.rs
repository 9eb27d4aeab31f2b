use crate::aggregate::{aggregate, outcome};
use crate::contract::Contract;
use crate::error::ContractError;
use crate::params::{collect_parameters, ParameterLocation, ParameterSpec};
use crate::resolver::{resolve_with, PinnedPath, ValidationContext};
use crate::validation_error::ValidationError;
use crate::validators::parameter::validate_location;
use crate::validators::request::check_request_body;
use crate::validators::response::check_response;
use crate::validators::{ParameterValidator, RequestBodyValidator, ResponseBodyValidator};
use crate::schema::SchemaValidator;
use http::{Request, Response};
use openapiv3::{OpenAPI, PathItem};
use std::sync::Arc;

/// Order parameters are checked in, ahead of the body.
const PARAMETER_ORDER: [ParameterLocation; 4] = [
    ParameterLocation::Path,
    ParameterLocation::Query,
    ParameterLocation::Header,
    ParameterLocation::Cookie,
];

/// Top-level validator that checks requests and responses against an OpenAPI contract.
///
/// Cheap to clone: the contract is shared. Resolution happens per call unless
/// a path item is pinned with [`Validator::set_path_item`], which mutates this
/// instance; give each concurrent caller its own instance in that case.
#[derive(Debug, Clone)]
pub struct Validator {
    contract: Arc<Contract>,
    pinned: Option<PinnedPath>,
}

impl Validator {
    pub fn new(contract: Arc<Contract>) -> Self {
        Self {
            contract,
            pinned: None,
        }
    }

    pub fn from_document(document: OpenAPI) -> Result<Self, ContractError> {
        Ok(Self::new(Arc::new(Contract::new(document)?)))
    }

    pub fn contract(&self) -> &Arc<Contract> {
        &self.contract
    }

    /// Pins every later call to `path_item`, skipping path template search.
    pub fn set_path_item(&mut self, path_item: PathItem, path_value: &str) {
        tracing::debug!(path_value, "pinning path item");
        self.pinned = Some(PinnedPath::new(path_item, path_value));
    }

    pub fn clear_path_item(&mut self) {
        self.pinned = None;
    }

    pub fn parameter_validator(&self) -> ParameterValidator {
        self.with_pinned(ParameterValidator::new(Arc::clone(&self.contract)), ParameterValidator::set_path_item)
    }

    pub fn request_body_validator(&self) -> RequestBodyValidator {
        self.with_pinned(RequestBodyValidator::new(Arc::clone(&self.contract)), RequestBodyValidator::set_path_item)
    }

    pub fn response_body_validator(&self) -> ResponseBodyValidator {
        self.with_pinned(ResponseBodyValidator::new(Arc::clone(&self.contract)), ResponseBodyValidator::set_path_item)
    }

    pub fn schema_validator(&self) -> SchemaValidator {
        SchemaValidator::new(Arc::clone(&self.contract))
    }

    fn with_pinned<V>(&self, mut validator: V, pin: fn(&mut V, PathItem, &str)) -> V {
        if let Some(pinned) = &self.pinned {
            pin(&mut validator, pinned.path_item().clone(), pinned.template());
        }
        validator
    }

    fn context<'a>(&'a self, method: &http::Method, path: &str) -> Result<ValidationContext<'a>, ValidationError> {
        resolve_with(&self.contract, self.pinned.as_ref(), method, path)
    }

    /// Checks parameters and body: path, query, header and cookie parameters first, the body last.
    pub fn validate_request<B>(&self, request: &Request<B>) -> (bool, Vec<ValidationError>)
    where
        B: AsRef<[u8]>,
    {
        match self.context(request.method(), request.uri().path()) {
            Ok(context) => outcome(self.request_errors(&context, request)),
            Err(error) => outcome(vec![error]),
        }
    }

    /// Checks the request, then the response; request errors come first.
    pub fn validate_request_response<Q, B>(
        &self,
        request: &Request<Q>,
        response: &Response<B>,
    ) -> (bool, Vec<ValidationError>)
    where
        Q: AsRef<[u8]>,
        B: AsRef<[u8]>,
    {
        let context = match self.context(request.method(), request.uri().path()) {
            Ok(context) => context,
            Err(error) => return outcome(vec![error]),
        };

        let response_errors = check_response(
            &self.contract,
            &context,
            response.status(),
            response.headers(),
            response.body().as_ref(),
        );

        outcome(aggregate([self.request_errors(&context, request), response_errors]))
    }

    fn request_errors<B>(&self, context: &ValidationContext<'_>, request: &Request<B>) -> Vec<ValidationError>
    where
        B: AsRef<[u8]>,
    {
        let specs: Vec<ParameterSpec> = match collect_parameters(
            self.contract.document(),
            context.path_item,
            context.operation,
        ) {
            Ok(specs) => specs,
            Err(e) => {
                tracing::warn!(error = %e, template = context.template, "parameters cannot be resolved");
                return vec![ValidationError::from_contract(
                    format!("{} operation for '{}' has unusable parameters", context.method, context.template),
                    &e,
                )];
            }
        };

        let parameter_errors = PARAMETER_ORDER.iter().map(|location| {
            validate_location(
                &self.contract,
                context,
                &specs,
                *location,
                request.uri(),
                request.headers(),
            )
        });

        let body_errors = check_request_body(
            &self.contract,
            context,
            request.headers(),
            request.body().as_ref(),
        );

        aggregate(parameter_errors.chain(std::iter::once(body_errors)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation_error::{ValidationType, ViolationKind};

    const SPEC: &str = r##"
openapi: 3.0.3
info: { title: burgers, version: "1" }
paths:
  /burgers/{burgerId}:
    parameters:
      - name: burgerId
        in: path
        required: true
        schema: { type: integer }
    patch:
      parameters:
        - { name: cheese, in: query, required: true, schema: { type: boolean } }
        - { name: X-Sauce, in: header, required: true, schema: { type: string } }
        - { name: table, in: cookie, required: true, schema: { type: integer } }
      requestBody:
        required: true
        content:
          application/json:
            schema: { type: object, required: [name] }
      responses:
        "200": { description: ok }
"##;

    fn validator() -> Validator {
        Validator::new(Arc::new(Contract::parse(SPEC).unwrap()))
    }

    #[test]
    fn violations_follow_discovery_order() {
        let request = Request::builder()
            .method("PATCH")
            .uri("/burgers/abc")
            .header("content-type", "application/json")
            .body(b"{}".to_vec())
            .unwrap();

        let (valid, errors) = validator().validate_request(&request);
        assert!(!valid);
        let types: Vec<_> = errors.iter().map(|e| e.validation_type).collect();
        assert_eq!(
            types,
            vec![
                ValidationType::Path,
                ValidationType::Query,
                ValidationType::Header,
                ValidationType::Cookie,
                ValidationType::RequestBody,
            ]
        );
    }

    #[test]
    fn method_not_allowed_is_an_operation_error() {
        let request = Request::builder()
            .method("DELETE")
            .uri("/burgers/1")
            .body(Vec::new())
            .unwrap();
        let (valid, errors) = validator().validate_request(&request);
        assert!(!valid);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ViolationKind::MethodNotAllowed);
        assert!(errors[0].is_configuration());
    }

    #[test]
    fn sub_validators_inherit_pinned_path() {
        let mut validator = validator();
        let path_item = validator.contract().document().paths.paths["/burgers/{burgerId}"]
            .as_item()
            .unwrap()
            .clone();
        validator.set_path_item(path_item, "/burgers/{burgerId}");

        let request = Request::builder()
            .method("PATCH")
            .uri("/burgers/1?cheese=true")
            .body(())
            .unwrap();
        assert!(validator.parameter_validator().validate_query_params(&request).0);
    }

    const BROKEN: &str = r##"
openapi: 3.0.3
info: { title: burgers, version: "1" }
paths:
  /burgers:
    post:
      requestBody:
        content:
          application/json:
            schema: { type: 12 }
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema: { type: object }
  /orders:
    get:
      parameters:
        - $ref: "#/components/parameters/Missing"
      responses:
        "200":
          $ref: "#/components/responses/Missing"
"##;

    fn broken() -> Validator {
        Validator::new(Arc::new(Contract::parse(BROKEN).unwrap()))
    }

    fn json_response() -> Response<Vec<u8>> {
        Response::builder()
            .status(200)
            .header("content-type", "application/json")
            .body(b"{}".to_vec())
            .unwrap()
    }

    #[test]
    fn uncompilable_body_schema_is_a_configuration_error() {
        let request = Request::builder()
            .method("POST")
            .uri("/burgers")
            .header("content-type", "application/json")
            .body(br#"{"name":"Big Mac"}"#.to_vec())
            .unwrap();

        let (valid, errors) = broken().validate_request(&request);
        assert!(!valid);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].validation_type, ValidationType::Configuration);
        assert_eq!(errors[0].kind, ViolationKind::SchemaCompilation);
        assert!(errors[0].message.contains("cannot be compiled"), "{}", errors[0].message);

        let (valid, errors) = broken().validate_request_response(&request, &json_response());
        assert!(!valid);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].validation_type, ValidationType::Configuration);
    }

    #[test]
    fn dangling_references_are_reported_as_unresolved() {
        let request = Request::builder()
            .method("GET")
            .uri("/orders")
            .body(Vec::new())
            .unwrap();

        let (valid, errors) = broken().validate_request(&request);
        assert!(!valid);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].validation_type, ValidationType::Configuration);
        assert_eq!(errors[0].kind, ViolationKind::UnresolvedReference);

        let (_, errors) = broken().validate_request_response(&request, &json_response());
        let kinds: Vec<_> = errors.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![ViolationKind::UnresolvedReference, ViolationKind::UnresolvedReference]
        );
        assert!(errors.iter().all(ValidationError::is_configuration));
    }
}
