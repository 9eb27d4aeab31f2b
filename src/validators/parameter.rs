use crate::aggregate::{outcome, schema_failure};
use crate::contract::Contract;
use crate::params::{
    canonical_form, collect_parameters, contains_reserved, decode, escape_query_value, form_decode,
    header_value, parse_cookies, parse_query, CodecIssue, Decoded, ParameterLocation,
    ParameterSpec, ParameterStyle, RawPair, RawParameter, Shape,
};
use crate::resolver::{resolve_with, PinnedPath, ValidationContext};
use crate::schema::plain_text;
use crate::validation_error::{ValidationError, ViolationKind};
use http::{HeaderMap, Request, Uri};
use openapiv3::PathItem;
use serde_json::Value;
use std::sync::Arc;

/// Headers whose declarations OAS says to ignore.
const IGNORED_HEADERS: [&str; 3] = ["accept", "content-type", "authorization"];

/// Validates the parameters of one location, in declaration order.
pub(crate) fn validate_location(
    contract: &Contract,
    context: &ValidationContext<'_>,
    specs: &[ParameterSpec],
    location: ParameterLocation,
    uri: &Uri,
    headers: &HeaderMap,
) -> Vec<ValidationError> {
    let specs = specs.iter().filter(|spec| spec.location == location);

    match location {
        ParameterLocation::Query => {
            let pairs = parse_query(uri.query().unwrap_or_default());
            let specs: Vec<&ParameterSpec> = specs.collect();
            specs
                .iter()
                .flat_map(|spec| {
                    // pairs owned by another declared parameter are not offered
                    let offered: Vec<RawPair> = pairs
                        .iter()
                        .filter(|pair| {
                            !specs
                                .iter()
                                .any(|other| other.name != spec.name && claims(other, &pair.key))
                        })
                        .cloned()
                        .collect();
                    check_parameter(contract, spec, Some(RawParameter::Query(&offered)))
                })
                .collect()
        }
        ParameterLocation::Header => specs
            .filter(|spec| {
                !(contract.options().ignore_reserved_headers
                    && IGNORED_HEADERS
                        .iter()
                        .any(|ignored| spec.name.eq_ignore_ascii_case(ignored)))
            })
            .flat_map(|spec| {
                let value = header_value(headers, &spec.name);
                check_parameter(contract, spec, value.as_deref().map(RawParameter::Text))
            })
            .collect(),
        ParameterLocation::Cookie => {
            let cookies = parse_cookies(headers);
            specs
                .flat_map(|spec| {
                    let value = cookies
                        .iter()
                        .find(|(name, _)| *name == spec.name)
                        .map(|(_, value)| RawParameter::Text(value));
                    check_parameter(contract, spec, value)
                })
                .collect()
        }
        ParameterLocation::Path => specs
            .flat_map(|spec| {
                let value = context.path_param(&spec.name).map(RawParameter::Text);
                check_parameter(contract, spec, value)
            })
            .collect(),
    }
}

/// Whether a query key is sent under a declared parameter's own name.
fn claims(spec: &ParameterSpec, key: &str) -> bool {
    match key.strip_prefix(spec.name.as_str()) {
        Some("") => true,
        Some(rest) => spec.style == ParameterStyle::DeepObject && rest.starts_with('['),
        None => false,
    }
}

/// Checks one declared parameter against whatever the request carries for it.
///
/// Serialization problems and enum mismatches are reported on their own; the
/// schema is only evaluated once the value decoded cleanly.
pub fn check_parameter(
    contract: &Contract,
    spec: &ParameterSpec,
    raw: Option<RawParameter<'_>>,
) -> Vec<ValidationError> {
    let view = contract.schema_view(&spec.schema);

    let Some(decoded) = raw.and_then(|raw| decode(spec, raw, &view)) else {
        return if spec.required {
            vec![missing(spec)]
        } else {
            Vec::new()
        };
    };

    tracing::trace!(
        parameter = %spec.name,
        location = %spec.location,
        value = %decoded.value,
        "decoded parameter"
    );

    let shape = Shape::of(&view);
    if spec.location == ParameterLocation::Query
        && spec.content_type.is_none()
        && shape == Shape::Primitive
        && !spec.allow_empty_value
        && decoded.raw.iter().all(String::is_empty)
    {
        return vec![empty_value(spec)];
    }

    let mut errors = Vec::new();

    if spec.location == ParameterLocation::Query {
        if let Some((raw, reserved)) = decoded
            .raw
            .iter()
            .find_map(|raw| contains_reserved(spec, raw).map(|c| (raw, c)))
        {
            errors.push(reserved_values(spec, raw, reserved));
        }
    }

    for issue in &decoded.issues {
        errors.push(match issue {
            CodecIssue::ExplodeMismatch => explode_mismatch(spec, &decoded),
            CodecIssue::InvalidShape(detail) => invalid_shape(spec, detail),
        });
    }

    if !errors.is_empty() {
        return errors;
    }

    if let Some(error) = enum_mismatch(spec, &view, &decoded.value) {
        return vec![error];
    }

    let compiled = match contract.compile(&spec.schema) {
        Ok(compiled) => compiled,
        Err(e) => {
            return vec![ValidationError::from_contract(
                format!(
                    "{} parameter '{}' has a schema that cannot be compiled",
                    spec.location.title(),
                    spec.name
                ),
                &e,
            )
            .with_parameter(&spec.name)]
        }
    };

    let violations: Vec<_> = compiled.validate(&decoded.value).collect();
    if violations.is_empty() {
        return Vec::new();
    }

    vec![schema_failure(
        spec.location.validation_type(),
        format!(
            "{} parameter '{}' failed to validate against its schema",
            spec.location.title(),
            spec.name
        ),
        &decoded.value,
        violations,
    )
    .with_parameter(&spec.name)]
}

fn missing(spec: &ParameterSpec) -> ValidationError {
    ValidationError::new(
        spec.location.validation_type(),
        ViolationKind::Missing,
        format!("{} parameter '{}' is missing", spec.location.title(), spec.name),
    )
    .with_reason(format!(
        "The {} parameter '{}' is defined as being required, however it's missing from the request",
        spec.location, spec.name
    ))
    .with_how_to_fix(format!(
        "Add the missing {} parameter '{}'",
        spec.location, spec.name
    ))
    .with_parameter(&spec.name)
}

fn empty_value(spec: &ParameterSpec) -> ValidationError {
    ValidationError::new(
        spec.location.validation_type(),
        ViolationKind::EmptyValue,
        format!("{} parameter '{}' has an empty value", spec.location.title(), spec.name),
    )
    .with_reason(format!(
        "The {} parameter '{}' is sent without a value, and empty values are not allowed",
        spec.location, spec.name
    ))
    .with_how_to_fix(format!(
        "Send a value for '{}', or declare it with 'allowEmptyValue: true'",
        spec.name
    ))
    .with_parameter(&spec.name)
}

fn reserved_values(spec: &ParameterSpec, raw: &str, reserved: char) -> ValidationError {
    ValidationError::new(
        spec.location.validation_type(),
        ViolationKind::ReservedCharacters,
        format!(
            "{} parameter '{}' value contains reserved values",
            spec.location.title(),
            spec.name
        ),
    )
    .with_reason(format!(
        "The {} parameter '{}' has a value of '{}' containing the reserved character '{}', \
         but 'allowReserved' is not set",
        spec.location, spec.name, raw, reserved
    ))
    .with_how_to_fix(format!(
        "Percent-encode the value as '{}'",
        escape_query_value(&form_decode(raw))
    ))
    .with_parameter(&spec.name)
}

fn explode_mismatch(spec: &ParameterSpec, decoded: &Decoded) -> ValidationError {
    ValidationError::new(
        spec.location.validation_type(),
        ViolationKind::ExplodeMismatch,
        format!(
            "{} parameter '{}' is not exploded correctly",
            spec.location.title(),
            spec.name
        ),
    )
    .with_reason(format!(
        "The {} parameter '{}' is declared with style '{}' and explode={}, \
         but the value '{}' is serialized for explode={}",
        spec.location,
        spec.name,
        spec.style.as_str(),
        spec.explode,
        decoded.raw.join("&"),
        !spec.explode
    ))
    .with_how_to_fix(format!(
        "Send the value as '{}'",
        canonical_form(spec, &decoded.raw)
    ))
    .with_parameter(&spec.name)
}

fn invalid_shape(spec: &ParameterSpec, detail: &str) -> ValidationError {
    ValidationError::new(
        spec.location.validation_type(),
        ViolationKind::InvalidShape,
        format!(
            "{} parameter '{}' is not serialized correctly",
            spec.location.title(),
            spec.name
        ),
    )
    .with_reason(format!(
        "The {} parameter '{}' cannot be read with style '{}': {}",
        spec.location,
        spec.name,
        spec.style.as_str(),
        detail
    ))
    .with_how_to_fix(format!(
        "Serialize the value using the '{}' style with explode={}",
        spec.style.as_str(),
        spec.explode
    ))
    .with_parameter(&spec.name)
}

/// Enum check for primitives and for array items; reports the first offending value.
fn enum_mismatch(spec: &ParameterSpec, view: &Value, value: &Value) -> Option<ValidationError> {
    let (allowed, candidates): (&Vec<Value>, Vec<&Value>) = match value {
        Value::Array(items) => (
            view.get("items")?.get("enum")?.as_array()?,
            items.iter().collect(),
        ),
        Value::Object(_) => return None,
        primitive => (view.get("enum")?.as_array()?, vec![primitive]),
    };

    let offending = candidates
        .into_iter()
        .find(|candidate| !allowed.contains(candidate))?;
    let allowed_text = allowed.iter().map(plain_text).collect::<Vec<_>>().join(", ");

    Some(
        ValidationError::new(
            spec.location.validation_type(),
            ViolationKind::EnumMismatch,
            format!(
                "{} parameter '{}' does not match allowed values",
                spec.location.title(),
                spec.name
            ),
        )
        .with_reason(format!(
            "The {} parameter '{}' has pre-defined values set via an enum. The value '{}' is not one of those values.",
            spec.location,
            spec.name,
            plain_text(offending)
        ))
        .with_how_to_fix(format!(
            "Instead of '{}', use one of the allowed values: '{}'",
            plain_text(offending),
            allowed_text
        ))
        .with_parameter(&spec.name),
    )
}

/// Validates query, header, cookie and path parameters on their own.
///
/// Each call resolves the operation from the request unless a path item was
/// pinned with [`ParameterValidator::set_path_item`]. Pinning mutates the
/// validator, so a pinned instance must not be shared between concurrent callers.
#[derive(Debug, Clone)]
pub struct ParameterValidator {
    contract: Arc<Contract>,
    pinned: Option<PinnedPath>,
}

impl ParameterValidator {
    pub fn new(contract: Arc<Contract>) -> Self {
        Self {
            contract,
            pinned: None,
        }
    }

    pub fn set_path_item(&mut self, path_item: PathItem, path_value: &str) {
        self.pinned = Some(PinnedPath::new(path_item, path_value));
    }

    pub fn clear_path_item(&mut self) {
        self.pinned = None;
    }

    pub fn validate_query_params<B>(&self, request: &Request<B>) -> (bool, Vec<ValidationError>) {
        self.validate(request, ParameterLocation::Query)
    }

    pub fn validate_header_params<B>(&self, request: &Request<B>) -> (bool, Vec<ValidationError>) {
        self.validate(request, ParameterLocation::Header)
    }

    pub fn validate_cookie_params<B>(&self, request: &Request<B>) -> (bool, Vec<ValidationError>) {
        self.validate(request, ParameterLocation::Cookie)
    }

    pub fn validate_path_params<B>(&self, request: &Request<B>) -> (bool, Vec<ValidationError>) {
        self.validate(request, ParameterLocation::Path)
    }

    fn validate<B>(&self, request: &Request<B>, location: ParameterLocation) -> (bool, Vec<ValidationError>) {
        let context = match resolve_with(
            &self.contract,
            self.pinned.as_ref(),
            request.method(),
            request.uri().path(),
        ) {
            Ok(context) => context,
            Err(error) => return outcome(vec![error]),
        };

        let specs = match collect_parameters(
            self.contract.document(),
            context.path_item,
            context.operation,
        ) {
            Ok(specs) => specs,
            Err(e) => {
                return outcome(vec![ValidationError::from_contract(
                    format!("{} operation for '{}' has unusable parameters", context.method, context.template),
                    &e,
                )])
            }
        };

        outcome(validate_location(
            &self.contract,
            &context,
            &specs,
            location,
            request.uri(),
            request.headers(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterStyle;
    use crate::validation_error::ValidationType;
    use serde_json::json;

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
    get:
      parameters:
        - name: cheese
          in: query
          required: true
          schema: { type: boolean }
        - name: X-Fries
          in: header
          required: true
          schema:
            type: string
            enum: [small, large]
        - name: Authorization
          in: header
          required: true
          schema: { type: string }
        - name: session
          in: cookie
          required: true
          schema: { type: string, minLength: 4 }
      responses:
        "200": { description: ok }
"##;

    fn validator() -> ParameterValidator {
        ParameterValidator::new(Arc::new(Contract::parse(SPEC).unwrap()))
    }

    fn request_to(uri: &str) -> http::request::Builder {
        Request::builder().method("GET").uri(uri)
    }

    #[test]
    fn valid_parameters_pass_every_location() {
        let request = request_to("/burgers/12?cheese=true")
            .header("x-fries", "large")
            .header("cookie", "session=abcdef")
            .body(())
            .unwrap();
        let validator = validator();
        assert_eq!(validator.validate_path_params(&request), (true, vec![]));
        assert_eq!(validator.validate_query_params(&request), (true, vec![]));
        assert_eq!(validator.validate_header_params(&request), (true, vec![]));
        assert_eq!(validator.validate_cookie_params(&request), (true, vec![]));
    }

    #[test]
    fn missing_parameters_are_reported_per_location() {
        let request = request_to("/burgers/12").body(()).unwrap();
        let validator = validator();

        let (valid, errors) = validator.validate_query_params(&request);
        assert!(!valid);
        assert_eq!(errors[0].message, "Query parameter 'cheese' is missing");

        let (_, errors) = validator.validate_header_params(&request);
        assert_eq!(errors.len(), 1, "Authorization must be ignored");
        assert_eq!(errors[0].message, "Header parameter 'X-Fries' is missing");

        let (_, errors) = validator.validate_cookie_params(&request);
        assert_eq!(errors[0].message, "Cookie parameter 'session' is missing");
        assert_eq!(errors[0].validation_type, ValidationType::Cookie);
    }

    #[test]
    fn path_parameter_type_mismatch_is_a_schema_error() {
        let request = request_to("/burgers/big-mac?cheese=true").body(()).unwrap();
        let (valid, errors) = validator().validate_path_params(&request);
        assert!(!valid);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ViolationKind::Schema);
        assert_eq!(
            errors[0].schema_validation_errors[0].reason,
            "expected integer, but got string"
        );
    }

    #[test]
    fn header_enum_mismatch_has_hint() {
        let request = request_to("/burgers/1?cheese=false")
            .header("X-Fries", "medium")
            .body(())
            .unwrap();
        let (_, errors) = validator().validate_header_params(&request);
        assert_eq!(errors[0].message, "Header parameter 'X-Fries' does not match allowed values");
        assert_eq!(
            errors[0].how_to_fix.as_deref(),
            Some("Instead of 'medium', use one of the allowed values: 'small, large'")
        );
    }

    #[test]
    fn pinned_path_item_skips_resolution() {
        let contract = Arc::new(Contract::parse(SPEC).unwrap());
        let path_item = contract.document().paths.paths["/burgers/{burgerId}"]
            .as_item()
            .unwrap()
            .clone();

        let mut validator = ParameterValidator::new(contract);
        validator.set_path_item(path_item, "/burgers/{burgerId}");

        let request = request_to("/burgers/7?cheese=yes").body(()).unwrap();
        let (valid, errors) = validator.validate_query_params(&request);
        assert!(!valid);
        assert_eq!(errors[0].kind, ViolationKind::Schema);

        validator.clear_path_item();
        let request = request_to("/fries").body(()).unwrap();
        let (_, errors) = validator.validate_query_params(&request);
        assert_eq!(errors[0].kind, ViolationKind::PathNotFound);
    }

    #[test]
    fn empty_query_value_is_rejected_unless_allowed() {
        let contract = Contract::parse(SPEC).unwrap();
        let spec = ParameterSpec::new("q", ParameterLocation::Query)
            .with_schema(json!({ "type": "string" }));
        let pairs = parse_query("q=");

        let errors = check_parameter(&contract, &spec, Some(RawParameter::Query(&pairs)));
        assert_eq!(errors[0].kind, ViolationKind::EmptyValue);

        let allowed = spec.with_allow_empty_value(true);
        assert!(check_parameter(&contract, &allowed, Some(RawParameter::Query(&pairs))).is_empty());
    }

    #[test]
    fn unexploded_pipe_array_accepts_delimiter() {
        let contract = Contract::parse(SPEC).unwrap();
        let spec = ParameterSpec::new("ids", ParameterLocation::Query)
            .with_style(ParameterStyle::PipeDelimited)
            .with_schema(json!({ "type": "array", "items": { "type": "integer" } }));
        let pairs = parse_query("ids=1|2|3");
        assert!(check_parameter(&contract, &spec, Some(RawParameter::Query(&pairs))).is_empty());

        let pairs = parse_query("ids=1|two");
        let errors = check_parameter(&contract, &spec, Some(RawParameter::Query(&pairs)));
        assert_eq!(errors[0].schema_validation_errors[0].location, "/1");
    }

    #[test]
    fn free_form_query_object_takes_unclaimed_pairs() {
        let contract = Arc::new(
            Contract::parse(
                r##"
openapi: 3.0.3
info: { title: burgers, version: "1" }
paths:
  /search:
    get:
      parameters:
        - name: filter
          in: query
          required: true
          schema:
            type: object
            additionalProperties: { type: integer }
        - name: page
          in: query
          schema: { type: integer }
      responses:
        "200": { description: ok }
"##,
            )
            .unwrap(),
        );
        let validator = ParameterValidator::new(contract);

        let request = request_to("/search?a=1&b=2&page=3").body(()).unwrap();
        assert_eq!(validator.validate_query_params(&request), (true, vec![]));

        let request = request_to("/search?a=1&b=two").body(()).unwrap();
        let (valid, errors) = validator.validate_query_params(&request);
        assert!(!valid);
        assert_eq!(errors[0].kind, ViolationKind::Schema);
        assert_eq!(errors[0].schema_validation_errors[0].location, "/b");

        let request = request_to("/search?page=3").body(()).unwrap();
        let (_, errors) = validator.validate_query_params(&request);
        assert_eq!(errors[0].message, "Query parameter 'filter' is missing");
    }
}
