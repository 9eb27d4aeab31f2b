use crate::error::ContractError;
use openapiv3::{Components, OpenAPI, ReferenceOr};

/// Resolves OpenAPI structure-level $ref to actual component definitions
///
/// This trait handles references to OpenAPI components like:
/// - `$ref: "#/components/parameters/PageLimit"`
/// - `$ref: "#/components/requestBodies/CreateUser"`
/// - `$ref: "#/components/responses/ErrorResponse"`
///
/// Schema-level references inside JSON schemas are left to the `jsonschema`
/// registry built from the contract components.
pub trait ResolveReference<T> {
    fn resolve<'a>(&'a self, spec: &'a OpenAPI) -> Result<&'a T, ContractError>;
}

fn resolve_logic<'a, T, F>(
    ref_or: &'a ReferenceOr<T>,
    spec: &'a OpenAPI,
    prefix: &str,
    selector: F,
) -> Result<&'a T, ContractError>
where
    F: Fn(&'a Components) -> &'a indexmap::IndexMap<String, ReferenceOr<T>>,
{
    match ref_or {
        ReferenceOr::Item(item) => Ok(item),
        ReferenceOr::Reference { reference } => {
            let name = reference.strip_prefix(prefix).ok_or_else(|| {
                ContractError::InvalidReference {
                    reference: reference.clone(),
                    prefix: prefix.to_string(),
                }
            })?;

            spec.components
                .as_ref()
                .map(selector)
                .and_then(|map| map.get(name))
                .and_then(|r| r.as_item())
                .ok_or_else(|| ContractError::ReferenceNotFound(reference.clone()))
        }
    }
}

impl ResolveReference<openapiv3::Parameter> for ReferenceOr<openapiv3::Parameter> {
    fn resolve<'a>(&'a self, spec: &'a OpenAPI) -> Result<&'a openapiv3::Parameter, ContractError> {
        resolve_logic(self, spec, "#/components/parameters/", |c| &c.parameters)
    }
}

impl ResolveReference<openapiv3::RequestBody> for ReferenceOr<openapiv3::RequestBody> {
    fn resolve<'a>(
        &'a self,
        spec: &'a OpenAPI,
    ) -> Result<&'a openapiv3::RequestBody, ContractError> {
        resolve_logic(self, spec, "#/components/requestBodies/", |c| &c.request_bodies)
    }
}

impl ResolveReference<openapiv3::Response> for ReferenceOr<openapiv3::Response> {
    fn resolve<'a>(&'a self, spec: &'a OpenAPI) -> Result<&'a openapiv3::Response, ContractError> {
        resolve_logic(self, spec, "#/components/responses/", |c| &c.responses)
    }
}
