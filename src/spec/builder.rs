use crate::config::ValidatorOptions;
use crate::contract::Contract;
use crate::error::ContractError;
use crate::resolver::RouteTemplate;
use crate::schema::{SchemaCache, SPEC_BASE_URI};
use crate::spec::document::split_document;
use jsonschema::{Registry, Resource};
use openapiv3::{OpenAPI, PathItem, ReferenceOr};
use serde_json::Value;

/// Registers the normalized document under [`SPEC_BASE_URI`], so that both
/// `#/components/...` and pointer references resolve from the document root.
fn build_registry(root: &Value) -> Result<Registry, ContractError> {
    let components_resource = Resource::from_contents(root.clone())
        .map_err(|e| ContractError::Registry(format!("Failed to create resource: {}", e)))?;

    Registry::try_new(SPEC_BASE_URI, components_resource)
        .map_err(|e| ContractError::Registry(e.to_string()))
}

fn build_routes(spec: &OpenAPI) -> Vec<(RouteTemplate, PathItem)> {
    let mut routes = Vec::with_capacity(spec.paths.paths.len());

    for (path, path_item_ref) in &spec.paths.paths {
        match path_item_ref {
            ReferenceOr::Item(item) => routes.push((RouteTemplate::parse(path), item.clone())),
            ReferenceOr::Reference { reference } => {
                tracing::warn!(path, reference, "skipping path: path item references are not supported");
            }
        }
    }
    routes
}

/// Path portions of the declared server URLs, with variables substituted by
/// their defaults. `/` and empty paths are dropped.
fn server_prefixes(spec: &OpenAPI) -> Vec<String> {
    let mut prefixes: Vec<String> = spec
        .servers
        .iter()
        .filter_map(|server| {
            let mut url = server.url.clone();
            if let Some(variables) = &server.variables {
                for (name, variable) in variables {
                    url = url.replace(&format!("{{{}}}", name), &variable.default);
                }
            }

            let path = match url.find("://") {
                Some(scheme_end) => {
                    let after_scheme = &url[scheme_end + 3..];
                    after_scheme.find('/').map(|i| after_scheme[i..].to_string())?
                }
                None => url,
            };

            let path = path.trim_end_matches('/');
            (path.starts_with('/') && path.len() > 1).then(|| path.to_string())
        })
        .collect();

    // longest prefix first so the most specific server wins
    prefixes.sort_by_key(|prefix| std::cmp::Reverse(prefix.len()));
    prefixes.dedup();
    prefixes
}

/// Build a [`Contract`] from a raw OpenAPI 3.0 or 3.1 document.
pub fn build_contract(raw: &Value, options: ValidatorOptions) -> Result<Contract, ContractError> {
    let split = split_document(raw)?;
    let spec = split.model;
    let root = split.schema_root;
    let registry = build_registry(&root)?;

    let routes = build_routes(&spec);
    let prefixes = if options.strip_server_prefixes {
        server_prefixes(&spec)
    } else {
        Vec::new()
    };

    tracing::debug!(
        routes = routes.len(),
        server_prefixes = ?prefixes,
        "contract built"
    );

    Ok(Contract {
        document: spec,
        registry,
        root,
        routes,
        schemas: SchemaCache::new(),
        options,
        server_prefixes: prefixes,
    })
}
