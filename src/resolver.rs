//! Maps an incoming request path and method onto a declared path template.
//!
//! Templates are tokenized into `/`-separated segments. A segment is either a
//! literal, which must match exactly, or a pattern holding one or more
//! `{param}` captures (optionally mixed with literal text, e.g. `{id}.json`).
//! When several templates match, the one with the most literal segments wins;
//! ties keep declaration order.

use crate::contract::Contract;
use crate::validation_error::{ValidationError, ValidationType, ViolationKind};
use http::Method;
use openapiv3::{Operation, PathItem};

/// The per-call state produced by resolution.
#[derive(Debug, Clone)]
pub struct ValidationContext<'a> {
    pub method: Method,
    pub path_item: &'a PathItem,
    pub operation: &'a Operation,
    /// The matched path template, e.g. `/pet/{petId}`.
    pub template: &'a str,
    /// Raw (still percent-encoded) path parameter values keyed by name.
    pub path_params: Vec<(String, String)>,
}

impl ValidationContext<'_> {
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Param(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Pattern(Vec<Part>),
}

/// A tokenized path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTemplate {
    template: String,
    segments: Vec<Segment>,
}

impl RouteTemplate {
    pub fn parse(template: &str) -> Self {
        let segments = split_segments(template)
            .map(|segment| {
                if segment.contains('{') {
                    Segment::Pattern(parse_parts(segment))
                } else {
                    Segment::Literal(segment.to_string())
                }
            })
            .collect();

        Self {
            template: template.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Number of fully literal segments, used to rank overlapping matches.
    pub fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    /// Matches a normalized request path, returning the captured parameters.
    pub fn captures(&self, path: &str) -> Option<Vec<(String, String)>> {
        let segments: Vec<&str> = split_segments(path).collect();
        if segments.len() != self.segments.len() {
            return None;
        }

        let mut captures = Vec::new();
        for (declared, actual) in self.segments.iter().zip(segments) {
            match declared {
                Segment::Literal(literal) => {
                    if literal != actual {
                        return None;
                    }
                }
                Segment::Pattern(parts) => {
                    if !match_parts(parts, actual, &mut captures) {
                        return None;
                    }
                }
            }
        }
        Some(captures)
    }
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

fn parse_parts(segment: &str) -> Vec<Part> {
    let mut parts = Vec::new();
    let mut rest = segment;

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|i| open + i) else {
            break;
        };
        if open > 0 {
            parts.push(Part::Literal(rest[..open].to_string()));
        }
        parts.push(Part::Param(rest[open + 1..close].to_string()));
        rest = &rest[close + 1..];
    }

    if !rest.is_empty() {
        parts.push(Part::Literal(rest.to_string()));
    }
    parts
}

/// Each capture must be non-empty; earlier captures are kept as short as possible.
fn match_parts(parts: &[Part], input: &str, captures: &mut Vec<(String, String)>) -> bool {
    match parts.split_first() {
        None => input.is_empty(),
        Some((Part::Literal(literal), rest)) => input
            .strip_prefix(literal.as_str())
            .is_some_and(|remaining| match_parts(rest, remaining, captures)),
        Some((Part::Param(name), [])) => {
            if input.is_empty() {
                return false;
            }
            captures.push((name.clone(), input.to_string()));
            true
        }
        Some((Part::Param(name), rest)) => {
            let mark = captures.len();
            for (end, _) in input.char_indices().skip(1) {
                captures.push((name.clone(), input[..end].to_string()));
                if match_parts(rest, &input[end..], captures) {
                    return true;
                }
                captures.truncate(mark);
            }
            false
        }
    }
}

/// Normalize a request path: collapse double slashes, strip trailing slashes.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len());
    let mut prev_slash = false;

    for ch in path.chars() {
        if ch == '/' {
            if !prev_slash {
                normalized.push('/');
            }
            prev_slash = true;
        } else {
            normalized.push(ch);
            prev_slash = false;
        }
    }

    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }

    if normalized.is_empty() {
        "/".to_string()
    } else {
        normalized
    }
}

/// Finds the operation declared for `method` on a path item.
pub fn operation_for<'a>(path_item: &'a PathItem, method: &Method) -> Option<&'a Operation> {
    match *method {
        Method::GET => path_item.get.as_ref(),
        Method::PUT => path_item.put.as_ref(),
        Method::POST => path_item.post.as_ref(),
        Method::DELETE => path_item.delete.as_ref(),
        Method::OPTIONS => path_item.options.as_ref(),
        Method::HEAD => path_item.head.as_ref(),
        Method::PATCH => path_item.patch.as_ref(),
        Method::TRACE => path_item.trace.as_ref(),
        _ => None,
    }
}

fn allowed_methods(path_item: &PathItem) -> Vec<String> {
    path_item
        .iter()
        .map(|(method, _)| method.to_uppercase())
        .collect()
}

/// Candidate paths for matching: the request path itself, then the path with
/// each server prefix removed.
fn candidate_paths(path: &str, server_prefixes: &[String]) -> Vec<String> {
    let normalized = normalize_path(path);
    let mut candidates = vec![normalized.clone()];

    for prefix in server_prefixes {
        if let Some(stripped) = normalized.strip_prefix(prefix.as_str()) {
            if stripped.is_empty() || stripped.starts_with('/') {
                candidates.push(normalize_path(stripped));
            }
        }
    }
    candidates
}

pub(crate) fn path_not_found(method: &Method, path: &str) -> ValidationError {
    ValidationError::new(
        ValidationType::Operation,
        ViolationKind::PathNotFound,
        format!("{} Path '{}' not found", method, path),
    )
    .with_reason(format!(
        "The {} request contains a path of '{}' however that path does not exist in the specification",
        method, path
    ))
    .with_how_to_fix(format!(
        "Add the path '{}' to the contract, or correct the request path",
        path
    ))
}

fn method_not_allowed(method: &Method, template: &str, path_item: &PathItem) -> ValidationError {
    let allowed = allowed_methods(path_item).join(", ");
    ValidationError::new(
        ValidationType::Operation,
        ViolationKind::MethodNotAllowed,
        format!("{} method for path '{}' is not allowed", method, template),
    )
    .with_reason(format!(
        "The path '{}' exists in the specification, but it declares no {} operation",
        template, method
    ))
    .with_how_to_fix(format!("Use one of the declared methods: '{}'", allowed))
}

/// Resolves `method` + `path` against every path template in the contract.
pub fn resolve<'a>(
    contract: &'a Contract,
    method: &Method,
    path: &str,
) -> Result<ValidationContext<'a>, ValidationError> {
    for candidate in candidate_paths(path, contract.server_prefixes()) {
        let mut matches: Vec<(&RouteTemplate, &PathItem, Vec<(String, String)>)> = contract
            .routes()
            .filter_map(|(route, path_item)| {
                route
                    .captures(&candidate)
                    .map(|captures| (route, path_item, captures))
            })
            .collect();

        if matches.is_empty() {
            continue;
        }

        // stable: equally specific templates keep declaration order
        matches.sort_by_key(|(route, _, _)| std::cmp::Reverse(route.literal_count()));

        let (most_specific, most_specific_item) = (matches[0].0, matches[0].1);
        for (route, path_item, captures) in matches {
            if let Some(operation) = operation_for(path_item, method) {
                tracing::debug!(%method, path, template = route.as_str(), "resolved operation");
                return Ok(ValidationContext {
                    method: method.clone(),
                    path_item,
                    operation,
                    template: route.as_str(),
                    path_params: captures,
                });
            }
        }

        tracing::debug!(%method, path, template = most_specific.as_str(), "method not allowed");
        return Err(method_not_allowed(
            method,
            most_specific.as_str(),
            most_specific_item,
        ));
    }

    tracing::debug!(%method, path, "no path template matched");
    Err(path_not_found(method, &normalize_path(path)))
}

/// A path item pinned on a validator instance, bypassing template search.
#[derive(Debug, Clone)]
pub struct PinnedPath {
    path_item: PathItem,
    route: RouteTemplate,
}

impl PinnedPath {
    pub fn new(path_item: PathItem, path_value: &str) -> Self {
        Self {
            path_item,
            route: RouteTemplate::parse(path_value),
        }
    }

    pub fn path_item(&self) -> &PathItem {
        &self.path_item
    }

    pub fn template(&self) -> &str {
        self.route.as_str()
    }

    /// Only extracts path parameters; the template is trusted to be the right one.
    pub fn resolve<'a>(
        &'a self,
        method: &Method,
        path: &str,
        server_prefixes: &[String],
    ) -> Result<ValidationContext<'a>, ValidationError> {
        let captures = candidate_paths(path, server_prefixes)
            .iter()
            .find_map(|candidate| self.route.captures(candidate))
            .ok_or_else(|| path_not_found(method, &normalize_path(path)))?;

        let operation = operation_for(&self.path_item, method)
            .ok_or_else(|| method_not_allowed(method, self.route.as_str(), &self.path_item))?;

        Ok(ValidationContext {
            method: method.clone(),
            path_item: &self.path_item,
            operation,
            template: self.route.as_str(),
            path_params: captures,
        })
    }
}

/// Uses the pinned path item when one is set, otherwise searches the contract.
pub(crate) fn resolve_with<'a>(
    contract: &'a Contract,
    pinned: Option<&'a PinnedPath>,
    method: &Method,
    path: &str,
) -> Result<ValidationContext<'a>, ValidationError> {
    match pinned {
        Some(pinned) => pinned.resolve(method, path, contract.server_prefixes()),
        None => resolve(contract, method, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_template_matches_exactly() {
        let route = RouteTemplate::parse("/pet/findByStatus");
        assert_eq!(route.captures("/pet/findByStatus"), Some(vec![]));
        assert_eq!(route.captures("/pet/findbystatus"), None);
        assert_eq!(route.captures("/pet"), None);
    }

    #[test]
    fn parameter_segment_captures_value() {
        let route = RouteTemplate::parse("/pet/{petId}/uploadImage");
        assert_eq!(
            route.captures("/pet/12/uploadImage"),
            Some(vec![("petId".to_string(), "12".to_string())])
        );
        assert_eq!(route.captures("/pet//uploadImage"), None);
    }

    #[test]
    fn mixed_segment_captures_value() {
        let route = RouteTemplate::parse("/reports/{id}.{format}");
        assert_eq!(
            route.captures("/reports/42.json"),
            Some(vec![
                ("id".to_string(), "42".to_string()),
                ("format".to_string(), "json".to_string())
            ])
        );
        assert_eq!(route.captures("/reports/.json"), None);
    }

    #[test]
    fn literal_count_ranks_templates() {
        assert_eq!(RouteTemplate::parse("/pet/findByStatus").literal_count(), 2);
        assert_eq!(RouteTemplate::parse("/pet/{petId}").literal_count(), 1);
        assert_eq!(RouteTemplate::parse("/{a}/{b}").literal_count(), 0);
    }

    #[test]
    fn normalize_strips_trailing_slash() {
        assert_eq!(normalize_path("/users/"), "/users");
    }

    #[test]
    fn normalize_collapses_double_slashes() {
        assert_eq!(normalize_path("/users//123"), "/users/123");
    }

    #[test]
    fn normalize_preserves_root() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), "/");
    }

    #[test]
    fn server_prefix_candidates() {
        let prefixes = vec!["/api/v3".to_string()];
        assert_eq!(
            candidate_paths("/api/v3/pet", &prefixes),
            vec!["/api/v3/pet".to_string(), "/pet".to_string()]
        );
        assert_eq!(
            candidate_paths("/api/v3pet", &prefixes),
            vec!["/api/v3pet".to_string()]
        );
    }
}
