//! Parameter declarations and their wire serialization grammar.

pub mod codec;
pub mod raw;

pub use codec::{
    canonical_form, coerce, contains_reserved, decode, encode, escape_query_value, CodecIssue,
    Decoded, RawParameter, Shape,
};
pub use raw::{form_decode, header_value, parse_cookies, parse_query, percent_decode, RawPair};

use crate::error::ContractError;
use crate::spec::ResolveReference;
use crate::validation_error::ValidationType;
use openapiv3::{
    CookieStyle, HeaderStyle, OpenAPI, Operation, Parameter, ParameterData,
    ParameterSchemaOrContent, PathItem, PathStyle, QueryStyle, ReferenceOr,
};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterLocation {
    Query,
    Header,
    Path,
    Cookie,
}

impl ParameterLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Header => "header",
            Self::Path => "path",
            Self::Cookie => "cookie",
        }
    }

    /// Capitalized form used at the start of messages.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Query => "Query",
            Self::Header => "Header",
            Self::Path => "Path",
            Self::Cookie => "Cookie",
        }
    }

    pub fn validation_type(&self) -> ValidationType {
        match self {
            Self::Query => ValidationType::Query,
            Self::Header => ValidationType::Header,
            Self::Path => ValidationType::Path,
            Self::Cookie => ValidationType::Cookie,
        }
    }

    /// Style used when a declaration names none.
    pub fn default_style(&self) -> ParameterStyle {
        match self {
            Self::Query | Self::Cookie => ParameterStyle::Form,
            Self::Path | Self::Header => ParameterStyle::Simple,
        }
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterStyle {
    Form,
    Simple,
    Matrix,
    Label,
    SpaceDelimited,
    PipeDelimited,
    DeepObject,
}

impl ParameterStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Form => "form",
            Self::Simple => "simple",
            Self::Matrix => "matrix",
            Self::Label => "label",
            Self::SpaceDelimited => "spaceDelimited",
            Self::PipeDelimited => "pipeDelimited",
            Self::DeepObject => "deepObject",
        }
    }

    /// Separator between collection items when the value is not exploded.
    pub fn delimiter(&self) -> char {
        match self {
            Self::SpaceDelimited => ' ',
            Self::PipeDelimited => '|',
            _ => ',',
        }
    }

    /// Explode default per OAS: only `form` explodes by default.
    pub fn default_explode(&self) -> bool {
        matches!(self, Self::Form)
    }
}

/// One parameter declaration, flattened out of the contract model.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub style: ParameterStyle,
    pub explode: bool,
    pub allow_reserved: bool,
    pub allow_empty_value: bool,
    /// The declared schema as JSON, possibly a `$ref`.
    pub schema: Value,
    /// Media type of a content-based declaration.
    pub content_type: Option<String>,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, location: ParameterLocation) -> Self {
        let style = location.default_style();
        Self {
            name: name.into(),
            location,
            // path parameters are always required
            required: location == ParameterLocation::Path,
            style,
            explode: style.default_explode(),
            allow_reserved: false,
            allow_empty_value: false,
            schema: Value::Object(Default::default()),
            content_type: None,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Changes the style and resets `explode` to the style's default.
    pub fn with_style(mut self, style: ParameterStyle) -> Self {
        self.style = style;
        self.explode = style.default_explode();
        self
    }

    pub fn with_explode(mut self, explode: bool) -> Self {
        self.explode = explode;
        self
    }

    pub fn with_allow_reserved(mut self, allow_reserved: bool) -> Self {
        self.allow_reserved = allow_reserved;
        self
    }

    pub fn with_allow_empty_value(mut self, allow_empty_value: bool) -> Self {
        self.allow_empty_value = allow_empty_value;
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn from_openapi(parameter: &Parameter) -> Result<Self, ContractError> {
        let (location, style, data) = match parameter {
            Parameter::Query {
                parameter_data,
                style,
                ..
            } => {
                let style = match style {
                    QueryStyle::Form => ParameterStyle::Form,
                    QueryStyle::SpaceDelimited => ParameterStyle::SpaceDelimited,
                    QueryStyle::PipeDelimited => ParameterStyle::PipeDelimited,
                    QueryStyle::DeepObject => ParameterStyle::DeepObject,
                };
                (ParameterLocation::Query, style, parameter_data)
            }
            Parameter::Header {
                parameter_data,
                style: HeaderStyle::Simple,
            } => (ParameterLocation::Header, ParameterStyle::Simple, parameter_data),
            Parameter::Path {
                parameter_data,
                style,
            } => {
                let style = match style {
                    PathStyle::Simple => ParameterStyle::Simple,
                    PathStyle::Label => ParameterStyle::Label,
                    PathStyle::Matrix => ParameterStyle::Matrix,
                };
                (ParameterLocation::Path, style, parameter_data)
            }
            Parameter::Cookie {
                parameter_data,
                style: CookieStyle::Form,
            } => (ParameterLocation::Cookie, ParameterStyle::Form, parameter_data),
        };

        let mut spec = Self::new(data.name.clone(), location)
            .with_style(style)
            .required(data.required || location == ParameterLocation::Path);

        if let Some(explode) = data.explode {
            spec = spec.with_explode(explode);
        }

        if let Parameter::Query {
            allow_reserved,
            allow_empty_value,
            ..
        } = parameter
        {
            spec = spec
                .with_allow_reserved(*allow_reserved)
                .with_allow_empty_value(allow_empty_value.unwrap_or(false));
        }

        apply_format(spec, data)
    }
}

fn apply_format(spec: ParameterSpec, data: &ParameterData) -> Result<ParameterSpec, ContractError> {
    let to_json = |schema: &ReferenceOr<openapiv3::Schema>| {
        serde_json::to_value(schema).map_err(|e| ContractError::SchemaConversion {
            context: format!("parameter '{}'", data.name),
            message: e.to_string(),
        })
    };

    match &data.format {
        ParameterSchemaOrContent::Schema(schema) => Ok(spec.with_schema(to_json(schema)?)),
        ParameterSchemaOrContent::Content(content) => {
            let (media_type, declaration) = content
                .iter()
                .next()
                .ok_or_else(|| ContractError::ParameterWithoutSchema(data.name.clone()))?;
            let schema = declaration
                .schema
                .as_ref()
                .ok_or_else(|| ContractError::ParameterWithoutSchema(data.name.clone()))?;
            Ok(spec
                .with_schema(to_json(schema)?)
                .with_content_type(media_type.clone()))
        }
    }
}

/// Path-level parameters merged with the operation's own; an operation-level
/// declaration replaces a path-level one with the same name and location.
pub fn collect_parameters(
    document: &OpenAPI,
    path_item: &PathItem,
    operation: &Operation,
) -> Result<Vec<ParameterSpec>, ContractError> {
    let mut specs: Vec<ParameterSpec> = Vec::new();

    for parameter_ref in path_item.parameters.iter().chain(&operation.parameters) {
        let spec = ParameterSpec::from_openapi(parameter_ref.resolve(document)?)?;
        match specs
            .iter_mut()
            .find(|existing| existing.name == spec.name && existing.location == spec.location)
        {
            Some(existing) => *existing = spec,
            None => specs.push(spec),
        }
    }

    Ok(specs)
}
