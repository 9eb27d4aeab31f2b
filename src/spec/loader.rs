use crate::error::ContractError;
use crate::spec::document::split_document;
use openapiv3::OpenAPI;
use serde_json::Value;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Loads a raw OpenAPI document from a YAML or JSON file
pub fn load_document(path: &Path) -> Result<Value, ContractError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    // JSON is a subset of YAML, one parser covers both
    serde_yaml::from_reader(reader).map_err(|e| ContractError::Parse(e.to_string()))
}

/// Parses a raw OpenAPI document held in memory
pub fn parse_document(text: &str) -> Result<Value, ContractError> {
    serde_yaml::from_str(text).map_err(|e| ContractError::Parse(e.to_string()))
}

/// Loads the structural model of an OpenAPI 3.0 or 3.1 file.
///
/// Schemas in the returned model are `$ref`s into the raw document.
pub fn load_openapi_spec(path: &Path) -> Result<OpenAPI, ContractError> {
    Ok(split_document(&load_document(path)?)?.model)
}

/// Parses the structural model of an OpenAPI 3.0 or 3.1 document.
pub fn parse_openapi_spec(text: &str) -> Result<OpenAPI, ContractError> {
    Ok(split_document(&parse_document(text)?)?.model)
}
