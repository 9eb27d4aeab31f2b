//! Contract validator CLI
//!
//! Checks one HTTP exchange against an OpenAPI contract and prints the
//! violations as JSON.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use contract_validator::{Contract, ValidationReport, Validator, ValidatorOptions};
use http::{HeaderName, HeaderValue, Method, Request, Response};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "contract-validator")]
#[command(about = "Validate an HTTP exchange against an OpenAPI contract")]
#[command(version)]
struct Cli {
    /// OpenAPI document (YAML or JSON)
    spec: PathBuf,

    /// Request method, e.g. GET
    method: String,

    /// Request target: path plus optional query string
    url: String,

    /// Request header as NAME:VALUE (repeatable)
    #[arg(long = "header", short = 'H')]
    headers: Vec<String>,

    /// File holding the request body
    #[arg(long)]
    body: Option<PathBuf>,

    /// Response status code; enables response validation
    #[arg(long)]
    status: Option<u16>,

    /// Response header as NAME:VALUE (repeatable)
    #[arg(long = "response-header")]
    response_headers: Vec<String>,

    /// File holding the response body
    #[arg(long, requires = "status")]
    response_body: Option<PathBuf>,

    /// Treat `format` keywords as annotations only
    #[arg(long)]
    no_formats: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(code) => ExitCode::from(code),
    }
}

fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue), u8> {
    let (name, value) = raw.split_once(':').ok_or_else(|| {
        eprintln!("Error: header '{}' must be NAME:VALUE", raw);
        2u8
    })?;

    let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|e| {
        eprintln!("Error: invalid header name in '{}': {}", raw, e);
        2u8
    })?;
    let value = HeaderValue::from_str(value.trim()).map_err(|e| {
        eprintln!("Error: invalid header value in '{}': {}", raw, e);
        2u8
    })?;
    Ok((name, value))
}

fn read_body(path: Option<&Path>) -> Result<Vec<u8>, u8> {
    match path {
        Some(path) => std::fs::read(path).map_err(|e| {
            eprintln!("Error reading {}: {}", path.display(), e);
            2u8
        }),
        None => Ok(Vec::new()),
    }
}

fn run(cli: Cli) -> Result<bool, u8> {
    let options = ValidatorOptions {
        validate_formats: !cli.no_formats,
        ..Default::default()
    };

    let document = contract_validator::load_document(&cli.spec).map_err(|e| {
        eprintln!("Error: {}", e);
        2u8
    })?;
    let contract = Contract::from_value(&document, options).map_err(|e| {
        eprintln!("Error: {}", e);
        2u8
    })?;
    let validator = Validator::new(Arc::new(contract));

    let method = Method::from_bytes(cli.method.to_uppercase().as_bytes()).map_err(|e| {
        eprintln!("Error: invalid method '{}': {}", cli.method, e);
        2u8
    })?;

    let mut request = Request::builder().method(method).uri(cli.url.as_str());
    for raw in &cli.headers {
        let (name, value) = parse_header(raw)?;
        request = request.header(name, value);
    }
    let request = request.body(read_body(cli.body.as_deref())?).map_err(|e| {
        eprintln!("Error: invalid request: {}", e);
        2u8
    })?;

    let (valid, errors) = match cli.status {
        Some(status) => {
            let mut response = Response::builder().status(status);
            for raw in &cli.response_headers {
                let (name, value) = parse_header(raw)?;
                response = response.header(name, value);
            }
            let response = response
                .body(read_body(cli.response_body.as_deref())?)
                .map_err(|e| {
                    eprintln!("Error: invalid response: {}", e);
                    2u8
                })?;
            validator.validate_request_response(&request, &response)
        }
        None => validator.validate_request(&request),
    };

    let report = ValidationReport::new(valid, &errors);
    let json = report.to_json().map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;
    println!("{}", json);

    Ok(valid)
}
