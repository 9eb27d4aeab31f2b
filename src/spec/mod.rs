pub mod builder;
pub mod document;
pub mod loader;
pub mod reference_resolver;

pub use builder::build_contract;
pub use document::{split_document, SplitDocument};
pub use loader::{load_document, load_openapi_spec, parse_document, parse_openapi_spec};
pub use reference_resolver::ResolveReference;
