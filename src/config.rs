/// Knobs applied when a [`crate::Contract`] is built.
#[derive(Debug, Clone)]
pub struct ValidatorOptions {
    /// Assert `format` keywords (date-time, email, uuid, ...) instead of treating them as annotations.
    pub validate_formats: bool,
    /// Retry path resolution with the path portion of each declared server URL stripped.
    pub strip_server_prefixes: bool,
    /// Skip header parameters named `Accept`, `Content-Type` or `Authorization`.
    pub ignore_reserved_headers: bool,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            validate_formats: true,
            strip_server_prefixes: true,
            ignore_reserved_headers: true,
        }
    }
}
