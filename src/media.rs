//! Media type helpers shared by body and content-based parameter handling.

/// The `type/subtype` part of a content type, lowercased, parameters dropped.
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// `application/json` and any `+json` structured syntax suffix.
pub fn is_json(content_type: &str) -> bool {
    let essence = essence(content_type);
    essence == "application/json" || essence.ends_with("+json")
}

pub fn is_text(content_type: &str) -> bool {
    essence(content_type).starts_with("text/")
}
