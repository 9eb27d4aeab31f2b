//! Extraction of raw parameter text from request parts.

use http::HeaderMap;
use percent_encoding::percent_decode_str;

/// One `key=value` occurrence from a query string.
///
/// The key is decoded; the value is kept exactly as sent so that reserved
/// characters and delimiters can still be told apart from encoded ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPair {
    pub key: String,
    pub raw_value: String,
}

impl RawPair {
    pub fn new(key: impl Into<String>, raw_value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            raw_value: raw_value.into(),
        }
    }

    pub fn value(&self) -> String {
        form_decode(&self.raw_value)
    }
}

pub fn percent_decode(input: &str) -> String {
    percent_decode_str(input).decode_utf8_lossy().into_owned()
}

/// `application/x-www-form-urlencoded` decoding: `+` is a space.
pub fn form_decode(input: &str) -> String {
    percent_decode(&input.replace('+', " "))
}

/// Splits a query string (without the leading `?`) into its occurrences, in order.
pub fn parse_query(query: &str) -> Vec<RawPair> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => RawPair::new(form_decode(key), value),
            None => RawPair::new(form_decode(pair), ""),
        })
        .collect()
}

/// All cookies from every `Cookie` header, in order.
pub fn parse_cookies(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .get_all(http::header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|cookie| {
            let (name, value) = cookie.trim().split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// A header's value, case-insensitively; repeated headers are joined with `,`.
pub fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(name)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();

    if values.is_empty() {
        None
    } else {
        Some(values.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn query_keeps_raw_values() {
        let pairs = parse_query("tags=fuzzy%2Cwuzzy&name=big+mac&flag&&x=a=b");
        assert_eq!(
            pairs,
            vec![
                RawPair::new("tags", "fuzzy%2Cwuzzy"),
                RawPair::new("name", "big+mac"),
                RawPair::new("flag", ""),
                RawPair::new("x", "a=b"),
            ]
        );
        assert_eq!(pairs[0].value(), "fuzzy,wuzzy");
        assert_eq!(pairs[1].value(), "big mac");
    }

    #[test]
    fn query_keys_are_decoded() {
        let pairs = parse_query("color%5BR%5D=100");
        assert_eq!(pairs[0].key, "color[R]");
    }

    #[test]
    fn cookies_from_multiple_headers() {
        let mut headers = HeaderMap::new();
        headers.append("cookie", HeaderValue::from_static("session=abc; theme=dark"));
        headers.append("cookie", HeaderValue::from_static("lang=en"));
        assert_eq!(
            parse_cookies(&headers),
            vec![
                ("session".to_string(), "abc".to_string()),
                ("theme".to_string(), "dark".to_string()),
                ("lang".to_string(), "en".to_string()),
            ]
        );
    }

    #[test]
    fn header_lookup_ignores_case() {
        let mut headers = HeaderMap::new();
        headers.append("x-rate-limit", HeaderValue::from_static("10"));
        headers.append("x-rate-limit", HeaderValue::from_static("20"));
        assert_eq!(header_value(&headers, "X-Rate-Limit").as_deref(), Some("10,20"));
        assert_eq!(header_value(&headers, "X-Missing"), None);
    }
}
