//! Encoding and decoding of parameter values for every location, style,
//! explode setting and value shape.
//!
//! Decoding is schema driven: the (ref-resolved) parameter schema decides
//! whether the text is read as a primitive, an array or an object, and which
//! primitive types the decoded strings are coerced to.

use super::raw::{form_decode, percent_decode, RawPair};
use super::{ParameterLocation, ParameterSpec, ParameterStyle};
use crate::media;
use crate::schema::plain_text;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Number, Value};

/// Characters that must be percent-encoded in query values unless `allowReserved` is set.
pub const RESERVED: &str = ":/?#[]@!$&'()*+,;=";

const UNRESERVED_ONLY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const RESERVED_PASSTHROUGH: &AsciiSet = &UNRESERVED_ONLY
    .remove(b':')
    .remove(b'/')
    .remove(b'?')
    .remove(b'[')
    .remove(b']')
    .remove(b'@')
    .remove(b'!')
    .remove(b'$')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b';');

/// Label items also escape `.`, the exploded label separator.
const LABEL_ITEM: &AsciiSet = &UNRESERVED_ONLY.add(b'.');

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Primitive,
    Array,
    Object,
}

impl Shape {
    /// Shape declared by a schema; untyped schemas are inferred from `properties`/`items`.
    pub fn of(schema: &Value) -> Self {
        match primary_type(schema) {
            Some("array") => Self::Array,
            Some("object") => Self::Object,
            Some(_) => Self::Primitive,
            None if schema.get("properties").is_some() => Self::Object,
            None if schema.get("items").is_some() => Self::Array,
            None => Self::Primitive,
        }
    }

    fn of_value(value: &Value) -> Self {
        match value {
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
            _ => Self::Primitive,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecIssue {
    /// The serialized form contradicts the declared explode setting.
    ExplodeMismatch,
    /// The text cannot be read as the declared style and shape.
    InvalidShape(String),
}

/// Raw text handed to the decoder.
#[derive(Debug, Clone, Copy)]
pub enum RawParameter<'a> {
    /// Every query occurrence of the request; the decoder picks the ones it owns.
    Query(&'a [RawPair]),
    /// A path capture, header value or cookie value.
    Text(&'a str),
}

/// The outcome of decoding one parameter that was present on the request.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub value: Value,
    /// The raw occurrences the value was read from, as sent.
    pub raw: Vec<String>,
    pub issues: Vec<CodecIssue>,
}

impl Decoded {
    fn ok(value: Value, raw: Vec<String>) -> Self {
        Self {
            value,
            raw,
            issues: Vec::new(),
        }
    }

    fn invalid(raw: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            value: Value::Null,
            raw,
            issues: vec![CodecIssue::InvalidShape(message.into())],
        }
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

fn primary_type(schema: &Value) -> Option<&str> {
    match schema.get("type")? {
        Value::String(ty) => Some(ty.as_str()),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|ty| *ty != "null"),
        _ => None,
    }
}

fn items_schema(schema: &Value) -> &Value {
    schema.get("items").unwrap_or(&Value::Null)
}

fn property_schema<'a>(schema: &'a Value, name: &str) -> &'a Value {
    schema
        .get("properties")
        .and_then(|properties| properties.get(name))
        .or_else(|| schema.get("additionalProperties").filter(|v| v.is_object()))
        .unwrap_or(&Value::Null)
}

/// Converts decoded text to the schema's primitive type. Text that does not
/// parse stays a string so schema validation can report the mismatch.
pub fn coerce(text: &str, schema: &Value) -> Value {
    let fallback = || Value::String(text.to_string());
    match primary_type(schema) {
        Some("integer") => text
            .parse::<i64>()
            .map(Value::from)
            .or_else(|_| text.parse::<u64>().map(Value::from))
            .unwrap_or_else(|_| fallback()),
        Some("number") => match text.parse::<i64>() {
            Ok(int) => Value::from(int),
            Err(_) => text
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(fallback),
        },
        Some("boolean") => match text {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => fallback(),
        },
        _ => fallback(),
    }
}

fn pairs_to_object(items: Vec<String>, schema: &Value) -> Result<Value, String> {
    if items.len() % 2 != 0 {
        return Err("object values must be sent as key and value pairs".to_string());
    }

    let mut object = Map::new();
    for pair in items.chunks(2) {
        let value = coerce(&pair[1], property_schema(schema, &pair[0]));
        object.insert(pair[0].clone(), value);
    }
    Ok(Value::Object(object))
}

/// Decodes a parameter. Returns `None` when the request does not carry it.
pub fn decode(spec: &ParameterSpec, raw: RawParameter<'_>, schema: &Value) -> Option<Decoded> {
    if let Some(content_type) = &spec.content_type {
        return decode_content(spec, raw, content_type);
    }

    match raw {
        RawParameter::Query(pairs) => decode_query(spec, pairs, schema),
        RawParameter::Text(text) => Some(decode_text(spec, text, schema)),
    }
}

fn decode_content(spec: &ParameterSpec, raw: RawParameter<'_>, content_type: &str) -> Option<Decoded> {
    let (text, raw) = match raw {
        RawParameter::Query(pairs) => {
            let pair = pairs.iter().find(|pair| pair.key == spec.name)?;
            (pair.value(), vec![pair.raw_value.clone()])
        }
        RawParameter::Text(text) if spec.location == ParameterLocation::Path => {
            (percent_decode(text), vec![text.to_string()])
        }
        RawParameter::Text(text) => (text.to_string(), vec![text.to_string()]),
    };

    if !media::is_json(content_type) {
        return Some(Decoded::ok(Value::String(text), raw));
    }

    Some(match serde_json::from_str(&text) {
        Ok(value) => Decoded::ok(value, raw),
        Err(e) => Decoded::invalid(raw, format!("value is not valid JSON: {}", e)),
    })
}

/// Whether an exploded occurrence carries the style's non-exploded delimiter.
fn carries_delimiter(style: ParameterStyle, raw: &str) -> bool {
    match style {
        ParameterStyle::SpaceDelimited => {
            raw.contains(' ') || raw.contains('+') || raw.contains("%20")
        }
        ParameterStyle::PipeDelimited => raw.contains('|'),
        _ => raw.contains(','),
    }
}

fn split_delimited(style: ParameterStyle, raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    match style {
        ParameterStyle::SpaceDelimited => raw
            .replace('+', " ")
            .replace("%20", " ")
            .split(' ')
            .map(percent_decode)
            .collect(),
        // an escaped `%7C` belongs to its item
        ParameterStyle::PipeDelimited => raw.split('|').map(form_decode).collect(),
        _ => raw.split(',').map(form_decode).collect(),
    }
}

fn decode_query(spec: &ParameterSpec, pairs: &[RawPair], schema: &Value) -> Option<Decoded> {
    let shape = Shape::of(schema);

    if spec.style == ParameterStyle::DeepObject {
        return decode_deep_object(spec, pairs, schema, shape);
    }

    if shape == Shape::Object && spec.explode && spec.style == ParameterStyle::Form {
        return decode_exploded_object(pairs, schema);
    }

    let owned: Vec<&RawPair> = pairs.iter().filter(|pair| pair.key == spec.name).collect();
    let first = owned.first()?;
    let raw: Vec<String> = owned.iter().map(|pair| pair.raw_value.clone()).collect();
    let mut issues = Vec::new();

    let value = match shape {
        Shape::Primitive => coerce(&first.value(), schema),
        Shape::Array if spec.explode => {
            if raw.iter().any(|r| carries_delimiter(spec.style, r)) {
                issues.push(CodecIssue::ExplodeMismatch);
            }
            Value::Array(
                owned
                    .iter()
                    .map(|pair| coerce(&pair.value(), items_schema(schema)))
                    .collect(),
            )
        }
        Shape::Array => {
            if owned.len() > 1 {
                issues.push(CodecIssue::ExplodeMismatch);
            }
            Value::Array(
                split_delimited(spec.style, &first.raw_value)
                    .iter()
                    .map(|item| coerce(item, items_schema(schema)))
                    .collect(),
            )
        }
        Shape::Object => {
            match pairs_to_object(split_delimited(spec.style, &first.raw_value), schema) {
                Ok(object) => object,
                Err(message) => return Some(Decoded::invalid(raw, message)),
            }
        }
    };

    Some(Decoded { value, raw, issues })
}

/// Exploded form objects spread their members over the query. Without
/// declared properties every pair handed in is a member, typed by
/// `additionalProperties`.
fn decode_exploded_object(pairs: &[RawPair], schema: &Value) -> Option<Decoded> {
    let mut object = Map::new();
    let mut raw = Vec::new();

    match schema.get("properties").and_then(Value::as_object) {
        Some(properties) => {
            for (key, property) in properties {
                if let Some(pair) = pairs.iter().find(|pair| &pair.key == key) {
                    object.insert(key.clone(), coerce(&pair.value(), property));
                    raw.push(pair.raw_value.clone());
                }
            }
        }
        None => {
            for pair in pairs {
                let value = coerce(&pair.value(), property_schema(schema, &pair.key));
                object.insert(pair.key.clone(), value);
                raw.push(pair.raw_value.clone());
            }
        }
    }

    (!object.is_empty()).then(|| Decoded::ok(Value::Object(object), raw))
}

fn decode_deep_object(
    spec: &ParameterSpec,
    pairs: &[RawPair],
    schema: &Value,
    shape: Shape,
) -> Option<Decoded> {
    let prefix = format!("{}[", spec.name);
    let owned: Vec<(&str, &RawPair)> = pairs
        .iter()
        .filter_map(|pair| {
            let property = pair.key.strip_prefix(prefix.as_str())?.strip_suffix(']')?;
            Some((property, pair))
        })
        .collect();

    if owned.is_empty() {
        let plain = pairs.iter().find(|pair| pair.key == spec.name)?;
        return Some(Decoded::invalid(
            vec![plain.raw_value.clone()],
            format!("deepObject values must be sent as '{}[property]=value'", spec.name),
        ));
    }

    let raw: Vec<String> = owned.iter().map(|(_, pair)| pair.raw_value.clone()).collect();
    if shape != Shape::Object {
        return Some(Decoded::invalid(raw, "deepObject style only applies to objects"));
    }

    let object: Map<String, Value> = owned
        .into_iter()
        .map(|(property, pair)| {
            let value = coerce(&pair.value(), property_schema(schema, property));
            (property.to_string(), value)
        })
        .collect();

    Some(Decoded::ok(Value::Object(object), raw))
}

fn split_items(body: &str, separator: char, shape: Shape) -> Vec<&str> {
    match shape {
        Shape::Primitive => vec![body],
        _ if body.is_empty() => Vec::new(),
        _ => body.split(separator).collect(),
    }
}

/// Splits path, header and cookie text into its items. Objects come back as
/// alternating keys and values.
fn text_items(spec: &ParameterSpec, text: &str, shape: Shape) -> Result<Vec<String>, String> {
    let exploded_object = spec.explode && shape == Shape::Object;

    let items: Vec<&str> = match spec.style {
        ParameterStyle::Label => {
            let body = text
                .strip_prefix('.')
                .ok_or("label style values must start with '.'")?;
            let separator = if spec.explode { '.' } else { ',' };
            split_items(body, separator, shape)
        }
        ParameterStyle::Matrix => {
            let body = text
                .strip_prefix(';')
                .ok_or("matrix style values must start with ';'")?;
            let named = format!("{}=", spec.name);
            if exploded_object {
                body.split(';').collect()
            } else if spec.explode && shape == Shape::Array {
                body.split(';')
                    .map(|occurrence| {
                        occurrence
                            .strip_prefix(named.as_str())
                            .ok_or_else(|| format!("matrix values must be named '{}'", spec.name))
                    })
                    .collect::<Result<_, _>>()?
            } else if body == spec.name {
                split_items("", ',', shape)
            } else {
                let value = body
                    .strip_prefix(named.as_str())
                    .ok_or_else(|| format!("matrix values must be named '{}'", spec.name))?;
                split_items(value, ',', shape)
            }
        }
        _ => split_items(text, ',', shape),
    };

    let unescape = |item: &str| match spec.location {
        ParameterLocation::Path => percent_decode(item),
        _ => item.to_string(),
    };

    if !exploded_object {
        return Ok(items.into_iter().map(unescape).collect());
    }

    let mut flattened = Vec::with_capacity(items.len() * 2);
    for item in items {
        let (key, value) = item
            .split_once('=')
            .ok_or("exploded object values must be sent as key=value pairs")?;
        flattened.push(unescape(key));
        flattened.push(unescape(value));
    }
    Ok(flattened)
}

fn decode_text(spec: &ParameterSpec, text: &str, schema: &Value) -> Decoded {
    let shape = Shape::of(schema);
    let raw = vec![text.to_string()];

    let items = match text_items(spec, text, shape) {
        Ok(items) => items,
        Err(message) => return Decoded::invalid(raw, message),
    };

    match shape {
        Shape::Primitive => {
            let value = items.first().map(String::as_str).unwrap_or_default();
            Decoded::ok(coerce(value, schema), raw)
        }
        Shape::Array => {
            let items = items
                .iter()
                .map(|item| coerce(item, items_schema(schema)))
                .collect();
            Decoded::ok(Value::Array(items), raw)
        }
        Shape::Object => match pairs_to_object(items, schema) {
            Ok(object) => Decoded::ok(object, raw),
            Err(message) => Decoded::invalid(raw, message),
        },
    }
}

/// The first reserved character of a raw query value the declaration does not permit.
///
/// The style's own delimiter is exempt when the value is not exploded, and so
/// is `+`, which stands for an encoded space.
pub fn contains_reserved(spec: &ParameterSpec, raw: &str) -> Option<char> {
    if spec.allow_reserved {
        return None;
    }
    raw.chars().find(|c| {
        RESERVED.contains(*c) && *c != '+' && (spec.explode || *c != spec.style.delimiter())
    })
}

/// Percent-encodes a decoded query value so it carries no reserved characters.
pub fn escape_query_value(text: &str) -> String {
    utf8_percent_encode(text, UNRESERVED_ONLY).to_string()
}

/// The correctly serialized form of the items found in `raw`, used as a hint
/// when a value was sent with the wrong explode setting.
pub fn canonical_form(spec: &ParameterSpec, raw: &[String]) -> String {
    let items: Vec<Value> = raw
        .iter()
        .flat_map(|occurrence| split_delimited(spec.style, occurrence))
        .map(Value::String)
        .collect();
    encode(spec, &Value::Array(items))
}

fn items_of(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(plain_text).collect(),
        other => vec![plain_text(other)],
    }
}

fn entries_of(value: &Value) -> Vec<(String, String)> {
    match value {
        Value::Object(object) => object
            .iter()
            .map(|(key, value)| (key.clone(), plain_text(value)))
            .collect(),
        _ => Vec::new(),
    }
}

/// Serializes `value` the way a conforming client sends it.
///
/// Query parameters come back as `name=value` fragments joined with `&`,
/// path parameters as the path segment, headers as the header value and
/// cookies as a `name=value` pair.
pub fn encode(spec: &ParameterSpec, value: &Value) -> String {
    let escape = |text: &str| -> String {
        match spec.location {
            ParameterLocation::Query if spec.allow_reserved => {
                utf8_percent_encode(text, RESERVED_PASSTHROUGH).to_string()
            }
            ParameterLocation::Path if spec.style == ParameterStyle::Label => {
                utf8_percent_encode(text, LABEL_ITEM).to_string()
            }
            ParameterLocation::Query | ParameterLocation::Path => {
                utf8_percent_encode(text, UNRESERVED_ONLY).to_string()
            }
            ParameterLocation::Header | ParameterLocation::Cookie => text.to_string(),
        }
    };

    match spec.location {
        ParameterLocation::Query => encode_query(spec, value, &escape),
        ParameterLocation::Path | ParameterLocation::Header => encode_text(spec, value, &escape),
        ParameterLocation::Cookie => format!("{}={}", spec.name, encode_text(spec, value, &escape)),
    }
}

fn encode_query(spec: &ParameterSpec, value: &Value, escape: &dyn Fn(&str) -> String) -> String {
    let name = &spec.name;
    let shape = Shape::of_value(value);

    if spec.style == ParameterStyle::DeepObject {
        return entries_of(value)
            .iter()
            .map(|(key, v)| format!("{}[{}]={}", name, key, escape(v.as_str())))
            .collect::<Vec<_>>()
            .join("&");
    }

    let delimiter = match spec.style {
        ParameterStyle::SpaceDelimited => "%20",
        ParameterStyle::PipeDelimited => "|",
        _ => ",",
    };

    match shape {
        Shape::Primitive => format!("{}={}", name, escape(&plain_text(value))),
        Shape::Array if spec.explode => items_of(value)
            .iter()
            .map(|item| format!("{}={}", name, escape(item.as_str())))
            .collect::<Vec<_>>()
            .join("&"),
        Shape::Array => {
            let joined = items_of(value)
                .iter()
                .map(|item| escape(item.as_str()))
                .collect::<Vec<_>>()
                .join(delimiter);
            format!("{}={}", name, joined)
        }
        Shape::Object if spec.explode && spec.style == ParameterStyle::Form => entries_of(value)
            .iter()
            .map(|(key, v)| format!("{}={}", escape(key.as_str()), escape(v.as_str())))
            .collect::<Vec<_>>()
            .join("&"),
        Shape::Object => {
            let joined = entries_of(value)
                .iter()
                .flat_map(|(key, v)| [escape(key.as_str()), escape(v.as_str())])
                .collect::<Vec<_>>()
                .join(delimiter);
            format!("{}={}", name, joined)
        }
    }
}

fn encode_text(spec: &ParameterSpec, value: &Value, escape: &dyn Fn(&str) -> String) -> String {
    let shape = Shape::of_value(value);
    let exploded_object = spec.explode && shape == Shape::Object;

    let items: Vec<String> = match shape {
        Shape::Object if exploded_object => entries_of(value)
            .iter()
            .map(|(key, v)| format!("{}={}", escape(key.as_str()), escape(v.as_str())))
            .collect(),
        Shape::Object => entries_of(value)
            .iter()
            .flat_map(|(key, v)| [escape(key.as_str()), escape(v.as_str())])
            .collect(),
        _ => items_of(value).iter().map(|item| escape(item.as_str())).collect(),
    };

    match spec.style {
        ParameterStyle::Label => {
            let separator = if spec.explode { "." } else { "," };
            format!(".{}", items.join(separator))
        }
        ParameterStyle::Matrix if exploded_object => format!(";{}", items.join(";")),
        ParameterStyle::Matrix if spec.explode && shape == Shape::Array => items
            .iter()
            .map(|item| format!(";{}={}", spec.name, item))
            .collect(),
        ParameterStyle::Matrix => format!(";{}={}", spec.name, items.join(",")),
        _ => items.join(","),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::raw::parse_query;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn strings() -> Value {
        json!({ "type": "array", "items": { "type": "string" } })
    }

    fn integers() -> Value {
        json!({ "type": "array", "items": { "type": "integer" } })
    }

    fn color() -> Value {
        json!({
            "type": "object",
            "properties": {
                "R": { "type": "integer" },
                "G": { "type": "integer" },
                "B": { "type": "integer" }
            }
        })
    }

    fn decode_encoded(spec: &ParameterSpec, schema: &Value, value: &Value) -> Decoded {
        let encoded = encode(spec, value);
        match spec.location {
            ParameterLocation::Query => {
                let pairs = parse_query(&encoded);
                decode(spec, RawParameter::Query(&pairs), schema).unwrap()
            }
            ParameterLocation::Cookie => {
                let (_, cookie) = encoded.split_once('=').unwrap();
                decode(spec, RawParameter::Text(cookie), schema).unwrap()
            }
            _ => decode(spec, RawParameter::Text(&encoded), schema).unwrap(),
        }
    }

    fn assert_round_trip(spec: ParameterSpec, schema: Value, value: Value) {
        let decoded = decode_encoded(&spec, &schema, &value);
        assert!(decoded.is_clean(), "{:?} produced {:?}", spec, decoded.issues);
        assert_eq!(decoded.value, value, "{} {:?}", spec.style.as_str(), spec.location);
    }

    #[test]
    fn form_query_round_trips() {
        let query = || ParameterSpec::new("id", ParameterLocation::Query);
        assert_round_trip(query(), json!({ "type": "integer" }), json!(5));
        assert_round_trip(query(), integers(), json!([3, 4, 5]));
        assert_round_trip(query().with_explode(false), integers(), json!([3, 4, 5]));
        assert_round_trip(query(), color(), json!({ "R": 100, "G": 200, "B": 150 }));
        assert_round_trip(
            query().with_explode(false),
            color(),
            json!({ "R": 100, "G": 200, "B": 150 }),
        );
    }

    #[test]
    fn delimited_query_round_trips() {
        for style in [ParameterStyle::SpaceDelimited, ParameterStyle::PipeDelimited] {
            let spec = ParameterSpec::new("tags", ParameterLocation::Query).with_style(style);
            assert_round_trip(spec.clone(), strings(), json!(["fuzzy", "wuzzy"]));
            assert_round_trip(spec.with_explode(true), strings(), json!(["fuzzy", "wuzzy"]));
        }
    }

    #[test]
    fn deep_object_round_trips() {
        let spec = ParameterSpec::new("color", ParameterLocation::Query)
            .with_style(ParameterStyle::DeepObject)
            .with_explode(true);
        assert_eq!(encode(&spec, &json!({ "R": 100 })), "color[R]=100");
        assert_round_trip(spec, color(), json!({ "R": 100, "G": 200, "B": 150 }));
    }

    #[test]
    fn path_styles_round_trip() {
        for style in [ParameterStyle::Simple, ParameterStyle::Label, ParameterStyle::Matrix] {
            for explode in [false, true] {
                let spec = ParameterSpec::new("id", ParameterLocation::Path)
                    .with_style(style)
                    .with_explode(explode);
                assert_round_trip(spec.clone(), json!({ "type": "integer" }), json!(5));
                assert_round_trip(spec.clone(), integers(), json!([3, 4, 5]));
                assert_round_trip(spec, color(), json!({ "R": 100, "G": 200, "B": 150 }));
            }
        }
    }

    #[test]
    fn path_wire_forms() {
        let label = ParameterSpec::new("id", ParameterLocation::Path).with_style(ParameterStyle::Label);
        let matrix = ParameterSpec::new("id", ParameterLocation::Path).with_style(ParameterStyle::Matrix);
        let array = json!([3, 4, 5]);
        let object = json!({ "R": 100, "G": 200 });

        assert_eq!(encode(&label, &array), ".3,4,5");
        assert_eq!(encode(&label.clone().with_explode(true), &array), ".3.4.5");
        assert_eq!(encode(&matrix, &array), ";id=3,4,5");
        assert_eq!(encode(&matrix.clone().with_explode(true), &array), ";id=3;id=4;id=5");
        assert_eq!(encode(&matrix.with_explode(true), &object), ";R=100;G=200");

        let simple = ParameterSpec::new("id", ParameterLocation::Path);
        assert_eq!(encode(&simple, &object), "R,100,G,200");
        assert_eq!(encode(&simple.with_explode(true), &object), "R=100,G=200");
    }

    #[test]
    fn object_members_keep_declared_order() {
        let spec = ParameterSpec::new("filter", ParameterLocation::Query);
        assert_eq!(encode(&spec, &json!({ "zeta": 1, "alpha": 2 })), "zeta=1&alpha=2");
    }

    #[test]
    fn dotted_label_items_round_trip() {
        let spec = ParameterSpec::new("versions", ParameterLocation::Path)
            .with_style(ParameterStyle::Label)
            .with_explode(true);
        let value = json!(["v1.2", "x"]);
        assert_eq!(encode(&spec, &value), ".v1%2E2.x");
        assert_round_trip(spec.clone(), strings(), value.clone());
        assert_round_trip(spec.with_explode(false), strings(), value);
    }

    #[test]
    fn escaped_pipe_stays_inside_its_item() {
        let spec = ParameterSpec::new("t", ParameterLocation::Query)
            .with_style(ParameterStyle::PipeDelimited);
        let value = json!(["a|b", "c"]);
        assert_eq!(encode(&spec, &value), "t=a%7Cb|c");
        assert_round_trip(spec.clone(), strings(), value.clone());
        assert_round_trip(spec.with_explode(true), strings(), value);
    }

    #[test]
    fn free_form_exploded_object_takes_every_pair() {
        let spec = ParameterSpec::new("filter", ParameterLocation::Query);
        let schema = json!({ "type": "object", "additionalProperties": { "type": "integer" } });
        let pairs = parse_query("a=1&b=2");
        let decoded = decode(&spec, RawParameter::Query(&pairs), &schema).unwrap();
        assert!(decoded.is_clean());
        assert_eq!(decoded.value, json!({ "a": 1, "b": 2 }));
        assert_eq!(decoded.raw, vec!["1".to_string(), "2".to_string()]);

        assert!(decode(&spec, RawParameter::Query(&[]), &schema).is_none());
    }

    #[test]
    fn header_and_cookie_round_trip() {
        let header = ParameterSpec::new("X-Ids", ParameterLocation::Header);
        assert_round_trip(header.clone(), integers(), json!([1, 2]));
        assert_round_trip(header.with_explode(true), color(), json!({ "R": 1, "G": 2, "B": 3 }));

        let cookie = ParameterSpec::new("prefs", ParameterLocation::Cookie).with_explode(false);
        assert_round_trip(cookie.clone(), strings(), json!(["dark", "compact"]));
        assert_round_trip(cookie, json!({ "type": "boolean" }), json!(true));
    }

    #[test]
    fn encoded_reserved_characters_survive() {
        let spec = ParameterSpec::new("q", ParameterLocation::Query);
        let value = json!("a,b&c=d");
        assert_eq!(encode(&spec, &value), "q=a%2Cb%26c%3Dd");
        assert_round_trip(spec, json!({ "type": "string" }), value);
    }

    #[test]
    fn comma_joined_array_under_exploded_form_is_flagged() {
        let spec = ParameterSpec::new("tags", ParameterLocation::Query);
        let pairs = parse_query("tags=fuzzy,wuzzy");
        let decoded = decode(&spec, RawParameter::Query(&pairs), &strings()).unwrap();
        assert_eq!(decoded.issues, vec![CodecIssue::ExplodeMismatch]);
        assert_eq!(contains_reserved(&spec, &decoded.raw[0]), Some(','));
    }

    #[test]
    fn space_joined_array_under_exploded_space_delimited_is_flagged() {
        let spec = ParameterSpec::new("tags", ParameterLocation::Query)
            .with_style(ParameterStyle::SpaceDelimited)
            .with_explode(true);
        let pairs = parse_query("tags=fuzzy%20wuzzy");
        let decoded = decode(&spec, RawParameter::Query(&pairs), &strings()).unwrap();
        assert_eq!(decoded.issues, vec![CodecIssue::ExplodeMismatch]);

        let pairs = parse_query("tags=fuzzy,wuzzy");
        let decoded = decode(&spec, RawParameter::Query(&pairs), &strings()).unwrap();
        assert_eq!(contains_reserved(&spec, &decoded.raw[0]), Some(','));
    }

    #[test]
    fn canonical_form_respells_items() {
        let exploded = ParameterSpec::new("tags", ParameterLocation::Query);
        let raw = vec!["fuzzy,wuzzy".to_string()];
        assert_eq!(canonical_form(&exploded, &raw), "tags=fuzzy&tags=wuzzy");

        let joined = exploded.with_explode(false);
        let raw = vec!["fuzzy".to_string(), "wuzzy".to_string()];
        assert_eq!(canonical_form(&joined, &raw), "tags=fuzzy,wuzzy");
    }

    #[test]
    fn repeated_occurrences_of_unexploded_array_are_flagged() {
        let spec = ParameterSpec::new("tags", ParameterLocation::Query).with_explode(false);
        let pairs = parse_query("tags=a&tags=b");
        let decoded = decode(&spec, RawParameter::Query(&pairs), &strings()).unwrap();
        assert_eq!(decoded.issues, vec![CodecIssue::ExplodeMismatch]);
    }

    #[test]
    fn reserved_exemptions() {
        let form = ParameterSpec::new("tags", ParameterLocation::Query).with_explode(false);
        assert_eq!(contains_reserved(&form, "a,b"), None);
        assert_eq!(contains_reserved(&form, "big+mac"), None);
        assert_eq!(contains_reserved(&form, "a/b"), Some('/'));
        assert_eq!(contains_reserved(&form.with_allow_reserved(true), "a/b"), None);
    }

    #[test]
    fn deep_object_on_array_is_invalid() {
        let spec = ParameterSpec::new("ids", ParameterLocation::Query)
            .with_style(ParameterStyle::DeepObject);
        let pairs = parse_query("ids[0]=1");
        let decoded = decode(&spec, RawParameter::Query(&pairs), &integers()).unwrap();
        assert!(matches!(decoded.issues[..], [CodecIssue::InvalidShape(_)]));
    }

    #[test]
    fn label_without_prefix_is_invalid() {
        let spec = ParameterSpec::new("id", ParameterLocation::Path).with_style(ParameterStyle::Label);
        let decoded = decode(&spec, RawParameter::Text("5"), &json!({ "type": "integer" })).unwrap();
        assert!(matches!(decoded.issues[..], [CodecIssue::InvalidShape(_)]));
    }

    #[test]
    fn odd_object_items_are_invalid() {
        let spec = ParameterSpec::new("color", ParameterLocation::Query).with_explode(false);
        let pairs = parse_query("color=R,100,G");
        let decoded = decode(&spec, RawParameter::Query(&pairs), &color()).unwrap();
        assert!(matches!(decoded.issues[..], [CodecIssue::InvalidShape(_)]));
    }

    #[test]
    fn absent_parameter_decodes_to_none() {
        let spec = ParameterSpec::new("status", ParameterLocation::Query);
        let pairs = parse_query("other=1");
        assert!(decode(&spec, RawParameter::Query(&pairs), &json!({ "type": "string" })).is_none());
    }

    #[test]
    fn uncoercible_text_stays_a_string() {
        assert_eq!(coerce("abc", &json!({ "type": "integer" })), json!("abc"));
        assert_eq!(coerce("1.5", &json!({ "type": ["number", "null"] })), json!(1.5));
        assert_eq!(coerce("yes", &json!({ "type": "boolean" })), json!("yes"));
    }

    #[test]
    fn json_content_parameter() {
        let spec = ParameterSpec::new("filter", ParameterLocation::Query)
            .with_content_type("application/json");
        let pairs = parse_query("filter=%7B%22a%22%3A1%7D");
        let decoded = decode(&spec, RawParameter::Query(&pairs), &Value::Null).unwrap();
        assert_eq!(decoded.value, json!({ "a": 1 }));

        let pairs = parse_query("filter=nope");
        let decoded = decode(&spec, RawParameter::Query(&pairs), &Value::Null).unwrap();
        assert!(!decoded.is_clean());
    }
}
