use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

/// An attribute map, keyed by attribute name, in source iteration order.
pub type AttributeMap = IndexMap<String, AttributeValue>;

/// A DynamoDB Streams attribute value. Recursive tagged union per §3.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    /// Arbitrary-precision decimal, kept as the source digit string so it
    /// can round-trip through JSON without float rounding or exponents.
    Number(String),
    Boolean(bool),
    Null,
    Map(AttributeMap),
    List(Vec<AttributeValue>),
    StringSet(Vec<String>),
    NumberSet(Vec<String>),
    Binary(Vec<u8>),
    BinarySet(Vec<Vec<u8>>),
}

/// Converts a single attribute value to its JSON-serializable form, per the
/// table in §4.1. Never fails: unrecognized or malformed inputs degrade to
/// `null` or are silently dropped, matching the Schema error policy of §7.
pub fn convert(attr: &AttributeValue) -> Value {
    match attr {
        AttributeValue::String(s) => Value::String(s.clone()),
        AttributeValue::Number(digits) => exact_number(digits),
        AttributeValue::Boolean(b) => Value::Bool(*b),
        AttributeValue::Null => Value::Null,
        AttributeValue::Map(m) => {
            let mut object = Map::with_capacity(m.len());
            for (k, v) in m {
                object.insert(k.clone(), convert(v));
            }
            Value::Object(object)
        }
        AttributeValue::List(items) => Value::Array(items.iter().map(convert).collect()),
        AttributeValue::StringSet(items) => {
            Value::Array(items.iter().cloned().map(Value::String).collect())
        }
        AttributeValue::NumberSet(items) => Value::Array(
            items
                .iter()
                .filter_map(|n| n.parse::<f64>().ok())
                .filter_map(Number::from_f64)
                .map(Value::Number)
                .collect(),
        ),
        AttributeValue::Binary(bytes) => Value::String(encode_binary(bytes)),
        AttributeValue::BinarySet(sets) => {
            Value::Array(sets.iter().map(|b| Value::String(encode_binary(b))).collect())
        }
    }
}

/// Converts an attribute map to a JSON object, or `None` if the map is
/// absent or empty (callers then omit or null the field per §6).
pub fn convert_map(attrs: Option<&AttributeMap>) -> Option<Value> {
    let attrs = attrs?;
    if attrs.is_empty() {
        return None;
    }
    let mut object = Map::with_capacity(attrs.len());
    for (k, v) in attrs {
        object.insert(k.clone(), convert(v));
    }
    Some(Value::Object(object))
}

fn encode_binary(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Builds a JSON number that preserves `digits` verbatim, with no float
/// rounding or exponent notation. Relies on serde_json's
/// `arbitrary_precision` feature, which stores numbers as their source
/// string rather than parsing them into an `f64`.
fn exact_number(digits: &str) -> Value {
    Value::Number(Number::from_string_unchecked(digits.to_string()))
}
