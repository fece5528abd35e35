//! Event records supplied by the host pipeline.
//!
//! A record is owned by the caller for the duration of one `process` call.
//! Field values keep their original shape so that stringification happens
//! in exactly one place ([`FieldValue::render`]) with locale-independent
//! rules: integers are plain digits, booleans are `true`/`false`, missing and
//! null values are empty.

use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// A single scalar (or structured) field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    Text(String),
    /// Raw bytes as delivered by the pipeline; may not be valid UTF-8.
    Bytes(Vec<u8>),
    /// Arrays and objects, rendered as compact JSON.
    Structured(Value),
}

impl FieldValue {
    /// Render the value as the bytes that get substituted into templates.
    pub fn render(&self) -> Cow<'_, [u8]> {
        match self {
            FieldValue::Null => Cow::Borrowed(b""),
            FieldValue::Bool(true) => Cow::Borrowed(b"true"),
            FieldValue::Bool(false) => Cow::Borrowed(b"false"),
            FieldValue::Integer(n) => Cow::Owned(n.to_string().into_bytes()),
            FieldValue::Unsigned(n) => Cow::Owned(n.to_string().into_bytes()),
            FieldValue::Float(f) => Cow::Owned(format_float(*f).into_bytes()),
            FieldValue::Text(s) => Cow::Borrowed(s.as_bytes()),
            FieldValue::Bytes(b) => Cow::Borrowed(b.as_slice()),
            FieldValue::Structured(v) => Cow::Owned(v.to_string().into_bytes()),
        }
    }

    /// Render the value as text, replacing invalid UTF-8 with U+FFFD.
    pub fn render_lossy(&self) -> Cow<'_, str> {
        match self.render() {
            Cow::Borrowed(bytes) => String::from_utf8_lossy(bytes),
            Cow::Owned(bytes) => Cow::Owned(String::from_utf8_lossy(&bytes).into_owned()),
        }
    }
}

// Whole floats keep a trailing ".0" so 1.0 never reads as the integer 1.
fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    FieldValue::Unsigned(u)
                } else {
                    FieldValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => FieldValue::Text(s),
            other => FieldValue::Structured(other),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        FieldValue::Bytes(value)
    }
}

/// One event: a timestamp (epoch seconds) and its fields.
///
/// The tag travels alongside the batch rather than inside each record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub timestamp: i64,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Create an empty record at the given epoch second.
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field insertion.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Build a record from a decoded JSON object.
    pub fn from_json(timestamp: i64, object: Map<String, Value>) -> Self {
        Self {
            timestamp,
            fields: object
                .into_iter()
                .map(|(k, v)| (k, FieldValue::from(v)))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_render_locale_independent() {
        assert_eq!(FieldValue::Integer(-42).render().as_ref(), b"-42");
        assert_eq!(FieldValue::Unsigned(u64::MAX).render().as_ref(), b"18446744073709551615");
        assert_eq!(FieldValue::Bool(true).render().as_ref(), b"true");
        assert_eq!(FieldValue::Bool(false).render().as_ref(), b"false");
        assert_eq!(FieldValue::Null.render().as_ref(), b"");
        assert_eq!(FieldValue::Float(1.5).render().as_ref(), b"1.5");
        assert_eq!(FieldValue::Float(3.0).render().as_ref(), b"3.0");
    }

    #[test]
    fn structured_values_render_as_compact_json() {
        let v = FieldValue::from(json!({"a": [1, 2]}));
        assert_eq!(v.render().as_ref(), br#"{"a":[1,2]}"#);
    }

    #[test]
    fn bytes_render_verbatim_and_lossy() {
        let v = FieldValue::Bytes(vec![b'o', b'k', 0xFF]);
        assert_eq!(v.render().as_ref(), &[b'o', b'k', 0xFF]);
        assert_eq!(v.render_lossy(), "ok\u{FFFD}");
    }

    #[test]
    fn from_json_converts_every_field() {
        let object = json!({"value": "hello", "count": 3, "ok": true, "none": null});
        let Value::Object(map) = object else {
            panic!("expected object");
        };
        let record = Record::from_json(1_700_000_000, map);

        assert_eq!(record.timestamp, 1_700_000_000);
        assert_eq!(record.get("value"), Some(&FieldValue::Text("hello".to_string())));
        assert_eq!(record.get("count"), Some(&FieldValue::Integer(3)));
        assert_eq!(record.get("ok"), Some(&FieldValue::Bool(true)));
        assert_eq!(record.get("none"), Some(&FieldValue::Null));
        assert!(record.get("missing").is_none());
    }

    #[test]
    fn with_field_builds_records() {
        let record = Record::new(10).with_field("a", "x").with_field("b", 2_i64);
        assert_eq!(record.fields.len(), 2);
        assert_eq!(record.get("b"), Some(&FieldValue::Integer(2)));
    }
}
