use chrono::NaiveDateTime;
use serde_json::{Map, Value as JsonValue};
use std::fmt;

pub const DATETIME_PATTERN: &str = "%Y-%m-%d %H:%M:%S";

/// Typed value of one field. `Null` only ever survives coercion for datetimes
/// and unassigned foreign keys.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Bool(bool),
    Char(String),
    Datetime(NaiveDateTime),
    List(Vec<JsonValue>),
    Json(Map<String, JsonValue>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Char(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&NaiveDateTime> {
        match self {
            Value::Datetime(dt) => Some(dt),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<JsonValue>> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Map<String, JsonValue>> {
        match self {
            Value::Json(map) => Some(map),
            _ => None,
        }
    }

    /// Storage form. `None` means the field is not written at all.
    pub fn serialize(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Integer(i) => Some(i.to_string()),
            Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            Value::Char(s) => Some(s.clone()),
            Value::Datetime(dt) => Some(dt.format(DATETIME_PATTERN).to_string()),
            Value::List(list) => Some(JsonValue::Array(list.clone()).to_string()),
            Value::Json(map) => Some(JsonValue::Object(map.clone()).to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.serialize() {
            Some(s) => f.write_str(&s),
            None => f.write_str("null"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self { Value::Integer(v) }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self { Value::Integer(v as i64) }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self { Value::Integer(v as i64) }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self { Value::Bool(v) }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self { Value::Char(v.to_string()) }
}

impl From<String> for Value {
    fn from(v: String) -> Self { Value::Char(v) }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self { Value::Datetime(v) }
}

impl From<Vec<JsonValue>> for Value {
    fn from(v: Vec<JsonValue>) -> Self { Value::List(v) }
}

impl From<Map<String, JsonValue>> for Value {
    fn from(v: Map<String, JsonValue>) -> Self { Value::Json(v) }
}

impl From<JsonValue> for Value {
    fn from(v: JsonValue) -> Self {
        match v {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Char(n.to_string()),
            },
            JsonValue::String(s) => Value::Char(s),
            JsonValue::Array(list) => Value::List(list),
            JsonValue::Object(map) => Value::Json(map),
        }
    }
}

#[cfg(all(test, not(feature = "integration")))]
mod value_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn storage_forms() {
        assert_eq!(Value::from(42).serialize().as_deref(), Some("42"));
        assert_eq!(Value::from(true).serialize().as_deref(), Some("1"));
        assert_eq!(Value::from(false).serialize().as_deref(), Some("0"));
        assert_eq!(Value::from("abc").serialize().as_deref(), Some("abc"));
        assert_eq!(Value::Null.serialize(), None);
        assert_eq!(Value::from(json!([1, "a"])).serialize().as_deref(), Some("[1,\"a\"]"));
        assert_eq!(Value::from(json!({"test": 5})).serialize().as_deref(), Some("{\"test\":5}"));
        let dt = NaiveDateTime::parse_from_str("2024-01-02 03:04:05", DATETIME_PATTERN).unwrap();
        assert_eq!(Value::from(dt).serialize().as_deref(), Some("2024-01-02 03:04:05"));
    }

    #[test]
    fn json_values_map_to_variants() {
        assert_eq!(Value::from(json!(null)), Value::Null);
        assert_eq!(Value::from(json!(7)), Value::Integer(7));
        assert_eq!(Value::from(json!("x")), Value::Char("x".into()));
        assert!(Value::from(json!({"a": 1})).as_json().is_some());
        assert!(Value::from(json!([1])).as_list().is_some());
    }
}
