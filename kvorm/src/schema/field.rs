use crate::schema::value::{Value, DATETIME_PATTERN};
use crate::AppError;
use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

/// Closed set of field types, each with its own coerce/serialize/deserialize contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Bool,
    Char,
    Datetime { auto_now_add: bool, auto_now: bool },
    List,
    Json,
    /// Primary key of a record in the `target` namespace.
    Foreign { target: String },
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Integer => "integer",
            FieldKind::Bool => "bool",
            FieldKind::Char => "char",
            FieldKind::Datetime { .. } => "datetime",
            FieldKind::List => "list",
            FieldKind::Json => "json",
            FieldKind::Foreign { .. } => "foreign",
        }
    }

    pub fn empty_value(&self) -> Value {
        match self {
            FieldKind::Integer => Value::Integer(0),
            FieldKind::Bool => Value::Bool(false),
            FieldKind::Char => Value::Char(String::new()),
            FieldKind::Datetime { .. } | FieldKind::Foreign { .. } => Value::Null,
            FieldKind::List => Value::List(Vec::new()),
            FieldKind::Json => Value::Json(Default::default()),
        }
    }

    /// Validates caller input and normalises it to this kind's variant.
    pub fn coerce(&self, value: Value) -> Result<Value, AppError> {
        let rejected = |v: &Value| AppError::invalid(format!("{} should be {}", v, self.name()));
        match (self, value) {
            (FieldKind::Integer, Value::Integer(i)) => Ok(Value::Integer(i)),
            (FieldKind::Integer, Value::Char(s)) => s.trim().parse::<i64>().map(Value::Integer).map_err(|_| rejected(&Value::Char(s))),

            (FieldKind::Bool, Value::Bool(b)) => Ok(Value::Bool(b)),
            (FieldKind::Bool, Value::Integer(0)) => Ok(Value::Bool(false)),
            (FieldKind::Bool, Value::Integer(1)) => Ok(Value::Bool(true)),
            (FieldKind::Bool, Value::Char(s)) => parse_bool(&s).map(Value::Bool).ok_or_else(|| rejected(&Value::Char(s))),

            (FieldKind::Char, Value::Null) => Err(rejected(&Value::Null)),
            (FieldKind::Char, Value::Char(s)) => Ok(Value::Char(s)),
            (FieldKind::Char, other) => Ok(Value::Char(other.to_string())),

            (FieldKind::Datetime { .. }, Value::Null) => Ok(Value::Null),
            (FieldKind::Datetime { .. }, Value::Datetime(dt)) => Ok(Value::Datetime(dt)),
            (FieldKind::Datetime { .. }, Value::Char(s)) if s.is_empty() => Ok(Value::Null),
            (FieldKind::Datetime { .. }, Value::Char(s)) => parse_datetime(&s).map(Value::Datetime).ok_or_else(|| rejected(&Value::Char(s))),

            (FieldKind::List, Value::List(list)) => Ok(Value::List(list)),
            (FieldKind::List, Value::Char(s)) => match serde_json::from_str::<JsonValue>(&s) {
                Ok(JsonValue::Array(list)) => Ok(Value::List(list)),
                _ => Err(rejected(&Value::Char(s))),
            },

            (FieldKind::Json, Value::Json(map)) => Ok(Value::Json(map)),
            (FieldKind::Json, Value::Char(s)) => match serde_json::from_str::<JsonValue>(&s) {
                Ok(JsonValue::Object(map)) => Ok(Value::Json(map)),
                _ => Err(rejected(&Value::Char(s))),
            },

            (FieldKind::Foreign { .. }, Value::Null) => Ok(Value::Null),
            (FieldKind::Foreign { .. }, Value::Integer(i)) => Ok(Value::Char(i.to_string())),
            (FieldKind::Foreign { .. }, Value::Char(s)) if !s.is_empty() => Ok(Value::Char(s)),

            (_, other) => Err(rejected(&other)),
        }
    }

    pub fn serialize(&self, value: &Value) -> Option<String> {
        value.serialize()
    }

    /// Inverse of [`FieldKind::serialize`] for strings read back from the store.
    pub fn deserialize(&self, raw: &str) -> Result<Value, AppError> {
        let rejected = || AppError::invalid(format!("{} should be dumped {}", raw, self.name()));
        match self {
            FieldKind::Integer => raw.parse::<i64>().map(Value::Integer).map_err(|_| rejected()),
            FieldKind::Bool => parse_bool(raw).map(Value::Bool).ok_or_else(rejected),
            FieldKind::Char | FieldKind::Foreign { .. } => Ok(Value::Char(raw.to_string())),
            FieldKind::Datetime { .. } if raw.is_empty() => Ok(Value::Null),
            FieldKind::Datetime { .. } => parse_datetime(raw).map(Value::Datetime).ok_or_else(rejected),
            FieldKind::List => match serde_json::from_str::<JsonValue>(raw) {
                Ok(JsonValue::Array(list)) => Ok(Value::List(list)),
                _ => Err(rejected()),
            },
            FieldKind::Json => match serde_json::from_str::<JsonValue>(raw) {
                Ok(JsonValue::Object(map)) => Ok(Value::Json(map)),
                _ => Err(rejected()),
            },
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "true" | "True" => Some(true),
        "0" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_PATTERN).ok()
}

/// Declaration of one field, gathered into a [`crate::schema::Schema`].
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    pub primary: bool,
    pub unique: bool,
    pub required: bool,
    pub default: Option<Value>,
    /// Index tuples this field takes part in, filled when the schema is built.
    pub indexes: Vec<Vec<String>>,
}

impl FieldDef {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self { name: name.to_string(), kind, primary: false, unique: false, required: false, default: None, indexes: Vec::new() }
    }

    pub fn integer(name: &str) -> Self { Self::new(name, FieldKind::Integer) }
    pub fn boolean(name: &str) -> Self { Self::new(name, FieldKind::Bool) }
    pub fn char(name: &str) -> Self { Self::new(name, FieldKind::Char) }
    pub fn datetime(name: &str) -> Self { Self::new(name, FieldKind::Datetime { auto_now_add: false, auto_now: false }) }
    pub fn list(name: &str) -> Self { Self::new(name, FieldKind::List) }
    pub fn json(name: &str) -> Self { Self::new(name, FieldKind::Json) }
    pub fn foreign(name: &str, target: &str) -> Self { Self::new(name, FieldKind::Foreign { target: target.to_string() }) }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Stamp on first save. Only meaningful for datetime fields.
    pub fn auto_now_add(mut self) -> Self {
        if let FieldKind::Datetime { auto_now_add, .. } = &mut self.kind {
            *auto_now_add = true;
        }
        self
    }

    /// Stamp on every save. Only meaningful for datetime fields.
    pub fn auto_now(mut self) -> Self {
        if let FieldKind::Datetime { auto_now, .. } = &mut self.kind {
            *auto_now = true;
        }
        self
    }

    pub fn foreign_target(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Foreign { target } => Some(target.as_str()),
            _ => None,
        }
    }

    /// Value a fresh record starts with when the caller supplies none.
    pub fn initial_value(&self) -> Value {
        self.default.clone().unwrap_or_else(|| self.kind.empty_value())
    }
}
