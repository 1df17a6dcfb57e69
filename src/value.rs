//! Store values
//!
//! A closed tagged union over everything a test script may put in `config` or `env`.
//! Structured values compare by content; opaque values (functions, host handles)
//! compare by identity, since they cannot leave the context that created them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A dynamically-typed store value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// Milliseconds since the Unix epoch.
    Date(f64),
    RegExp {
        source: String,
        flags: String,
    },
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    Map(Vec<(Value, Value)>),
    Set(Vec<Value>),
    Error(ErrorValue),
    // Opaque variants stay last so skipping them leaves wire variant indices unchanged.
    #[serde(skip)]
    Function(FunctionRef),
    #[serde(skip)]
    Handle(HostHandle),
}

/// An error object (`new Error(message)`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorValue {
    pub name: String,
    pub message: String,
}

impl ErrorValue {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Reference to a function living in one context.
#[derive(Clone)]
pub struct FunctionRef(Arc<OpaqueInner>);

/// Reference to an external host object, such as a DOM element.
#[derive(Clone)]
pub struct HostHandle(Arc<OpaqueInner>);

struct OpaqueInner {
    label: String,
}

impl FunctionRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Arc::new(OpaqueInner { label: name.into() }))
    }

    pub fn name(&self) -> &str {
        &self.0.label
    }

    /// Identity comparison; two functions with the same name are still different functions.
    pub fn ptr_eq(&self, other: &FunctionRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl HostHandle {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(Arc::new(OpaqueInner { label: kind.into() }))
    }

    pub fn kind(&self) -> &str {
        &self.0.label
    }

    pub fn ptr_eq(&self, other: &HostHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Function: {}]", self.name())
    }
}

impl fmt::Debug for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Handle: {}]", self.kind())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            // SameValueZero: NaN equals itself
            (Value::Number(a), Value::Number(b)) | (Value::Date(a), Value::Date(b)) => {
                a == b || (a.is_nan() && b.is_nan())
            }
            (Value::String(a), Value::String(b)) => a == b,
            (
                Value::RegExp { source, flags },
                Value::RegExp {
                    source: other_source,
                    flags: other_flags,
                },
            ) => source == other_source && flags == other_flags,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Array(a), Value::Array(b)) | (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Handle(a), Value::Handle(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Value {
    /// Build an object value from key/value pairs.
    pub fn object<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn function(name: impl Into<String>) -> Self {
        Value::Function(FunctionRef::new(name))
    }

    pub fn handle(kind: impl Into<String>) -> Self {
        Value::Handle(HostHandle::new(kind))
    }

    pub fn error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Value::Error(ErrorValue::new(name, message))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Property lookup on an object value (`value.field`).
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Object(fields) => fields.get(name),
            _ => None,
        }
    }

    /// Short type name used in log fields.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::RegExp { .. } => "regexp",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::Error(_) => "error",
            Value::Function(_) => "function",
            Value::Handle(_) => "handle",
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(value)
    }
}

/// Values loaded from configuration files arrive as JSON-like trees.
impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}
