//! Serialization probe
//!
//! Decides whether a value survives the structured-clone boundary between contexts and,
//! when it does, produces the copy that will travel. Classification is a normal outcome,
//! not an error: unclonable entries simply stay in the context that owns them.

use crate::value::{ErrorValue, Value};
use serde::{Deserialize, Serialize};

/// Error constructors a native structured clone preserves by name.
const CLONABLE_ERROR_NAMES: &[&str] = &[
    "Error",
    "EvalError",
    "RangeError",
    "ReferenceError",
    "SyntaxError",
    "TypeError",
    "URIError",
];

/// Which structured-clone implementation backs the probe.
///
/// The two disagree on `Error` values: a native clone may accept them (host dependent),
/// the ponyfill never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloneBackend {
    Native,
    Ponyfill,
}

impl Default for CloneBackend {
    fn default() -> Self {
        CloneBackend::Native
    }
}

/// Why a value was left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnclonableReason {
    Function,
    HostHandle,
    Error,
}

impl UnclonableReason {
    pub fn as_str(self) -> &'static str {
        match self {
            UnclonableReason::Function => "function",
            UnclonableReason::HostHandle => "host_handle",
            UnclonableReason::Error => "error",
        }
    }
}

/// Outcome of probing one value.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Clonable(Value),
    Unclonable(UnclonableReason),
}

impl Classification {
    pub fn is_clonable(&self) -> bool {
        matches!(self, Classification::Clonable(_))
    }
}

/// Total classifier over [`Value`].
#[derive(Debug, Clone, Copy)]
pub struct SerializationProbe {
    backend: CloneBackend,
    native_clones_errors: bool,
}

impl Default for SerializationProbe {
    fn default() -> Self {
        Self::native(true)
    }
}

impl SerializationProbe {
    pub fn new(backend: CloneBackend, native_clones_errors: bool) -> Self {
        Self {
            backend,
            native_clones_errors,
        }
    }

    /// Native structured clone. `clones_errors` reflects the host engine
    /// (Chromium-family engines clone errors, Firefox does not).
    pub fn native(clones_errors: bool) -> Self {
        Self::new(CloneBackend::Native, clones_errors)
    }

    pub fn ponyfill() -> Self {
        Self::new(CloneBackend::Ponyfill, false)
    }

    pub fn backend(&self) -> CloneBackend {
        self.backend
    }

    /// Classify a value. Never mutates the input; the copy shares nothing with it.
    pub fn classify(&self, value: &Value) -> Classification {
        match self.try_clone(value) {
            Ok(copy) => Classification::Clonable(copy),
            Err(reason) => Classification::Unclonable(reason),
        }
    }

    pub fn is_clonable(&self, value: &Value) -> bool {
        self.classify(value).is_clonable()
    }

    fn try_clone(&self, value: &Value) -> Result<Value, UnclonableReason> {
        Ok(match value {
            Value::Undefined => Value::Undefined,
            Value::Null => Value::Null,
            Value::Bool(b) => Value::Bool(*b),
            Value::Number(n) => Value::Number(*n),
            Value::String(s) => Value::String(s.clone()),
            Value::Date(ms) => Value::Date(*ms),
            Value::RegExp { source, flags } => Value::RegExp {
                source: source.clone(),
                flags: flags.clone(),
            },
            Value::Bytes(bytes) => Value::Bytes(bytes.clone()),
            Value::Array(items) => Value::Array(self.clone_all(items)?),
            Value::Set(items) => Value::Set(self.clone_all(items)?),
            Value::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), self.try_clone(v)?)))
                    .collect::<Result<_, UnclonableReason>>()?,
            ),
            Value::Map(pairs) => Value::Map(
                pairs
                    .iter()
                    .map(|(k, v)| Ok((self.try_clone(k)?, self.try_clone(v)?)))
                    .collect::<Result<_, UnclonableReason>>()?,
            ),
            Value::Error(err) => self.clone_error(err)?,
            Value::Function(_) => return Err(UnclonableReason::Function),
            Value::Handle(_) => return Err(UnclonableReason::HostHandle),
        })
    }

    fn clone_all(&self, items: &[Value]) -> Result<Vec<Value>, UnclonableReason> {
        items.iter().map(|item| self.try_clone(item)).collect()
    }

    fn clone_error(&self, err: &ErrorValue) -> Result<Value, UnclonableReason> {
        match self.backend {
            // A native clone would rename other errors to `Error`, so they stay behind.
            CloneBackend::Native
                if self.native_clones_errors
                    && CLONABLE_ERROR_NAMES.contains(&err.name.as_str()) =>
            {
                Ok(Value::Error(err.clone()))
            }
            _ => Err(UnclonableReason::Error),
        }
    }
}
