use crate::buffer::PersistentArrayBuffer;
use crate::core::Handle;
use crate::object::PersistentObject;
use crate::storage::SharedEngine;
use serde::{Deserialize, Serialize};

/// A value as seen by callers of the pool and the wrappers.
///
/// `Map` and `List` are transient literals: writing one deep-copies it into
/// persistent representation. `Object` is a live reference and aliases the
/// persistent data it wraps; assigning it never copies. `Buffer` references
/// cannot be stored inside objects or the root and are rejected with
/// "unsupported type".
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Object(PersistentObject),
    Buffer(PersistentArrayBuffer),
    Map(Vec<(String, Value)>),
    List(Vec<Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::Str(_) => "string",
            Self::Object(_) => "object",
            Self::Buffer(_) => "buffer",
            Self::Map(_) => "map",
            Self::List(_) => "list",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&PersistentObject> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Lower into the engine-facing representation, unwrapping live
    /// references to their raw handles.
    pub(crate) fn into_raw(self) -> RawValue {
        match self {
            Value::None => RawValue::None,
            Value::Int(i) => RawValue::Int(i),
            Value::Float(f) => RawValue::Float(f),
            Value::Bool(b) => RawValue::Bool(b),
            Value::Str(s) => RawValue::Str(s),
            Value::Object(object) => RawValue::Ref(object.handle()),
            Value::Buffer(buffer) => RawValue::Ref(buffer.handle()),
            Value::Map(entries) => RawValue::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, value.into_raw()))
                    .collect(),
            ),
            Value::List(items) => {
                RawValue::List(items.into_iter().map(Value::into_raw).collect())
            }
        }
    }

    /// Lift an engine value, wrapping every raw handle in a fresh
    /// `PersistentObject`. Wrappers are never reused between reads.
    pub(crate) fn from_raw(raw: RawValue, engine: &SharedEngine) -> Value {
        match raw {
            RawValue::None => Value::None,
            RawValue::Int(i) => Value::Int(i),
            RawValue::Float(f) => Value::Float(f),
            RawValue::Bool(b) => Value::Bool(b),
            RawValue::Str(s) => Value::Str(s),
            RawValue::Ref(handle) => {
                Value::Object(PersistentObject::new(engine.clone(), handle))
            }
            RawValue::Map(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Value::from_raw(value, engine)))
                    .collect(),
            ),
            RawValue::List(items) => Value::List(
                items
                    .into_iter()
                    .map(|item| Value::from_raw(item, engine))
                    .collect(),
            ),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// The engine-facing value representation.
///
/// Reads only ever produce scalars or `Ref`; `Map`/`List` appear on the
/// write path as deep-copy input that the engine materializes into handles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawValue {
    None,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Ref(Handle),
    Map(Vec<(String, RawValue)>),
    List(Vec<RawValue>),
}
