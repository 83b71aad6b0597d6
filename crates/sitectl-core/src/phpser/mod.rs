//! Codec for the application's serialized-structure text format.
//!
//! Byte oriented: string lengths are byte counts and string payloads are
//! kept as raw bytes, so non-UTF-8 content survives a decode/encode cycle.
//! Floats keep their original text for the same reason.

mod decode;
mod encode;

pub use decode::{decode, try_decode, DecodeError, MAX_DEPTH};
pub use encode::{encode, encode_into};

/// Key of an array or object member.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Int(i64),
    Str(Vec<u8>),
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Int(i) => write!(f, "{i}"),
            Key::Str(s) => f.write_str(&String::from_utf8_lossy(s)),
        }
    }
}

/// A decoded value.
///
/// Scalars (`Null`, `Bool`, `Int`, `Float`, `Str`), mappings (`Array`,
/// `Object`) and opaque payloads the codec carries through untouched
/// (`Custom`, `Enum`, references).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    /// Original decimal text, e.g. `0.1`, `1.0E+25`, `INF`.
    Float(String),
    Str(Vec<u8>),
    Array(Vec<(Key, Value)>),
    Object {
        class: Vec<u8>,
        members: Vec<(Key, Value)>,
    },
    /// `C:` custom-serialized object; payload is opaque.
    Custom {
        class: Vec<u8>,
        payload: Vec<u8>,
    },
    /// `E:` enum case, `Class:Case`.
    Enum(Vec<u8>),
    /// `r:` value reference.
    Ref(i64),
    /// `R:` strong reference.
    StrongRef(i64),
}

impl Value {
    /// Arrays and objects; the shapes a rewrite descends into.
    pub fn is_mapping(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object { .. })
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Str(b) => Some(b),
            _ => None,
        }
    }

    /// Build a list-shaped array (`0..n` integer keys).
    pub fn list<I>(items: I) -> Value
    where
        I: IntoIterator<Item = Value>,
    {
        Value::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (Key::Int(i as i64), v))
                .collect(),
        )
    }

    /// Member values of an array or object, in order.
    pub fn members(&self) -> Option<&[(Key, Value)]> {
        match self {
            Value::Array(m) | Value::Object { members: m, .. } => Some(m),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.as_bytes().to_vec())
    }
}
