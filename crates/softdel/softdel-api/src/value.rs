use std::fmt;

use serde::{Deserialize, Serialize};

/// A generic wrapper enum to hold any column value.
///
/// Timestamps are expressed as milliseconds since the UNIX epoch.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Value {
    Boolean(bool),
    Int64(i64),
    Null,
    Text(String),
    Timestamp(u64),
    Uint64(u64),
}

impl Value {
    /// Returns whether the value is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the inner text, if the value is a [`Value::Text`].
    pub fn as_text(&self) -> Option<&str> {
        if let Value::Text(text) = self {
            Some(text)
        } else {
            None
        }
    }

    /// Returns the inner timestamp, if the value is a [`Value::Timestamp`].
    pub fn as_timestamp(&self) -> Option<u64> {
        if let Value::Timestamp(ts) = self {
            Some(*ts)
        } else {
            None
        }
    }

    /// Returns the inner unsigned integer, if the value is a [`Value::Uint64`].
    pub fn as_uint64(&self) -> Option<u64> {
        if let Value::Uint64(v) = self {
            Some(*v)
        } else {
            None
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Null => write!(f, "NULL"),
            Value::Text(v) => write!(f, "'{v}'"),
            Value::Timestamp(v) => write!(f, "@{v}"),
            Value::Uint64(v) => write!(f, "{v}"),
        }
    }
}

// macro rules for implementing From trait for Value enum variants
macro_rules! value_from_primitive {
    ($variant:ident, $primitive:ty) => {
        impl From<$primitive> for Value {
            fn from(value: $primitive) -> Self {
                Value::$variant(value.into())
            }
        }
    };
}

value_from_primitive!(Boolean, bool);
value_from_primitive!(Int64, i64);
value_from_primitive!(Int64, i32);
value_from_primitive!(Text, String);
value_from_primitive!(Text, &str);
value_from_primitive!(Uint64, u64);
value_from_primitive!(Uint64, u32);

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}
