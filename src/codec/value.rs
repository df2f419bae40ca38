/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The heterogeneous value graph that the codec serializes.
//!
//! A [Value] is a passive description of a state graph: primitives, the fixed
//! [pair](Value::Pair) and [triplet](Value::Triplet) composites used by the tree walk, ordered
//! heterogeneous lists and maps, enumerated values, single-rank arrays, type descriptors, values
//! carried as their string representation, and opaque byte payloads for everything else.
//!
//! Opaque payloads are produced and consumed with [borsh] by the caller; the codec treats them as
//! black boxes (see [Value::opaque_from] and [Value::opaque_into]).

use borsh::{BorshDeserialize, BorshSerialize};
use std::fmt::{self, Display, Formatter};

use super::CodecError;

/// Name of a value's logical type, written to the stream so that the reader can reconstruct
/// enumerated values, array elements, and string-converted values. Descriptors are deduplicated
/// by the codec's write-side cache.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeDescriptor(String);

impl TypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Display for TypeDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A value encodable by the codec. `Null` stands for "absent" and is written as a bare `0` tag
/// with no payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    U8(u8),
    I16(i16),
    I32(i32),
    I64(i64),
    Char(char),
    String(String),
    Pair(Box<Value>, Box<Value>),
    Triplet(Box<Value>, Box<Value>, Box<Value>),
    List(Vec<Value>),
    /// Insertion-ordered key/value entries. Keys and values are arbitrary values.
    Map(Vec<(Value, Value)>),
    Enum {
        ty: TypeDescriptor,
        discriminant: i64,
    },
    Type(TypeDescriptor),
    /// Single-rank array of homogeneously-typed elements. Arrays of `u8`/`i32`/`i64` elements
    /// take a packed fast path on the wire; everything else is written element by element.
    Array {
        elem: TypeDescriptor,
        items: Vec<Value>,
    },
    /// A value carried as its canonical string representation, reconstructible from it.
    Converted {
        ty: TypeDescriptor,
        repr: String,
    },
    Opaque(Vec<u8>),
}

/// Discriminant of a [Value], used as the dispatch key of the formatter registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    U8,
    I16,
    I32,
    I64,
    Char,
    Str,
    Pair,
    Triplet,
    List,
    Map,
    Enum,
    Type,
    Array,
    Converted,
    Opaque,
}

impl Value {
    /// The dispatch kind of this value, or `None` for `Null` (which short-circuits before
    /// formatter dispatch).
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(ValueKind::Bool),
            Value::U8(_) => Some(ValueKind::U8),
            Value::I16(_) => Some(ValueKind::I16),
            Value::I32(_) => Some(ValueKind::I32),
            Value::I64(_) => Some(ValueKind::I64),
            Value::Char(_) => Some(ValueKind::Char),
            Value::String(_) => Some(ValueKind::Str),
            Value::Pair(_, _) => Some(ValueKind::Pair),
            Value::Triplet(_, _, _) => Some(ValueKind::Triplet),
            Value::List(_) => Some(ValueKind::List),
            Value::Map(_) => Some(ValueKind::Map),
            Value::Enum { .. } => Some(ValueKind::Enum),
            Value::Type(_) => Some(ValueKind::Type),
            Value::Array { .. } => Some(ValueKind::Array),
            Value::Converted { .. } => Some(ValueKind::Converted),
            Value::Opaque(_) => Some(ValueKind::Opaque),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn pair(first: Value, second: Value) -> Value {
        Value::Pair(Box::new(first), Box::new(second))
    }

    pub fn triplet(first: Value, second: Value, third: Value) -> Value {
        Value::Triplet(Box::new(first), Box::new(second), Box::new(third))
    }

    /// Wrap a borsh-serializable value as an opaque payload.
    pub fn opaque_from<T: BorshSerialize>(value: &T) -> Result<Value, CodecError> {
        Ok(Value::Opaque(value.try_to_vec().map_err(|source| {
            CodecError::OpaquePayload { source }
        })?))
    }

    /// Recover a borsh-deserializable value from an opaque payload. Fails if the value is not
    /// opaque or the payload does not parse.
    pub fn opaque_into<T: BorshDeserialize>(&self) -> Result<T, CodecError> {
        match self {
            Value::Opaque(bytes) => {
                T::try_from_slice(bytes).map_err(|source| CodecError::OpaquePayload { source })
            }
            _ => Err(CodecError::UnsupportedValue {
                context: "opaque_into on a non-opaque value",
            }),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Bool(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Value {
        Value::U8(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Value {
        Value::I16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Value {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::I64(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Value {
        Value::Char(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::String(v)
    }
}
