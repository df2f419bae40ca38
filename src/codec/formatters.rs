/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The value formatters and their registry.
//!
//! Every encodable value kind has exactly one registered [ValueFormatter]. Formatters are handed
//! one to three sequential one-byte tags at registry construction; construction happens once,
//! unconditionally, and in a fixed order, so the tag space is stable for the lifetime of the
//! process. Tag `0` is reserved for "absent" and never assigned.
//!
//! The registry is an explicit immutable value ([FormatterRegistry::standard]) passed by
//! reference into codec contexts; there is no process-global mutable registration.

use borsh::{BorshDeserialize, BorshSerialize};
use std::collections::HashMap;

use super::context::CacheEntry;
use super::value::{TypeDescriptor, Value, ValueKind};
use super::{CodecError, Decoder, Encoder};

/// The one-byte wire tags assigned to a formatter. `0` marks an unassigned slot.
#[derive(Clone, Copy)]
pub(crate) struct Tags {
    pub(crate) primary: u8,
    pub(crate) secondary: u8,
}

pub(crate) trait ValueFormatter: Send + Sync {
    fn kind(&self) -> ValueKind;

    /// How many sequential tags this formatter claims (1 or 2).
    fn tag_count(&self) -> u8 {
        1
    }

    fn write(&self, tags: Tags, value: &Value, enc: &mut Encoder) -> Result<(), CodecError>;

    fn read(&self, tags: Tags, tag: u8, dec: &mut Decoder) -> Result<Value, CodecError>;
}

struct RegisteredFormatter {
    tags: Tags,
    formatter: Box<dyn ValueFormatter>,
}

/// Immutable table mapping value kinds to formatters on the write side and tag bytes to
/// formatters on the read side.
pub struct FormatterRegistry {
    formatters: Vec<RegisteredFormatter>,
    by_kind: HashMap<ValueKind, usize>,
    by_tag: [Option<u8>; 256],
}

impl FormatterRegistry {
    /// Build the standard registry. Registration order is fixed; it determines tag assignment
    /// and therefore wire compatibility within one process lifetime.
    pub fn standard() -> FormatterRegistry {
        let mut registry = FormatterRegistry {
            formatters: Vec::new(),
            by_kind: HashMap::new(),
            by_tag: [None; 256],
        };
        let mut next_tag: u8 = 1;
        registry.register(&mut next_tag, Box::new(StringFormatter));
        registry.register(&mut next_tag, Box::new(I64Formatter));
        registry.register(&mut next_tag, Box::new(I32Formatter));
        registry.register(&mut next_tag, Box::new(I16Formatter));
        registry.register(&mut next_tag, Box::new(U8Formatter));
        registry.register(&mut next_tag, Box::new(BoolFormatter));
        registry.register(&mut next_tag, Box::new(CharFormatter));
        registry.register(&mut next_tag, Box::new(PairFormatter));
        registry.register(&mut next_tag, Box::new(TripletFormatter));
        registry.register(&mut next_tag, Box::new(ListFormatter));
        registry.register(&mut next_tag, Box::new(MapFormatter));
        registry.register(&mut next_tag, Box::new(EnumFormatter));
        registry.register(&mut next_tag, Box::new(TypeFormatter));
        registry.register(&mut next_tag, Box::new(ArrayFormatter));
        registry.register(&mut next_tag, Box::new(ConvertedFormatter));
        registry.register(&mut next_tag, Box::new(OpaqueFormatter));
        registry
    }

    fn register(&mut self, next_tag: &mut u8, formatter: Box<dyn ValueFormatter>) {
        let primary = *next_tag;
        *next_tag += 1;
        let secondary = if formatter.tag_count() == 2 {
            let tag = *next_tag;
            *next_tag += 1;
            tag
        } else {
            0
        };
        let index = self.formatters.len();
        self.by_kind.insert(formatter.kind(), index);
        self.by_tag[primary as usize] = Some(index as u8);
        if secondary != 0 {
            self.by_tag[secondary as usize] = Some(index as u8);
        }
        self.formatters.push(RegisteredFormatter {
            tags: Tags { primary, secondary },
            formatter,
        });
    }

    pub(crate) fn for_kind(&self, kind: ValueKind) -> Option<(Tags, &dyn ValueFormatter)> {
        let index = *self.by_kind.get(&kind)?;
        let slot = &self.formatters[index];
        Some((slot.tags, slot.formatter.as_ref()))
    }

    pub(crate) fn for_tag(&self, tag: u8) -> Option<(Tags, &dyn ValueFormatter)> {
        let index = self.by_tag[tag as usize]? as usize;
        let slot = &self.formatters[index];
        Some((slot.tags, slot.formatter.as_ref()))
    }
}

fn wrong_value(context: &'static str) -> CodecError {
    CodecError::UnsupportedValue { context }
}

/* ↓↓↓ Strings and type descriptors (deduplicated) ↓↓↓ */

struct StringFormatter;

impl ValueFormatter for StringFormatter {
    fn kind(&self) -> ValueKind {
        ValueKind::Str
    }

    fn tag_count(&self) -> u8 {
        2
    }

    fn write(&self, tags: Tags, value: &Value, enc: &mut Encoder) -> Result<(), CodecError> {
        let s = match value {
            Value::String(s) => s,
            _ => return Err(wrong_value("string formatter on a non-string")),
        };
        match enc.cache.register(CacheEntry::Str(s.clone())) {
            Some(key) => {
                enc.out.write_u8(tags.secondary);
                enc.out.write_u16_le(key);
            }
            None => {
                enc.out.write_u8(tags.primary);
                enc.out.write_string(s);
            }
        }
        Ok(())
    }

    fn read(&self, tags: Tags, tag: u8, dec: &mut Decoder) -> Result<Value, CodecError> {
        if tag == tags.primary {
            let s = dec.reader.read_string()?;
            dec.cache.cache(CacheEntry::Str(s.clone()));
            Ok(Value::String(s))
        } else {
            let key = dec.reader.read_u16_le()?;
            Ok(Value::String(dec.cache.get_str(key)?.to_string()))
        }
    }
}

struct TypeFormatter;

impl ValueFormatter for TypeFormatter {
    fn kind(&self) -> ValueKind {
        ValueKind::Type
    }

    fn tag_count(&self) -> u8 {
        2
    }

    fn write(&self, tags: Tags, value: &Value, enc: &mut Encoder) -> Result<(), CodecError> {
        let ty = match value {
            Value::Type(ty) => ty,
            _ => return Err(wrong_value("type formatter on a non-type")),
        };
        match enc.cache.register(CacheEntry::Type(ty.clone())) {
            Some(key) => {
                enc.out.write_u8(tags.secondary);
                enc.out.write_u16_le(key);
            }
            None => {
                enc.out.write_u8(tags.primary);
                enc.out.write_string(ty.name());
            }
        }
        Ok(())
    }

    fn read(&self, tags: Tags, tag: u8, dec: &mut Decoder) -> Result<Value, CodecError> {
        if tag == tags.primary {
            let ty = TypeDescriptor::new(dec.reader.read_string()?);
            dec.cache.cache(CacheEntry::Type(ty.clone()));
            Ok(Value::Type(ty))
        } else {
            let key = dec.reader.read_u16_le()?;
            Ok(Value::Type(dec.cache.get_type(key)?.clone()))
        }
    }
}

/* ↓↓↓ Integers ↓↓↓ */

struct I64Formatter;

impl ValueFormatter for I64Formatter {
    fn kind(&self) -> ValueKind {
        ValueKind::I64
    }

    fn write(&self, tags: Tags, value: &Value, enc: &mut Encoder) -> Result<(), CodecError> {
        match value {
            Value::I64(v) => {
                enc.out.write_u8(tags.primary);
                enc.out.write_i64_le(*v);
                Ok(())
            }
            _ => Err(wrong_value("i64 formatter on a non-i64")),
        }
    }

    fn read(&self, _tags: Tags, _tag: u8, dec: &mut Decoder) -> Result<Value, CodecError> {
        Ok(Value::I64(dec.reader.read_i64_le()?))
    }
}

struct I32Formatter;

impl ValueFormatter for I32Formatter {
    fn kind(&self) -> ValueKind {
        ValueKind::I32
    }

    fn tag_count(&self) -> u8 {
        2
    }

    fn write(&self, tags: Tags, value: &Value, enc: &mut Encoder) -> Result<(), CodecError> {
        let v = match value {
            Value::I32(v) => *v,
            _ => return Err(wrong_value("i32 formatter on a non-i32")),
        };
        // Byte-narrowing fast path: values that survive a round trip through u8.
        if v as u8 as i32 == v {
            enc.out.write_u8(tags.secondary);
            enc.out.write_u8(v as u8);
        } else {
            enc.out.write_u8(tags.primary);
            enc.out.write_i32_le(v);
        }
        Ok(())
    }

    fn read(&self, tags: Tags, tag: u8, dec: &mut Decoder) -> Result<Value, CodecError> {
        if tag == tags.primary {
            Ok(Value::I32(dec.reader.read_i32_le()?))
        } else {
            Ok(Value::I32(dec.reader.read_u8()? as i32))
        }
    }
}

struct I16Formatter;

impl ValueFormatter for I16Formatter {
    fn kind(&self) -> ValueKind {
        ValueKind::I16
    }

    fn write(&self, tags: Tags, value: &Value, enc: &mut Encoder) -> Result<(), CodecError> {
        match value {
            Value::I16(v) => {
                enc.out.write_u8(tags.primary);
                enc.out.write_i16_le(*v);
                Ok(())
            }
            _ => Err(wrong_value("i16 formatter on a non-i16")),
        }
    }

    fn read(&self, _tags: Tags, _tag: u8, dec: &mut Decoder) -> Result<Value, CodecError> {
        Ok(Value::I16(dec.reader.read_i16_le()?))
    }
}

struct U8Formatter;

impl ValueFormatter for U8Formatter {
    fn kind(&self) -> ValueKind {
        ValueKind::U8
    }

    fn write(&self, tags: Tags, value: &Value, enc: &mut Encoder) -> Result<(), CodecError> {
        match value {
            Value::U8(v) => {
                enc.out.write_u8(tags.primary);
                enc.out.write_u8(*v);
                Ok(())
            }
            _ => Err(wrong_value("u8 formatter on a non-u8")),
        }
    }

    fn read(&self, _tags: Tags, _tag: u8, dec: &mut Decoder) -> Result<Value, CodecError> {
        Ok(Value::U8(dec.reader.read_u8()?))
    }
}

/* ↓↓↓ Booleans and chars ↓↓↓ */

struct BoolFormatter;

impl ValueFormatter for BoolFormatter {
    fn kind(&self) -> ValueKind {
        ValueKind::Bool
    }

    fn tag_count(&self) -> u8 {
        2
    }

    // True and false are each a bare tag with no payload.
    fn write(&self, tags: Tags, value: &Value, enc: &mut Encoder) -> Result<(), CodecError> {
        match value {
            Value::Bool(true) => {
                enc.out.write_u8(tags.primary);
                Ok(())
            }
            Value::Bool(false) => {
                enc.out.write_u8(tags.secondary);
                Ok(())
            }
            _ => Err(wrong_value("bool formatter on a non-bool")),
        }
    }

    fn read(&self, tags: Tags, tag: u8, _dec: &mut Decoder) -> Result<Value, CodecError> {
        Ok(Value::Bool(tag == tags.primary))
    }
}

struct CharFormatter;

impl ValueFormatter for CharFormatter {
    fn kind(&self) -> ValueKind {
        ValueKind::Char
    }

    fn write(&self, tags: Tags, value: &Value, enc: &mut Encoder) -> Result<(), CodecError> {
        match value {
            Value::Char(c) => {
                enc.out.write_u8(tags.primary);
                enc.out.write_varint(*c as u64);
                Ok(())
            }
            _ => Err(wrong_value("char formatter on a non-char")),
        }
    }

    fn read(&self, _tags: Tags, _tag: u8, dec: &mut Decoder) -> Result<Value, CodecError> {
        let code = dec.reader.read_varint()?;
        let code = u32::try_from(code).map_err(|_| CodecError::MalformedPayload {
            context: "char scalar out of range",
        })?;
        char::from_u32(code)
            .map(Value::Char)
            .ok_or(CodecError::MalformedPayload {
                context: "char scalar is not a valid code point",
            })
    }
}

/* ↓↓↓ Compounds ↓↓↓ */

struct PairFormatter;

impl ValueFormatter for PairFormatter {
    fn kind(&self) -> ValueKind {
        ValueKind::Pair
    }

    fn write(&self, tags: Tags, value: &Value, enc: &mut Encoder) -> Result<(), CodecError> {
        match value {
            Value::Pair(first, second) => {
                enc.out.write_u8(tags.primary);
                enc.write_value(first)?;
                enc.write_value(second)
            }
            _ => Err(wrong_value("pair formatter on a non-pair")),
        }
    }

    fn read(&self, _tags: Tags, _tag: u8, dec: &mut Decoder) -> Result<Value, CodecError> {
        let first = dec.read_value()?;
        let second = dec.read_value()?;
        Ok(Value::pair(first, second))
    }
}

struct TripletFormatter;

impl ValueFormatter for TripletFormatter {
    fn kind(&self) -> ValueKind {
        ValueKind::Triplet
    }

    fn write(&self, tags: Tags, value: &Value, enc: &mut Encoder) -> Result<(), CodecError> {
        match value {
            Value::Triplet(first, second, third) => {
                enc.out.write_u8(tags.primary);
                enc.write_value(first)?;
                enc.write_value(second)?;
                enc.write_value(third)
            }
            _ => Err(wrong_value("triplet formatter on a non-triplet")),
        }
    }

    fn read(&self, _tags: Tags, _tag: u8, dec: &mut Decoder) -> Result<Value, CodecError> {
        let first = dec.read_value()?;
        let second = dec.read_value()?;
        let third = dec.read_value()?;
        Ok(Value::triplet(first, second, third))
    }
}

struct ListFormatter;

impl ValueFormatter for ListFormatter {
    fn kind(&self) -> ValueKind {
        ValueKind::List
    }

    fn write(&self, tags: Tags, value: &Value, enc: &mut Encoder) -> Result<(), CodecError> {
        match value {
            Value::List(items) => {
                enc.out.write_u8(tags.primary);
                enc.out.write_varint(items.len() as u64);
                for item in items {
                    enc.write_value(item)?;
                }
                Ok(())
            }
            _ => Err(wrong_value("list formatter on a non-list")),
        }
    }

    fn read(&self, _tags: Tags, _tag: u8, dec: &mut Decoder) -> Result<Value, CodecError> {
        let count = dec.reader.read_varint()? as usize;
        let mut items = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            items.push(dec.read_value()?);
        }
        Ok(Value::List(items))
    }
}

struct MapFormatter;

impl ValueFormatter for MapFormatter {
    fn kind(&self) -> ValueKind {
        ValueKind::Map
    }

    fn write(&self, tags: Tags, value: &Value, enc: &mut Encoder) -> Result<(), CodecError> {
        match value {
            Value::Map(entries) => {
                enc.out.write_u8(tags.primary);
                enc.out.write_varint(entries.len() as u64);
                for (key, val) in entries {
                    enc.write_value(key)?;
                    enc.write_value(val)?;
                }
                Ok(())
            }
            _ => Err(wrong_value("map formatter on a non-map")),
        }
    }

    fn read(&self, _tags: Tags, _tag: u8, dec: &mut Decoder) -> Result<Value, CodecError> {
        let count = dec.reader.read_varint()? as usize;
        let mut entries = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let key = dec.read_value()?;
            let val = dec.read_value()?;
            entries.push((key, val));
        }
        Ok(Value::Map(entries))
    }
}

/* ↓↓↓ Enumerations ↓↓↓ */

struct EnumFormatter;

impl ValueFormatter for EnumFormatter {
    fn kind(&self) -> ValueKind {
        ValueKind::Enum
    }

    fn write(&self, tags: Tags, value: &Value, enc: &mut Encoder) -> Result<(), CodecError> {
        match value {
            Value::Enum { ty, discriminant } => {
                enc.out.write_u8(tags.primary);
                enc.write_value(&Value::Type(ty.clone()))?;
                enc.write_value(&Value::I64(*discriminant))
            }
            _ => Err(wrong_value("enum formatter on a non-enum")),
        }
    }

    fn read(&self, _tags: Tags, _tag: u8, dec: &mut Decoder) -> Result<Value, CodecError> {
        let ty = match dec.read_value()? {
            Value::Type(ty) => ty,
            _ => {
                return Err(CodecError::MalformedPayload {
                    context: "enum record without a type descriptor",
                })
            }
        };
        let discriminant = match dec.read_value()? {
            Value::U8(v) => v as i64,
            Value::I16(v) => v as i64,
            Value::I32(v) => v as i64,
            Value::I64(v) => v,
            _ => {
                return Err(CodecError::MalformedPayload {
                    context: "enum record without an integral discriminant",
                })
            }
        };
        Ok(Value::Enum { ty, discriminant })
    }
}

/* ↓↓↓ Single-rank arrays ↓↓↓ */

struct ArrayFormatter;

impl ArrayFormatter {
    /// Packed representation for arrays of `u8`/`i32`/`i64` whose items all match the declared
    /// element type. `None` means "write element by element".
    fn packed(elem: &TypeDescriptor, items: &[Value]) -> Result<Option<Vec<u8>>, CodecError> {
        let bytes = match elem.name() {
            "u8" => {
                let mut v = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::U8(b) => v.push(*b),
                        _ => return Ok(None),
                    }
                }
                v.try_to_vec()
            }
            "i32" => {
                let mut v = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::I32(i) => v.push(*i),
                        _ => return Ok(None),
                    }
                }
                v.try_to_vec()
            }
            "i64" => {
                let mut v = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::I64(i) => v.push(*i),
                        _ => return Ok(None),
                    }
                }
                v.try_to_vec()
            }
            _ => return Ok(None),
        };
        bytes
            .map(Some)
            .map_err(|source| CodecError::OpaquePayload { source })
    }

    fn unpack(elem: &TypeDescriptor, bytes: &[u8]) -> Result<Vec<Value>, CodecError> {
        let items = match elem.name() {
            "u8" => Vec::<u8>::try_from_slice(bytes)
                .map_err(|source| CodecError::OpaquePayload { source })?
                .into_iter()
                .map(Value::U8)
                .collect(),
            "i32" => Vec::<i32>::try_from_slice(bytes)
                .map_err(|source| CodecError::OpaquePayload { source })?
                .into_iter()
                .map(Value::I32)
                .collect(),
            "i64" => Vec::<i64>::try_from_slice(bytes)
                .map_err(|source| CodecError::OpaquePayload { source })?
                .into_iter()
                .map(Value::I64)
                .collect(),
            _ => {
                return Err(CodecError::MalformedPayload {
                    context: "packed array with an unsupported element type",
                })
            }
        };
        Ok(items)
    }
}

impl ValueFormatter for ArrayFormatter {
    fn kind(&self) -> ValueKind {
        ValueKind::Array
    }

    fn tag_count(&self) -> u8 {
        2
    }

    fn write(&self, tags: Tags, value: &Value, enc: &mut Encoder) -> Result<(), CodecError> {
        let (elem, items) = match value {
            Value::Array { elem, items } => (elem, items),
            _ => return Err(wrong_value("array formatter on a non-array")),
        };
        if let Some(packed) = Self::packed(elem, items)? {
            enc.out.write_u8(tags.secondary);
            enc.write_value(&Value::Type(elem.clone()))?;
            enc.out.write_varint(packed.len() as u64);
            enc.out.write_bytes(&packed);
            return Ok(());
        }
        enc.out.write_u8(tags.primary);
        enc.write_value(&Value::Type(elem.clone()))?;
        enc.out.write_varint(items.len() as u64);
        for item in items {
            enc.write_value(item)?;
        }
        Ok(())
    }

    fn read(&self, tags: Tags, tag: u8, dec: &mut Decoder) -> Result<Value, CodecError> {
        let elem = match dec.read_value()? {
            Value::Type(ty) => ty,
            _ => {
                return Err(CodecError::MalformedPayload {
                    context: "array record without an element type descriptor",
                })
            }
        };
        if tag == tags.secondary {
            let len = dec.reader.read_varint()? as usize;
            let bytes = dec.reader.read_bytes(len)?;
            let items = Self::unpack(&elem, bytes)?;
            return Ok(Value::Array { elem, items });
        }
        let count = dec.reader.read_varint()? as usize;
        let mut items = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            items.push(dec.read_value()?);
        }
        Ok(Value::Array { elem, items })
    }
}

/* ↓↓↓ String-converted values ↓↓↓ */

struct ConvertedFormatter;

impl ValueFormatter for ConvertedFormatter {
    fn kind(&self) -> ValueKind {
        ValueKind::Converted
    }

    fn write(&self, tags: Tags, value: &Value, enc: &mut Encoder) -> Result<(), CodecError> {
        match value {
            Value::Converted { ty, repr } => {
                enc.out.write_u8(tags.primary);
                enc.write_value(&Value::Type(ty.clone()))?;
                // The representation goes through the string formatter so it participates in
                // deduplication.
                enc.write_value(&Value::String(repr.clone()))
            }
            _ => Err(wrong_value("converted formatter on a non-converted value")),
        }
    }

    fn read(&self, _tags: Tags, _tag: u8, dec: &mut Decoder) -> Result<Value, CodecError> {
        let ty = match dec.read_value()? {
            Value::Type(ty) => ty,
            _ => {
                return Err(CodecError::MalformedPayload {
                    context: "converted record without a type descriptor",
                })
            }
        };
        let repr = match dec.read_value()? {
            Value::String(s) => s,
            _ => {
                return Err(CodecError::MalformedPayload {
                    context: "converted record without a string representation",
                })
            }
        };
        Ok(Value::Converted { ty, repr })
    }
}

/* ↓↓↓ Opaque payloads ↓↓↓ */

struct OpaqueFormatter;

impl ValueFormatter for OpaqueFormatter {
    fn kind(&self) -> ValueKind {
        ValueKind::Opaque
    }

    fn write(&self, tags: Tags, value: &Value, enc: &mut Encoder) -> Result<(), CodecError> {
        match value {
            Value::Opaque(bytes) => {
                enc.out.write_u8(tags.primary);
                enc.out.write_varint(bytes.len() as u64);
                enc.out.write_bytes(bytes);
                Ok(())
            }
            _ => Err(wrong_value("opaque formatter on a non-opaque value")),
        }
    }

    fn read(&self, _tags: Tags, _tag: u8, dec: &mut Decoder) -> Result<Value, CodecError> {
        let len = dec.reader.read_varint()? as usize;
        Ok(Value::Opaque(dec.reader.read_bytes(len)?.to_vec()))
    }
}
