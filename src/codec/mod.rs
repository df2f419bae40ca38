/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Compact, self-describing binary encoding of heterogeneous state graphs.
//!
//! Every record on the wire is one tag byte followed by a tag-specific payload; a `0` tag
//! denotes "absent" and has no payload. Repeated strings and type descriptors are deduplicated
//! within one pass through a 16-bit key cache (see [context]); counts use a 7-bit varint. A blob
//! starts with the fixed [STATE_STREAM_MAGIC] header.
//!
//! Decoding failures are fatal: an unrecognized tag, a truncated stream, or a bad magic header
//! rejects the whole blob, never individual values. Dedup-cache exhaustion on the write side is
//! not a failure; it degrades to writing values in full.

pub mod value;
pub use value::{TypeDescriptor, Value, ValueKind};

pub(crate) mod context;

pub mod formatters;
pub use formatters::FormatterRegistry;

use std::fmt::{self, Display, Formatter};

use context::{ByteReader, ByteWriter, ReadCache, WriteCache};

/// First two bytes (little-endian) of every serialized blob.
pub const STATE_STREAM_MAGIC: u16 = 0x01FF;

/// Encodes and decodes [Value] graphs against a formatter registry.
pub struct ObjectGraphCodec<'a> {
    registry: &'a FormatterRegistry,
}

impl<'a> ObjectGraphCodec<'a> {
    pub fn new(registry: &'a FormatterRegistry) -> ObjectGraphCodec<'a> {
        ObjectGraphCodec { registry }
    }

    /// Serialize a value graph into a fresh blob with the magic header.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let mut enc = Encoder {
            registry: self.registry,
            out: ByteWriter::new(),
            cache: WriteCache::new(),
        };
        enc.out.write_u16_le(STATE_STREAM_MAGIC);
        enc.write_value(value)?;
        Ok(enc.out.into_bytes())
    }

    /// Deserialize a blob produced by [encode](Self::encode). The magic header is checked
    /// verbatim before anything else.
    pub fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let mut dec = Decoder {
            registry: self.registry,
            reader: ByteReader::new(bytes),
            cache: ReadCache::new(),
        };
        let found = dec.reader.read_u16_le()?;
        if found != STATE_STREAM_MAGIC {
            return Err(CodecError::BadMagic { found });
        }
        dec.read_value()
    }
}

/// Write-side context for one encode pass.
pub struct Encoder<'a> {
    pub(crate) registry: &'a FormatterRegistry,
    pub(crate) out: ByteWriter,
    pub(crate) cache: WriteCache,
}

impl<'a> Encoder<'a> {
    pub(crate) fn write_value(&mut self, value: &Value) -> Result<(), CodecError> {
        let kind = match value.kind() {
            Some(kind) => kind,
            None => {
                self.out.write_u8(0);
                return Ok(());
            }
        };
        let registry = self.registry;
        let (tags, formatter) = registry.for_kind(kind).ok_or(CodecError::UnsupportedValue {
            context: "no formatter registered for value kind",
        })?;
        formatter.write(tags, value, self)
    }
}

/// Read-side context for one decode pass.
pub struct Decoder<'a> {
    pub(crate) registry: &'a FormatterRegistry,
    pub(crate) reader: ByteReader<'a>,
    pub(crate) cache: ReadCache,
}

impl<'a> Decoder<'a> {
    pub(crate) fn read_value(&mut self) -> Result<Value, CodecError> {
        let tag = self.reader.read_u8()?;
        if tag == 0 {
            return Ok(Value::Null);
        }
        let registry = self.registry;
        let (tags, formatter) = registry
            .for_tag(tag)
            .ok_or(CodecError::UnknownTag { tag })?;
        formatter.read(tags, tag, self)
    }
}

/// Error while encoding or decoding a blob. All variants are fatal for the blob concerned; see
/// the module docs.
#[derive(Debug)]
pub enum CodecError {
    /// The first two bytes of the blob are not [STATE_STREAM_MAGIC].
    BadMagic { found: u16 },
    /// The blob ended in the middle of a record.
    TruncatedStream,
    /// A tag byte that no registered formatter claims.
    UnknownTag { tag: u8 },
    /// A record's payload does not have the shape its tag promises.
    MalformedPayload { context: &'static str },
    /// A cache-hit token referred to a slot that was never filled, or was filled with a value
    /// of the wrong category.
    BadCacheKey { key: u16 },
    /// A value was handed to the encoder that its formatter cannot represent.
    UnsupportedValue { context: &'static str },
    /// An opaque or packed payload failed to serialize or parse.
    OpaquePayload { source: std::io::Error },
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::BadMagic { found } => {
                write!(f, "serialized data is invalid: bad magic header {:#06x}", found)
            }
            CodecError::TruncatedStream => write!(f, "serialized data is invalid: truncated stream"),
            CodecError::UnknownTag { tag } => {
                write!(f, "serialized data is invalid: unknown format tag {}", tag)
            }
            CodecError::MalformedPayload { context } => {
                write!(f, "serialized data is invalid: {}", context)
            }
            CodecError::BadCacheKey { key } => {
                write!(f, "serialized data is invalid: dangling cache key {}", key)
            }
            CodecError::UnsupportedValue { context } => {
                write!(f, "value cannot be encoded: {}", context)
            }
            CodecError::OpaquePayload { source } => {
                write!(f, "opaque payload error: {}", source)
            }
        }
    }
}
