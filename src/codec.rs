//! Versioned binary codec with a closed type registry
//!
//! Encoding rules:
//! 1. Fixed-width integers are big-endian
//! 2. Sequences are a 4-byte element count followed by the elements in order
//! 3. Strings are a 2-byte byte length followed by UTF-8 bytes
//! 4. Polymorphic values are a 4-byte type tag followed by the variant body
//! 5. The outermost value is preceded by the 2-byte codec version
//!
//! Type tags are assigned in registration order. Two codec instances only
//! agree on the wire if their types were registered in the same order.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use thiserror::Error;

use crate::constants::{MAX_SLICE_LEN, MAX_STRING_LEN};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Truncated input: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("Unknown type tag: {0}")]
    UnknownTypeTag(u32),

    #[error("Type not registered: {0}")]
    UnregisteredType(String),

    #[error("Type registered twice: {0}")]
    DuplicateType(String),

    #[error("Expected {expected}, found {found}")]
    UnexpectedType { expected: &'static str, found: String },

    #[error("Declared length {declared} exceeds {remaining} remaining bytes")]
    LengthExceedsInput { declared: u32, remaining: usize },

    #[error("Sequence length {len} exceeds maximum {max}")]
    MaxSliceLenExceeded { len: usize, max: u32 },

    #[error("Unsupported codec version {found}, expected {expected}")]
    InvalidVersion { expected: u16, found: u16 },

    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),

    #[error("String is not valid UTF-8")]
    InvalidString,

    #[error("String length {0} exceeds maximum")]
    StringTooLong(usize),
}

/// Keys a codec registry can hold
pub trait TypeKey: Copy + Eq + Hash + Debug {}

impl<T: Copy + Eq + Hash + Debug> TypeKey for T {}

/// Values that can be written to the wire
pub trait Encode<K> {
    fn encode(&self, w: &mut Writer<'_, K>) -> Result<(), CodecError>;
}

/// Values that can be read back from the wire
pub trait Decode<K>: Sized {
    fn decode(r: &mut Reader<'_, K>) -> Result<Self, CodecError>;
}

/// Codec instance owning a closed type registry
#[derive(Debug, Clone)]
pub struct Codec<K> {
    version: u16,
    kinds: Vec<K>,
    tags: HashMap<K, u32>,
}

impl<K: TypeKey> Codec<K> {
    pub fn new(version: u16) -> Self {
        Self {
            version,
            kinds: Vec::new(),
            tags: HashMap::new(),
        }
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    /// Register a type, returning the tag it will be written with
    pub fn register_type(&mut self, kind: K) -> Result<u32, CodecError> {
        if self.tags.contains_key(&kind) {
            return Err(CodecError::DuplicateType(format!("{:?}", kind)));
        }
        let tag = u32::try_from(self.kinds.len()).map_err(|_| CodecError::MaxSliceLenExceeded {
            len: self.kinds.len(),
            max: u32::MAX,
        })?;
        self.kinds.push(kind);
        self.tags.insert(kind, tag);
        Ok(tag)
    }

    pub fn tag_of(&self, kind: K) -> Result<u32, CodecError> {
        self.tags
            .get(&kind)
            .copied()
            .ok_or_else(|| CodecError::UnregisteredType(format!("{:?}", kind)))
    }

    pub fn kind_of(&self, tag: u32) -> Result<K, CodecError> {
        self.kinds
            .get(tag as usize)
            .copied()
            .ok_or(CodecError::UnknownTypeTag(tag))
    }

    /// Registered types in tag order
    pub fn registered(&self) -> &[K] {
        &self.kinds
    }

    /// Marshal: version prefix followed by the value's encoding
    pub fn marshal<T: Encode<K> + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        let mut w = Writer::new(self);
        w.write_u16(self.version);
        value.encode(&mut w)?;
        Ok(w.into_bytes())
    }

    /// Unmarshal: the version must match and every byte must be consumed
    pub fn unmarshal<T: Decode<K>>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        let mut r = Reader::new(self, bytes);
        let found = r.read_u16()?;
        if found != self.version {
            return Err(CodecError::InvalidVersion {
                expected: self.version,
                found,
            });
        }
        let value = T::decode(&mut r)?;
        if r.remaining() != 0 {
            return Err(CodecError::TrailingBytes(r.remaining()));
        }
        Ok(value)
    }
}

pub struct Writer<'a, K> {
    codec: &'a Codec<K>,
    buf: Vec<u8>,
}

impl<'a, K: TypeKey> Writer<'a, K> {
    pub fn new(codec: &'a Codec<K>) -> Self {
        Self {
            codec,
            buf: Vec::new(),
        }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Raw bytes with no length prefix
    pub fn write_fixed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_str(&mut self, value: &str) -> Result<(), CodecError> {
        if value.len() > MAX_STRING_LEN {
            return Err(CodecError::StringTooLong(value.len()));
        }
        self.write_u16(value.len() as u16);
        self.write_fixed(value.as_bytes());
        Ok(())
    }

    pub fn write_tag(&mut self, kind: K) -> Result<(), CodecError> {
        let tag = self.codec.tag_of(kind)?;
        self.write_u32(tag);
        Ok(())
    }

    pub fn write_seq<T: Encode<K>>(&mut self, items: &[T]) -> Result<(), CodecError> {
        if items.len() > MAX_SLICE_LEN as usize {
            return Err(CodecError::MaxSliceLenExceeded {
                len: items.len(),
                max: MAX_SLICE_LEN,
            });
        }
        self.write_u32(items.len() as u32);
        for item in items {
            item.encode(self)?;
        }
        Ok(())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

pub struct Reader<'a, K> {
    codec: &'a Codec<K>,
    bytes: &'a [u8],
    offset: usize,
}

impl<'a, K: TypeKey> Reader<'a, K> {
    pub fn new(codec: &'a Codec<K>, bytes: &'a [u8]) -> Self {
        Self {
            codec,
            bytes,
            offset: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    /// Bytes consumed so far
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.bytes[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    pub fn read_str(&mut self) -> Result<String, CodecError> {
        let len = self.read_u16()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidString)
    }

    pub fn read_tag(&mut self) -> Result<K, CodecError> {
        let tag = self.read_u32()?;
        self.codec.kind_of(tag)
    }

    pub fn read_seq<T: Decode<K>>(&mut self) -> Result<Vec<T>, CodecError> {
        let declared = self.read_u32()?;
        if declared > MAX_SLICE_LEN {
            return Err(CodecError::MaxSliceLenExceeded {
                len: declared as usize,
                max: MAX_SLICE_LEN,
            });
        }
        // every element occupies at least one byte
        if declared as usize > self.remaining() {
            return Err(CodecError::LengthExceedsInput {
                declared,
                remaining: self.remaining(),
            });
        }
        let mut items = Vec::with_capacity(declared as usize);
        for _ in 0..declared {
            items.push(T::decode(self)?);
        }
        Ok(items)
    }
}

impl<K: TypeKey> Encode<K> for u8 {
    fn encode(&self, w: &mut Writer<'_, K>) -> Result<(), CodecError> {
        w.write_u8(*self);
        Ok(())
    }
}

impl<K: TypeKey> Decode<K> for u8 {
    fn decode(r: &mut Reader<'_, K>) -> Result<Self, CodecError> {
        r.read_u8()
    }
}

impl<K: TypeKey> Encode<K> for u32 {
    fn encode(&self, w: &mut Writer<'_, K>) -> Result<(), CodecError> {
        w.write_u32(*self);
        Ok(())
    }
}

impl<K: TypeKey> Decode<K> for u32 {
    fn decode(r: &mut Reader<'_, K>) -> Result<Self, CodecError> {
        r.read_u32()
    }
}

impl<K: TypeKey> Encode<K> for u64 {
    fn encode(&self, w: &mut Writer<'_, K>) -> Result<(), CodecError> {
        w.write_u64(*self);
        Ok(())
    }
}

impl<K: TypeKey> Decode<K> for u64 {
    fn decode(r: &mut Reader<'_, K>) -> Result<Self, CodecError> {
        r.read_u64()
    }
}

impl<K: TypeKey, const N: usize> Encode<K> for [u8; N] {
    fn encode(&self, w: &mut Writer<'_, K>) -> Result<(), CodecError> {
        w.write_fixed(self);
        Ok(())
    }
}

impl<K: TypeKey, const N: usize> Decode<K> for [u8; N] {
    fn decode(r: &mut Reader<'_, K>) -> Result<Self, CodecError> {
        r.read_array()
    }
}

impl<K: TypeKey> Encode<K> for String {
    fn encode(&self, w: &mut Writer<'_, K>) -> Result<(), CodecError> {
        w.write_str(self)
    }
}

impl<K: TypeKey> Decode<K> for String {
    fn decode(r: &mut Reader<'_, K>) -> Result<Self, CodecError> {
        r.read_str()
    }
}

impl<K: TypeKey, T: Encode<K>> Encode<K> for Vec<T> {
    fn encode(&self, w: &mut Writer<'_, K>) -> Result<(), CodecError> {
        w.write_seq(self)
    }
}

impl<K: TypeKey, T: Decode<K>> Decode<K> for Vec<T> {
    fn decode(r: &mut Reader<'_, K>) -> Result<Self, CodecError> {
        r.read_seq()
    }
}
