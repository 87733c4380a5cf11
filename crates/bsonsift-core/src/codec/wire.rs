//! Low-level BSON wire format primitives.
//!
//! This module implements the element-level reading needed to walk a
//! document body without trusting any length it has not yet checked.
//!
//! ## Wire Format Overview
//!
//! A document is encoded as:
//! - An `int32` total length (including itself and the terminator)
//! - A sequence of elements: type byte, null-terminated key, payload
//! - A single `0x00` terminator
//!
//! All integers are little-endian. Strings carry an `int32` length that
//! counts their trailing null byte.

use crate::error::DecodeError;

/// BSON element types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ElementType {
    /// 64-bit binary floating point
    Double = 0x01,
    /// UTF-8 string
    String = 0x02,
    /// Embedded document
    Document = 0x03,
    /// Array
    Array = 0x04,
    /// Binary data
    Binary = 0x05,
    /// Undefined (deprecated)
    Undefined = 0x06,
    /// ObjectId
    ObjectId = 0x07,
    /// Boolean
    Boolean = 0x08,
    /// UTC datetime
    DateTime = 0x09,
    /// Null
    Null = 0x0A,
    /// Regular expression
    Regex = 0x0B,
    /// DBPointer (deprecated)
    DbPointer = 0x0C,
    /// JavaScript code
    JavaScript = 0x0D,
    /// Symbol (deprecated)
    Symbol = 0x0E,
    /// JavaScript code with scope
    JavaScriptWithScope = 0x0F,
    /// 32-bit integer
    Int32 = 0x10,
    /// Timestamp
    Timestamp = 0x11,
    /// 64-bit integer
    Int64 = 0x12,
    /// 128-bit decimal floating point
    Decimal128 = 0x13,
    /// Min key
    MinKey = 0xFF,
    /// Max key
    MaxKey = 0x7F,
}

impl TryFrom<u8> for ElementType {
    /// The unrecognised tag
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        Ok(match value {
            0x01 => ElementType::Double,
            0x02 => ElementType::String,
            0x03 => ElementType::Document,
            0x04 => ElementType::Array,
            0x05 => ElementType::Binary,
            0x06 => ElementType::Undefined,
            0x07 => ElementType::ObjectId,
            0x08 => ElementType::Boolean,
            0x09 => ElementType::DateTime,
            0x0A => ElementType::Null,
            0x0B => ElementType::Regex,
            0x0C => ElementType::DbPointer,
            0x0D => ElementType::JavaScript,
            0x0E => ElementType::Symbol,
            0x0F => ElementType::JavaScriptWithScope,
            0x10 => ElementType::Int32,
            0x11 => ElementType::Timestamp,
            0x12 => ElementType::Int64,
            0x13 => ElementType::Decimal128,
            0xFF => ElementType::MinKey,
            0x7F => ElementType::MaxKey,
            other => return Err(other),
        })
    }
}

impl ElementType {
    /// Stable type alias, matching the names MongoDB uses for `$type`
    pub fn name(self) -> &'static str {
        match self {
            ElementType::Double => "double",
            ElementType::String => "string",
            ElementType::Document => "object",
            ElementType::Array => "array",
            ElementType::Binary => "binData",
            ElementType::Undefined => "undefined",
            ElementType::ObjectId => "objectId",
            ElementType::Boolean => "bool",
            ElementType::DateTime => "date",
            ElementType::Null => "null",
            ElementType::Regex => "regex",
            ElementType::DbPointer => "dbPointer",
            ElementType::JavaScript => "javascript",
            ElementType::Symbol => "symbol",
            ElementType::JavaScriptWithScope => "javascriptWithScope",
            ElementType::Int32 => "int",
            ElementType::Timestamp => "timestamp",
            ElementType::Int64 => "long",
            ElementType::Decimal128 => "decimal",
            ElementType::MinKey => "minKey",
            ElementType::MaxKey => "maxKey",
        }
    }
}

/// Bounds-checked reader over one document's bytes.
///
/// `limit` is the exclusive end of the region the current container may
/// use; reads never cross it, even if more bytes follow in `data`.
#[derive(Debug, Clone)]
pub(crate) struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    limit: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            limit: data.len(),
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn limit(&self) -> usize {
        self.limit
    }

    pub(crate) fn remaining(&self) -> usize {
        self.limit - self.pos
    }

    /// Cursor over `[self.pos, limit)`; `limit` must not exceed ours
    pub(crate) fn bounded(&self, limit: usize) -> Cursor<'a> {
        debug_assert!(limit <= self.limit);
        Cursor {
            data: self.data,
            pos: self.pos,
            limit,
        }
    }

    pub(crate) fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Byte at an absolute offset, ignoring the limit
    pub(crate) fn byte_at(&self, offset: usize) -> Option<u8> {
        self.data.get(offset).copied()
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::TruncatedPayload {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub(crate) fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn read_i32(&mut self) -> Result<i32, DecodeError> {
        self.read_array().map(i32::from_le_bytes)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, DecodeError> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub(crate) fn read_i64(&mut self) -> Result<i64, DecodeError> {
        self.read_array().map(i64::from_le_bytes)
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64, DecodeError> {
        self.read_array().map(f64::from_le_bytes)
    }

    /// Null-terminated UTF-8 string (keys, regex parts)
    pub(crate) fn read_cstring(&mut self) -> Result<String, DecodeError> {
        let start = self.pos;
        let region = &self.data[start..self.limit];
        let Some(len) = region.iter().position(|&b| b == 0) else {
            return Err(DecodeError::MalformedString {
                offset: start,
                reason: "unterminated C string",
            });
        };
        let text = std::str::from_utf8(&region[..len]).map_err(|_| {
            DecodeError::MalformedString {
                offset: start,
                reason: "invalid UTF-8",
            }
        })?;
        self.pos = start + len + 1;
        Ok(text.to_owned())
    }

    /// `int32`-length-prefixed UTF-8 string whose length counts its terminator
    pub(crate) fn read_string(&mut self) -> Result<String, DecodeError> {
        let start = self.pos;
        let len = self.read_i32()?;
        if len < 1 {
            return Err(DecodeError::MalformedString {
                offset: start,
                reason: "invalid string length",
            });
        }
        let bytes = self.take(len as usize)?;
        let (text, terminator) = bytes.split_at(bytes.len() - 1);
        if terminator != [0] {
            return Err(DecodeError::MalformedString {
                offset: start,
                reason: "missing string terminator",
            });
        }
        std::str::from_utf8(text)
            .map(str::to_owned)
            .map_err(|_| DecodeError::MalformedString {
                offset: start,
                reason: "invalid UTF-8",
            })
    }
}
