//! Streaming BSON codec: framing and decoding.
//!
//! ## Pipeline
//!
//! 1. [`FrameReader`] splits a byte stream into [`RawDocument`]s using each
//!    document's little-endian length prefix. It never buffers more than one
//!    document.
//! 2. [`decode`] turns one [`RawDocument`] into a [`Document`] tree. It is a
//!    pure function of the bytes and reports the first defect it finds as a
//!    [`DecodeError`] naming the offending offset.
//!
//! Framing failures poison the rest of the stream; decode failures are
//! confined to the document they occur in.

mod frame;
mod wire;

use crate::error::DecodeError;
use crate::value::{Decimal128, Document, Value};
use wire::Cursor;

pub use frame::{FrameReader, RawDocument, MIN_DOCUMENT_SIZE};
pub use wire::ElementType;

/// Binary subtype whose payload repeats its own length
const BINARY_OLD: u8 = 0x02;

/// Decode one framed document into its value tree.
pub fn decode(raw: &RawDocument) -> Result<Document, DecodeError> {
    decode_bytes(raw.as_bytes())
}

/// Decode a complete document encoding.
///
/// The declared length must cover `bytes` exactly. Nesting is tracked on
/// the heap, so depth is bounded only by the input size.
pub fn decode_bytes(bytes: &[u8]) -> Result<Document, DecodeError> {
    let mut cursor = Cursor::new(bytes);
    let mut current = Envelope::open(&mut cursor)?;
    let mut parents: Vec<(Envelope<'_>, Slot)> = Vec::new();

    let root = loop {
        if current.body.remaining() > 0 {
            match current.read_element()? {
                Element::Field(key, value) => current.fields.insert(key, value),
                Element::Open(child, slot) => {
                    parents.push((std::mem::replace(&mut current, child), slot));
                }
            }
            continue;
        }

        let (fields, end) = current.close()?;
        let Some((mut parent, slot)) = parents.pop() else {
            cursor.seek(end);
            break fields;
        };
        parent.body.seek(end);
        let (key, value) = match slot {
            Slot::Document(key) => (key, Value::Document(fields)),
            Slot::Array(key) => (key, Value::Array(fields.into_values())),
            Slot::Scope {
                key,
                start,
                declared,
                code,
            } => {
                let actual = (parent.body.position() - start) as i64;
                if i64::from(declared) != actual {
                    return Err(DecodeError::SizeMismatch {
                        offset: start,
                        declared: declared.into(),
                        actual,
                    });
                }
                let scope = fields;
                (key, Value::JavaScriptWithScope { code, scope })
            }
        };
        parent.fields.insert(key, value);
        current = parent;
    };

    if cursor.position() != bytes.len() {
        return Err(DecodeError::SizeMismatch {
            offset: 0,
            declared: cursor.position() as i64,
            actual: bytes.len() as i64,
        });
    }
    Ok(root)
}

/// A document or array envelope whose elements are still being read.
struct Envelope<'a> {
    start: usize,
    declared: i32,
    end: usize,
    /// Positioned at the next element, bounded by the terminator
    body: Cursor<'a>,
    fields: Document,
}

/// Where a finished child envelope lands in its parent
enum Slot {
    Document(String),
    Array(String),
    Scope {
        key: String,
        start: usize,
        declared: i32,
        code: String,
    },
}

enum Element<'a> {
    Field(String, Value),
    Open(Envelope<'a>, Slot),
}

impl<'a> Envelope<'a> {
    /// Reads the length prefix at the cursor and checks it fits the parent.
    fn open(cursor: &mut Cursor<'a>) -> Result<Self, DecodeError> {
        let start = cursor.position();
        let declared = cursor.read_i32()?;
        if declared < MIN_DOCUMENT_SIZE {
            return Err(DecodeError::SizeMismatch {
                offset: start,
                declared: declared.into(),
                actual: (cursor.limit() - start) as i64,
            });
        }

        let end = start + declared as usize;
        if end > cursor.limit() {
            return Err(DecodeError::TruncatedPayload {
                offset: start,
                needed: declared as usize,
                available: cursor.limit() - start,
            });
        }

        Ok(Self {
            start,
            declared,
            end,
            body: cursor.bounded(end - 1),
            fields: Document::new(),
        })
    }

    fn read_element(&mut self) -> Result<Element<'a>, DecodeError> {
        let tag_offset = self.body.position();
        let tag = self.body.read_u8()?;
        if tag == 0 {
            // Terminator ahead of the declared end
            return Err(DecodeError::SizeMismatch {
                offset: self.start,
                declared: self.declared.into(),
                actual: (tag_offset + 1 - self.start) as i64,
            });
        }
        let element_type = ElementType::try_from(tag).map_err(|tag| DecodeError::UnknownType {
            tag,
            offset: tag_offset,
        })?;
        let key = self.body.read_cstring()?;

        read_value(&mut self.body, key, element_type)
    }

    /// Checks the terminator once every element has been read.
    fn close(self) -> Result<(Document, usize), DecodeError> {
        let terminator = self.end - 1;
        if self.body.byte_at(terminator) != Some(0) {
            return Err(DecodeError::MissingTerminator { offset: terminator });
        }
        Ok((self.fields, self.end))
    }
}

/// Reads the payload of a field. Containers are returned unopened, with
/// the cursor positioned at their first element.
fn read_value<'a>(
    cursor: &mut Cursor<'a>,
    key: String,
    element_type: ElementType,
) -> Result<Element<'a>, DecodeError> {
    let value = match element_type {
        ElementType::Document => {
            return Ok(Element::Open(Envelope::open(cursor)?, Slot::Document(key)));
        }
        ElementType::Array => return Ok(Element::Open(Envelope::open(cursor)?, Slot::Array(key))),
        ElementType::JavaScriptWithScope => {
            let start = cursor.position();
            let declared = cursor.read_i32()?;
            let code = cursor.read_string()?;
            let scope = Envelope::open(cursor)?;
            let slot = Slot::Scope {
                key,
                start,
                declared,
                code,
            };
            return Ok(Element::Open(scope, slot));
        }
        ElementType::Double => Value::Double(cursor.read_f64()?),
        ElementType::String => Value::String(cursor.read_string()?),
        ElementType::Binary => read_binary(cursor)?,
        ElementType::Undefined => Value::Undefined,
        ElementType::ObjectId => Value::ObjectId(cursor.read_array()?),
        ElementType::Boolean => {
            let offset = cursor.position();
            match cursor.read_u8()? {
                0 => Value::Boolean(false),
                1 => Value::Boolean(true),
                value => return Err(DecodeError::InvalidBoolean { offset, value }),
            }
        }
        ElementType::DateTime => Value::DateTime(cursor.read_i64()?),
        ElementType::Null => Value::Null,
        ElementType::Regex => Value::Regex {
            pattern: cursor.read_cstring()?,
            options: cursor.read_cstring()?,
        },
        ElementType::DbPointer => Value::DbPointer {
            namespace: cursor.read_string()?,
            id: cursor.read_array()?,
        },
        ElementType::JavaScript => Value::JavaScript(cursor.read_string()?),
        ElementType::Symbol => Value::Symbol(cursor.read_string()?),
        ElementType::Int32 => Value::Int32(cursor.read_i32()?),
        ElementType::Timestamp => {
            let increment = cursor.read_u32()?;
            let time = cursor.read_u32()?;
            Value::Timestamp { time, increment }
        }
        ElementType::Int64 => Value::Int64(cursor.read_i64()?),
        ElementType::Decimal128 => Value::Decimal128(Decimal128::from_bytes(cursor.read_array()?)),
        ElementType::MinKey => Value::MinKey,
        ElementType::MaxKey => Value::MaxKey,
    };
    Ok(Element::Field(key, value))
}

fn read_binary(cursor: &mut Cursor<'_>) -> Result<Value, DecodeError> {
    let start = cursor.position();
    let len = cursor.read_i32()?;
    if len < 0 {
        return Err(DecodeError::SizeMismatch {
            offset: start,
            declared: len.into(),
            actual: 0,
        });
    }
    let subtype = cursor.read_u8()?;
    let mut bytes = cursor.take(len as usize)?;

    if subtype == BINARY_OLD {
        if bytes.len() < 4 {
            return Err(DecodeError::SizeMismatch {
                offset: start,
                declared: len.into(),
                actual: 4,
            });
        }
        let (prefix, rest) = bytes.split_at(4);
        let inner = i32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
        if i64::from(inner) != i64::from(len) - 4 {
            return Err(DecodeError::SizeMismatch {
                offset: start + 5,
                declared: inner.into(),
                actual: i64::from(len) - 4,
            });
        }
        bytes = rest;
    }

    Ok(Value::Binary {
        subtype,
        bytes: bytes.to_vec(),
    })
}
