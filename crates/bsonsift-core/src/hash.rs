//! Key-order independent content hashing of decoded documents.
//!
//! Each value is fed to BLAKE3 as its type tag followed by a
//! length-delimited payload. Document fields are sorted by key at every
//! nesting level first, so two documents holding the same fields in a
//! different order hash identically. Dates and decimals are fed as their
//! textual rendering.

use crate::value::{Document, Value};

/// Content digest of a document
pub type Digest = blake3::Hash;

/// Hash a document independently of its field order.
pub fn canonical_hash(doc: &Document) -> Digest {
    let mut hasher = CanonicalHasher::new();
    hasher.write_document(doc);
    hasher.finalize()
}

/// Members of a container still to be fed
enum Members<'v> {
    Fields(std::vec::IntoIter<(&'v str, &'v Value)>),
    Items(std::slice::Iter<'v, Value>),
}

/// Incremental canonical serializer feeding a BLAKE3 hasher
#[derive(Debug, Clone, Default)]
pub struct CanonicalHasher {
    inner: blake3::Hasher,
}

impl CanonicalHasher {
    /// Creates a hasher with empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a document, fields sorted by key
    pub fn write_document(&mut self, doc: &Document) {
        let open = self.open_document(doc);
        self.drain(vec![open]);
    }

    /// Feeds one value with its type tag
    pub fn write_value(&mut self, value: &Value) {
        if let Some(open) = self.write_head(value) {
            self.drain(vec![open]);
        }
    }

    /// Feeds the members of open containers depth first until none remain.
    fn drain<'v>(&mut self, mut stack: Vec<Members<'v>>) {
        while let Some(top) = stack.last_mut() {
            let next = match top {
                Members::Fields(fields) => fields.next().map(|(key, value)| {
                    self.write_text(key);
                    value
                }),
                Members::Items(items) => items.next(),
            };
            match next {
                Some(value) => {
                    if let Some(open) = self.write_head(value) {
                        stack.push(open);
                    }
                }
                None => {
                    stack.pop();
                }
            }
        }
    }

    fn open_document<'v>(&mut self, doc: &'v Document) -> Members<'v> {
        let mut fields: Vec<(&str, &Value)> = doc.iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));
        self.write_len(fields.len());
        Members::Fields(fields.into_iter())
    }

    /// Feeds the tag and every scalar part of `value`, returning its members
    /// if it is a container.
    fn write_head<'v>(&mut self, value: &'v Value) -> Option<Members<'v>> {
        self.inner.update(&[value.element_type() as u8]);
        match value {
            Value::Double(v) => {
                let bits = if v.is_nan() { f64::NAN.to_bits() } else { v.to_bits() };
                self.inner.update(&bits.to_le_bytes());
            }
            Value::String(s) | Value::JavaScript(s) | Value::Symbol(s) => self.write_text(s),
            Value::Document(doc) => return Some(self.open_document(doc)),
            Value::Array(items) => {
                self.write_len(items.len());
                return Some(Members::Items(items.iter()));
            }
            Value::Binary { subtype, bytes } => {
                self.inner.update(&[*subtype]);
                self.write_bytes(bytes);
            }
            Value::ObjectId(id) => {
                self.inner.update(id);
            }
            Value::Boolean(b) => {
                self.inner.update(&[u8::from(*b)]);
            }
            Value::DateTime(millis) => {
                let text = crate::value::iso_date(*millis).unwrap_or_else(|| millis.to_string());
                self.write_text(&text);
            }
            Value::Regex { pattern, options } => {
                self.write_text(pattern);
                self.write_text(options);
            }
            Value::DbPointer { namespace, id } => {
                self.write_text(namespace);
                self.inner.update(id);
            }
            Value::JavaScriptWithScope { code, scope } => {
                self.write_text(code);
                return Some(self.open_document(scope));
            }
            Value::Int32(v) => {
                self.inner.update(&v.to_le_bytes());
            }
            Value::Timestamp { time, increment } => {
                self.inner.update(&time.to_le_bytes());
                self.inner.update(&increment.to_le_bytes());
            }
            Value::Int64(v) => {
                self.inner.update(&v.to_le_bytes());
            }
            Value::Decimal128(d) => self.write_text(&d.to_string()),
            Value::Undefined | Value::Null | Value::MinKey | Value::MaxKey => {}
        }
        None
    }

    /// Returns the digest of everything fed so far
    pub fn finalize(&self) -> Digest {
        self.inner.finalize()
    }

    fn write_len(&mut self, len: usize) {
        self.inner.update(&(len as u64).to_le_bytes());
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_len(bytes.len());
        self.inner.update(bytes);
    }

    fn write_text(&mut self, text: &str) {
        self.write_bytes(text.as_bytes());
    }
}
