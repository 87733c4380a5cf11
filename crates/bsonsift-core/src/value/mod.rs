//! Generic value model for decoded BSON documents.
//!
//! [`Value`] is a closed tagged union over every element type the decoder
//! understands. Analysis, hashing and serialization all match on it
//! exhaustively, so adding a variant is a compile error everywhere a
//! decision about it has to be made.
//!
//! [`Document`] keeps its entries in encoding order. Order is irrelevant for
//! equality of content (see [`crate::hash`]) but is preserved for output.

mod decimal;
mod extjson;

use crate::codec::ElementType;

pub use decimal::Decimal128;
pub(crate) use extjson::iso_date;
pub use extjson::to_writer_pretty;

/// A decoded BSON value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 64-bit IEEE 754 floating point
    Double(f64),
    /// UTF-8 string
    String(String),
    /// Embedded document
    Document(Document),
    /// Array; element keys are positional and discarded
    Array(Vec<Value>),
    /// Binary data with its subtype byte
    Binary {
        /// Binary subtype
        subtype: u8,
        /// Payload bytes
        bytes: Vec<u8>,
    },
    /// Deprecated undefined value
    Undefined,
    /// 12-byte ObjectId
    ObjectId([u8; 12]),
    /// Boolean
    Boolean(bool),
    /// UTC datetime as milliseconds since the Unix epoch
    DateTime(i64),
    /// Null
    Null,
    /// Regular expression
    Regex {
        /// Pattern source
        pattern: String,
        /// Option flags
        options: String,
    },
    /// Deprecated database pointer
    DbPointer {
        /// Target namespace
        namespace: String,
        /// Target ObjectId
        id: [u8; 12],
    },
    /// JavaScript code
    JavaScript(String),
    /// Deprecated symbol
    Symbol(String),
    /// JavaScript code with a scope document
    JavaScriptWithScope {
        /// Code source
        code: String,
        /// Variable scope
        scope: Document,
    },
    /// 32-bit signed integer
    Int32(i32),
    /// Internal replication timestamp
    Timestamp {
        /// Seconds since the epoch
        time: u32,
        /// Ordinal within the second
        increment: u32,
    },
    /// 64-bit signed integer
    Int64(i64),
    /// 128-bit decimal floating point
    Decimal128(Decimal128),
    /// Compares lower than every other value
    MinKey,
    /// Compares higher than every other value
    MaxKey,
}

impl Value {
    /// Element type this value is encoded as
    pub fn element_type(&self) -> ElementType {
        match self {
            Value::Double(_) => ElementType::Double,
            Value::String(_) => ElementType::String,
            Value::Document(_) => ElementType::Document,
            Value::Array(_) => ElementType::Array,
            Value::Binary { .. } => ElementType::Binary,
            Value::Undefined => ElementType::Undefined,
            Value::ObjectId(_) => ElementType::ObjectId,
            Value::Boolean(_) => ElementType::Boolean,
            Value::DateTime(_) => ElementType::DateTime,
            Value::Null => ElementType::Null,
            Value::Regex { .. } => ElementType::Regex,
            Value::DbPointer { .. } => ElementType::DbPointer,
            Value::JavaScript(_) => ElementType::JavaScript,
            Value::Symbol(_) => ElementType::Symbol,
            Value::JavaScriptWithScope { .. } => ElementType::JavaScriptWithScope,
            Value::Int32(_) => ElementType::Int32,
            Value::Timestamp { .. } => ElementType::Timestamp,
            Value::Int64(_) => ElementType::Int64,
            Value::Decimal128(_) => ElementType::Decimal128,
            Value::MinKey => ElementType::MinKey,
            Value::MaxKey => ElementType::MaxKey,
        }
    }

    /// Stable type name, as used in analysis reports
    pub fn type_name(&self) -> &'static str {
        self.element_type().name()
    }

    /// Returns the embedded document, if this is one
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(doc) => Some(doc),
            _ => None,
        }
    }

    /// True for values that hold other values
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Value::Document(_) | Value::Array(_) | Value::JavaScriptWithScope { .. }
        )
    }
}

/// An ordered mapping of field names to values.
///
/// Duplicate keys are kept as encoded; lookups return the first match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    entries: Vec<(String, Value)>,
}

impl Document {
    /// Creates an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field, keeping insertion order
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.entries.push((key.into(), value));
    }

    /// Returns the first value stored under `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Iterates over fields in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the document has no fields
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Field values in order, keys discarded
    pub(crate) fn into_values(mut self) -> Vec<Value> {
        std::mem::take(&mut self.entries)
            .into_iter()
            .map(|(_, value)| value)
            .collect()
    }

    /// Nesting depth; a document without containers has depth 1
    pub fn depth(&self) -> usize {
        let mut deepest = 1;
        let mut pending: Vec<(usize, &Value)> =
            self.entries.iter().map(|(_, value)| (2, value)).collect();
        while let Some((level, value)) = pending.pop() {
            match value {
                Value::Document(doc) | Value::JavaScriptWithScope { scope: doc, .. } => {
                    deepest = deepest.max(level);
                    pending.extend(doc.entries.iter().map(|(_, value)| (level + 1, value)));
                }
                Value::Array(items) => {
                    deepest = deepest.max(level);
                    pending.extend(items.iter().map(|item| (level + 1, item)));
                }
                _ => {}
            }
        }
        deepest
    }
}

// Nested values are unlinked onto a worklist so dropping a deep tree does
// not recurse once per level.
impl Drop for Document {
    fn drop(&mut self) {
        if !self.entries.iter().any(|(_, value)| value.is_container()) {
            return;
        }
        let mut pending: Vec<Value> = std::mem::take(&mut self.entries)
            .into_iter()
            .map(|(_, value)| value)
            .collect();
        while let Some(value) = pending.pop() {
            match value {
                Value::Document(doc) | Value::JavaScriptWithScope { scope: doc, .. } => {
                    pending.extend(doc.into_values())
                }
                Value::Array(items) => pending.extend(items),
                _ => {}
            }
        }
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
