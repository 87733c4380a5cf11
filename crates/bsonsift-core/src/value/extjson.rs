//! Relaxed Extended JSON (v2) serialization.
//!
//! JSON-native values serialize as themselves; everything else becomes a
//! single-key wrapper object (`{"$oid": ...}`, `{"$date": ...}`, ...).
//! Field order follows the document.
//!
//! The [`Serialize`] impls recurse once per nesting level. [`to_writer_pretty`]
//! produces the same text as `serde_json`'s pretty printer while keeping
//! open containers on the heap, for documents of any depth.

use super::{Document, Value};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::ser::{Formatter, PrettyFormatter};
use std::io::{self, Write};

/// Latest instant relaxed mode renders as an ISO-8601 string (9999-12-31T23:59:59.999Z)
const MAX_ISO_MILLIS: i64 = 253_402_300_799_999;

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Double(v) if v.is_finite() => serializer.serialize_f64(*v),
            Value::Double(v) => {
                let text = if v.is_nan() {
                    "NaN"
                } else if *v > 0.0 {
                    "Infinity"
                } else {
                    "-Infinity"
                };
                wrap(serializer, "$numberDouble", text)
            }
            Value::String(s) => serializer.serialize_str(s),
            Value::Document(doc) => doc.serialize(serializer),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Binary { subtype, bytes } => wrap(
                serializer,
                "$binary",
                &BinaryBody {
                    base64: BASE64.encode(bytes),
                    sub_type: format!("{:02x}", subtype),
                },
            ),
            Value::Undefined => wrap(serializer, "$undefined", &true),
            Value::ObjectId(id) => ObjectIdRef(id).serialize(serializer),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::DateTime(millis) => match iso_date(*millis) {
                Some(text) => wrap(serializer, "$date", &text),
                None => wrap(serializer, "$date", &NumberLong(*millis)),
            },
            Value::Null => serializer.serialize_unit(),
            Value::Regex { pattern, options } => {
                wrap(serializer, "$regularExpression", &RegexBody { pattern, options })
            }
            Value::DbPointer { namespace, id } => wrap(
                serializer,
                "$dbPointer",
                &DbPointerBody {
                    namespace,
                    id: ObjectIdRef(id),
                },
            ),
            Value::JavaScript(code) => wrap(serializer, "$code", code),
            Value::Symbol(symbol) => wrap(serializer, "$symbol", symbol),
            Value::JavaScriptWithScope { code, scope } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("$code", code)?;
                map.serialize_entry("$scope", scope)?;
                map.end()
            }
            Value::Int32(v) => serializer.serialize_i32(*v),
            Value::Timestamp { time, increment } => wrap(
                serializer,
                "$timestamp",
                &TimestampBody {
                    t: *time,
                    i: *increment,
                },
            ),
            Value::Int64(v) => serializer.serialize_i64(*v),
            Value::Decimal128(d) => wrap(serializer, "$numberDecimal", &d.to_string()),
            Value::MinKey => wrap(serializer, "$minKey", &1),
            Value::MaxKey => wrap(serializer, "$maxKey", &1),
        }
    }
}

/// Renders epoch milliseconds as ISO-8601 when inside years 1970..=9999
pub(crate) fn iso_date(millis: i64) -> Option<String> {
    if !(0..=MAX_ISO_MILLIS).contains(&millis) {
        return None;
    }
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn wrap<S, T>(serializer: S, key: &str, value: &T) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize + ?Sized,
{
    let mut map = serializer.serialize_map(Some(1))?;
    map.serialize_entry(key, value)?;
    map.end()
}

struct ObjectIdRef<'a>(&'a [u8; 12]);

impl Serialize for ObjectIdRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        wrap(serializer, "$oid", &hex::encode(self.0))
    }
}

struct NumberLong(i64);

impl Serialize for NumberLong {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        wrap(serializer, "$numberLong", &self.0.to_string())
    }
}

#[derive(serde::Serialize)]
struct BinaryBody {
    base64: String,
    #[serde(rename = "subType")]
    sub_type: String,
}

#[derive(serde::Serialize)]
struct TimestampBody {
    t: u32,
    i: u32,
}

#[derive(serde::Serialize)]
struct RegexBody<'a> {
    pattern: &'a str,
    options: &'a str,
}

#[derive(serde::Serialize)]
struct DbPointerBody<'a> {
    #[serde(rename = "$ref")]
    namespace: &'a str,
    #[serde(rename = "$id")]
    id: ObjectIdRef<'a>,
}

/// Writes `doc` as pretty-printed Extended JSON, one `indent` per level.
pub fn to_writer_pretty<W: Write>(doc: &Document, mut out: W, indent: &[u8]) -> io::Result<()> {
    let mut formatter = PrettyFormatter::with_indent(indent);
    formatter.begin_object(&mut out)?;
    let mut stack = vec![Open::Fields {
        fields: doc.entries.iter(),
        first: true,
    }];

    while let Some(top) = stack.last_mut() {
        let next = match top {
            Open::Fields { fields, first } => match fields.next() {
                Some((key, value)) => {
                    write_key(&mut out, &mut formatter, key, *first)?;
                    *first = false;
                    Some(value)
                }
                None => {
                    formatter.end_object(&mut out)?;
                    None
                }
            },
            Open::Items { items, first } => match items.next() {
                Some(item) => {
                    formatter.begin_array_value(&mut out, *first)?;
                    *first = false;
                    Some(item)
                }
                None => {
                    formatter.end_array(&mut out)?;
                    None
                }
            },
            Open::Scope => {
                formatter.end_object(&mut out)?;
                None
            }
        };

        match next {
            Some(value) => {
                if !open(value, &mut out, &mut formatter, &mut stack)? {
                    end_value(&stack, &mut out, &mut formatter)?;
                }
            }
            None => {
                stack.pop();
                end_value(&stack, &mut out, &mut formatter)?;
            }
        }
    }
    Ok(())
}

/// A container whose closing bracket has not been written yet
enum Open<'a> {
    Fields {
        fields: std::slice::Iter<'a, (String, Value)>,
        first: bool,
    },
    Items {
        items: std::slice::Iter<'a, Value>,
        first: bool,
    },
    /// `{"$code": ..., "$scope": ...}` after its scope document
    Scope,
}

/// Writes the opening of a container and pushes it, or writes a scalar
/// whole. Returns whether something was pushed.
fn open<'a, W: Write>(
    value: &'a Value,
    out: &mut W,
    formatter: &mut PrettyFormatter<'_>,
    stack: &mut Vec<Open<'a>>,
) -> io::Result<bool> {
    match value {
        Value::Document(doc) => {
            formatter.begin_object(out)?;
            stack.push(Open::Fields {
                fields: doc.entries.iter(),
                first: true,
            });
        }
        Value::Array(items) => {
            formatter.begin_array(out)?;
            stack.push(Open::Items {
                items: items.iter(),
                first: true,
            });
        }
        Value::JavaScriptWithScope { code, scope } => {
            formatter.begin_object(out)?;
            write_key(out, formatter, "$code", true)?;
            write_scalar(out, formatter, code.as_str())?;
            formatter.end_object_value(out)?;
            write_key(out, formatter, "$scope", false)?;
            formatter.begin_object(out)?;
            stack.push(Open::Scope);
            stack.push(Open::Fields {
                fields: scope.entries.iter(),
                first: true,
            });
        }
        scalar => {
            write_scalar(out, formatter, scalar)?;
            return Ok(false);
        }
    }
    Ok(true)
}

fn write_key<W: Write>(
    out: &mut W,
    formatter: &mut PrettyFormatter<'_>,
    key: &str,
    first: bool,
) -> io::Result<()> {
    formatter.begin_object_key(out, first)?;
    write_scalar(out, formatter, key)?;
    formatter.end_object_key(out)?;
    formatter.begin_object_value(out)
}

fn end_value<W: Write>(
    stack: &[Open<'_>],
    out: &mut W,
    formatter: &mut PrettyFormatter<'_>,
) -> io::Result<()> {
    match stack.last() {
        Some(Open::Items { .. }) => formatter.end_array_value(out),
        Some(Open::Fields { .. } | Open::Scope) => formatter.end_object_value(out),
        None => Ok(()),
    }
}

/// Serializes a value with no nested documents through the shared formatter,
/// so wrapper objects pick up the current indentation.
fn write_scalar<W: Write, T: Serialize + ?Sized>(
    out: &mut W,
    formatter: &mut PrettyFormatter<'_>,
    value: &T,
) -> io::Result<()> {
    let shared = Shared(&mut *formatter);
    let mut serializer = serde_json::Serializer::with_formatter(&mut *out, shared);
    value.serialize(&mut serializer).map_err(io::Error::from)
}

/// Lends a formatter to a short-lived serializer, keeping its indentation state
struct Shared<'f, 'i>(&'f mut PrettyFormatter<'i>);

impl Formatter for Shared<'_, '_> {
    fn begin_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_array(writer)
    }

    fn end_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.0.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_object(writer)
    }

    fn end_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.0.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_object_value(writer)
    }
}
