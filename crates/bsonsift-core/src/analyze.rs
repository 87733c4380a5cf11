//! Aggregate statistics over a document stream.
//!
//! Field accounting descends into embedded documents, building dotted paths
//! (`a.b.c`). Arrays count as a field of type `array` and their path is
//! remembered, but their elements are not descended into.

use crate::codec::RawDocument;
use crate::error::{DecodeError, Error, Result};
use crate::pipeline::{run, Flow, Mode, Progress, Reducer, StreamSummary};
use crate::value::{Document, Value};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Number of decoded documents kept as samples
pub const SAMPLE_LIMIT: usize = 5;

/// Earliest and latest datetime seen, in epoch milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DateRange {
    /// Earliest value
    #[serde(serialize_with = "serialize_date")]
    pub min: Option<i64>,
    /// Latest value
    #[serde(serialize_with = "serialize_date")]
    pub max: Option<i64>,
}

impl DateRange {
    fn observe(&mut self, millis: i64) {
        if self.min.map_or(true, |min| millis < min) {
            self.min = Some(millis);
        }
        if self.max.map_or(true, |max| millis > max) {
            self.max = Some(millis);
        }
    }
}

fn serialize_date<S>(millis: &Option<i64>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    millis.map(Value::DateTime).serialize(serializer)
}

/// Statistics gathered in one pass over a stream
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisStats {
    /// Documents that decoded and were analyzed
    pub total_documents: u64,
    /// Documents left out because they failed to decode
    pub skipped_documents: u64,
    /// Combined size of analyzed documents
    pub total_size_bytes: u64,
    /// `total_size_bytes / total_documents`, or 0 for an empty stream
    pub avg_doc_size_bytes: f64,
    /// Occurrences per dotted field path
    pub field_names: BTreeMap<String, u64>,
    /// Occurrences per value type name
    pub data_types: BTreeMap<String, u64>,
    /// Paths that held an array at least once
    pub array_fields: BTreeSet<String>,
    /// Datetime extremes
    pub date_range: DateRange,
    /// The first analyzed documents, at most [`SAMPLE_LIMIT`]
    pub sample_documents: Vec<Document>,
}

impl AnalysisStats {
    /// Presence-level differences going from `self` to `other`
    pub fn compare(&self, other: &AnalysisStats) -> DiffReport {
        compare(self, other)
    }

    fn record_document(&mut self, size: usize, doc: Document) {
        self.total_documents += 1;
        self.total_size_bytes += size as u64;
        self.record_fields(&doc);
        if self.sample_documents.len() < SAMPLE_LIMIT {
            self.sample_documents.push(doc);
        }
    }

    fn record_fields(&mut self, doc: &Document) {
        let mut pending: Vec<(Option<String>, &Document)> = vec![(None, doc)];
        while let Some((prefix, doc)) = pending.pop() {
            self.record_level(doc, prefix.as_deref(), &mut pending);
        }
    }

    fn record_level<'d>(
        &mut self,
        doc: &'d Document,
        prefix: Option<&str>,
        pending: &mut Vec<(Option<String>, &'d Document)>,
    ) {
        for (key, value) in doc.iter() {
            let path = match prefix {
                Some(prefix) => format!("{prefix}.{key}"),
                None => key.to_string(),
            };
            *self.field_names.entry(path.clone()).or_insert(0) += 1;
            *self.data_types.entry(value.type_name().to_string()).or_insert(0) += 1;

            match value {
                Value::Document(inner) => pending.push((Some(path), inner)),
                Value::Array(_) => {
                    self.array_fields.insert(path);
                }
                Value::DateTime(millis) => self.date_range.observe(*millis),
                Value::Double(_)
                | Value::String(_)
                | Value::Binary { .. }
                | Value::Undefined
                | Value::ObjectId(_)
                | Value::Boolean(_)
                | Value::Null
                | Value::Regex { .. }
                | Value::DbPointer { .. }
                | Value::JavaScript(_)
                | Value::Symbol(_)
                | Value::JavaScriptWithScope { .. }
                | Value::Int32(_)
                | Value::Timestamp { .. }
                | Value::Int64(_)
                | Value::Decimal128(_)
                | Value::MinKey
                | Value::MaxKey => {}
            }
        }
    }
}

/// Added and removed members of a key set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SetDiff {
    /// Present only in the second set
    pub added: Vec<String>,
    /// Present only in the first set
    pub removed: Vec<String>,
}

impl SetDiff {
    fn between<'a>(
        before: impl IntoIterator<Item = &'a String>,
        after: impl IntoIterator<Item = &'a String>,
    ) -> Self {
        let before: BTreeSet<&String> = before.into_iter().collect();
        let after: BTreeSet<&String> = after.into_iter().collect();
        Self {
            added: after.difference(&before).map(|s| s.to_string()).collect(),
            removed: before.difference(&after).map(|s| s.to_string()).collect(),
        }
    }

    /// True if both sets were identical
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Structural differences between two analyzed streams
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffReport {
    /// Second count minus first count
    pub document_count_diff: i64,
    /// Second total size minus first total size
    pub size_diff_bytes: i64,
    /// Field path presence changes
    pub field_differences: SetDiff,
    /// Type name presence changes
    pub type_differences: SetDiff,
}

/// Compares two sets of statistics by key presence and totals only.
pub fn compare(before: &AnalysisStats, after: &AnalysisStats) -> DiffReport {
    DiffReport {
        document_count_diff: after.total_documents as i64 - before.total_documents as i64,
        size_diff_bytes: after.total_size_bytes as i64 - before.total_size_bytes as i64,
        field_differences: SetDiff::between(before.field_names.keys(), after.field_names.keys()),
        type_differences: SetDiff::between(before.data_types.keys(), after.data_types.keys()),
    }
}

#[derive(Default)]
struct Analyzer {
    stats: AnalysisStats,
}

impl Reducer for Analyzer {
    type Output = AnalysisStats;

    fn mode(&self) -> Mode {
        Mode::Analyze
    }

    fn accept(&mut self, raw: RawDocument, decoded: Option<Document>) -> Result<Flow> {
        if let Some(doc) = decoded {
            self.stats.record_document(raw.len(), doc);
        }
        Ok(Flow::Continue)
    }

    fn reject(&mut self, _raw: &RawDocument, _err: &DecodeError) {
        self.stats.skipped_documents += 1;
    }

    fn finish(mut self, _summary: StreamSummary) -> Result<AnalysisStats> {
        if self.stats.total_documents > 0 {
            self.stats.avg_doc_size_bytes =
                self.stats.total_size_bytes as f64 / self.stats.total_documents as f64;
        }
        Ok(self.stats)
    }
}

/// Analyzes one stream
pub fn analyze<R: Read>(reader: R, progress: &mut dyn Progress) -> Result<AnalysisStats> {
    run(reader, Analyzer::default(), progress)
}

/// Analyzes a file on disk
pub fn analyze_file(path: impl AsRef<Path>, progress: &mut dyn Progress) -> Result<AnalysisStats> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::file_read(path, e))?;
    analyze(BufReader::new(file), progress)
}

/// Analyzes two files independently and compares them
pub fn compare_files(
    before: impl AsRef<Path>,
    after: impl AsRef<Path>,
    progress: &mut dyn Progress,
) -> Result<DiffReport> {
    let before = analyze_file(before, progress)?;
    let after = analyze_file(after, progress)?;
    Ok(compare(&before, &after))
}
