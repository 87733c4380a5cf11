//! Stream rewriting: export, deduplicate, trim and clean.
//!
//! Apart from export, every transform writes the original bytes of the
//! documents it keeps. Nothing is ever re-encoded, so a kept document is
//! byte-for-byte identical to its input.

mod export;

pub use export::{export, ExportConfig};

use crate::codec::RawDocument;
use crate::error::{DecodeError, Error, Result};
use crate::hash::{canonical_hash, Digest};
use crate::pipeline::{run, Flow, Mode, Progress, Reducer, StreamSummary};
use crate::value::Document;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{debug, trace};

/// Counts from one transform pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransformReport {
    /// Documents read from the input
    pub processed: u64,
    /// Documents written to the output
    pub written: u64,
    /// Documents left out because they failed to decode
    pub skipped: u64,
}

impl TransformReport {
    /// Documents left out for any other reason, such as duplicates
    pub fn dropped(&self) -> u64 {
        self.processed.saturating_sub(self.written + self.skipped)
    }
}

/// A stream rewrite
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform {
    /// Extended JSON array of every decodable document
    Export(ExportConfig),
    /// First occurrence of each distinct document
    Deduplicate,
    /// Documents `0..=limit`, copied without decoding
    Trim {
        /// Zero-based index of the last document kept
        limit: u64,
    },
    /// Every decodable document
    Clean,
}

impl Transform {
    /// Pipeline mode this transform runs in
    pub fn mode(&self) -> Mode {
        match self {
            Transform::Export(_) => Mode::Export,
            Transform::Deduplicate => Mode::Deduplicate,
            Transform::Trim { .. } => Mode::Trim,
            Transform::Clean => Mode::Clean,
        }
    }

    /// Applies the transform from `reader` to `writer`
    pub fn apply<R, W>(
        &self,
        reader: R,
        writer: W,
        progress: &mut dyn Progress,
    ) -> Result<TransformReport>
    where
        R: Read,
        W: Write,
    {
        match self {
            Transform::Export(config) => export(reader, writer, config, progress),
            Transform::Deduplicate => deduplicate(reader, writer, progress),
            Transform::Trim { limit } => trim(reader, writer, *limit, progress),
            Transform::Clean => clean(reader, writer, progress),
        }
    }

    /// Applies the transform between two files.
    ///
    /// The output file is created and must not exist yet.
    pub fn apply_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        progress: &mut dyn Progress,
    ) -> Result<TransformReport> {
        let input = input.as_ref();
        let output = output.as_ref();

        let source = File::open(input).map_err(|e| Error::file_read(input, e))?;
        let sink = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(output)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => Error::OutputExists {
                    path: output.to_path_buf(),
                },
                _ => Error::file_write(output, e),
            })?;

        debug!("{:?}: {} -> {}", self.mode(), input.display(), output.display());

        self.apply(BufReader::new(source), BufWriter::new(sink), progress)
            .map_err(|err| match err {
                Error::Output(source) => Error::file_write(output, source),
                other => other,
            })
    }
}

/// Output side shared by the byte-copying transforms
struct Sink<W> {
    out: W,
    report: TransformReport,
}

impl<W: Write> Sink<W> {
    fn new(out: W) -> Self {
        Self {
            out,
            report: TransformReport::default(),
        }
    }

    fn copy(&mut self, raw: &RawDocument) -> Result<()> {
        self.out.write_all(raw.as_bytes()).map_err(Error::Output)?;
        self.report.written += 1;
        Ok(())
    }

    fn finish(mut self, summary: StreamSummary) -> Result<TransformReport> {
        self.out.flush().map_err(Error::Output)?;
        self.report.processed = summary.documents;
        Ok(self.report)
    }
}

struct Deduplicator<W> {
    sink: Sink<W>,
    seen: HashSet<Digest>,
}

impl<W: Write> Reducer for Deduplicator<W> {
    type Output = TransformReport;

    fn mode(&self) -> Mode {
        Mode::Deduplicate
    }

    fn accept(&mut self, raw: RawDocument, decoded: Option<Document>) -> Result<Flow> {
        let Some(doc) = decoded else {
            return Ok(Flow::Continue);
        };
        if self.seen.insert(canonical_hash(&doc)) {
            self.sink.copy(&raw)?;
        } else {
            trace!("Dropping duplicate document {}", raw.ordinal());
        }
        Ok(Flow::Continue)
    }

    fn reject(&mut self, _raw: &RawDocument, _err: &DecodeError) {
        self.sink.report.skipped += 1;
    }

    fn finish(self, summary: StreamSummary) -> Result<TransformReport> {
        debug!("{} distinct documents", self.seen.len());
        self.sink.finish(summary)
    }
}

struct Trimmer<W> {
    sink: Sink<W>,
    limit: u64,
}

impl<W: Write> Reducer for Trimmer<W> {
    type Output = TransformReport;

    fn mode(&self) -> Mode {
        Mode::Trim
    }

    fn accept(&mut self, raw: RawDocument, _decoded: Option<Document>) -> Result<Flow> {
        self.sink.copy(&raw)?;
        if self.sink.report.written > self.limit {
            Ok(Flow::Stop)
        } else {
            Ok(Flow::Continue)
        }
    }

    fn finish(self, summary: StreamSummary) -> Result<TransformReport> {
        self.sink.finish(summary)
    }
}

struct Cleaner<W> {
    sink: Sink<W>,
}

impl<W: Write> Reducer for Cleaner<W> {
    type Output = TransformReport;

    fn mode(&self) -> Mode {
        Mode::Clean
    }

    fn accept(&mut self, raw: RawDocument, _decoded: Option<Document>) -> Result<Flow> {
        self.sink.copy(&raw)?;
        Ok(Flow::Continue)
    }

    fn reject(&mut self, _raw: &RawDocument, _err: &DecodeError) {
        self.sink.report.skipped += 1;
    }

    fn finish(self, summary: StreamSummary) -> Result<TransformReport> {
        self.sink.finish(summary)
    }
}

/// Copies the first occurrence of every distinct document.
///
/// Documents are compared by [`canonical_hash`], so field order does not
/// matter. Later duplicates are dropped without a warning.
pub fn deduplicate<R: Read, W: Write>(
    reader: R,
    writer: W,
    progress: &mut dyn Progress,
) -> Result<TransformReport> {
    let reducer = Deduplicator {
        sink: Sink::new(writer),
        seen: HashSet::new(),
    };
    run(reader, reducer, progress)
}

/// Copies documents `0..=limit` without decoding them.
///
/// Reading stops as soon as `limit + 1` documents have been written, so
/// damage further into the stream is never reached.
pub fn trim<R: Read, W: Write>(
    reader: R,
    writer: W,
    limit: u64,
    progress: &mut dyn Progress,
) -> Result<TransformReport> {
    let reducer = Trimmer {
        sink: Sink::new(writer),
        limit,
    };
    run(reader, reducer, progress)
}

/// Copies every document that decodes, dropping the rest with a warning
pub fn clean<R: Read, W: Write>(
    reader: R,
    writer: W,
    progress: &mut dyn Progress,
) -> Result<TransformReport> {
    run(reader, Cleaner { sink: Sink::new(writer) }, progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FramingError;
    use crate::fixtures::{stream, unknown_type_document, DocBuilder};
    use crate::pipeline::NullProgress;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn apply(transform: &Transform, data: &[u8]) -> (Vec<u8>, TransformReport) {
        let mut out = Vec::new();
        let report = transform
            .apply(Cursor::new(data), &mut out, &mut NullProgress)
            .unwrap();
        (out, report)
    }

    fn numbered(n: i32) -> Vec<u8> {
        DocBuilder::new().int32("n", n).build()
    }

    #[test]
    fn test_deduplicate_ignores_field_order() {
        let ab = DocBuilder::new().int32("a", 1).int32("b", 2).build();
        let ba = DocBuilder::new().int32("b", 2).int32("a", 1).build();
        let other = DocBuilder::new().int32("a", 2).build();
        let data = stream(&[ab.clone(), ba, other.clone(), ab.clone()]);

        let (out, report) = apply(&Transform::Deduplicate, &data);
        assert_eq!(out, stream(&[ab, other]));
        assert_eq!(report.processed, 4);
        assert_eq!(report.written, 2);
        assert_eq!(report.dropped(), 2);
    }

    #[test]
    fn test_deduplicate_is_idempotent() {
        let data = stream(&[numbered(1), numbered(2), numbered(1), numbered(3), numbered(2)]);
        let (once, _) = apply(&Transform::Deduplicate, &data);
        let (twice, report) = apply(&Transform::Deduplicate, &once);
        assert_eq!(once, twice);
        assert_eq!(report.dropped(), 0);
    }

    #[test]
    fn test_deduplicate_skips_undecodable() {
        let data = stream(&[unknown_type_document(), numbered(1), unknown_type_document()]);
        let (out, report) = apply(&Transform::Deduplicate, &data);
        assert_eq!(out, numbered(1));
        assert_eq!(report.skipped, 2);
    }

    #[test]
    fn test_trim_limit_is_inclusive() {
        let docs: Vec<_> = (0..5).map(numbered).collect();
        let data = stream(&docs);

        let (out, report) = apply(&Transform::Trim { limit: 2 }, &data);
        assert_eq!(out, stream(&docs[..3]));
        assert_eq!(report.written, 3);
        assert_eq!(report.processed, 3);

        let (out, _) = apply(&Transform::Trim { limit: 0 }, &data);
        assert_eq!(out, docs[0]);

        let (out, report) = apply(&Transform::Trim { limit: 10 }, &data);
        assert_eq!(out, data);
        assert_eq!(report.written, 5);
    }

    #[test]
    fn test_trim_copies_undecodable_documents() {
        let data = stream(&[unknown_type_document(), numbered(1)]);
        let (out, report) = apply(&Transform::Trim { limit: 1 }, &data);
        assert_eq!(out, data);
        assert_eq!(report.skipped, 0);
    }

    #[test]
    fn test_trim_stops_before_damage() {
        let mut data = stream(&[numbered(0), numbered(1)]);
        data.extend_from_slice(&[2, 0, 0, 0]);
        let (out, _) = apply(&Transform::Trim { limit: 1 }, &data);
        assert_eq!(out, stream(&[numbered(0), numbered(1)]));

        let result =
            Transform::Trim { limit: 2 }.apply(Cursor::new(&data), Vec::new(), &mut NullProgress);
        assert!(matches!(
            result,
            Err(Error::Framing(FramingError::InvalidLength { length: 2, .. }))
        ));
    }

    #[test]
    fn test_clean_keeps_original_bytes() {
        let good = DocBuilder::new()
            .double("d", 1.5)
            .string("s", "text")
            .document("sub", DocBuilder::new().null("x"))
            .build();
        let data = stream(&[good.clone(), unknown_type_document(), numbered(7)]);

        let mut warnings = Vec::new();
        let mut progress = Warnings(&mut warnings);
        let mut out = Vec::new();
        let report = clean(Cursor::new(&data), &mut out, &mut progress).unwrap();

        assert_eq!(out, stream(&[good, numbered(7)]));
        assert_eq!(
            report,
            TransformReport {
                processed: 3,
                written: 2,
                skipped: 1,
            }
        );
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("Removing invalid document 1:"));
    }

    struct Warnings<'a>(&'a mut Vec<String>);

    impl Progress for Warnings<'_> {
        fn warn(&mut self, message: &str) {
            self.0.push(message.to_string());
        }
    }

    #[test]
    fn test_apply_file_refuses_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.bson");
        let output = dir.path().join("out.bson");
        std::fs::write(&input, stream(&[numbered(1), numbered(1)])).unwrap();
        std::fs::write(&output, b"keep").unwrap();

        let result = Transform::Clean.apply_file(&input, &output, &mut NullProgress);
        assert!(matches!(result, Err(Error::OutputExists { .. })));
        assert_eq!(std::fs::read(&output).unwrap(), b"keep");
    }

    #[test]
    fn test_apply_file_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.bson");
        let output = dir.path().join("out.bson");
        std::fs::write(&input, stream(&[numbered(1), numbered(1)])).unwrap();

        let report = Transform::Deduplicate
            .apply_file(&input, &output, &mut NullProgress)
            .unwrap();
        assert_eq!(report.written, 1);
        assert_eq!(std::fs::read(&output).unwrap(), numbered(1));
    }

    #[test]
    fn test_apply_file_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let result = Transform::Clean.apply_file(
            dir.path().join("missing.bson"),
            dir.path().join("out.bson"),
            &mut NullProgress,
        );
        assert!(matches!(result, Err(Error::FileRead { .. })));
        assert!(!dir.path().join("out.bson").exists());
    }
}
