//! Extended JSON export.

use super::TransformReport;
use crate::codec::RawDocument;
use crate::error::{DecodeError, Error, Result};
use crate::pipeline::{run, Flow, Mode, Progress, Reducer, StreamSummary};
use crate::value::{to_writer_pretty, Document};
use std::io::{Read, Write};

/// Configuration for JSON export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Indentation unit used when pretty-printing each document
    pub indent: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            indent: "  ".to_string(),
        }
    }
}

impl ExportConfig {
    /// Creates a new export config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the indentation unit
    pub fn indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = indent.into();
        self
    }
}

struct Exporter<W> {
    out: W,
    indent: Vec<u8>,
    report: TransformReport,
}

impl<W: Write> Exporter<W> {
    fn write_document(&mut self, doc: &Document) -> Result<()> {
        if self.report.written > 0 {
            self.out.write_all(b",\n").map_err(Error::Output)?;
        }
        to_writer_pretty(doc, &mut self.out, &self.indent).map_err(Error::Output)?;
        self.report.written += 1;
        Ok(())
    }
}

impl<W: Write> Reducer for Exporter<W> {
    type Output = TransformReport;

    fn mode(&self) -> Mode {
        Mode::Export
    }

    fn accept(&mut self, _raw: RawDocument, decoded: Option<Document>) -> Result<Flow> {
        if let Some(doc) = decoded {
            self.write_document(&doc)?;
        }
        Ok(Flow::Continue)
    }

    fn reject(&mut self, _raw: &RawDocument, _err: &DecodeError) {
        self.report.skipped += 1;
    }

    fn finish(mut self, summary: StreamSummary) -> Result<TransformReport> {
        self.out.write_all(b"\n]").map_err(Error::Output)?;
        self.out.flush().map_err(Error::Output)?;
        self.report.processed = summary.documents;
        Ok(self.report)
    }
}

/// Writes every decodable document as one element of a JSON array.
///
/// The brackets are written even for an empty stream. Documents that fail
/// to decode are skipped with a warning.
pub fn export<R, W>(
    reader: R,
    mut writer: W,
    config: &ExportConfig,
    progress: &mut dyn Progress,
) -> Result<TransformReport>
where
    R: Read,
    W: Write,
{
    writer.write_all(b"[\n").map_err(Error::Output)?;
    let exporter = Exporter {
        out: writer,
        indent: config.indent.as_bytes().to_vec(),
        report: TransformReport::default(),
    };
    run(reader, exporter, progress)
}
