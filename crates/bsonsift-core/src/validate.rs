//! Structural integrity checking.
//!
//! Validation never fails past its own boundary: undecodable documents are
//! counted, a framing failure clears the integrity flag, and a mismatch
//! between bytes framed and total stream size becomes a warning.

use crate::codec::RawDocument;
use crate::error::{DecodeError, Error, FramingError, Result};
use crate::pipeline::{run, Flow, Mode, Progress, Reducer, StreamSummary};
use crate::value::Document;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

/// Outcome of validating one stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Documents that decoded successfully
    pub valid_documents: u64,
    /// Documents that framed but failed to decode
    pub invalid_documents: u64,
    /// Per-document and framing errors, in stream order
    pub errors: Vec<String>,
    /// Non-fatal observations
    pub warnings: Vec<String>,
    /// False once a framing error has been seen
    pub integrity_check: bool,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self {
            valid_documents: 0,
            invalid_documents: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            integrity_check: true,
        }
    }
}

impl ValidationReport {
    /// Documents framed, valid or not
    pub fn total_documents(&self) -> u64 {
        self.valid_documents + self.invalid_documents
    }

    /// True if the stream framed completely and every document decoded
    pub fn is_clean(&self) -> bool {
        self.integrity_check && self.invalid_documents == 0
    }
}

struct Validator {
    total_size: u64,
    report: ValidationReport,
}

impl Reducer for Validator {
    type Output = ValidationReport;

    fn mode(&self) -> Mode {
        Mode::Validate
    }

    fn accept(&mut self, _raw: RawDocument, _decoded: Option<Document>) -> Result<Flow> {
        self.report.valid_documents += 1;
        Ok(Flow::Continue)
    }

    fn reject(&mut self, raw: &RawDocument, err: &DecodeError) {
        self.report.invalid_documents += 1;
        self.report
            .errors
            .push(format!("Document {}: {}", raw.ordinal(), err));
    }

    fn framing_failed(&mut self, err: FramingError) {
        self.report.errors.push(err.to_string());
        self.report.integrity_check = false;
    }

    fn finish(mut self, summary: StreamSummary) -> Result<ValidationReport> {
        if summary.bytes_consumed != self.total_size {
            self.report.warnings.push(format!(
                "File size ({}) doesn't match processed bytes ({})",
                self.total_size, summary.bytes_consumed
            ));
        }
        Ok(self.report)
    }
}

/// Validates a stream whose full length is `total_size` bytes.
pub fn validate<R: Read>(reader: R, total_size: u64, progress: &mut dyn Progress) -> ValidationReport {
    let validator = Validator {
        total_size,
        report: ValidationReport::default(),
    };
    match run(reader, validator, progress) {
        Ok(report) => report,
        // Validate mode records framing errors, so only a reducer failure lands here
        Err(err) => ValidationReport {
            errors: vec![err.to_string()],
            integrity_check: false,
            ..ValidationReport::default()
        },
    }
}

/// Validates a file on disk
pub fn validate_file(path: impl AsRef<Path>, progress: &mut dyn Progress) -> Result<ValidationReport> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::file_read(path, e))?;
    let total_size = file
        .metadata()
        .map_err(|e| Error::file_read(path, e))?
        .len();
    debug!("Validating {} ({} bytes)", path.display(), total_size);
    Ok(validate(BufReader::new(file), total_size, progress))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{stream, unknown_type_document, DocBuilder};
    use crate::pipeline::NullProgress;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn check(data: Vec<u8>) -> ValidationReport {
        let len = data.len() as u64;
        validate(Cursor::new(data), len, &mut NullProgress)
    }

    #[test]
    fn test_clean_stream() {
        let data = stream(&[
            DocBuilder::new().int32("a", 1).build(),
            DocBuilder::new().string("b", "x").build(),
        ]);
        let report = check(data);
        assert_eq!(
            report,
            ValidationReport {
                valid_documents: 2,
                ..ValidationReport::default()
            }
        );
        assert!(report.is_clean());
    }

    #[test]
    fn test_empty_stream_is_valid() {
        let report = check(Vec::new());
        assert_eq!(report.total_documents(), 0);
        assert!(report.integrity_check);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_invalid_size_after_valid_documents() {
        let doc = DocBuilder::new().int32("a", 1).build();
        let mut data = stream(&[doc.clone(), doc.clone(), doc.clone()]);
        let framed = data.len();
        data.extend_from_slice(&2i32.to_le_bytes());

        let report = check(data);
        assert_eq!(report.valid_documents, 3);
        assert_eq!(report.invalid_documents, 0);
        assert!(!report.integrity_check);
        assert_eq!(
            report.errors,
            vec![format!("Invalid document size (2) at position {framed}")]
        );
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_undecodable_document_is_counted() {
        let data = stream(&[
            DocBuilder::new().int32("a", 1).build(),
            unknown_type_document(),
        ]);
        let report = check(data);
        assert_eq!(report.valid_documents, 1);
        assert_eq!(report.invalid_documents, 1);
        assert!(report.integrity_check);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("Document 1: unknown element type 0x42"));
    }

    #[test]
    fn test_size_mismatch_is_only_a_warning() {
        let data = DocBuilder::new().int32("a", 1).build();
        let len = data.len() as u64;
        let report = validate(Cursor::new(data), len + 10, &mut NullProgress);
        assert!(report.integrity_check);
        assert_eq!(
            report.warnings,
            vec![format!("File size ({}) doesn't match processed bytes ({})", len + 10, len)]
        );
    }

    #[test]
    fn test_truncated_size_field() {
        let mut data = DocBuilder::new().build();
        data.extend_from_slice(&[7, 0, 0]);
        let report = check(data);
        assert_eq!(report.valid_documents, 1);
        assert!(!report.integrity_check);
        assert_eq!(report.errors, vec!["Truncated size field at position 5".to_string()]);
    }
}
