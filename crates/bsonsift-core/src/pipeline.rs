//! Driving reducers over a framed document stream.
//!
//! [`run`] pulls documents from a [`FrameReader`], decodes them when the
//! reducer's [`Mode`] needs decoded values, and applies the mode's error
//! policy:
//!
//! | Mode        | Framing error               | Decode error            |
//! |-------------|-----------------------------|-------------------------|
//! | Validate    | stop, recorded in report    | recorded, continue      |
//! | Analyze     | stop, fatal                 | skipped with warning    |
//! | Export      | stop, fatal                 | skipped with warning    |
//! | Deduplicate | stop, fatal                 | skipped with warning    |
//! | Trim        | stop, fatal                 | not decoded             |
//! | Clean       | stop, fatal                 | dropped with warning    |
//!
//! Processing is strictly sequential and in stream order.

use crate::codec::{decode, FrameReader, RawDocument};
use crate::error::{DecodeError, FramingError, Result};
use crate::value::Document;
use std::io::Read;
use tracing::{debug, info, warn};

/// Operation a pipeline runs on behalf of
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Integrity report
    Validate,
    /// Statistics
    Analyze,
    /// Extended JSON export
    Export,
    /// Duplicate removal
    Deduplicate,
    /// Prefix copy
    Trim,
    /// Invalid document removal
    Clean,
}

/// What happens when the stream cannot be framed any further
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingPolicy {
    /// Hand the error to the reducer and finish normally
    Record,
    /// Abort the operation with the error
    Fatal,
}

/// What happens when one document fails to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePolicy {
    /// The failure is the datum: count it, no warning
    Record,
    /// Leave the document out and warn
    Skip,
    /// Documents are copied without decoding
    NotDecoded,
}

impl Mode {
    /// Policy for framing errors
    pub fn framing_policy(self) -> FramingPolicy {
        match self {
            Mode::Validate => FramingPolicy::Record,
            Mode::Analyze | Mode::Export | Mode::Deduplicate | Mode::Trim | Mode::Clean => {
                FramingPolicy::Fatal
            }
        }
    }

    /// Policy for decode errors
    pub fn decode_policy(self) -> DecodePolicy {
        match self {
            Mode::Validate => DecodePolicy::Record,
            Mode::Analyze | Mode::Export | Mode::Deduplicate | Mode::Clean => DecodePolicy::Skip,
            Mode::Trim => DecodePolicy::NotDecoded,
        }
    }

    /// Verb used in progress messages
    pub fn verb(self) -> &'static str {
        match self {
            Mode::Validate => "Validated",
            Mode::Analyze => "Analyzed",
            Mode::Export => "Converted",
            Mode::Deduplicate | Mode::Trim | Mode::Clean => "Processed",
        }
    }

    /// Warning for a document left out under [`DecodePolicy::Skip`]
    fn skip_message(self, ordinal: u64, err: &DecodeError) -> String {
        let action = match self {
            Mode::Analyze => "Could not analyze",
            Mode::Export => "Could not convert",
            Mode::Clean => "Removing invalid",
            _ => "Could not process",
        };
        format!("{action} document {ordinal}: {err}")
    }
}

/// Observer notified as documents are processed.
///
/// Purely observational; nothing it does affects the pipeline.
pub trait Progress {
    /// Called once per framed document; `processed` counts from 1
    fn update(&mut self, mode: Mode, processed: u64) {
        let _ = (mode, processed);
    }

    /// Called once per skipped or dropped document
    fn warn(&mut self, message: &str) {
        let _ = message;
    }
}

/// A progress sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl Progress for NullProgress {}

/// Logs a line every `interval` documents and every warning
#[derive(Debug, Clone, Copy)]
pub struct LogProgress {
    interval: u64,
}

impl Default for LogProgress {
    fn default() -> Self {
        Self { interval: 1000 }
    }
}

impl LogProgress {
    /// Creates a sink logging every `interval` documents (0 disables updates)
    pub fn new(interval: u64) -> Self {
        Self { interval }
    }

    /// Configured interval
    pub fn interval(&self) -> u64 {
        self.interval
    }
}

impl Progress for LogProgress {
    fn update(&mut self, mode: Mode, processed: u64) {
        if self.interval > 0 && processed % self.interval == 0 {
            info!("{} document {}", mode.verb(), processed);
        }
    }

    fn warn(&mut self, message: &str) {
        warn!("{}", message);
    }
}

impl<F: FnMut(u64)> Progress for F {
    fn update(&mut self, _mode: Mode, processed: u64) {
        self(processed)
    }
}

/// Whether the pipeline should keep reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next document
    Continue,
    /// Stop before reading any further
    Stop,
}

/// Where the stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    /// Documents framed
    pub documents: u64,
    /// Bytes covered by framed documents
    pub bytes_consumed: u64,
    /// True if a reducer asked to stop before end of input
    pub stopped_early: bool,
}

/// A per-operation aggregation over the document stream
pub trait Reducer {
    /// Value produced once the stream is exhausted
    type Output;

    /// Operation this reducer implements; selects the error policy
    fn mode(&self) -> Mode;

    /// Accepts one framed document, decoded unless the mode copies raw bytes
    fn accept(&mut self, raw: RawDocument, decoded: Option<Document>) -> Result<Flow>;

    /// Notified of every document that failed to decode
    fn reject(&mut self, raw: &RawDocument, err: &DecodeError) {
        let _ = (raw, err);
    }

    /// Receives the terminal framing error under [`FramingPolicy::Record`]
    fn framing_failed(&mut self, err: FramingError) {
        let _ = err;
    }

    /// Produces the output
    fn finish(self, summary: StreamSummary) -> Result<Self::Output>;
}

/// Runs `reducer` over every document in `reader`.
pub fn run<R, D>(reader: R, mut reducer: D, progress: &mut dyn Progress) -> Result<D::Output>
where
    R: Read,
    D: Reducer,
{
    let mode = reducer.mode();
    let mut frames = FrameReader::new(reader);
    let mut stopped_early = false;

    debug!("Starting {:?} pass", mode);

    for frame in frames.by_ref() {
        let raw = match frame {
            Ok(raw) => raw,
            Err(err) => match mode.framing_policy() {
                FramingPolicy::Record => {
                    debug!("Framing stopped: {}", err);
                    reducer.framing_failed(err);
                    break;
                }
                FramingPolicy::Fatal => return Err(err.into()),
            },
        };
        let processed = raw.ordinal() + 1;

        let flow = match mode.decode_policy() {
            DecodePolicy::NotDecoded => reducer.accept(raw, None)?,
            policy => match decode(&raw) {
                Ok(doc) => reducer.accept(raw, Some(doc))?,
                Err(err) => {
                    if policy == DecodePolicy::Skip {
                        progress.warn(&mode.skip_message(raw.ordinal(), &err));
                    }
                    reducer.reject(&raw, &err);
                    Flow::Continue
                }
            },
        };

        progress.update(mode, processed);

        if flow == Flow::Stop {
            stopped_early = true;
            break;
        }
    }

    let summary = StreamSummary {
        documents: frames.documents_framed(),
        bytes_consumed: frames.bytes_consumed(),
        stopped_early,
    };
    debug!(
        "{:?} pass complete: {} documents, {} bytes",
        mode, summary.documents, summary.bytes_consumed
    );
    reducer.finish(summary)
}
