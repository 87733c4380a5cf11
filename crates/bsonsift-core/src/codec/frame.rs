//! Splitting a byte stream into length-prefixed documents.

use crate::error::FramingError;
use std::io::{self, Read};
use tracing::trace;

/// Smallest legal document: 4-byte length plus the terminator
pub const MIN_DOCUMENT_SIZE: i32 = 5;

/// Upper bound on the buffer reserved up front for one document
const INITIAL_CAPACITY_LIMIT: usize = 64 * 1024;

/// One complete document as read from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    ordinal: u64,
    offset: u64,
    bytes: Vec<u8>,
}

impl RawDocument {
    /// Zero-based position of the document in the stream
    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    /// Stream offset of the first byte
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The full encoding, length prefix and terminator included
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Total length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; a framed document holds at least five bytes
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Consumes the document, returning its bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Lazy iterator of [`RawDocument`]s over a reader.
///
/// The sequence ends cleanly at end of input on a document boundary. Any
/// framing failure is yielded once and ends the sequence; the reader is
/// never consulted again afterwards.
#[derive(Debug)]
pub struct FrameReader<R> {
    reader: R,
    offset: u64,
    framed: u64,
    finished: bool,
}

impl<R: Read> FrameReader<R> {
    /// Creates a frame reader positioned at a document boundary
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            offset: 0,
            framed: 0,
            finished: false,
        }
    }

    /// Bytes belonging to documents framed so far
    pub fn bytes_consumed(&self) -> u64 {
        self.offset
    }

    /// Number of documents framed so far
    pub fn documents_framed(&self) -> u64 {
        self.framed
    }

    fn read_prefix(&mut self, prefix: &mut [u8; 4]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < prefix.len() {
            match self.reader.read(&mut prefix[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn next_frame(&mut self) -> Result<Option<RawDocument>, FramingError> {
        let offset = self.offset;
        let io_error = |source: io::Error| FramingError::Io { offset, source };

        let mut prefix = [0u8; 4];
        let available = self.read_prefix(&mut prefix).map_err(io_error)?;
        if available == 0 {
            return Ok(None);
        }
        if available < prefix.len() {
            return Err(FramingError::TruncatedLength { offset, available });
        }

        let length = i32::from_le_bytes(prefix);
        if length < MIN_DOCUMENT_SIZE {
            return Err(FramingError::InvalidLength { offset, length });
        }

        let expected = length as usize;
        let mut bytes = Vec::with_capacity(expected.min(INITIAL_CAPACITY_LIMIT));
        bytes.extend_from_slice(&prefix);
        (&mut self.reader)
            .take((expected - prefix.len()) as u64)
            .read_to_end(&mut bytes)
            .map_err(io_error)?;

        if bytes.len() < expected {
            return Err(FramingError::TruncatedDocument {
                offset,
                expected,
                available: bytes.len(),
            });
        }

        trace!("Framed document {} at {} ({} bytes)", self.framed, offset, expected);

        let document = RawDocument {
            ordinal: self.framed,
            offset,
            bytes,
        };
        self.offset += expected as u64;
        self.framed += 1;
        Ok(Some(document))
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = Result<RawDocument, FramingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_frame() {
            Ok(Some(document)) => Some(Ok(document)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
