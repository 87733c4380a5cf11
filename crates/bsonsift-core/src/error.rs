//! Error types for the bsonsift-core library.
//!
//! Errors are split by how far their damage reaches:
//!
//! - [`FramingError`]: the stream can no longer be split into documents.
//!   Always fatal to the stream, because every later offset is untrusted.
//! - [`DecodeError`]: one framed document has a malformed body. Always
//!   recoverable at document granularity.
//! - [`Error`]: everything an operation can surface to its caller, including
//!   I/O failures and path preconditions.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for bsonsift operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure to split the byte stream into documents.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FramingError {
    /// Fewer than four bytes remained where a length prefix was expected
    #[error("Truncated size field at position {offset}")]
    TruncatedLength {
        /// Stream offset of the partial prefix
        offset: u64,
        /// Number of prefix bytes actually available
        available: usize,
    },

    /// The length prefix is below the five-byte minimum
    #[error("Invalid document size ({length}) at position {offset}")]
    InvalidLength {
        /// Stream offset of the prefix
        offset: u64,
        /// The decoded prefix value
        length: i32,
    },

    /// The stream ended inside a document body
    #[error("Truncated document at position {offset}: expected {expected} bytes, found {available}")]
    TruncatedDocument {
        /// Stream offset of the document start
        offset: u64,
        /// Declared document length
        expected: usize,
        /// Bytes actually available
        available: usize,
    },

    /// The underlying reader failed
    #[error("read failed at position {offset}: {source}")]
    Io {
        /// Stream offset at which the read was attempted
        offset: u64,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl FramingError {
    /// Stream offset the error refers to
    pub fn offset(&self) -> u64 {
        match self {
            Self::TruncatedLength { offset, .. }
            | Self::InvalidLength { offset, .. }
            | Self::TruncatedDocument { offset, .. }
            | Self::Io { offset, .. } => *offset,
        }
    }
}

/// Failure to decode the body of one framed document.
///
/// Offsets are relative to the first byte of the document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeError {
    /// Element type byte outside the known set
    #[error("unknown element type 0x{tag:02x} at offset {offset}")]
    UnknownType {
        /// The unrecognised type byte
        tag: u8,
        /// Offset of the type byte
        offset: usize,
    },

    /// A key, C-string or length-prefixed string is not well formed
    #[error("malformed string at offset {offset}: {reason}")]
    MalformedString {
        /// Offset of the string start
        offset: usize,
        /// What was wrong with it
        reason: &'static str,
    },

    /// A payload runs past the end of its enclosing document
    #[error("truncated payload at offset {offset}: need {needed} bytes, {available} available")]
    TruncatedPayload {
        /// Offset of the payload start
        offset: usize,
        /// Bytes the payload requires
        needed: usize,
        /// Bytes left in the enclosing document
        available: usize,
    },

    /// A document or array does not end with a null byte
    #[error("missing document terminator at offset {offset}")]
    MissingTerminator {
        /// Offset where the terminator was expected
        offset: usize,
    },

    /// An embedded length disagrees with the bytes it covers
    #[error("size mismatch at offset {offset}: declared {declared}, actual {actual}")]
    SizeMismatch {
        /// Offset of the length field
        offset: usize,
        /// Length as declared in the encoding
        declared: i64,
        /// Length actually consumed
        actual: i64,
    },

    /// A boolean byte other than 0x00 or 0x01
    #[error("invalid boolean value 0x{value:02x} at offset {offset}")]
    InvalidBoolean {
        /// Offset of the boolean byte
        offset: usize,
        /// The offending byte
        value: u8,
    },
}

impl DecodeError {
    /// Offset within the document the error refers to
    pub fn offset(&self) -> usize {
        match self {
            Self::UnknownType { offset, .. }
            | Self::MalformedString { offset, .. }
            | Self::TruncatedPayload { offset, .. }
            | Self::MissingTerminator { offset }
            | Self::SizeMismatch { offset, .. }
            | Self::InvalidBoolean { offset, .. } => *offset,
        }
    }
}

/// Comprehensive error type for all bsonsift operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The stream could not be framed
    #[error(transparent)]
    Framing(#[from] FramingError),

    /// A document could not be decoded
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Failed to open or read an input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or write an output file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        /// Path to the file that failed to write
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to write to an output stream
    #[error("failed to write output: {0}")]
    Output(#[source] std::io::Error),

    /// Input path does not exist or is not a regular file
    #[error("Input file not found: {}", path.display())]
    InputNotFound {
        /// The missing input path
        path: PathBuf,
    },

    /// Output path already exists
    #[error("Output file already exists: {}", path.display())]
    OutputExists {
        /// The existing output path
        path: PathBuf,
    },

    /// Input and output refer to the same file
    #[error("Input and output paths cannot be the same: {}", path.display())]
    SamePath {
        /// The shared path
        path: PathBuf,
    },
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new file write error
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Returns true if processing of the stream may continue past this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}
