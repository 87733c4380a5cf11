//! # bsonsift-core
//!
//! A library for inspecting and repairing concatenated BSON document streams,
//! such as the files produced by `mongodump`.
//!
//! This crate provides the core functionality for:
//! - Framing a byte stream into length-prefixed documents
//! - Decoding documents into a generic [`Value`] tree
//! - Validating, analyzing and comparing streams
//! - Exporting to Extended JSON, deduplicating, trimming and cleaning
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`codec`]: Framing and decoding of the wire format
//! - [`value`]: Decoded value model and its Extended JSON form
//! - [`hash`]: Key-order independent content hashing
//! - [`pipeline`]: The single-pass driver and its per-mode error policy
//! - [`validate`], [`analyze`], [`transform`]: Operations built on the driver
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use bsonsift_core::{validate_file, LogProgress, Transform};
//!
//! let report = validate_file("dump/users.bson", &mut LogProgress::default())?;
//! println!("{} valid, {} invalid", report.valid_documents, report.invalid_documents);
//!
//! if report.invalid_documents > 0 {
//!     Transform::Clean.apply_file(
//!         "dump/users.bson",
//!         "dump/users.clean.bson",
//!         &mut LogProgress::default(),
//!     )?;
//! }
//! # Ok::<(), bsonsift_core::Error>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`Progress`]: Observe documents as they are processed
//! - [`Reducer`]: Run a custom single-pass aggregation under a [`Mode`]'s error policy

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod analyze;
pub mod codec;
pub mod error;
pub mod hash;
pub mod pipeline;
pub mod preconditions;
pub mod transform;
pub mod validate;
pub mod value;

#[cfg(test)]
mod fixtures;

// Re-export primary types for convenience
pub use analyze::{analyze, analyze_file, compare, compare_files, AnalysisStats, DiffReport};
pub use codec::{decode, FrameReader, RawDocument};
pub use error::{DecodeError, Error, FramingError, Result};
pub use hash::canonical_hash;
pub use pipeline::{run, LogProgress, Mode, NullProgress, Progress, Reducer};
pub use preconditions::check_paths;
pub use transform::{ExportConfig, Transform, TransformReport};
pub use validate::{validate, validate_file, ValidationReport};
pub use value::{Document, Value};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
