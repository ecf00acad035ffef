#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! ## Pipeline
//!
//! ```text
//! Read ──▶ RecordStream ──▶ CombiningReader ──▶ CombinedDocument
//!            │  decode()          │ IdentifierSpec
//!            ▼                    ▼
//!        Result<Record>     Result<CombinedDocument>
//! ```
//!
//! Every stage is a pull-based [`Iterator`]; nothing is read before the
//! consumer asks for the next item, and at most one record window and one
//! open group are held in memory.
//!
//! ## Modules
//!
//! - [`decoder`]: decoding one ISO 2709 record from a buffer
//! - [`stream`]: splitting a byte source into records, with resynchronization
//! - [`combine`]: grouping adjacent records by identifier
//! - [`document`]: the combined document handed to consumers
//! - [`identifier`]: which field holds the grouping key
//! - [`record`] and [`leader`]: the record model
//! - [`encoding`]: MARC-8, UTF-8 and Latin-1 text decoding
//! - [`writer`]: serializing records back to ISO 2709
//! - [`config`]: settings for the pipeline
//! - [`error`]: error types and result type

pub mod combine;
pub mod config;
pub mod decoder;
pub mod document;
pub mod encoding;
pub mod error;
pub mod identifier;
pub mod leader;
pub mod record;
pub mod stream;
pub mod writer;

pub use combine::{combine_records, CombineStats, CombiningReader};
pub use config::CombineConfig;
pub use decoder::decode;
pub use document::CombinedDocument;
pub use encoding::SourceEncoding;
pub use error::{DecodeError, ErrorKind, MarcError, Result};
pub use identifier::IdentifierSpec;
pub use leader::Leader;
pub use record::{DataField, Field, FieldValue, Record, Subfield, Tag};
pub use stream::{RecordStream, StreamStats};
pub use writer::MarcWriter;
