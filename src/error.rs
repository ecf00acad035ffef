//! Error types for MARC stream operations.
//!
//! Two layers are distinguished:
//!
//! - [`DecodeError`] describes why a single record could not be decoded. It is
//!   local to that record; the stream keeps going after reporting it.
//! - [`MarcError`] is the item error type of the record and document streams.
//!   It wraps decode errors and adds the stream-level conditions
//!   ([`MarcError::UnrecoverableStream`], I/O failures) that end a run.
//!
//! The [`Result`] alias uses [`MarcError`].

use thiserror::Error;

/// Error describing why one record failed to decode.
///
/// Every variant carries the byte offset of the start of the offending record.
/// Offsets are relative to the buffer handed to [`crate::decoder::decode`] and
/// absolute stream positions once the error has passed through a
/// [`crate::stream::RecordStream`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes remain than the leader or the declared record length needs.
    #[error("Truncated input at byte {offset}: need {needed} bytes, {available} available")]
    TruncatedInput {
        /// Start of the record.
        offset: u64,
        /// Bytes required to continue decoding.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// The 24-byte leader is not structurally valid.
    #[error("Malformed leader at byte {offset}: {reason}")]
    MalformedLeader {
        /// Start of the record.
        offset: u64,
        /// What was wrong with the leader.
        reason: String,
    },

    /// The directory is not a well-formed sequence of entries.
    #[error("Malformed directory in record at byte {offset}: {reason}")]
    MalformedDirectory {
        /// Start of the record.
        offset: u64,
        /// What was wrong with the directory.
        reason: String,
    },

    /// A field's bytes do not match the directory or the field grammar.
    #[error("Malformed field {tag} in record at byte {offset}: {reason}")]
    MalformedField {
        /// Start of the record.
        offset: u64,
        /// Tag of the offending field.
        tag: String,
        /// What was wrong with the field.
        reason: String,
    },

    /// The last byte of the record is not the record terminator.
    #[error("Missing record terminator in record at byte {offset}: found {found:#04x}")]
    MissingRecordTerminator {
        /// Start of the record.
        offset: u64,
        /// The byte found where the terminator should have been.
        found: u8,
    },
}

impl DecodeError {
    /// Byte offset of the record that failed to decode.
    #[must_use]
    pub fn offset(&self) -> u64 {
        match self {
            DecodeError::TruncatedInput { offset, .. }
            | DecodeError::MalformedLeader { offset, .. }
            | DecodeError::MalformedDirectory { offset, .. }
            | DecodeError::MalformedField { offset, .. }
            | DecodeError::MissingRecordTerminator { offset, .. } => *offset,
        }
    }

    /// Shift the reported offset by `base`, turning a window-relative offset
    /// into an absolute stream position.
    #[must_use]
    pub fn rebased(mut self, base: u64) -> Self {
        match &mut self {
            DecodeError::TruncatedInput { offset, .. }
            | DecodeError::MalformedLeader { offset, .. }
            | DecodeError::MalformedDirectory { offset, .. }
            | DecodeError::MalformedField { offset, .. }
            | DecodeError::MissingRecordTerminator { offset, .. } => *offset += base,
        }
        self
    }

    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::TruncatedInput { .. } => ErrorKind::TruncatedInput,
            DecodeError::MalformedLeader { .. } => ErrorKind::MalformedLeader,
            DecodeError::MalformedDirectory { .. } => ErrorKind::MalformedDirectory,
            DecodeError::MalformedField { .. } => ErrorKind::MalformedField,
            DecodeError::MissingRecordTerminator { .. } => ErrorKind::MissingRecordTerminator,
        }
    }
}

/// Error type for all stream, encoding and writer operations.
#[derive(Error, Debug)]
pub enum MarcError {
    /// A single record failed to decode. The stream continues after this item.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Resynchronization after a decode error found no plausible record
    /// terminator. Nothing follows this item.
    #[error("Unrecoverable stream at byte {offset}: no record terminator found in {scanned} bytes")]
    UnrecoverableStream {
        /// Stream position where scanning started.
        offset: u64,
        /// Number of bytes examined before giving up.
        scanned: usize,
    },

    /// IO error from the underlying source/destination.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error related to character encoding conversion.
    #[error("Encoding error: {0}")]
    EncodingError(String),

    /// Configuration value that cannot be used.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Record that cannot be serialized.
    #[error("Invalid MARC record: {0}")]
    InvalidRecord(String),
}

impl MarcError {
    /// Classify this error, e.g. for per-kind error counters.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            MarcError::Decode(e) => e.kind(),
            MarcError::UnrecoverableStream { .. } => ErrorKind::UnrecoverableStream,
            MarcError::IoError(_) => ErrorKind::Io,
            MarcError::EncodingError(_) => ErrorKind::Encoding,
            MarcError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            MarcError::InvalidRecord(_) => ErrorKind::InvalidRecord,
        }
    }

    /// Whether the stream that produced this error has ended.
    ///
    /// Decode errors are per record; an unrecoverable stream or an I/O failure
    /// terminates the sequence.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MarcError::UnrecoverableStream { .. } | MarcError::IoError(_)
        )
    }
}

/// Flat classification of [`DecodeError`] and [`MarcError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`DecodeError::TruncatedInput`].
    TruncatedInput,
    /// See [`DecodeError::MalformedLeader`].
    MalformedLeader,
    /// See [`DecodeError::MalformedDirectory`].
    MalformedDirectory,
    /// See [`DecodeError::MalformedField`].
    MalformedField,
    /// See [`DecodeError::MissingRecordTerminator`].
    MissingRecordTerminator,
    /// See [`MarcError::UnrecoverableStream`].
    UnrecoverableStream,
    /// See [`MarcError::IoError`].
    Io,
    /// See [`MarcError::EncodingError`].
    Encoding,
    /// See [`MarcError::InvalidConfig`].
    InvalidConfig,
    /// See [`MarcError::InvalidRecord`].
    InvalidRecord,
}

/// Convenience type alias for [`std::result::Result`] with [`MarcError`].
pub type Result<T> = std::result::Result<T, MarcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebased_shifts_offset() {
        let err = DecodeError::MissingRecordTerminator {
            offset: 10,
            found: b'X',
        };
        let err = err.rebased(1000);
        assert_eq!(err.offset(), 1010);
        assert_eq!(err.kind(), ErrorKind::MissingRecordTerminator);
    }

    #[test]
    fn test_decode_error_is_not_fatal() {
        let err: MarcError = DecodeError::MalformedLeader {
            offset: 0,
            reason: "bad".to_string(),
        }
        .into();
        assert!(!err.is_fatal());
        assert_eq!(err.kind(), ErrorKind::MalformedLeader);
    }

    #[test]
    fn test_unrecoverable_is_fatal() {
        let err = MarcError::UnrecoverableStream {
            offset: 5,
            scanned: 100,
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("100 bytes"));
    }

    #[test]
    fn test_message_includes_tag() {
        let err = DecodeError::MalformedField {
            offset: 0,
            tag: "245".to_string(),
            reason: "missing field terminator".to_string(),
        };
        assert!(err.to_string().contains("245"));
    }
}
