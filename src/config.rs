//! Configuration for the combining reader.
//!
//! [`CombineConfig`] is a plain value: build it with struct update syntax or
//! the `with_*` methods, or embed it in a host application's own config file
//! through serde. Loading that file is the host's job.
//!
//! # Examples
//!
//! ```
//! use marc_combine::{CombineConfig, SourceEncoding};
//!
//! let config = CombineConfig::default()
//!     .with_identifier("035$a".parse().unwrap())
//!     .with_source_encoding(SourceEncoding::Marc8)
//!     .with_resync_scan_limit(64 * 1024);
//! assert!(config.validate().is_ok());
//! ```

use crate::encoding::SourceEncoding;
use crate::error::{MarcError, Result};
use crate::identifier::IdentifierSpec;
use crate::leader::MAX_RECORD_LEN;
use serde::{Deserialize, Serialize};

/// Default number of bytes scanned for a record terminator after a decode error.
pub const DEFAULT_RESYNC_SCAN_LIMIT: usize = 1024 * 1024;

/// Settings consumed by [`crate::stream::RecordStream`] and
/// [`crate::combine::CombiningReader`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CombineConfig {
    /// Field whose value is the grouping key (default `001`).
    #[serde(alias = "identifier_field_tag")]
    pub identifier: IdentifierSpec,

    /// Character encoding of field data. Only affects text accessors.
    pub source_encoding: SourceEncoding,

    /// Maximum number of bytes examined while looking for the next record
    /// after a decode error. Running past it ends the stream with
    /// [`MarcError::UnrecoverableStream`].
    pub resync_scan_limit: usize,
}

impl Default for CombineConfig {
    fn default() -> Self {
        CombineConfig {
            identifier: IdentifierSpec::default(),
            source_encoding: SourceEncoding::Auto,
            resync_scan_limit: DEFAULT_RESYNC_SCAN_LIMIT,
        }
    }
}

impl CombineConfig {
    /// Set the identifier field.
    #[must_use]
    pub fn with_identifier(mut self, identifier: IdentifierSpec) -> Self {
        self.identifier = identifier;
        self
    }

    /// Set the source encoding.
    #[must_use]
    pub fn with_source_encoding(mut self, encoding: SourceEncoding) -> Self {
        self.source_encoding = encoding;
        self
    }

    /// Set the resynchronization scan limit in bytes.
    #[must_use]
    pub fn with_resync_scan_limit(mut self, limit: usize) -> Self {
        self.resync_scan_limit = limit;
        self
    }

    /// Check that the settings are usable.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidConfig`] if the scan limit is zero.
    pub fn validate(&self) -> Result<()> {
        if self.resync_scan_limit == 0 {
            return Err(MarcError::InvalidConfig(
                "resync_scan_limit must be at least 1 byte".to_string(),
            ));
        }
        if self.resync_scan_limit < MAX_RECORD_LEN {
            log::debug!(
                "resync_scan_limit of {} bytes is smaller than the largest possible record",
                self.resync_scan_limit
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CombineConfig::default();
        assert_eq!(config.identifier.to_string(), "001");
        assert_eq!(config.source_encoding, SourceEncoding::Auto);
        assert_eq!(config.resync_scan_limit, DEFAULT_RESYNC_SCAN_LIMIT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_scan_limit_is_rejected() {
        let config = CombineConfig::default().with_resync_scan_limit(0);
        assert!(matches!(
            config.validate(),
            Err(MarcError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_deserialize_partial_section() {
        let config: CombineConfig =
            serde_json::from_str(r#"{"identifier_field_tag": "035$a", "source_encoding": "marc-8"}"#)
                .unwrap();
        assert_eq!(config.identifier.to_string(), "035$a");
        assert_eq!(config.source_encoding, SourceEncoding::Marc8);
        assert_eq!(config.resync_scan_limit, DEFAULT_RESYNC_SCAN_LIMIT);
    }

    #[test]
    fn test_deserialize_rejects_unknown_keys_and_bad_tags() {
        assert!(serde_json::from_str::<CombineConfig>(r#"{"identifer": "001"}"#).is_err());
        assert!(serde_json::from_str::<CombineConfig>(r#"{"identifier": "1"}"#).is_err());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = CombineConfig::default().with_source_encoding(SourceEncoding::Latin1);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"latin1\""));
        let back: CombineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
