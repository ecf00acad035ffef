//! The unit handed to the indexing side: one logical document built from one
//! or more adjacent records.
//!
//! A [`CombinedDocument`] keeps its records exactly as decoded and in arrival
//! order. Field iteration walks the first record's fields, then the second
//! record's, and so on; nothing is re-sorted or de-duplicated. Deciding which
//! copy of a repeated field wins is left to the consumer.
//!
//! Payloads stay raw bytes. The document remembers the configured
//! [`SourceEncoding`] so text accessors decode each value against the leader
//! of the record it came from.

use crate::encoding::SourceEncoding;
use crate::error::Result;
use crate::record::{Field, Record};
use bytes::Bytes;

/// One or more adjacent records sharing an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedDocument {
    identifier: Option<Bytes>,
    records: Vec<Record>,
    encoding: SourceEncoding,
}

impl CombinedDocument {
    /// Create a document from its identifier and first record.
    ///
    /// Text accessors use [`SourceEncoding::Auto`] until
    /// [`with_source_encoding`](Self::with_source_encoding) says otherwise.
    #[must_use]
    pub fn new(identifier: Option<Bytes>, first: Record) -> Self {
        CombinedDocument {
            identifier,
            records: vec![first],
            encoding: SourceEncoding::default(),
        }
    }

    /// Set the encoding used by the text accessors.
    #[must_use]
    pub fn with_source_encoding(mut self, encoding: SourceEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Encoding used by the text accessors, before per-record resolution.
    #[must_use]
    pub fn source_encoding(&self) -> SourceEncoding {
        self.encoding
    }

    /// Fold another record into this document.
    pub(crate) fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Shared identifier, or `None` for a record without one.
    #[must_use]
    pub fn identifier(&self) -> Option<&[u8]> {
        self.identifier.as_deref()
    }

    /// The records in arrival order. Never empty.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Take ownership of the records.
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Number of records in this document.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always `false`; a document holds at least one record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether more than one record was combined.
    #[must_use]
    pub fn is_combined(&self) -> bool {
        self.records.len() > 1
    }

    /// The first record of the group.
    #[must_use]
    pub fn primary(&self) -> &Record {
        &self.records[0]
    }

    /// All fields of all records, record by record in arrival order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.records.iter().flat_map(|record| record.fields.iter())
    }

    /// Fields with the given tag across all records, in arrival order.
    pub fn fields_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Field> + 'a {
        self.fields().filter(move |field| field.tag == tag)
    }

    /// Decode bytes taken from `record` with this document's encoding.
    ///
    /// [`SourceEncoding::Auto`] resolves against `record`'s leader, so a
    /// MARC-8 holdings record and a UTF-8 bibliographic record in the same
    /// group each decode correctly.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MarcError::EncodingError`] if the bytes are not valid
    /// in the resolved encoding.
    pub fn decode_text(&self, record: &Record, bytes: &[u8]) -> Result<String> {
        record.decode_text(bytes, self.encoding)
    }

    /// Decoded values of every `code` subfield in `tag` fields, across all
    /// records in arrival order.
    pub fn subfield_text<'a>(
        &'a self,
        tag: &'a str,
        code: u8,
    ) -> impl Iterator<Item = Result<String>> + 'a {
        let encoding = self.encoding;
        self.records.iter().flat_map(move |record| {
            record
                .fields_by_tag(tag)
                .filter_map(Field::data)
                .flat_map(move |data| data.subfields_by_code(code))
                .map(move |value| record.decode_text(value, encoding))
        })
    }

    /// Merge the group into a single record.
    ///
    /// The result carries the first record's leader and every field of every
    /// record in arrival order. Its directory is empty; lengths are recomputed
    /// when it is written with [`crate::writer::MarcWriter`].
    #[must_use]
    pub fn to_merged_record(&self) -> Record {
        let mut merged = Record::new(self.primary().leader.clone());
        merged.fields = self.fields().cloned().collect();
        merged
    }
}

impl IntoIterator for CombinedDocument {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
