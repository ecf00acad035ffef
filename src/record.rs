//! Decoded MARC record structures.
//!
//! This module provides the types produced by the decoder:
//! - [`Record`]: leader, directory and fields of one ISO 2709 record
//! - [`Field`]: a control field (raw bytes) or a [`DataField`]
//! - [`Subfield`]: a coded data element within a data field
//! - [`Tag`]: the 3-byte field tag
//!
//! Fields are kept in directory order. Payloads are [`Bytes`] slices sharing
//! one allocation per record, so a record owns exactly its own bytes and can
//! be dropped independently of the stream that produced it.
//!
//! # Examples
//!
//! ```
//! use marc_combine::{Field, Leader, Record};
//!
//! let record = Record::builder(Leader::default())
//!     .control_field(*b"001", "ocm12345")
//!     .field(
//!         Field::builder(*b"245", b'1', b'0')
//!             .subfield(b'a', "Title")
//!             .build(),
//!     )
//!     .build();
//!
//! assert_eq!(record.control_number(), Some(&b"ocm12345"[..]));
//! assert_eq!(record.fields_by_tag("245").count(), 1);
//! ```

use crate::encoding::SourceEncoding;
use crate::error::{MarcError, Result};
use crate::leader::Leader;
use bytes::Bytes;
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

/// Tag of the control number field.
pub const CONTROL_NUMBER_TAG: Tag = Tag::new(*b"001");

/// A 3-byte field tag such as `001` or `245`.
///
/// Decoded tags are taken verbatim from the directory, so they may hold any
/// bytes; tags parsed from strings must be three ASCII alphanumerics.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag([u8; 3]);

impl Tag {
    /// Create a tag from its three bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 3]) -> Self {
        Tag(bytes)
    }

    /// Raw tag bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 3] {
        &self.0
    }

    /// Control fields are the `00x` tags; they carry raw text instead of
    /// indicators and subfields.
    #[must_use]
    pub fn is_control(&self) -> bool {
        self.0[0] == b'0' && self.0[1] == b'0'
    }
}

impl From<[u8; 3]> for Tag {
    fn from(bytes: [u8; 3]) -> Self {
        Tag(bytes)
    }
}

impl From<&[u8; 3]> for Tag {
    fn from(bytes: &[u8; 3]) -> Self {
        Tag(*bytes)
    }
}

impl FromStr for Tag {
    type Err = MarcError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_alphanumeric) {
            return Err(MarcError::InvalidConfig(format!(
                "Field tag must be three ASCII letters or digits, got '{s}'"
            )));
        }
        Ok(Tag([bytes[0], bytes[1], bytes[2]]))
    }
}

impl PartialEq<str> for Tag {
    fn eq(&self, other: &str) -> bool {
        self.0.as_slice() == other.as_bytes()
    }
}

impl PartialEq<&str> for Tag {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_slice() == other.as_bytes()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({self})")
    }
}

/// One directory entry as read from the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Field tag
    pub tag: Tag,
    /// Field length in bytes, including the field terminator
    pub length: usize,
    /// Offset of the field relative to the base address of data
    pub start: usize,
}

/// A decoded MARC record.
///
/// `directory` mirrors the directory of the source record and is empty for
/// records assembled in memory; `fields` holds one entry per directory entry,
/// in the same order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Record leader (24 bytes)
    pub leader: Leader,
    /// Directory entries, in source order
    pub directory: Vec<DirectoryEntry>,
    /// Fields, in directory order
    pub fields: Vec<Field>,
}

/// A field of a MARC record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field tag
    pub tag: Tag,
    /// Field content
    pub value: FieldValue,
}

/// Content of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Raw bytes of a control field (`00x`), without the field terminator
    Control(Bytes),
    /// Indicators and subfields of a data field
    Data(DataField),
}

/// Indicators and subfields of a data field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataField {
    /// Indicator bytes; as many as the leader's indicator count
    pub indicators: SmallVec<[u8; 2]>,
    /// Subfields in source order
    pub subfields: SmallVec<[Subfield; 4]>,
}

/// A subfield within a data field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subfield {
    /// Subfield code
    pub code: u8,
    /// Raw subfield value
    pub value: Bytes,
}

impl Record {
    /// Create an empty record with the given leader.
    #[must_use]
    pub fn new(leader: Leader) -> Self {
        Record {
            leader,
            directory: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Create a builder for fluently constructing records.
    #[must_use]
    pub fn builder(leader: Leader) -> RecordBuilder {
        RecordBuilder {
            record: Record::new(leader),
        }
    }

    /// Append a field.
    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Append a control field.
    pub fn add_control_field(&mut self, tag: impl Into<Tag>, value: impl Into<Bytes>) {
        self.fields.push(Field::control(tag, value));
    }

    /// Iterate over all fields in directory order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    /// Iterate over fields with the given tag.
    pub fn fields_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Field> + 'a {
        self.fields.iter().filter(move |field| field.tag == tag)
    }

    /// First field with the given tag.
    #[must_use]
    pub fn get_field(&self, tag: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.tag == tag)
    }

    /// Raw value of the first control field with the given tag.
    #[must_use]
    pub fn get_control_field(&self, tag: &str) -> Option<&[u8]> {
        self.fields
            .iter()
            .filter(|field| field.tag == tag)
            .find_map(Field::control_value)
    }

    /// Iterate over control fields as `(tag, value)` pairs.
    pub fn control_fields_iter(&self) -> impl Iterator<Item = (Tag, &[u8])> {
        self.fields
            .iter()
            .filter_map(|field| field.control_value().map(|value| (field.tag, value)))
    }

    /// Raw value of the `001` control number.
    #[must_use]
    pub fn control_number(&self) -> Option<&[u8]> {
        self.fields
            .iter()
            .filter(|field| field.tag == CONTROL_NUMBER_TAG)
            .find_map(Field::control_value)
    }

    /// Decode field bytes of this record to text.
    ///
    /// [`SourceEncoding::Auto`] is resolved against this record's leader.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::EncodingError`] if the bytes are invalid for the
    /// resolved encoding.
    pub fn decode_text(&self, bytes: &[u8], encoding: SourceEncoding) -> Result<String> {
        encoding.resolve(&self.leader).decode(bytes)
    }
}

impl Field {
    /// Create a control field.
    pub fn control(tag: impl Into<Tag>, value: impl Into<Bytes>) -> Self {
        Field {
            tag: tag.into(),
            value: FieldValue::Control(value.into()),
        }
    }

    /// Start building a data field with two indicators.
    pub fn builder(tag: impl Into<Tag>, indicator1: u8, indicator2: u8) -> FieldBuilder {
        let mut indicators = SmallVec::new();
        indicators.push(indicator1);
        indicators.push(indicator2);
        FieldBuilder {
            field: Field {
                tag: tag.into(),
                value: FieldValue::Data(DataField {
                    indicators,
                    subfields: SmallVec::new(),
                }),
            },
        }
    }

    /// Whether this is a control field.
    #[must_use]
    pub fn is_control(&self) -> bool {
        matches!(self.value, FieldValue::Control(_))
    }

    /// Raw value if this is a control field.
    #[must_use]
    pub fn control_value(&self) -> Option<&[u8]> {
        match &self.value {
            FieldValue::Control(value) => Some(&value[..]),
            FieldValue::Data(_) => None,
        }
    }

    /// Data field content if this is a data field.
    #[must_use]
    pub fn data(&self) -> Option<&DataField> {
        match &self.value {
            FieldValue::Control(_) => None,
            FieldValue::Data(data) => Some(data),
        }
    }

    /// Raw value of the first subfield with the given code.
    ///
    /// Always `None` for control fields.
    #[must_use]
    pub fn get_subfield(&self, code: u8) -> Option<&[u8]> {
        self.data().and_then(|data| data.get_subfield(code))
    }
}

impl DataField {
    /// First indicator, or a blank when there is none.
    #[must_use]
    pub fn indicator1(&self) -> u8 {
        self.indicators.first().copied().unwrap_or(b' ')
    }

    /// Second indicator, or a blank when there is none.
    #[must_use]
    pub fn indicator2(&self) -> u8 {
        self.indicators.get(1).copied().unwrap_or(b' ')
    }

    /// Append a subfield.
    pub fn add_subfield(&mut self, code: u8, value: impl Into<Bytes>) {
        self.subfields.push(Subfield {
            code,
            value: value.into(),
        });
    }

    /// Raw value of the first subfield with the given code.
    #[must_use]
    pub fn get_subfield(&self, code: u8) -> Option<&[u8]> {
        self.subfields_by_code(code).next()
    }

    /// Iterate over the raw values of all subfields with the given code.
    pub fn subfields_by_code(&self, code: u8) -> impl Iterator<Item = &[u8]> {
        self.subfields
            .iter()
            .filter(move |subfield| subfield.code == code)
            .map(|subfield| &subfield.value[..])
    }
}

/// Builder for [`Record`].
#[derive(Debug)]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    /// Append a control field.
    #[must_use]
    pub fn control_field(mut self, tag: impl Into<Tag>, value: impl Into<Bytes>) -> Self {
        self.record.add_control_field(tag, value);
        self
    }

    /// Append a field.
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.record.add_field(field);
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> Record {
        self.record
    }
}

/// Builder for data fields, created by [`Field::builder`].
#[derive(Debug)]
pub struct FieldBuilder {
    field: Field,
}

impl FieldBuilder {
    /// Append a subfield.
    #[must_use]
    pub fn subfield(mut self, code: u8, value: impl Into<Bytes>) -> Self {
        if let FieldValue::Data(data) = &mut self.field.value {
            data.add_subfield(code, value);
        }
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> Field {
        self.field
    }
}
