//! Grouping-key extraction.
//!
//! The identifier of a record is the raw value of one designated field: the
//! `001` control number by default, or any other control field, or one
//! subfield of a data field (written `035$a`). Identifiers are compared
//! byte-for-byte; no encoding conversion or trimming is applied.

use crate::error::{MarcError, Result};
use crate::record::{FieldValue, Record, Tag, CONTROL_NUMBER_TAG};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Subfield used when a data field tag is given without one.
const DEFAULT_SUBFIELD: u8 = b'a';

/// Which field holds a record's identifier.
///
/// Parsed from and serialized as a string:
///
/// - `"001"`: control field 001
/// - `"035$a"` or `"035a"`: subfield `a` of the first 035 field
/// - `"035"`: same as `"035$a"`
///
/// # Examples
///
/// ```
/// use marc_combine::IdentifierSpec;
///
/// let spec: IdentifierSpec = "035$9".parse().unwrap();
/// assert_eq!(spec.to_string(), "035$9");
/// assert_eq!(IdentifierSpec::default().to_string(), "001");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdentifierSpec {
    tag: Tag,
    subfield: Option<u8>,
}

impl Default for IdentifierSpec {
    fn default() -> Self {
        IdentifierSpec {
            tag: CONTROL_NUMBER_TAG,
            subfield: None,
        }
    }
}

impl IdentifierSpec {
    /// Identify records by a control field.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidConfig`] if `tag` is not a `00x` tag.
    pub fn control_field(tag: Tag) -> Result<Self> {
        if !tag.is_control() {
            return Err(MarcError::InvalidConfig(format!(
                "Tag {tag} is not a control field; name a subfield as well"
            )));
        }
        Ok(IdentifierSpec { tag, subfield: None })
    }

    /// Identify records by a subfield of a data field.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidConfig`] if `tag` is a control field tag.
    pub fn subfield(tag: Tag, code: u8) -> Result<Self> {
        if tag.is_control() {
            return Err(MarcError::InvalidConfig(format!(
                "Control field {tag} has no subfields"
            )));
        }
        Ok(IdentifierSpec {
            tag,
            subfield: Some(code),
        })
    }

    /// Tag of the identifier field.
    #[must_use]
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Subfield code, for data field identifiers.
    #[must_use]
    pub fn subfield_code(&self) -> Option<u8> {
        self.subfield
    }

    /// Extract the identifier of `record`.
    ///
    /// Uses the first field carrying the tag (and, for data fields, the first
    /// matching subfield within it). A missing field or subfield yields `None`.
    ///
    /// A field that is present but empty is treated exactly like a missing
    /// one: it yields `None`, so the record forms a document on its own and
    /// never joins a neighbour that is also empty.
    #[must_use]
    pub fn extract(&self, record: &Record) -> Option<Bytes> {
        let field = record.fields.iter().find(|field| field.tag == self.tag)?;
        let value = match (&field.value, self.subfield) {
            (FieldValue::Control(value), None) => value.clone(),
            (FieldValue::Data(data), Some(code)) => data
                .subfields
                .iter()
                .find(|subfield| subfield.code == code)?
                .value
                .clone(),
            _ => return None,
        };
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }
}

impl FromStr for IdentifierSpec {
    type Err = MarcError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() < 3 || !s.is_char_boundary(3) {
            return Err(MarcError::InvalidConfig(format!(
                "Identifier field must start with a 3-character tag, got '{s}'"
            )));
        }
        let (tag, rest) = s.split_at(3);
        let tag: Tag = tag.parse()?;
        let code = rest.strip_prefix('$').unwrap_or(rest);

        match code.as_bytes() {
            [] if tag.is_control() => Self::control_field(tag),
            [] => Self::subfield(tag, DEFAULT_SUBFIELD),
            [code] if code.is_ascii_graphic() => Self::subfield(tag, *code),
            _ => Err(MarcError::InvalidConfig(format!(
                "Invalid subfield code in identifier field '{s}'"
            ))),
        }
    }
}

impl TryFrom<String> for IdentifierSpec {
    type Error = MarcError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<IdentifierSpec> for String {
    fn from(spec: IdentifierSpec) -> Self {
        spec.to_string()
    }
}

impl fmt::Display for IdentifierSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subfield {
            Some(code) => write!(f, "{}${}", self.tag, code as char),
            None => write!(f, "{}", self.tag),
        }
    }
}
