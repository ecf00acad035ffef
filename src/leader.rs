//! MARC record leader parsing.
//!
//! The leader is the 24-byte fixed-length block at the start of every ISO 2709
//! record. Besides descriptive codes it carries the numbers the decoder needs
//! to find its way through the record.
//!
//! # Structure
//!
//! - Positions 0-4: Record length (5 digits)
//! - Position 5: Record status
//! - Position 6: Record type
//! - Position 7: Bibliographic level
//! - Position 8: Control record type
//! - Position 9: Character coding (space = MARC-8, a = UTF-8)
//! - Position 10: Indicator count (usually 2)
//! - Position 11: Subfield code count (usually 2)
//! - Positions 12-16: Base address of data (5 digits)
//! - Positions 17-19: Encoding level, cataloging form, multipart level
//! - Positions 20-23: Entry map (usually "4500")

use crate::error::{DecodeError, MarcError, Result};

/// Length of the leader in bytes.
pub const LEADER_LEN: usize = 24;

/// Largest value a 5-digit length or address can hold.
pub const MAX_RECORD_LEN: usize = 99_999;

const DEFAULT_LENGTH_DIGITS: usize = 4;
const DEFAULT_START_DIGITS: usize = 5;

/// MARC Leader - 24 bytes at the start of every MARC record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leader {
    /// Record length (5 digits) - positions 0-4
    pub record_length: u32,
    /// Record status (1 char) - position 5
    pub record_status: char,
    /// Type of record (1 char) - position 6
    pub record_type: char,
    /// Bibliographic level (1 char) - position 7
    pub bibliographic_level: char,
    /// Type of control record (1 char) - position 8
    pub control_record_type: char,
    /// Character coding scheme (1 char) - position 9
    pub character_coding: char,
    /// Indicator count (1 digit) - position 10
    pub indicator_count: u8,
    /// Subfield code count (1 digit) - position 11
    pub subfield_code_count: u8,
    /// Base address of data (5 digits) - positions 12-16
    pub data_base_address: u32,
    /// Encoding level (1 char) - position 17
    pub encoding_level: char,
    /// Cataloging form (1 char) - position 18
    pub cataloging_form: char,
    /// Multipart resource record level (1 char) - position 19
    pub multipart_level: char,
    /// Entry map - positions 20-23
    pub entry_map: [u8; 4],
}

impl Default for Leader {
    fn default() -> Self {
        Leader {
            record_length: 0,
            record_status: 'n',
            record_type: 'a',
            bibliographic_level: 'm',
            control_record_type: ' ',
            character_coding: 'a',
            indicator_count: 2,
            subfield_code_count: 2,
            data_base_address: 0,
            encoding_level: ' ',
            cataloging_form: 'a',
            multipart_level: ' ',
            entry_map: *b"4500",
        }
    }
}

impl Leader {
    /// Parse a leader from the first 24 bytes of `bytes`.
    ///
    /// Errors carry offset 0; callers decoding inside a larger buffer rebase
    /// them with [`DecodeError::rebased`].
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::TruncatedInput`] if fewer than 24 bytes are given
    /// and [`DecodeError::MalformedLeader`] if a numeric position holds
    /// anything but ASCII digits.
    pub fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, DecodeError> {
        if bytes.len() < LEADER_LEN {
            return Err(DecodeError::TruncatedInput {
                offset: 0,
                needed: LEADER_LEN,
                available: bytes.len(),
            });
        }

        let record_length = parse_leader_number(&bytes[0..5], "record length")?;
        let indicator_count = parse_leader_digit(bytes[10], "indicator count")?;
        let subfield_code_count = parse_leader_digit(bytes[11], "subfield code count")?;
        let data_base_address = parse_leader_number(&bytes[12..17], "base address of data")?;

        let mut entry_map = [0u8; 4];
        entry_map.copy_from_slice(&bytes[20..24]);

        Ok(Leader {
            record_length,
            record_status: bytes[5] as char,
            record_type: bytes[6] as char,
            bibliographic_level: bytes[7] as char,
            control_record_type: bytes[8] as char,
            character_coding: bytes[9] as char,
            indicator_count,
            subfield_code_count,
            data_base_address,
            encoding_level: bytes[17] as char,
            cataloging_form: bytes[18] as char,
            multipart_level: bytes[19] as char,
            entry_map,
        })
    }

    /// Read and check the record length (positions 0-4) of a raw leader.
    ///
    /// Only the first five bytes are looked at, so the decoder can compare
    /// the declared length against the available input before anything else
    /// in the leader is trusted.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::MalformedLeader`] (offset 0) if the positions
    /// are not all digits or the length is shorter than the leader itself,
    /// and [`DecodeError::TruncatedInput`] if fewer than five bytes are given.
    pub fn read_record_length(bytes: &[u8]) -> std::result::Result<usize, DecodeError> {
        let digits = bytes.get(..5).ok_or(DecodeError::TruncatedInput {
            offset: 0,
            needed: 5,
            available: bytes.len(),
        })?;
        let record_length = parse_leader_number(digits, "record length")? as usize;
        if record_length < LEADER_LEN {
            return Err(malformed(format!(
                "Record length must be at least 24, got {record_length}"
            )));
        }
        Ok(record_length)
    }

    /// Check that the base address of data lies in `[24, record_length]`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::MalformedLeader`] (offset 0) on violation.
    pub fn validate_base_address(&self) -> std::result::Result<(), DecodeError> {
        if (self.data_base_address as usize) < LEADER_LEN
            || self.data_base_address > self.record_length
        {
            return Err(malformed(format!(
                "Base address of data must be within [24, {}], got {}",
                self.record_length, self.data_base_address
            )));
        }
        Ok(())
    }

    /// Width of the field-length part of each directory entry (position 20).
    ///
    /// Falls back to 4 when the position does not hold a digit in `1..=9`.
    #[must_use]
    pub fn field_length_digits(&self) -> usize {
        entry_map_digit(self.entry_map[0]).unwrap_or(DEFAULT_LENGTH_DIGITS)
    }

    /// Width of the starting-position part of each directory entry (position 21).
    ///
    /// Falls back to 5 when the position does not hold a digit in `1..=9`.
    #[must_use]
    pub fn start_position_digits(&self) -> usize {
        entry_map_digit(self.entry_map[1]).unwrap_or(DEFAULT_START_DIGITS)
    }

    /// Total width of one directory entry: tag + length + starting position.
    #[must_use]
    pub fn directory_entry_width(&self) -> usize {
        3 + self.field_length_digits() + self.start_position_digits()
    }

    /// Serialize the leader to its 24-byte form.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidRecord`] if the record length or base
    /// address does not fit in five digits, or a count does not fit in one.
    pub fn as_bytes(&self) -> Result<Vec<u8>> {
        if self.record_length as usize > MAX_RECORD_LEN
            || self.data_base_address as usize > MAX_RECORD_LEN
        {
            return Err(MarcError::InvalidRecord(format!(
                "Record length {} or base address {} exceeds {MAX_RECORD_LEN}",
                self.record_length, self.data_base_address
            )));
        }
        if self.indicator_count > 9 || self.subfield_code_count > 9 {
            return Err(MarcError::InvalidRecord(
                "Indicator and subfield code counts must be single digits".to_string(),
            ));
        }

        let mut bytes = Vec::with_capacity(LEADER_LEN);
        bytes.extend_from_slice(format!("{:05}", self.record_length).as_bytes());
        bytes.push(char_byte(self.record_status));
        bytes.push(char_byte(self.record_type));
        bytes.push(char_byte(self.bibliographic_level));
        bytes.push(char_byte(self.control_record_type));
        bytes.push(char_byte(self.character_coding));
        bytes.push(b'0' + self.indicator_count);
        bytes.push(b'0' + self.subfield_code_count);
        bytes.extend_from_slice(format!("{:05}", self.data_base_address).as_bytes());
        bytes.push(char_byte(self.encoding_level));
        bytes.push(char_byte(self.cataloging_form));
        bytes.push(char_byte(self.multipart_level));
        bytes.extend_from_slice(&self.entry_map);

        Ok(bytes)
    }
}

/// Parse a fixed-width run of ASCII digits.
///
/// Returns `None` for an empty slice or any non-digit byte; there is no
/// sign, padding or whitespace tolerance.
pub(crate) fn parse_ascii_digits(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() {
        return None;
    }
    let mut result = 0usize;
    for &byte in bytes {
        if !byte.is_ascii_digit() {
            return None;
        }
        result = result * 10 + usize::from(byte - b'0');
    }
    Some(result)
}

fn parse_leader_number(bytes: &[u8], what: &str) -> std::result::Result<u32, DecodeError> {
    parse_ascii_digits(bytes)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| {
            malformed(format!(
                "Invalid {what}: '{}'",
                String::from_utf8_lossy(bytes)
            ))
        })
}

fn parse_leader_digit(byte: u8, what: &str) -> std::result::Result<u8, DecodeError> {
    if byte.is_ascii_digit() {
        Ok(byte - b'0')
    } else {
        Err(malformed(format!("Invalid {what}: '{}'", byte as char)))
    }
}

fn entry_map_digit(byte: u8) -> Option<usize> {
    match byte {
        b'1'..=b'9' => Some(usize::from(byte - b'0')),
        _ => None,
    }
}

fn char_byte(c: char) -> u8 {
    u8::try_from(c).unwrap_or(b' ')
}

fn malformed(reason: String) -> DecodeError {
    DecodeError::MalformedLeader { offset: 0, reason }
}
