//! Decoding one ISO 2709 record from a byte buffer.
//!
//! [`decode`] is a pure function: given a buffer and the offset of a record
//! start it either returns the decoded [`Record`] and the number of bytes the
//! record occupies, or a [`DecodeError`] describing the first structural
//! problem found. It never reads past the declared record length.
//!
//! Checks are applied in this order:
//!
//! 1. at least 24 bytes for the leader ([`DecodeError::TruncatedInput`])
//! 2. record length digits, at least 24 ([`DecodeError::MalformedLeader`])
//! 3. the whole declared record is present ([`DecodeError::TruncatedInput`])
//! 4. remaining leader digits and the base address range
//!    ([`DecodeError::MalformedLeader`])
//! 5. directory shape, entry digits, entry bounds and total length
//!    ([`DecodeError::MalformedDirectory`])
//! 6. field terminators and data field grammar ([`DecodeError::MalformedField`])
//! 7. the record terminator ([`DecodeError::MissingRecordTerminator`])
//!
//! # Examples
//!
//! ```
//! use marc_combine::decoder::decode;
//!
//! let bytes = b"00026nam a2200025 a 4500\x1e\x1d";
//! let (record, consumed) = decode(bytes, 0).unwrap();
//! assert_eq!(consumed, 26);
//! assert_eq!(record.fields.len(), 0);
//! ```

use crate::error::DecodeError;
use crate::leader::{parse_ascii_digits, Leader, LEADER_LEN};
use crate::record::{DataField, DirectoryEntry, Field, FieldValue, Record, Subfield, Tag};
use bytes::Bytes;
use smallvec::SmallVec;

/// Terminates the directory and every field.
pub const FIELD_TERMINATOR: u8 = 0x1E;
/// Introduces each subfield code.
pub const SUBFIELD_DELIMITER: u8 = 0x1F;
/// Terminates a record.
pub const RECORD_TERMINATOR: u8 = 0x1D;

type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Decode the record starting at `buffer[offset]`.
///
/// On success returns the record and the number of bytes consumed, which is
/// always the record length declared in the leader.
///
/// Error offsets are positions in `buffer`.
///
/// # Errors
///
/// Returns the [`DecodeError`] variant matching the first check that fails;
/// see the module documentation for the order.
pub fn decode(buffer: &[u8], offset: usize) -> DecodeResult<(Record, usize)> {
    let window = buffer.get(offset..).unwrap_or(&[]);
    decode_window(window).map_err(|e| e.rebased(offset as u64))
}

/// Record length declared by the leader at the start of `bytes`, if the
/// first five bytes are all digits.
#[must_use]
pub fn declared_length(bytes: &[u8]) -> Option<usize> {
    bytes.get(..5).and_then(parse_ascii_digits)
}

fn decode_window(window: &[u8]) -> DecodeResult<(Record, usize)> {
    if window.len() < LEADER_LEN {
        return Err(DecodeError::TruncatedInput {
            offset: 0,
            needed: LEADER_LEN,
            available: window.len(),
        });
    }

    let record_length = Leader::read_record_length(window)?;
    if window.len() < record_length {
        return Err(DecodeError::TruncatedInput {
            offset: 0,
            needed: record_length,
            available: window.len(),
        });
    }

    let leader = Leader::from_bytes(&window[..LEADER_LEN])?;
    leader.validate_base_address()?;

    // One allocation per record; every field below is a slice of it
    let raw = Bytes::copy_from_slice(&window[..record_length]);
    let base_address = leader.data_base_address as usize;

    let directory = parse_directory(&raw[LEADER_LEN..base_address], &leader)?;
    check_directory_bounds(&directory, base_address, record_length)?;

    let mut fields = Vec::with_capacity(directory.len());
    for entry in &directory {
        let start = base_address + entry.start;
        let field_bytes = raw.slice(start..start + entry.length);
        fields.push(parse_field(entry.tag, field_bytes, &leader)?);
    }

    let last = raw[record_length - 1];
    if last != RECORD_TERMINATOR {
        return Err(DecodeError::MissingRecordTerminator {
            offset: 0,
            found: last,
        });
    }

    Ok((
        Record {
            leader,
            directory,
            fields,
        },
        record_length,
    ))
}

/// Parse the directory area (between the leader and the base address).
///
/// The area must end with the field terminator, and the entries before it
/// must be an exact multiple of the entry width.
fn parse_directory(area: &[u8], leader: &Leader) -> DecodeResult<Vec<DirectoryEntry>> {
    let terminator = memchr::memchr(FIELD_TERMINATOR, area).ok_or_else(|| {
        malformed_directory("no directory terminator before the base address".to_string())
    })?;
    if terminator + 1 != area.len() {
        return Err(malformed_directory(format!(
            "directory terminator at byte {}, expected at byte {}",
            LEADER_LEN + terminator,
            LEADER_LEN + area.len() - 1
        )));
    }

    let entries = &area[..terminator];
    let width = leader.directory_entry_width();
    if entries.len() % width != 0 {
        return Err(malformed_directory(format!(
            "directory length {} is not a multiple of the entry width {width}",
            entries.len()
        )));
    }

    let length_digits = leader.field_length_digits();
    entries
        .chunks_exact(width)
        .map(|chunk| {
            let tag = Tag::new([chunk[0], chunk[1], chunk[2]]);
            let length_bytes = &chunk[3..3 + length_digits];
            let start_bytes = &chunk[3 + length_digits..];
            let length = parse_ascii_digits(length_bytes).ok_or_else(|| {
                malformed_directory(format!(
                    "invalid length '{}' for tag {tag}",
                    String::from_utf8_lossy(length_bytes)
                ))
            })?;
            let start = parse_ascii_digits(start_bytes).ok_or_else(|| {
                malformed_directory(format!(
                    "invalid starting position '{}' for tag {tag}",
                    String::from_utf8_lossy(start_bytes)
                ))
            })?;
            Ok(DirectoryEntry { tag, length, start })
        })
        .collect()
}

/// Every entry must lie inside the data area, and the field lengths must
/// account for exactly the bytes between the base address and the record
/// terminator.
fn check_directory_bounds(
    directory: &[DirectoryEntry],
    base_address: usize,
    record_length: usize,
) -> DecodeResult<()> {
    let data_len = (record_length - base_address).checked_sub(1).ok_or_else(|| {
        malformed_directory("base address leaves no room for the record terminator".to_string())
    })?;

    let mut total = 0usize;
    for entry in directory {
        if entry.start + entry.length > data_len {
            return Err(malformed_directory(format!(
                "field {} at {}+{} exceeds the data area of {data_len} bytes",
                entry.tag, entry.start, entry.length
            )));
        }
        total += entry.length;
    }

    if total != data_len {
        return Err(malformed_directory(format!(
            "field lengths sum to {total} bytes but the data area holds {data_len}"
        )));
    }
    Ok(())
}

fn parse_field(tag: Tag, bytes: Bytes, leader: &Leader) -> DecodeResult<Field> {
    if bytes.last() != Some(&FIELD_TERMINATOR) {
        return Err(malformed_field(tag, "missing field terminator"));
    }
    let content = bytes.slice(..bytes.len() - 1);

    let value = if tag.is_control() {
        FieldValue::Control(content)
    } else {
        FieldValue::Data(parse_data_field(tag, &content, usize::from(leader.indicator_count))?)
    };
    Ok(Field { tag, value })
}

/// Parse indicators and subfields. Empty subfield segments (a delimiter with
/// no code) are skipped.
fn parse_data_field(tag: Tag, content: &Bytes, indicator_count: usize) -> DecodeResult<DataField> {
    if content.len() < indicator_count {
        return Err(malformed_field(
            tag,
            &format!("data field shorter than its {indicator_count} indicators"),
        ));
    }

    let indicators: SmallVec<[u8; 2]> = content[..indicator_count].iter().copied().collect();
    let body = content.slice(indicator_count..);
    let mut subfields = SmallVec::new();

    if body.is_empty() {
        return Ok(DataField {
            indicators,
            subfields,
        });
    }
    if body[0] != SUBFIELD_DELIMITER {
        return Err(malformed_field(tag, "expected subfield delimiter"));
    }

    let mut delimiters = memchr::memchr_iter(SUBFIELD_DELIMITER, &body).peekable();
    while let Some(position) = delimiters.next() {
        let end = delimiters.peek().copied().unwrap_or(body.len());
        let segment_start = position + 1;
        if segment_start >= end {
            continue;
        }
        subfields.push(Subfield {
            code: body[segment_start],
            value: body.slice(segment_start + 1..end),
        });
    }

    Ok(DataField {
        indicators,
        subfields,
    })
}

fn malformed_directory(reason: String) -> DecodeError {
    DecodeError::MalformedDirectory { offset: 0, reason }
}

fn malformed_field(tag: Tag, reason: &str) -> DecodeError {
    DecodeError::MalformedField {
        offset: 0,
        tag: tag.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    /// Assemble a record from `(tag, content)` pairs; contents exclude the
    /// field terminator.
    fn encode(fields: &[(&str, &str)]) -> Vec<u8> {
        let mut directory = Vec::new();
        let mut data = Vec::new();
        for (tag, content) in fields {
            let length = content.len() + 1;
            directory.extend_from_slice(tag.as_bytes());
            directory.extend_from_slice(format!("{length:04}").as_bytes());
            directory.extend_from_slice(format!("{:05}", data.len()).as_bytes());
            data.extend_from_slice(content.as_bytes());
            data.push(FIELD_TERMINATOR);
        }
        directory.push(FIELD_TERMINATOR);

        let base_address = LEADER_LEN + directory.len();
        let record_length = base_address + data.len() + 1;
        let mut bytes = format!("{record_length:05}nam a22{base_address:05} a 4500").into_bytes();
        bytes.extend_from_slice(&directory);
        bytes.extend_from_slice(&data);
        bytes.push(RECORD_TERMINATOR);
        bytes
    }

    fn sample() -> Vec<u8> {
        encode(&[
            ("001", "ocm00012345"),
            ("245", "10\x1faThe Great Gatsby\x1fcF. Scott Fitzgerald"),
            ("650", " 0\x1faNovels"),
        ])
    }

    #[test]
    fn test_decode_simple_record() {
        let bytes = sample();
        let (record, consumed) = decode(&bytes, 0).unwrap();

        assert_eq!(consumed, bytes.len());
        assert_eq!(record.leader.record_type, 'a');
        assert_eq!(record.directory.len(), 3);
        assert_eq!(record.control_number(), Some(&b"ocm00012345"[..]));

        let title = record.get_field("245").unwrap();
        let data = title.data().unwrap();
        assert_eq!(data.indicator1(), b'1');
        assert_eq!(data.indicator2(), b'0');
        assert_eq!(data.subfields.len(), 2);
        assert_eq!(title.get_subfield(b'a'), Some(&b"The Great Gatsby"[..]));
        assert_eq!(title.get_subfield(b'c'), Some(&b"F. Scott Fitzgerald"[..]));
    }

    #[test]
    fn test_decode_preserves_directory_order() {
        let bytes = encode(&[("650", " 0\x1faB"), ("001", "x"), ("245", "00\x1faA")]);
        let (record, _) = decode(&bytes, 0).unwrap();
        let tags: Vec<String> = record.fields().map(|f| f.tag.to_string()).collect();
        assert_eq!(tags, ["650", "001", "245"]);
    }

    #[test]
    fn test_consumes_exactly_declared_length() {
        let first = sample();
        let second = encode(&[("001", "second")]);
        let mut buffer = first.clone();
        buffer.extend_from_slice(&second);

        let (_, consumed) = decode(&buffer, 0).unwrap();
        assert_eq!(consumed, first.len());
        let mut rebuilt = buffer[..consumed].to_vec();
        rebuilt.extend_from_slice(&buffer[consumed..]);
        assert_eq!(rebuilt, buffer);

        let (record, consumed_second) = decode(&buffer, consumed).unwrap();
        assert_eq!(consumed_second, second.len());
        assert_eq!(record.control_number(), Some(&b"second"[..]));
    }

    #[test]
    fn test_empty_record() {
        let bytes = encode(&[]);
        assert_eq!(bytes.len(), 26);
        let (record, consumed) = decode(&bytes, 0).unwrap();
        assert_eq!(consumed, 26);
        assert!(record.fields.is_empty());
    }

    #[test]
    fn test_short_leader_is_truncated_input() {
        let err = decode(b"00026nam", 0).unwrap_err();
        assert_eq!(
            err,
            DecodeError::TruncatedInput {
                offset: 0,
                needed: 24,
                available: 8
            }
        );
    }

    #[test]
    fn test_short_record_is_truncated_input() {
        let bytes = sample();
        let err = decode(&bytes[..bytes.len() - 3], 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedInput);
    }

    #[test]
    fn test_non_digit_length_is_malformed_leader() {
        let mut bytes = sample();
        bytes[2] = b'x';
        let err = decode(&bytes, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedLeader);
    }

    #[test]
    fn test_base_address_beyond_record_is_malformed_leader() {
        let mut bytes = sample();
        bytes[12..17].copy_from_slice(b"99999");
        let err = decode(&bytes, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedLeader);
    }

    #[test]
    fn test_truncation_reported_before_bad_base_address() {
        let err = decode(b"00100nam a2299999 a 4500001000", 0).unwrap_err();
        assert_eq!(
            err,
            DecodeError::TruncatedInput {
                offset: 0,
                needed: 100,
                available: 30
            }
        );
    }

    #[test]
    fn test_truncation_reported_before_bad_indicator_count() {
        let err = decode(b"00100nam aX200025 a 4500", 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedInput);
    }

    #[test]
    fn test_record_length_shorter_than_leader_is_malformed() {
        let err = decode(b"00010nam a2200025 a 4500", 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedLeader);
    }

    #[test]
    fn test_base_address_cutting_off_directory_terminator() {
        let mut bytes = sample();
        // Shift the base address left by one byte: the directory loses its terminator
        let base = declared_base(&bytes);
        bytes[12..17].copy_from_slice(format!("{:05}", base - 1).as_bytes());
        let err = decode(&bytes, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDirectory);
    }

    #[test]
    fn test_ragged_directory_entry() {
        // One 13-byte entry: the terminator sits at the right spot but the
        // entries are not a multiple of 12
        let mut bytes = b"00040nam a2200038 a 4500".to_vec();
        bytes.extend_from_slice(b"0010003000001");
        bytes.push(FIELD_TERMINATOR);
        bytes.push(b'x');
        bytes.push(RECORD_TERMINATOR);
        let err = decode(&bytes, 0).unwrap_err();
        assert!(err.to_string().contains("not a multiple"), "got: {err}");
    }

    #[test]
    fn test_non_digit_directory_length() {
        let mut bytes = sample();
        bytes[LEADER_LEN + 4] = b'?';
        let err = decode(&bytes, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDirectory);
        assert!(err.to_string().contains("001"));
    }

    #[test]
    fn test_entry_beyond_data_area() {
        let mut bytes = sample();
        // Starting position of the first entry
        bytes[LEADER_LEN + 7..LEADER_LEN + 12].copy_from_slice(b"09000");
        let err = decode(&bytes, 0).unwrap_err();
        assert!(err.to_string().contains("exceeds the data area"), "got: {err}");
    }

    #[test]
    fn test_length_sum_mismatch() {
        let mut bytes = sample();
        // Shrink the 001 entry by one byte; its terminator now falls outside it
        let length = parse_ascii_digits(&bytes[LEADER_LEN + 3..LEADER_LEN + 7]).unwrap();
        bytes[LEADER_LEN + 3..LEADER_LEN + 7]
            .copy_from_slice(format!("{:04}", length - 1).as_bytes());
        let err = decode(&bytes, 0).unwrap_err();
        assert!(err.to_string().contains("sum to"), "got: {err}");
    }

    #[test]
    fn test_missing_field_terminator() {
        let mut bytes = sample();
        let base = declared_base(&bytes);
        // Last byte of the 001 field ("ocm00012345" + terminator)
        bytes[base + 11] = b'!';
        let err = decode(&bytes, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedField);
        assert!(err.to_string().contains("001"));
    }

    #[test]
    fn test_data_field_without_delimiter() {
        let bytes = encode(&[("245", "10Title without delimiter")]);
        let err = decode(&bytes, 0).unwrap_err();
        assert_eq!(
            err,
            DecodeError::MalformedField {
                offset: 0,
                tag: "245".to_string(),
                reason: "expected subfield delimiter".to_string(),
            }
        );
    }

    #[test]
    fn test_data_field_shorter_than_indicators() {
        let bytes = encode(&[("245", "1")]);
        let err = decode(&bytes, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedField);
    }

    #[test]
    fn test_empty_subfield_segments_are_skipped() {
        let bytes = encode(&[("245", "10\x1faTitle\x1f")]);
        let (record, _) = decode(&bytes, 0).unwrap();
        let data = record.get_field("245").unwrap().data().unwrap();
        assert_eq!(data.subfields.len(), 1);
    }

    #[test]
    fn test_missing_record_terminator() {
        let mut bytes = sample();
        let last = bytes.len() - 1;
        bytes[last] = b'X';
        let err = decode(&bytes, 0).unwrap_err();
        assert_eq!(
            err,
            DecodeError::MissingRecordTerminator {
                offset: 0,
                found: b'X'
            }
        );
    }

    #[test]
    fn test_error_offset_is_buffer_position() {
        let good = sample();
        let mut buffer = good.clone();
        buffer.extend_from_slice(b"garbage that is long enough to hold a leader");
        let err = decode(&buffer, good.len()).unwrap_err();
        assert_eq!(err.offset(), good.len() as u64);
    }

    #[test]
    fn test_offset_past_end_is_truncated() {
        let bytes = sample();
        let err = decode(&bytes, bytes.len() + 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedInput);
    }

    #[test]
    fn test_declared_length() {
        assert_eq!(declared_length(b"00026nam"), Some(26));
        assert_eq!(declared_length(b"0002"), None);
        assert_eq!(declared_length(b"000x6nam"), None);
    }

    fn declared_base(bytes: &[u8]) -> usize {
        parse_ascii_digits(&bytes[12..17]).unwrap()
    }
}
