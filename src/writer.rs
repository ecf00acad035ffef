//! Writing records back out as ISO 2709.
//!
//! [`MarcWriter`] serializes a [`Record`] with its fields in their stored
//! order, recomputing the directory, base address and record length from the
//! field contents. Any directory carried over from decoding is ignored.
//!
//! # Examples
//!
//! ```
//! use marc_combine::{Field, Leader, MarcWriter, Record, RecordStream};
//!
//! # fn main() -> marc_combine::Result<()> {
//! let record = Record::builder(Leader::default())
//!     .control_field(*b"001", "42")
//!     .field(Field::builder(*b"245", b'1', b'0').subfield(b'a', "Title").build())
//!     .build();
//!
//! let mut writer = MarcWriter::new(Vec::new());
//! writer.write_record(&record)?;
//! let bytes = writer.into_inner()?;
//!
//! let decoded = RecordStream::new(&bytes[..]).next().unwrap()?;
//! assert_eq!(decoded.fields, record.fields);
//! # Ok(())
//! # }
//! ```

use crate::decoder::{FIELD_TERMINATOR, RECORD_TERMINATOR, SUBFIELD_DELIMITER};
use crate::document::CombinedDocument;
use crate::error::{MarcError, Result};
use crate::leader::{LEADER_LEN, MAX_RECORD_LEN};
use crate::record::{FieldValue, Record};
use std::io::Write;

/// Largest field length expressible in a four-digit directory entry.
const MAX_FIELD_LEN: usize = 9_999;

/// Writer for ISO 2709 binary MARC.
#[derive(Debug)]
pub struct MarcWriter<W: Write> {
    writer: W,
    records_written: usize,
    finished: bool,
}

impl<W: Write> MarcWriter<W> {
    /// Create a writer over any [`std::io::Write`] destination.
    pub fn new(writer: W) -> Self {
        MarcWriter {
            writer,
            records_written: 0,
            finished: false,
        }
    }

    /// Serialize and write one record.
    ///
    /// The leader is copied from the record with its length, base address
    /// and the first two entry map positions (`45`) replaced.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidRecord`] if the writer is finished, a field
    /// is longer than 9999 bytes or the record longer than 99999 bytes, and
    /// [`MarcError::IoError`] if the destination fails. Nothing is written
    /// for a record that is rejected.
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        if self.finished {
            return Err(MarcError::InvalidRecord(
                "Cannot write to a finished writer".to_string(),
            ));
        }

        let bytes = encode_record(record)?;
        self.writer.write_all(&bytes)?;
        self.records_written += 1;
        Ok(())
    }

    /// Write a combined document as one merged record.
    ///
    /// See [`CombinedDocument::to_merged_record`].
    ///
    /// # Errors
    ///
    /// Same as [`MarcWriter::write_record`]; merging several records can push
    /// the result past the 99999-byte limit.
    pub fn write_document(&mut self, document: &CombinedDocument) -> Result<()> {
        self.write_record(&document.to_merged_record())
    }

    /// Flush the writer and mark it as finished.
    ///
    /// After calling `finish`, no more records can be written.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing the underlying writer fails.
    pub fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.finished = true;
        Ok(())
    }

    /// Flush and return the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }

    /// Returns the number of records written so far.
    #[must_use]
    pub fn records_written(&self) -> usize {
        self.records_written
    }
}

/// Serialize one record into a fresh buffer.
fn encode_record(record: &Record) -> Result<Vec<u8>> {
    let mut data_area = Vec::new();
    let mut directory = Vec::with_capacity(record.fields.len() * 12 + 1);

    for field in &record.fields {
        let start = data_area.len();
        match &field.value {
            FieldValue::Control(value) => data_area.extend_from_slice(value),
            FieldValue::Data(data) => {
                data_area.extend_from_slice(&data.indicators);
                for subfield in &data.subfields {
                    data_area.push(SUBFIELD_DELIMITER);
                    data_area.push(subfield.code);
                    data_area.extend_from_slice(&subfield.value);
                }
            },
        }
        data_area.push(FIELD_TERMINATOR);

        let length = data_area.len() - start;
        if length > MAX_FIELD_LEN {
            return Err(MarcError::InvalidRecord(format!(
                "Field {} is {length} bytes; the limit is {MAX_FIELD_LEN}",
                field.tag
            )));
        }
        directory.extend_from_slice(field.tag.as_bytes());
        directory.extend_from_slice(format!("{length:04}{start:05}").as_bytes());
    }
    directory.push(FIELD_TERMINATOR);

    let base_address = LEADER_LEN + directory.len();
    let record_length = base_address + data_area.len() + 1;
    if record_length > MAX_RECORD_LEN {
        return Err(MarcError::InvalidRecord(format!(
            "Record is {record_length} bytes; the limit is {MAX_RECORD_LEN}"
        )));
    }

    let mut leader = record.leader.clone();
    leader.record_length = u32::try_from(record_length)
        .map_err(|_| MarcError::InvalidRecord("Record length out of range".to_string()))?;
    leader.data_base_address = u32::try_from(base_address)
        .map_err(|_| MarcError::InvalidRecord("Base address out of range".to_string()))?;
    leader.entry_map[0] = b'4';
    leader.entry_map[1] = b'5';

    let mut bytes = leader.as_bytes()?;
    bytes.reserve(record_length - LEADER_LEN);
    bytes.extend_from_slice(&directory);
    bytes.extend_from_slice(&data_area);
    bytes.push(RECORD_TERMINATOR);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode;
    use crate::leader::Leader;
    use crate::record::Field;

    fn sample() -> Record {
        Record::builder(Leader::default())
            .control_field(*b"001", "12883376")
            .field(
                Field::builder(*b"245", b'1', b'0')
                    .subfield(b'a', "Summerland /")
                    .subfield(b'c', "Michael Chabon.")
                    .build(),
            )
            .field(Field::builder(*b"650", b' ', b'0').subfield(b'a', "Fantasy.").build())
            .build()
    }

    #[test]
    fn test_write_then_decode() {
        let mut writer = MarcWriter::new(Vec::new());
        writer.write_record(&sample()).unwrap();
        assert_eq!(writer.records_written(), 1);
        let bytes = writer.into_inner().unwrap();

        let (record, consumed) = decode(&bytes, 0).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(record.fields, sample().fields);
        assert_eq!(record.directory.len(), 3);
        assert_eq!(record.leader.record_length as usize, bytes.len());
        assert_eq!(&bytes[20..24], b"4500");
    }

    #[test]
    fn test_fields_keep_stored_order() {
        let record = Record::builder(Leader::default())
            .field(Field::builder(*b"650", b' ', b'0').subfield(b'a', "B").build())
            .control_field(*b"001", "1")
            .build();
        let mut writer = MarcWriter::new(Vec::new());
        writer.write_record(&record).unwrap();
        let bytes = writer.into_inner().unwrap();

        let (decoded, _) = decode(&bytes, 0).unwrap();
        let tags: Vec<String> = decoded.fields.iter().map(|f| f.tag.to_string()).collect();
        assert_eq!(tags, ["650", "001"]);
    }

    #[test]
    fn test_oversized_field_is_rejected() {
        let record = Record::builder(Leader::default())
            .field(
                Field::builder(*b"500", b' ', b' ')
                    .subfield(b'a', vec![b'x'; MAX_FIELD_LEN])
                    .build(),
            )
            .build();
        let mut writer = MarcWriter::new(Vec::new());
        assert!(matches!(
            writer.write_record(&record),
            Err(MarcError::InvalidRecord(_))
        ));
        assert_eq!(writer.records_written(), 0);
        assert!(writer.into_inner().unwrap().is_empty());
    }

    #[test]
    fn test_oversized_record_is_rejected() {
        let mut builder = Record::builder(Leader::default());
        for _ in 0..20 {
            builder = builder.field(
                Field::builder(*b"500", b' ', b' ')
                    .subfield(b'a', vec![b'x'; 5_000])
                    .build(),
            );
        }
        let mut writer = MarcWriter::new(Vec::new());
        assert!(matches!(
            writer.write_record(&builder.build()),
            Err(MarcError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_write_document_merges_fields() {
        let mut document = CombinedDocument::new(None, sample());
        document.push(
            Record::builder(Leader::default())
                .control_field(*b"001", "12883376")
                .field(Field::builder(*b"852", b' ', b' ').subfield(b'h', "PZ7").build())
                .build(),
        );

        let mut writer = MarcWriter::new(Vec::new());
        writer.write_document(&document).unwrap();
        let bytes = writer.into_inner().unwrap();

        let (merged, _) = decode(&bytes, 0).unwrap();
        assert_eq!(merged.fields.len(), 5);
        assert_eq!(merged.get_field("852").and_then(|f| f.get_subfield(b'h')), Some(&b"PZ7"[..]));
    }

    #[test]
    fn test_finished_writer_rejects_records() {
        let mut writer = MarcWriter::new(Vec::new());
        writer.finish().unwrap();
        assert!(writer.write_record(&sample()).is_err());
    }
}
