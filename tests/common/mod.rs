//! Common test helpers shared across the integration test suite.

#![allow(dead_code)]

use marc_combine::{Field, Leader, MarcWriter, Record};
use std::io::{self, Read};

/// Leader for a bibliographic record (type `a`).
pub fn bib_leader() -> Leader {
    Leader::default()
}

/// Leader for a holdings record (type `y`).
pub fn holdings_leader() -> Leader {
    Leader {
        record_type: 'y',
        bibliographic_level: ' ',
        character_coding: ' ',
        ..Leader::default()
    }
}

/// A bibliographic record with a control number and a 245 title.
pub fn bib(id: &str, title: &str) -> Record {
    Record::builder(bib_leader())
        .control_field(*b"001", id.to_string())
        .field(
            Field::builder(*b"245", b'0', b'0')
                .subfield(b'a', title.to_string())
                .build(),
        )
        .build()
}

/// A holdings record with a control number and an 852 call number.
pub fn holdings(id: &str, call_number: &str) -> Record {
    Record::builder(holdings_leader())
        .control_field(*b"001", id.to_string())
        .field(
            Field::builder(*b"852", b'0', b' ')
                .subfield(b'b', "MAIN")
                .subfield(b'h', call_number.to_string())
                .build(),
        )
        .build()
}

/// A record with no 001 field at all.
pub fn anonymous(title: &str) -> Record {
    Record::builder(bib_leader())
        .field(
            Field::builder(*b"245", b'0', b'0')
                .subfield(b'a', title.to_string())
                .build(),
        )
        .build()
}

/// Serialize records back to back into one ISO 2709 stream.
pub fn encode(records: &[Record]) -> Vec<u8> {
    let mut writer = MarcWriter::new(Vec::new());
    for record in records {
        writer.write_record(record).expect("test record should encode");
    }
    writer.into_inner().expect("writing to a Vec cannot fail")
}

/// Serialize records and break the field terminator of the 001 field of the
/// record at `index`, leaving its length and record terminator intact.
///
/// Only valid for records whose first field is `001`.
pub fn encode_with_corrupt(records: &[Record], index: usize) -> Vec<u8> {
    let mut bytes = Vec::new();
    for (i, record) in records.iter().enumerate() {
        let mut encoded = encode(std::slice::from_ref(record));
        if i == index {
            let base = usize::from(encoded[12] - b'0') * 10_000
                + usize::from(encoded[13] - b'0') * 1_000
                + usize::from(encoded[14] - b'0') * 100
                + usize::from(encoded[15] - b'0') * 10
                + usize::from(encoded[16] - b'0');
            let id_len = record.control_number().map_or(0, <[u8]>::len);
            assert_eq!(encoded[base + id_len], 0x1E);
            encoded[base + id_len] = b'#';
        }
        bytes.extend_from_slice(&encoded);
    }
    bytes
}

/// Control numbers of decoded records, for compact assertions.
pub fn control_number(record: &Record) -> String {
    String::from_utf8_lossy(record.control_number().unwrap_or_default()).into_owned()
}

/// Reader producing `count` single-record documents on demand, so the whole
/// stream never exists in memory at once.
pub struct SyntheticCatalog {
    remaining: usize,
    next_id: usize,
    pending: Vec<u8>,
    cursor: usize,
}

impl SyntheticCatalog {
    pub fn new(count: usize) -> Self {
        SyntheticCatalog {
            remaining: count,
            next_id: 0,
            pending: Vec::new(),
            cursor: 0,
        }
    }
}

impl Read for SyntheticCatalog {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cursor == self.pending.len() {
            if self.remaining == 0 {
                return Ok(0);
            }
            self.remaining -= 1;
            self.next_id += 1;
            self.pending = encode(&[bib(&format!("syn{:08}", self.next_id), "Generated title")]);
            self.cursor = 0;
        }
        let n = buf.len().min(self.pending.len() - self.cursor);
        buf[..n].copy_from_slice(&self.pending[self.cursor..self.cursor + n]);
        self.cursor += n;
        Ok(n)
    }
}
