//! Character encoding of field data.
//!
//! Record boundaries never depend on the encoding; it only matters when field
//! bytes are turned into text. Supported encodings:
//!
//! - **UTF-8**: leader position 9 = `a`
//! - **MARC-8**: leader position 9 = space. Basic Latin and the ANSEL
//!   extended Latin set are decoded; other MARC-8 graphic sets selected by
//!   escape sequences come out as U+FFFD.
//! - **Latin-1**: for exports that ignore the leader and write Windows-1252
//!
//! [`SourceEncoding::Auto`] picks UTF-8 or MARC-8 from the leader.

use crate::error::{MarcError, Result};
use crate::leader::Leader;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use unicode_normalization::UnicodeNormalization;

const ESC: u8 = 0x1B;

/// Character encoding of field data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceEncoding {
    /// Decide per record from leader position 9
    #[default]
    Auto,
    /// UTF-8
    #[serde(alias = "utf-8")]
    Utf8,
    /// MARC-8 (ISO 2022 based, ANSEL diacritics)
    #[serde(alias = "marc-8")]
    Marc8,
    /// ISO 8859-1 / Windows-1252
    #[serde(alias = "latin-1", alias = "iso-8859-1")]
    Latin1,
}

impl SourceEncoding {
    /// Detect the encoding from the leader character coding position.
    ///
    /// `a` means UTF-8; anything else is treated as MARC-8.
    #[must_use]
    pub fn from_leader_char(c: char) -> Self {
        if c == 'a' {
            SourceEncoding::Utf8
        } else {
            SourceEncoding::Marc8
        }
    }

    /// Replace [`SourceEncoding::Auto`] with the encoding the leader declares.
    #[must_use]
    pub fn resolve(self, leader: &Leader) -> Self {
        match self {
            SourceEncoding::Auto => Self::from_leader_char(leader.character_coding),
            other => other,
        }
    }

    /// Decode raw field bytes to a string.
    ///
    /// An unresolved [`SourceEncoding::Auto`] decodes as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::EncodingError`] for bytes that are not valid UTF-8
    /// when decoding as UTF-8. MARC-8 and Latin-1 decoding never fail; unknown
    /// characters become U+FFFD.
    pub fn decode(self, bytes: &[u8]) -> Result<String> {
        match self {
            SourceEncoding::Auto | SourceEncoding::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| MarcError::EncodingError(format!("Invalid UTF-8: {e}"))),
            SourceEncoding::Marc8 => Ok(decode_marc8(bytes)),
            SourceEncoding::Latin1 => {
                let (text, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
                Ok(text.into_owned())
            },
        }
    }
}

impl fmt::Display for SourceEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceEncoding::Auto => write!(f, "auto"),
            SourceEncoding::Utf8 => write!(f, "utf8"),
            SourceEncoding::Marc8 => write!(f, "marc8"),
            SourceEncoding::Latin1 => write!(f, "latin1"),
        }
    }
}

impl FromStr for SourceEncoding {
    type Err = MarcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(SourceEncoding::Auto),
            "utf8" | "utf-8" => Ok(SourceEncoding::Utf8),
            "marc8" | "marc-8" => Ok(SourceEncoding::Marc8),
            "latin1" | "latin-1" | "iso-8859-1" => Ok(SourceEncoding::Latin1),
            _ => Err(MarcError::InvalidConfig(format!(
                "Unknown source encoding: {s}"
            ))),
        }
    }
}

/// Graphic character sets a MARC-8 escape sequence can designate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharacterSet {
    BasicLatin,
    Ansel,
    /// A set without a mapping table here, one byte per character
    Unsupported,
    /// East Asian (EACC), three bytes per character
    UnsupportedMultibyte,
}

impl CharacterSet {
    fn from_final_byte(byte: u8) -> Self {
        match byte {
            b'B' | b's' => CharacterSet::BasicLatin,
            b'E' => CharacterSet::Ansel,
            b'1' => CharacterSet::UnsupportedMultibyte,
            _ => CharacterSet::Unsupported,
        }
    }
}

lazy_static! {
    /// ANSEL extended Latin, keyed by the G1 byte: (code point, is combining).
    static ref ANSEL: HashMap<u8, (u32, bool)> = {
        let spacing: [(u8, u32); 36] = [
            (0xA1, 0x0141), (0xA2, 0x00D8), (0xA3, 0x0110), (0xA4, 0x00DE),
            (0xA5, 0x00C6), (0xA6, 0x0152), (0xA7, 0x02B9), (0xA8, 0x00B7),
            (0xA9, 0x266D), (0xAA, 0x00AE), (0xAB, 0x00B1), (0xAC, 0x01A0),
            (0xAD, 0x01AF), (0xAE, 0x02BC), (0xB0, 0x02BB), (0xB1, 0x0142),
            (0xB2, 0x00F8), (0xB3, 0x0111), (0xB4, 0x00FE), (0xB5, 0x00E6),
            (0xB6, 0x0153), (0xB7, 0x02BA), (0xB8, 0x0131), (0xB9, 0x00A3),
            (0xBA, 0x00F0), (0xBC, 0x01A1), (0xBD, 0x01B0), (0xC0, 0x00B0),
            (0xC1, 0x2113), (0xC2, 0x2117), (0xC3, 0x00A9), (0xC4, 0x266F),
            (0xC5, 0x00BF), (0xC6, 0x00A1), (0xC7, 0x00DF), (0xC8, 0x20AC),
        ];
        let combining: [(u8, u32); 29] = [
            (0xE0, 0x0309), (0xE1, 0x0300), (0xE2, 0x0301), (0xE3, 0x0302),
            (0xE4, 0x0303), (0xE5, 0x0304), (0xE6, 0x0306), (0xE7, 0x0307),
            (0xE8, 0x0308), (0xE9, 0x030C), (0xEA, 0x030A), (0xEB, 0xFE20),
            (0xEC, 0xFE21), (0xED, 0x0315), (0xEE, 0x030B), (0xEF, 0x0310),
            (0xF0, 0x0327), (0xF1, 0x0328), (0xF2, 0x0323), (0xF3, 0x0324),
            (0xF4, 0x0325), (0xF5, 0x0333), (0xF6, 0x0332), (0xF7, 0x0326),
            (0xF8, 0x031C), (0xF9, 0x032E), (0xFA, 0xFE22), (0xFB, 0xFE23),
            (0xFE, 0x0313),
        ];
        let mut table = HashMap::with_capacity(spacing.len() + combining.len());
        for (byte, code_point) in spacing {
            table.insert(byte, (code_point, false));
        }
        for (byte, code_point) in combining {
            table.insert(byte, (code_point, true));
        }
        table
    };
}

/// Decode MARC-8 bytes to an NFC-normalized string.
///
/// MARC-8 writes combining diacritics before their base character; they are
/// held back and emitted after it.
fn decode_marc8(bytes: &[u8]) -> String {
    let mut g0 = CharacterSet::BasicLatin;
    let mut g1 = CharacterSet::Ansel;
    let mut result = String::with_capacity(bytes.len());
    let mut combining: Vec<char> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let byte = bytes[i];

        if byte == ESC {
            i += consume_escape(&bytes[i..], &mut g0, &mut g1);
            continue;
        }

        // Control characters other than line breaks are dropped
        if byte < 0x20 || byte == 0x7F {
            if byte == b'\n' || byte == b'\r' {
                result.push(byte as char);
            }
            i += 1;
            continue;
        }

        let charset = if byte >= 0xA0 { g1 } else { g0 };
        let (ch, is_combining, width) = match charset {
            CharacterSet::BasicLatin => (
                char::from(byte & 0x7F),
                false,
                1,
            ),
            CharacterSet::Ansel => match ANSEL.get(&(byte | 0x80)) {
                Some(&(code_point, is_combining)) => (
                    char::from_u32(code_point).unwrap_or('\u{FFFD}'),
                    is_combining,
                    1,
                ),
                None => ('\u{FFFD}', false, 1),
            },
            CharacterSet::Unsupported => ('\u{FFFD}', false, 1),
            CharacterSet::UnsupportedMultibyte => ('\u{FFFD}', false, 3),
        };

        if is_combining {
            combining.push(ch);
        } else {
            result.push(ch);
            result.extend(combining.drain(..));
        }
        i += width;
    }

    result.extend(combining);
    result.nfc().collect()
}

/// Apply one escape sequence starting at `bytes[0]` and return its length.
fn consume_escape(bytes: &[u8], g0: &mut CharacterSet, g1: &mut CharacterSet) -> usize {
    match bytes.get(1) {
        // ESC ( F / ESC , F designate G0; ESC ) F / ESC - F designate G1
        Some(b'(' | b',') => {
            if let Some(&final_byte) = bytes.get(2) {
                *g0 = CharacterSet::from_final_byte(final_byte);
            }
            bytes.len().min(3)
        },
        Some(b')' | b'-') => {
            if let Some(&final_byte) = bytes.get(2) {
                *g1 = CharacterSet::from_final_byte(final_byte);
            }
            bytes.len().min(3)
        },
        // ESC $ [intermediate] F designates a multibyte set
        Some(b'$') => {
            let (target_is_g1, final_at) = match bytes.get(2) {
                Some(b')' | b'-') => (true, 3),
                Some(b'(' | b',') => (false, 3),
                _ => (false, 2),
            };
            let charset = match bytes.get(final_at) {
                Some(&final_byte) => CharacterSet::from_final_byte(final_byte),
                None => CharacterSet::UnsupportedMultibyte,
            };
            let charset = if charset == CharacterSet::Unsupported {
                CharacterSet::UnsupportedMultibyte
            } else {
                charset
            };
            if target_is_g1 {
                *g1 = charset;
            } else {
                *g0 = charset;
            }
            bytes.len().min(final_at + 1)
        },
        // ESC s returns G0 to Basic Latin
        Some(b's') => {
            *g0 = CharacterSet::BasicLatin;
            2
        },
        // ESC g / ESC b / ESC p: Greek symbols, subscripts, superscripts
        Some(b'g' | b'b' | b'p') => {
            *g0 = CharacterSet::Unsupported;
            2
        },
        Some(_) => 2,
        None => 1,
    }
}
