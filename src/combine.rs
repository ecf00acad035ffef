//! Folding adjacent records that share an identifier into one document.
//!
//! [`CombiningReader`] sits on top of any iterator of `Result<Record>` (a
//! [`RecordStream`] in the usual case) and holds at most one open group.
//! Only *adjacent* records combine: `[A, A, B, A]` yields three documents,
//! because there is no memory of identifiers already emitted. A record with
//! no identifier always stands alone.
//!
//! Errors from the inner iterator close the open group first, so the caller
//! sees the group, then the error, and a record before an error can never
//! merge with one after it.
//!
//! # Examples
//!
//! ```
//! use marc_combine::{CombineConfig, CombiningReader};
//!
//! # fn main() -> marc_combine::Result<()> {
//! let bytes: &[u8] = b"";
//! for document in CombiningReader::from_reader(bytes, &CombineConfig::default())? {
//!     let document = document?;
//!     println!("{} record(s)", document.len());
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::CombineConfig;
use crate::document::CombinedDocument;
use crate::encoding::SourceEncoding;
use crate::error::{MarcError, Result};
use crate::identifier::IdentifierSpec;
use crate::record::Record;
use crate::stream::RecordStream;
use std::io::Read;
use std::iter::FusedIterator;
use std::mem;

/// Counters kept by a [`CombiningReader`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CombineStats {
    /// Documents emitted.
    pub documents: u64,
    /// Records folded into emitted documents.
    pub records: u64,
    /// Record count of the largest document emitted.
    pub largest_group: usize,
}

#[derive(Debug, Default)]
enum GroupState {
    #[default]
    Idle,
    Accumulating(CombinedDocument),
}

/// Iterator of [`CombinedDocument`]s built from adjacent records.
#[derive(Debug)]
pub struct CombiningReader<I> {
    records: I,
    identifier: IdentifierSpec,
    encoding: SourceEncoding,
    state: GroupState,
    /// Error held back until the group it closed has been yielded.
    pending_error: Option<MarcError>,
    exhausted: bool,
    stats: CombineStats,
}

impl<R: Read> CombiningReader<RecordStream<R>> {
    /// Build the whole pipeline over a byte source.
    ///
    /// Emitted documents carry `config.source_encoding` for their text
    /// accessors.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidConfig`] if `config` does not validate.
    pub fn from_reader(reader: R, config: &CombineConfig) -> Result<Self> {
        config.validate()?;
        Ok(CombiningReader::new(
            RecordStream::with_config(reader, config),
            config.identifier,
        )
        .with_source_encoding(config.source_encoding))
    }

    /// Counters of the underlying record stream.
    #[must_use]
    pub fn stream_stats(&self) -> crate::stream::StreamStats {
        self.records.stats()
    }
}

impl<I> CombiningReader<I>
where
    I: Iterator<Item = Result<Record>>,
{
    /// Group the records of `records` by `identifier`.
    pub fn new(records: I, identifier: IdentifierSpec) -> Self {
        CombiningReader {
            records,
            identifier,
            encoding: SourceEncoding::default(),
            state: GroupState::Idle,
            pending_error: None,
            exhausted: false,
            stats: CombineStats::default(),
        }
    }

    /// Encoding stamped on every emitted document.
    #[must_use]
    pub fn with_source_encoding(mut self, encoding: SourceEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> CombineStats {
        self.stats
    }

    /// Take the open group, if any, and record it as emitted.
    fn close_group(&mut self) -> Option<CombinedDocument> {
        match mem::take(&mut self.state) {
            GroupState::Idle => None,
            GroupState::Accumulating(document) => {
                self.stats.documents += 1;
                self.stats.records += document.len() as u64;
                self.stats.largest_group = self.stats.largest_group.max(document.len());
                log::debug!(
                    "emitting document {:?} with {} record(s)",
                    document.identifier().map(String::from_utf8_lossy),
                    document.len()
                );
                Some(document)
            },
        }
    }
}

impl<I> Iterator for CombiningReader<I>
where
    I: Iterator<Item = Result<Record>>,
{
    type Item = Result<CombinedDocument>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(error) = self.pending_error.take() {
            return Some(Err(error));
        }

        while !self.exhausted {
            let record = match self.records.next() {
                Some(Ok(record)) => record,
                Some(Err(error)) => {
                    if let Some(document) = self.close_group() {
                        self.pending_error = Some(error);
                        return Some(Ok(document));
                    }
                    return Some(Err(error));
                },
                None => {
                    self.exhausted = true;
                    break;
                },
            };

            let identifier = self.identifier.extract(&record);
            if let GroupState::Accumulating(open) = &mut self.state {
                if identifier.is_some() && open.identifier() == identifier.as_deref() {
                    open.push(record);
                    continue;
                }
            }

            let emitted = self.close_group();
            let opened = CombinedDocument::new(identifier, record).with_source_encoding(self.encoding);
            self.state = GroupState::Accumulating(opened);
            if let Some(document) = emitted {
                return Some(Ok(document));
            }
        }

        self.close_group().map(Ok)
    }
}

impl<I> FusedIterator for CombiningReader<I> where I: FusedIterator<Item = Result<Record>> {}

/// Group any record iterator by `identifier`.
///
/// Shorthand for [`CombiningReader::new`].
pub fn combine_records<I>(records: I, identifier: IdentifierSpec) -> CombiningReader<I::IntoIter>
where
    I: IntoIterator<Item = Result<Record>>,
{
    CombiningReader::new(records.into_iter(), identifier)
}
