//! Splitting a byte source into records.
//!
//! [`RecordStream`] pulls bytes from any [`std::io::Read`] on demand, hands
//! each record window to [`crate::decoder::decode`] and yields the results in
//! order. It holds at most one record (plus one read chunk) in memory, or the
//! resync scan window while recovering from a bad record.
//!
//! # Errors as items
//!
//! A record that fails to decode is yielded as
//! `Err(MarcError::Decode(..))` and the stream carries on: it scans forward
//! from the byte after the bad record's start for a plausible record
//! terminator (`0x1D` followed by end of input or by five ASCII digits, the
//! start of the next leader) and resumes right after it. If no such
//! terminator turns up within the scan limit, or before end of input, the
//! stream yields one [`MarcError::UnrecoverableStream`] and then ends. An I/O
//! error from the source is yielded once and also ends the stream.
//!
//! # Examples
//!
//! ```
//! use marc_combine::RecordStream;
//!
//! let bytes = b"00026nam a2200025 a 4500\x1e\x1d00026nam a2200025 a 4500\x1e\x1d";
//! let mut stream = RecordStream::new(&bytes[..]);
//! assert_eq!(stream.by_ref().filter(Result::is_ok).count(), 2);
//! assert_eq!(stream.stats().records, 2);
//! ```

use crate::config::{CombineConfig, DEFAULT_RESYNC_SCAN_LIMIT};
use crate::decoder::{declared_length, decode, RECORD_TERMINATOR};
use crate::error::{MarcError, Result};
use crate::leader::{parse_ascii_digits, LEADER_LEN};
use crate::record::Record;
use std::io::{self, Read};
use std::iter::FusedIterator;

/// Bytes requested from the source per read call.
///
/// The read buffer never holds more than the bytes a record (or a resync
/// scan) still needs plus one chunk.
pub const READ_CHUNK: usize = 64 * 1024;

/// Digits that must follow a terminator for it to count as a record boundary.
const LENGTH_DIGITS: usize = 5;

/// Counters kept by a [`RecordStream`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Records decoded successfully.
    pub records: u64,
    /// Records that failed to decode.
    pub decode_errors: u64,
    /// Successful resynchronizations.
    pub resyncs: u64,
    /// Bytes discarded while resynchronizing.
    pub bytes_skipped: u64,
    /// Absolute offset of the next unread record.
    pub position: u64,
    /// Most bytes the read buffer has held at once.
    pub peak_buffered: usize,
}

/// Lazy iterator of records decoded from a byte source.
#[derive(Debug)]
pub struct RecordStream<R: Read> {
    reader: R,
    buffer: Vec<u8>,
    /// Index in `buffer` of the first byte not yet handed out.
    consumed: usize,
    eof: bool,
    finished: bool,
    /// Fatal error to yield after the decode error that caused it.
    pending: Option<MarcError>,
    resync_scan_limit: usize,
    stats: StreamStats,
}

impl<R: Read> RecordStream<R> {
    /// Create a stream with the default resync scan limit.
    pub fn new(reader: R) -> Self {
        RecordStream {
            reader,
            buffer: Vec::new(),
            consumed: 0,
            eof: false,
            finished: false,
            pending: None,
            resync_scan_limit: DEFAULT_RESYNC_SCAN_LIMIT,
            stats: StreamStats::default(),
        }
    }

    /// Create a stream using the scan limit from `config`.
    pub fn with_config(reader: R, config: &CombineConfig) -> Self {
        Self::new(reader).with_resync_scan_limit(config.resync_scan_limit)
    }

    /// Set how many bytes past a bad record's start are searched for the
    /// next record before giving up.
    #[must_use]
    pub fn with_resync_scan_limit(mut self, limit: usize) -> Self {
        self.resync_scan_limit = limit;
        self
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Absolute byte offset of the next record to be read.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.stats.position
    }

    /// Borrow the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    fn buffered(&self) -> usize {
        self.buffer.len() - self.consumed
    }

    fn window(&self) -> &[u8] {
        &self.buffer[self.consumed..]
    }

    fn consume(&mut self, count: usize) {
        self.consumed += count;
        self.stats.position += count as u64;
    }

    /// Read until at least `wanted` unconsumed bytes are buffered or the
    /// source is exhausted.
    fn fill(&mut self, wanted: usize) -> io::Result<()> {
        while self.buffered() < wanted && !self.eof {
            if self.consumed > 0 {
                self.buffer.drain(..self.consumed);
                self.consumed = 0;
            }
            let len = self.buffer.len();
            self.buffer.resize(len + READ_CHUNK, 0);
            match self.reader.read(&mut self.buffer[len..]) {
                Ok(0) => {
                    self.buffer.truncate(len);
                    self.eof = true;
                },
                Ok(n) => {
                    self.buffer.truncate(len + n);
                    self.stats.peak_buffered = self.stats.peak_buffered.max(self.buffer.len());
                },
                Err(e) if e.kind() == io::ErrorKind::Interrupted => self.buffer.truncate(len),
                Err(e) => {
                    self.buffer.truncate(len);
                    return Err(e);
                },
            }
        }
        Ok(())
    }

    fn read_record(&mut self) -> Result<Option<Record>> {
        self.fill(LEADER_LEN)?;
        if self.buffered() == 0 {
            return Ok(None);
        }

        let wanted = declared_length(self.window()).map_or(LEADER_LEN, |n| n.max(LEADER_LEN));
        self.fill(wanted)?;

        match decode(self.window(), 0) {
            Ok((record, length)) => {
                log::trace!(
                    "decoded record at byte {} ({length} bytes, {} fields)",
                    self.stats.position,
                    record.fields.len()
                );
                self.consume(length);
                self.stats.records += 1;
                Ok(Some(record))
            },
            Err(error) => {
                let error = error.rebased(self.stats.position);
                self.stats.decode_errors += 1;
                log::warn!("skipping undecodable record: {error}");
                if let Err(fatal) = self.resync() {
                    self.pending = Some(fatal);
                }
                Err(MarcError::Decode(error))
            },
        }
    }

    /// Advance past the record at the current position to just after the
    /// next plausible record terminator.
    ///
    /// Offsets here are relative to the current position; `fill` may compact
    /// the buffer but never moves the current position.
    fn resync(&mut self) -> Result<()> {
        let limit = self.resync_scan_limit;
        let mut next = 1;

        loop {
            if next > limit {
                return Err(self.unrecoverable(limit));
            }
            self.fill(next + 1)?;
            let available = self.buffered();
            if available <= next {
                return Err(self.unrecoverable(available.saturating_sub(1)));
            }

            let end = available.min(limit + 1);
            let Some(hit) = memchr::memchr(RECORD_TERMINATOR, &self.window()[next..end]) else {
                next = end;
                continue;
            };
            let terminator = next + hit;

            self.fill(terminator + 1 + LENGTH_DIGITS)?;
            let after = &self.window()[terminator + 1..];
            let plausible = if after.is_empty() {
                self.eof
            } else {
                after
                    .get(..LENGTH_DIGITS)
                    .and_then(parse_ascii_digits)
                    .is_some()
            };

            if plausible {
                let skipped = terminator + 1;
                log::debug!(
                    "resynchronized at byte {} after skipping {skipped} bytes",
                    self.stats.position + skipped as u64
                );
                self.consume(skipped);
                self.stats.resyncs += 1;
                self.stats.bytes_skipped += skipped as u64;
                return Ok(());
            }
            log::debug!(
                "ignoring record terminator at byte {} not followed by a leader",
                self.stats.position + terminator as u64
            );
            next = terminator + 1;
        }
    }

    fn unrecoverable(&self, scanned: usize) -> MarcError {
        let offset = self.stats.position;
        log::error!("no record boundary within {scanned} bytes of byte {offset}; ending stream");
        MarcError::UnrecoverableStream { offset, scanned }
    }
}

impl<R: Read> Iterator for RecordStream<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(error) = self.pending.take() {
            self.finished = true;
            return Some(Err(error));
        }
        if self.finished {
            return None;
        }

        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                None
            },
            Err(error) => {
                if error.is_fatal() {
                    self.finished = true;
                }
                Some(Err(error))
            },
        }
    }
}

impl<R: Read> FusedIterator for RecordStream<R> {}
