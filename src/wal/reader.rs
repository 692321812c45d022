//! Forward reader over one segment file.

use std::io::{self, BufReader, Read};
use std::path::Path;

use bytes::Bytes;

use crate::util::crc;
use crate::{CorruptionKind, Error, Result};

use super::segment::Segment;
use super::{rec_type_bits, RecordType, HEADER_SIZE, MAX_FRAGMENT_SIZE, PAGE_SIZE};

/// Reassembles records from a single segment's fragment stream.
///
/// Readers over multiple segments compose by iterating segment files in
/// ascending index order. A reader never coordinates with the writer:
/// it observes whatever bytes have reached the file.
pub struct WalReader<R: Read> {
    reader: R,
    /// Accumulated payload of the record being reassembled.
    rec: Vec<u8>,
    /// Scratch buffer for one fragment payload or padding run.
    buf: Box<[u8; PAGE_SIZE]>,
    /// Bytes consumed from the underlying reader.
    total: u64,
    /// Segment index for corruption reports, when known.
    segment: Option<u64>,
    err: Option<Error>,
}

impl WalReader<BufReader<Segment>> {
    /// Open a buffered reader over the segment file `index` in `dir`.
    pub fn open(dir: &Path, index: u64, extension: &str) -> Result<Self> {
        let segment = Segment::open_read(dir, index, extension)?;
        Ok(WalReader::new(BufReader::with_capacity(PAGE_SIZE, segment)).with_segment_index(index))
    }
}

impl<R: Read> WalReader<R> {
    /// Create a reader over any byte source laid out in the segment
    /// format.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            rec: Vec::new(),
            buf: Box::new([0u8; PAGE_SIZE]),
            total: 0,
            segment: None,
            err: None,
        }
    }

    /// Attach a segment index to corruption reports.
    pub fn with_segment_index(mut self, index: u64) -> Self {
        self.segment = Some(index);
        self
    }

    /// Advance to the next record. Returns `false` on end of file or on
    /// error; check [`WalReader::err`] to tell the two apart.
    pub fn next(&mut self) -> bool {
        if self.err.is_some() {
            return false;
        }

        match self.read_record() {
            Ok(complete) => complete,
            Err(e) => {
                self.err = Some(e);
                false
            }
        }
    }

    /// The last reassembled record. Valid only after [`WalReader::next`]
    /// returned `true`.
    pub fn record(&self) -> &[u8] {
        &self.rec
    }

    /// The error that terminated iteration, if any.
    pub fn err(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    /// Consume the reader, yielding records as [`Bytes`].
    pub fn records(self) -> Records<R> {
        Records { reader: self }
    }

    fn read_record(&mut self) -> Result<bool> {
        self.rec.clear();

        let mut i = 0usize;
        loop {
            let mut first = [0u8; 1];
            if read_full(&mut self.reader, &mut first)? == 0 {
                // End of file on a fragment boundary. Clean only if no
                // record is in flight.
                if i > 0 {
                    return Err(self.corruption(CorruptionKind::TornTail));
                }
                return Ok(false);
            }
            self.total += 1;

            let typ = rec_type_bits(first[0]);
            if typ == RecordType::PageTerm.to_byte() {
                self.consume_padding()?;
                continue;
            }

            let mut header = [0u8; HEADER_SIZE - 1];
            let got = read_full(&mut self.reader, &mut header)?;
            self.total += got as u64;
            if got < header.len() {
                return Err(self.corruption(CorruptionKind::TornTail));
            }

            let length = u16::from_be_bytes([header[0], header[1]]) as usize;
            let expected = u32::from_be_bytes([header[2], header[3], header[4], header[5]]);

            if length > MAX_FRAGMENT_SIZE {
                return Err(self.corruption(CorruptionKind::InvalidRecordSize { length }));
            }

            let got = read_full(&mut self.reader, &mut self.buf[..length])?;
            self.total += got as u64;
            if got < length {
                return Err(self.corruption(CorruptionKind::TornTail));
            }

            let actual = crc::checksum(&self.buf[..length]);
            if actual != expected {
                return Err(self.corruption(CorruptionKind::BadCrc { expected, actual }));
            }

            let rec_type = RecordType::from_byte(typ);
            let valid = match rec_type {
                Some(RecordType::Full) | Some(RecordType::First) => i == 0,
                Some(RecordType::Middle) | Some(RecordType::Last) => i > 0,
                _ => false,
            };
            if !valid {
                return Err(self.corruption(CorruptionKind::BadSequence { typ }));
            }

            self.rec.extend_from_slice(&self.buf[..length]);

            if matches!(rec_type, Some(RecordType::Full) | Some(RecordType::Last)) {
                return Ok(true);
            }
            i += 1;
        }
    }

    /// Consume the zero padding that a `PageTerm` byte introduces,
    /// through to the end of the current page.
    fn consume_padding(&mut self) -> Result<()> {
        let k = PAGE_SIZE - (self.total % PAGE_SIZE as u64) as usize;
        if k == PAGE_SIZE {
            // The terminator itself was the page's final byte.
            return Ok(());
        }

        let got = read_full(&mut self.reader, &mut self.buf[..k])?;
        self.total += got as u64;
        if got < k {
            return Err(self.corruption(CorruptionKind::TornTail));
        }

        if self.buf[..k].iter().any(|&b| b != 0) {
            return Err(self.corruption(CorruptionKind::TornPage));
        }

        Ok(())
    }

    fn corruption(&self, kind: CorruptionKind) -> Error {
        Error::Corruption {
            segment: self.segment,
            offset: self.total,
            kind,
        }
    }
}

/// Read until `buf` is full or EOF; returns the bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut n = 0;
    while n < buf.len() {
        match reader.read(&mut buf[n..]) {
            Ok(0) => break,
            Ok(m) => n += m,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(n)
}

/// Iterator over a reader's records.
pub struct Records<R: Read> {
    reader: WalReader<R>,
}

impl<R: Read> Iterator for Records<R> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.reader.next() {
            return Some(Ok(Bytes::copy_from_slice(self.reader.record())));
        }
        self.reader.err.take().map(Err)
    }
}
