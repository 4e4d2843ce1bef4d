//! Fixed-size records and their on-disk encoding.

use std::cmp::Ordering;
use std::fmt;
use std::io;
use std::io::prelude::*;
use std::marker::PhantomData;

use crate::config::RECORD_SIZE;

/// Fixed-width record interface. Provides methods for encoding a record into and decoding it from
/// exactly [`FixedSizeRecord::SIZE`] bytes.
pub trait FixedSizeRecord: Sized {
    /// Encoded record size in bytes.
    const SIZE: usize;

    /// Encodes the record into `buf`, which is exactly `SIZE` bytes long.
    fn encode(&self, buf: &mut [u8]);

    /// Decodes a record from `buf`, which is exactly `SIZE` bytes long.
    fn decode(buf: &[u8]) -> Self;
}

/// Sixteen byte record: a signed 64-bit identifier followed by a 64-bit floating-point sort key,
/// both stored most-significant byte first.
///
/// Records are ordered by the raw bits of the key interpreted as an unsigned integer, see [`Record::compare`].
#[derive(Debug, Clone, Copy)]
pub struct Record {
    id: i64,
    key: f64,
}

impl Record {
    pub fn new(id: i64, key: f64) -> Self {
        Record { id, key }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn key(&self) -> f64 {
        self.key
    }

    /// Returns the key bit pattern the records are sorted by.
    pub fn sort_key(&self) -> u64 {
        self.key.to_bits()
    }

    /// Compares two records by the bit patterns of their keys taken as unsigned 64-bit integers.
    ///
    /// This matches numeric order for non-negative keys only: every negative key sorts after every
    /// non-negative one, and negative keys sort by ascending magnitude.
    pub fn compare(&self, other: &Record) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

// bitwise equality, so that NaN keys and signed zeros survive comparisons in tests
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.key.to_bits() == other.key.to_bits()
    }
}

impl Eq for Record {}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.key)
    }
}

impl FixedSizeRecord for Record {
    const SIZE: usize = RECORD_SIZE;

    fn encode(&self, buf: &mut [u8]) {
        buf[..8].copy_from_slice(&self.id.to_be_bytes());
        buf[8..16].copy_from_slice(&self.key.to_bits().to_be_bytes());
    }

    fn decode(buf: &[u8]) -> Self {
        let mut id = [0u8; 8];
        let mut key = [0u8; 8];
        id.copy_from_slice(&buf[..8]);
        key.copy_from_slice(&buf[8..16]);

        Record {
            id: i64::from_be_bytes(id),
            key: f64::from_bits(u64::from_be_bytes(key)),
        }
    }
}

/// Reads into `buf` until it is full or the reader is exhausted. Returns the number of bytes read.
pub(crate) fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }

    return Ok(filled);
}

/// Sequential record reader. Yields records until the underlying reader is exhausted.
/// A trailing partial record is reported as an [`io::ErrorKind::UnexpectedEof`] error.
pub struct RecordReader<R, T> {
    reader: R,
    buf: Vec<u8>,
    done: bool,

    item_type: PhantomData<T>,
}

impl<R: Read, T: FixedSizeRecord> RecordReader<R, T> {
    pub fn new(reader: R) -> Self {
        RecordReader {
            reader,
            buf: vec![0; T::SIZE],
            done: false,
            item_type: PhantomData,
        }
    }
}

impl<R: Read, T: FixedSizeRecord> Iterator for RecordReader<R, T> {
    type Item = io::Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match read_up_to(&mut self.reader, &mut self.buf) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(n) if n < T::SIZE => {
                self.done = true;
                Some(Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("partial record: {} of {} bytes", n, T::SIZE),
                )))
            }
            Ok(_) => Some(Ok(T::decode(&self.buf))),
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Sequential record writer.
pub struct RecordWriter<W, T> {
    writer: W,
    buf: Vec<u8>,
    written: u64,

    item_type: PhantomData<T>,
}

impl<W: Write, T: FixedSizeRecord> RecordWriter<W, T> {
    pub fn new(writer: W) -> Self {
        RecordWriter {
            writer,
            buf: vec![0; T::SIZE],
            written: 0,
            item_type: PhantomData,
        }
    }

    /// Encodes and writes a single record.
    pub fn write(&mut self, record: &T) -> io::Result<()> {
        record.encode(&mut self.buf);
        self.writer.write_all(&self.buf)?;
        self.written += 1;

        return Ok(());
    }

    /// Returns the number of records written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flushes the underlying writer and returns it.
    pub fn finish(mut self) -> io::Result<W> {
        self.writer.flush()?;
        return Ok(self.writer);
    }
}
