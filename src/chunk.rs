//! Run file chunks.

use std::collections::VecDeque;
use std::io;
use std::io::prelude::*;
use std::io::SeekFrom;

use crate::record::FixedSizeRecord;
use crate::run::Run;

/// Cursor over a single run of a run file.
///
/// Runs of one file share the same source, so the chunk does not own it: every refill seeks the source to
/// the next unread block of the run and reads at most `block_records` records from it.
pub struct RunChunk<T> {
    /// Byte offset of the next unread record.
    offset: u64,
    /// Number of run records not read from the source yet.
    remaining: u64,
    block_records: usize,
    buffer: VecDeque<T>,
    scratch: Vec<u8>,
}

impl<T: FixedSizeRecord> RunChunk<T> {
    /// Creates a chunk reading `run` in blocks of `block_records` records.
    pub fn new(run: &Run, block_records: usize) -> Self {
        let block_records = block_records.max(1);
        RunChunk {
            offset: run.byte_range(T::SIZE).start,
            remaining: run.len,
            block_records,
            buffer: VecDeque::with_capacity(block_records),
            scratch: Vec::new(),
        }
    }

    /// Returns `true` if every record of the run has been taken.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0 && self.buffer.is_empty()
    }

    /// Returns the next run record, reading the next block from `source` if the buffer is empty.
    pub fn next_record<S: Read + Seek>(&mut self, source: &mut S) -> Option<io::Result<T>> {
        if self.buffer.is_empty() {
            if self.remaining == 0 {
                return None;
            }
            if let Err(err) = self.refill(source) {
                // a failed run is not retried
                self.remaining = 0;
                return Some(Err(err));
            }
        }

        self.buffer.pop_front().map(Ok)
    }

    fn refill<S: Read + Seek>(&mut self, source: &mut S) -> io::Result<()> {
        let count = self.remaining.min(self.block_records as u64) as usize;
        self.scratch.resize(count * T::SIZE, 0);

        source.seek(SeekFrom::Start(self.offset))?;
        source.read_exact(&mut self.scratch)?;

        self.buffer.extend(self.scratch.chunks_exact(T::SIZE).map(T::decode));
        self.offset += self.scratch.len() as u64;
        self.remaining -= count as u64;

        return Ok(());
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, Cursor};

    use rstest::*;

    use super::RunChunk;
    use crate::record::{Record, RecordWriter};
    use crate::run::RunLayout;

    #[fixture]
    fn run_file() -> Cursor<Vec<u8>> {
        let mut writer = RecordWriter::new(Vec::new());
        for i in 0..10 {
            writer.write(&Record::new(i, i as f64)).unwrap();
        }
        Cursor::new(writer.finish().unwrap())
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(4)]
    #[case(100)]
    fn test_interleaved_chunks(run_file: Cursor<Vec<u8>>, #[case] block_records: usize) {
        let mut run_file = run_file;
        let layout = RunLayout::new(10, 4).unwrap();
        let mut chunks = Vec::from_iter(layout.runs().map(|run| RunChunk::<Record>::new(&run, block_records)));

        let mut ids = vec![Vec::new(); chunks.len()];
        // round robin, so every refill has to seek away from the previous read position
        while chunks.iter().any(|chunk| !chunk.is_exhausted()) {
            for (idx, chunk) in chunks.iter_mut().enumerate() {
                if let Some(record) = chunk.next_record(&mut run_file) {
                    ids[idx].push(record.unwrap().id());
                }
            }
        }

        assert_eq!(ids, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7], vec![8, 9]]);
    }

    #[rstest]
    fn test_truncated_source(run_file: Cursor<Vec<u8>>) {
        let mut bytes = run_file.into_inner();
        bytes.truncate(150);
        let mut source = Cursor::new(bytes);

        let layout = RunLayout::new(10, 4).unwrap();
        let run = layout.run(2).unwrap();
        let mut chunk = RunChunk::<Record>::new(&run, 2);

        let err = chunk.next_record(&mut source).unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(chunk.next_record(&mut source).is_none());
    }
}
