//! Run merger.

use std::cmp::Ordering;
use std::io::prelude::*;

use log;

use crate::chunk::RunChunk;
use crate::heap::{BoundedHeap, Compare};
use crate::record::{FixedSizeRecord, RecordWriter};
use crate::run::RunLayout;
use crate::sort::SortError;

/// Current head record of a run.
#[derive(Debug, Clone)]
struct RunHead<T> {
    record: T,
    run: usize,
}

/// Orders run heads by record, then by run index, so equal records leave in run order.
#[derive(Clone)]
struct RunHeadOrder<C>(C);

impl<T, C: Compare<T>> Compare<RunHead<T>> for RunHeadOrder<C> {
    fn compare(&self, left: &RunHead<T>, right: &RunHead<T>) -> Ordering {
        self.0
            .compare(&left.record, &right.record)
            .then(left.run.cmp(&right.run))
    }
}

/// Heap based k-way run merger.
/// Merges the sorted runs of a run file into a single sorted output.
/// Time complexity is *m* \* log(*k*) where *m* is the number of records and *k* is the number of runs.
///
/// Ties between runs are resolved in favour of the lower run index, which gives the same output as
/// repeatedly scanning all run heads for the first minimum.
pub struct RunMerger<S, T, C>
where
    S: Read + Seek,
    T: FixedSizeRecord + Clone,
    C: Compare<T>,
{
    source: S,
    chunks: Vec<RunChunk<T>>,
    heads: BoundedHeap<RunHead<T>, RunHeadOrder<C>>,
    initiated: bool,
}

impl<S, T, C> RunMerger<S, T, C>
where
    S: Read + Seek,
    T: FixedSizeRecord + Clone,
    C: Compare<T>,
{
    /// Creates a merger over the runs of `source`.
    /// Every run must be sorted in ascending order otherwise the result is undefined.
    ///
    /// # Arguments
    /// * `source` - Run file
    /// * `layout` - Run file layout
    /// * `block_records` - Number of records read from a run at once
    /// * `order` - Record order
    pub fn new(source: S, layout: &RunLayout, block_records: usize, order: C) -> Self {
        let chunks = Vec::from_iter(layout.runs().map(|run| RunChunk::new(&run, block_records)));
        let heads = BoundedHeap::empty(chunks.len(), RunHeadOrder(order));

        log::debug!("merging {} runs ({} records)", chunks.len(), layout.records());

        return RunMerger {
            source,
            chunks,
            heads,
            initiated: false,
        };
    }

    /// Writes the whole merged sequence to the output. Returns the number of written records.
    pub fn write_to<W: Write>(self, output: W) -> Result<u64, SortError> {
        let mut writer = RecordWriter::new(output);
        for record in self {
            writer.write(&record?)?;
        }

        let written = writer.written();
        writer.finish()?;

        return Ok(written);
    }

    fn advance(&mut self, run: usize) -> Result<(), SortError> {
        if let Some(record) = self.chunks[run].next_record(&mut self.source) {
            self.heads.insert(RunHead { record: record?, run })?;
        }
        return Ok(());
    }
}

impl<S, T, C> Iterator for RunMerger<S, T, C>
where
    S: Read + Seek,
    T: FixedSizeRecord + Clone,
    C: Compare<T>,
{
    type Item = Result<T, SortError>;

    /// Returns the next record of the runs in ascending order.
    fn next(&mut self) -> Option<Self::Item> {
        if !self.initiated {
            self.initiated = true;
            for run in 0..self.chunks.len() {
                if let Err(err) = self.advance(run) {
                    return Some(Err(err));
                }
            }
        }

        if self.heads.is_empty() {
            return None;
        }
        let head = match self.heads.remove_min() {
            Ok(head) => head,
            Err(err) => return Some(Err(err.into())),
        };
        if let Err(err) = self.advance(head.run) {
            return Some(Err(err));
        }

        return Some(Ok(head.record));
    }
}
