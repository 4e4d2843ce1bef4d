//! Sorted run generation.

use std::cmp::Ordering;
use std::io;
use std::io::prelude::*;
use std::marker::PhantomData;
use std::ops::Range;

use log;

use crate::heap::{BoundedHeap, Compare};
use crate::record::{FixedSizeRecord, RecordWriter};
use crate::sort::SortError;

/// Single run of a run file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    /// Run index.
    pub index: usize,
    /// Offset of the first run record, in records.
    pub offset: u64,
    /// Number of records in the run.
    pub len: u64,
}

impl Run {
    /// Returns the run span in bytes for records of `record_size` bytes.
    pub fn byte_range(&self, record_size: usize) -> Range<u64> {
        let start = self.offset * record_size as u64;
        start..start + self.len * record_size as u64
    }
}

/// Partition of a run file into back-to-back runs of `run_len` records, the last one possibly shorter.
/// Run files have no markers, so the boundaries are recomputed from the total record count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLayout {
    records: u64,
    run_len: u64,
}

impl RunLayout {
    /// Creates a layout of `records` records split into runs of `run_len` records.
    /// Fails if the run length is zero.
    pub fn new(records: u64, run_len: usize) -> Result<Self, SortError> {
        if run_len == 0 {
            return Err(SortError::InvalidConfig("run length must be positive".to_string()));
        }
        return Ok(RunLayout {
            records,
            run_len: run_len as u64,
        });
    }

    /// Creates a layout for a run file of `byte_len` bytes.
    /// Fails if the length is not a whole number of records.
    pub fn from_byte_len(byte_len: u64, record_size: usize, run_len: usize) -> Result<Self, SortError> {
        if byte_len % record_size as u64 != 0 {
            return Err(SortError::MisalignedFile {
                path: None,
                len: byte_len,
                unit: record_size,
            });
        }
        return RunLayout::new(byte_len / record_size as u64, run_len);
    }

    /// Total number of records.
    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn run_len(&self) -> u64 {
        self.run_len
    }

    pub fn run_count(&self) -> usize {
        ((self.records + self.run_len - 1) / self.run_len) as usize
    }

    /// Returns the `index`-th run.
    pub fn run(&self, index: usize) -> Option<Run> {
        if index >= self.run_count() {
            return None;
        }
        let offset = index as u64 * self.run_len;

        Some(Run {
            index,
            offset,
            len: self.run_len.min(self.records - offset),
        })
    }

    pub fn runs(&self) -> impl Iterator<Item = Run> + '_ {
        (0..self.run_count()).filter_map(move |index| self.run(index))
    }
}

/// Replacement selection run generator with runs capped at the heap capacity.
///
/// Every run except the last holds exactly `run_len` records so that the merge phase can locate runs by
/// position alone. While a run is being emitted, each freshly read record that is greater than the last
/// emitted one still joins the current run through the heap; the others are deferred and seed the next run.
pub struct RunGenerator<T, C> {
    run_len: usize,
    order: C,

    item_type: PhantomData<T>,
}

impl<T, C> RunGenerator<T, C>
where
    T: FixedSizeRecord + Clone,
    C: Compare<T> + Clone,
{
    /// Creates a generator emitting runs of at most `run_len` records.
    /// Fails if the run length is zero.
    pub fn new(run_len: usize, order: C) -> Result<Self, SortError> {
        if run_len == 0 {
            return Err(SortError::InvalidConfig("run length must be positive".to_string()));
        }
        return Ok(RunGenerator {
            run_len,
            order,
            item_type: PhantomData,
        });
    }

    pub fn run_len(&self) -> usize {
        self.run_len
    }

    /// Reads the whole input once and writes sorted runs to the output back to back.
    /// Returns the layout of the written run file.
    ///
    /// # Arguments
    /// * `input` - Input record stream
    /// * `output` - Run file writer
    pub fn generate<I, W>(&self, input: I, output: W) -> Result<RunLayout, SortError>
    where
        I: IntoIterator<Item = io::Result<T>>,
        W: Write,
    {
        let mut input = input.into_iter();

        let mut initial = Vec::with_capacity(self.run_len);
        while initial.len() < self.run_len {
            match input.next() {
                Some(record) => initial.push(record?),
                None => break,
            }
        }
        let initial_len = initial.len();
        let mut heap = BoundedHeap::with_order(initial, initial_len, self.run_len, self.order.clone())?;

        let mut writer = RecordWriter::new(output);
        let mut deferred: Vec<T> = Vec::with_capacity(self.run_len);
        let mut runs = 0;

        // the heap holds exactly the records of the next run
        while !heap.is_empty() {
            let quota = heap.size();

            for _ in 0..quota {
                let next = input.next().transpose()?;

                let min = heap.remove_min()?;
                writer.write(&min)?;

                if let Some(next) = next {
                    if self.order.compare(&next, &min) == Ordering::Greater {
                        heap.insert(next)?;
                    } else {
                        deferred.push(next);
                    }
                }
            }

            log::debug!(
                "run {} written ({} records, {} deferred to the next run)",
                runs,
                quota,
                deferred.len()
            );

            for record in deferred.drain(..) {
                heap.insert(record)?;
            }
            runs += 1;
        }

        let records = writer.written();
        writer.finish()?;

        let layout = RunLayout::new(records, self.run_len)?;
        debug_assert_eq!(layout.run_count(), runs);
        log::info!("generated {} runs ({} records)", runs, records);

        return Ok(layout);
    }
}
