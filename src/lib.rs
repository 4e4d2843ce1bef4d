//! `ext-record-sort` is an external sort of files of fixed-size binary records.
//!
//! External sorting is required when the data being sorted do not fit into the main memory (RAM) of a computer
//! and instead must reside in slower external memory, usually a hard disk drive. Sorting is achieved in two
//! passes. During the first pass replacement selection produces sorted runs bounded by the memory budget,
//! during the second pass the runs are merged together. For more information see
//! [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Overview
//!
//! * **Record format:**
//!   a [`Record`] is 16 bytes: a big-endian signed 64-bit identifier and a big-endian IEEE-754 64-bit key.
//!   Records are ordered by the bit pattern of the key taken as an unsigned integer, which is not the numeric
//!   order for negative keys. Other fixed-size record types can be sorted by implementing [`FixedSizeRecord`].
//! * **Bounded memory:**
//!   the run generation heap holds [`HEAP_BLOCKS`] blocks of [`BLOCK_SIZE`] bytes, so every run but the last
//!   one holds exactly 4096 records. The merge phase relies on this to find run boundaries without any
//!   on-disk markers.
//! * **Sequential access:**
//!   the input is read once, the run file is written once and read back block by block per run.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use ext_record_sort::{sorted_file_path, ExternalSorter, ExternalSorterBuilder, Record, ResultSampler, BLOCK_SIZE};
//!
//! let input = Path::new("input.bin");
//! let output = sorted_file_path(input);
//!
//! let sorter: ExternalSorter<Record> = ExternalSorterBuilder::new().build().unwrap();
//! sorter.sort_file(input, &output).unwrap();
//!
//! let digest = ResultSampler::new(BLOCK_SIZE)
//!     .unwrap()
//!     .sample(std::fs::File::open(&output).unwrap())
//!     .unwrap();
//! print!("{}", digest);
//! ```

pub mod chunk;
pub mod config;
pub mod heap;
pub mod merger;
pub mod record;
pub mod run;
pub mod sampler;
pub mod sort;

pub use chunk::RunChunk;
pub use config::{SortConfig, BLOCK_SIZE, HEAP_BLOCKS, RECORDS_PER_BLOCK, RECORD_SIZE};
pub use heap::{BoundedHeap, Compare, HeapError, NaturalOrder};
pub use merger::RunMerger;
pub use record::{FixedSizeRecord, Record, RecordReader, RecordWriter};
pub use run::{Run, RunGenerator, RunLayout};
pub use sampler::{format_key, Digest, ResultSampler};
pub use sort::{run_file_path, sorted_file_path, ExternalSorter, ExternalSorterBuilder, SortError, SortSummary};
