//! Sorted file sampling.

use std::fmt;
use std::fmt::Display;
use std::io::prelude::*;

use log;

use crate::record::{read_up_to, FixedSizeRecord, Record};
use crate::sort::SortError;

/// Number of digest entries printed per line.
pub const ENTRIES_PER_LINE: usize = 5;

/// Formats a key in scientific notation without an explicit `+` on the exponent, e.g. `1.5E0` or `1E-3`.
pub fn format_key(key: f64) -> String {
    format!("{:E}", key)
}

/// First records of every block of a sorted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    samples: Vec<Record>,
}

impl Digest {
    pub fn new(samples: Vec<Record>) -> Self {
        Digest { samples }
    }

    pub fn samples(&self) -> &[Record] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Renders `id key` pairs, [`ENTRIES_PER_LINE`] per line.
impl Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.samples.chunks(ENTRIES_PER_LINE) {
            let entries = Vec::from_iter(
                line.iter()
                    .map(|record| format!("{} {}", record.id(), format_key(record.key()))),
            );
            writeln!(f, "{}", entries.join(" "))?;
        }
        return Ok(());
    }
}

/// Reads a sorted file block by block and keeps the first record of every full block.
pub struct ResultSampler {
    block_size: usize,
}

impl ResultSampler {
    /// Creates a sampler reading blocks of `block_size` bytes.
    /// Fails if a block cannot hold a single record.
    pub fn new(block_size: usize) -> Result<Self, SortError> {
        if block_size < Record::SIZE {
            return Err(SortError::InvalidConfig(format!(
                "block size {} is smaller than record size {}",
                block_size,
                Record::SIZE
            )));
        }
        return Ok(ResultSampler { block_size });
    }

    /// Samples the sorted input. A trailing partial block is skipped.
    pub fn sample<R: Read>(&self, mut input: R) -> Result<Digest, SortError> {
        let mut block = vec![0; self.block_size];
        let mut samples = Vec::new();

        loop {
            let read = read_up_to(&mut input, &mut block)?;
            if read == 0 {
                break;
            }
            if read < self.block_size {
                log::warn!(
                    "trailing partial block of {} bytes (block size: {}) is not sampled",
                    read,
                    self.block_size
                );
                break;
            }
            samples.push(Record::decode(&block[..Record::SIZE]));
        }

        log::debug!("sampled {} blocks", samples.len());

        return Ok(Digest::new(samples));
    }
}
