//! Sorting configuration.

/// Size of a single on-disk [`Record`](crate::Record) in bytes.
pub const RECORD_SIZE: usize = 16;
/// Size of a disk block in bytes.
pub const BLOCK_SIZE: usize = 8192;
/// Number of records stored in one block.
pub const RECORDS_PER_BLOCK: usize = BLOCK_SIZE / RECORD_SIZE;
/// Number of blocks the run generation heap is allowed to hold.
pub const HEAP_BLOCKS: usize = 8;

/// Block and memory budget configuration shared by the run generator, the run merger and the result sampler.
///
/// The default configuration is the production one: 8192 byte blocks and a heap of 8 blocks,
/// which gives runs of 4096 sixteen-byte records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortConfig {
    /// Block size in bytes.
    block_size: usize,
    /// Heap size in blocks.
    heap_blocks: usize,
    /// File read/write buffer size.
    rw_buf_size: Option<usize>,
}

impl SortConfig {
    /// Creates a configuration with the provided block size (in bytes) and heap size (in blocks).
    pub fn new(block_size: usize, heap_blocks: usize) -> Self {
        SortConfig {
            block_size,
            heap_blocks,
            rw_buf_size: None,
        }
    }

    /// Sets block size in bytes.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        return self;
    }

    /// Sets heap size in blocks.
    pub fn with_heap_blocks(mut self, heap_blocks: usize) -> Self {
        self.heap_blocks = heap_blocks;
        return self;
    }

    /// Sets file read/write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: usize) -> Self {
        self.rw_buf_size = Some(buf_size);
        return self;
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn heap_blocks(&self) -> usize {
        self.heap_blocks
    }

    pub fn rw_buf_size(&self) -> Option<usize> {
        self.rw_buf_size
    }

    /// Returns the number of records of `record_size` bytes that fit in one block.
    pub fn records_per_block(&self, record_size: usize) -> usize {
        self.block_size / record_size
    }

    /// Returns the run length (heap capacity) in records.
    pub fn run_len(&self, record_size: usize) -> usize {
        self.records_per_block(record_size) * self.heap_blocks
    }

    /// Checks that the configuration is usable for records of `record_size` bytes.
    pub fn validate(&self, record_size: usize) -> Result<(), String> {
        if record_size == 0 {
            return Err("record size must be positive".to_string());
        }
        if self.heap_blocks == 0 {
            return Err("heap must hold at least one block".to_string());
        }
        if self.block_size < record_size {
            return Err(format!(
                "block size {} is smaller than record size {}",
                self.block_size, record_size
            ));
        }
        if self.block_size % record_size != 0 {
            return Err(format!(
                "block size {} is not a multiple of record size {}",
                self.block_size, record_size
            ));
        }
        if self.records_per_block(record_size).checked_mul(self.heap_blocks).is_none() {
            return Err(format!(
                "heap of {} blocks of {} bytes overflows the run length",
                self.heap_blocks, self.block_size
            ));
        }
        if self.rw_buf_size == Some(0) {
            return Err("read/write buffer size must be positive".to_string());
        }

        return Ok(());
    }
}

impl Default for SortConfig {
    fn default() -> Self {
        SortConfig::new(BLOCK_SIZE, HEAP_BLOCKS)
    }
}
