//! External sorter.

use std::error::Error;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fmt::Display;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use bytesize::ByteSize;
use log;

use crate::config::SortConfig;
use crate::heap::{Compare, HeapError};
use crate::merger::RunMerger;
use crate::record::{FixedSizeRecord, Record, RecordReader};
use crate::run::{RunGenerator, RunLayout};

/// Run file name suffix appended to the input path.
pub const RUN_FILE_SUFFIX: &str = "_runfile.dat";
/// Sorted file name suffix replacing the input file extension.
pub const SORTED_FILE_SUFFIX: &str = "_sorted.bin";

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Common I/O error.
    IO(io::Error),
    /// Heap contract violation.
    Heap(HeapError),
    /// File length is not a multiple of the record size.
    MisalignedFile {
        path: Option<PathBuf>,
        len: u64,
        unit: usize,
    },
    /// Unusable sorter configuration.
    InvalidConfig(String),
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::IO(err) => Some(err),
            SortError::Heap(err) => Some(err),
            SortError::MisalignedFile { .. } => None,
            SortError::InvalidConfig(_) => None,
        }
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::IO(err) => write!(f, "I/O operation failed: {}", err),
            SortError::Heap(err) => write!(f, "heap contract violated: {}", err),
            SortError::MisalignedFile {
                path: Some(path),
                len,
                unit,
            } => write!(
                f,
                "file {} length {} is not a multiple of {} bytes",
                path.display(),
                len,
                unit
            ),
            SortError::MisalignedFile { path: None, len, unit } => {
                write!(f, "file length {} is not a multiple of {} bytes", len, unit)
            }
            SortError::InvalidConfig(err) => write!(f, "invalid sorter configuration: {}", err),
        }
    }
}

impl From<io::Error> for SortError {
    fn from(err: io::Error) -> Self {
        SortError::IO(err)
    }
}

impl From<HeapError> for SortError {
    fn from(err: HeapError) -> Self {
        SortError::Heap(err)
    }
}

/// Returns the run file path for an input file: the input path followed by [`RUN_FILE_SUFFIX`].
pub fn run_file_path(input: &Path) -> PathBuf {
    let mut path = OsString::from(input.as_os_str());
    path.push(RUN_FILE_SUFFIX);
    PathBuf::from(path)
}

/// Returns the sorted file path for an input file: the input path without its last four characters
/// (a dot and a three letter extension) followed by [`SORTED_FILE_SUFFIX`].
/// Paths shorter than four characters lose nothing. Non-UTF-8 paths lose their last four bytes.
pub fn sorted_file_path(input: &Path) -> PathBuf {
    let mut path = match input.to_str() {
        Some(input) => match input.char_indices().rev().nth(3) {
            Some((idx, _)) => OsString::from(&input[..idx]),
            None => OsString::from(input),
        },
        None => strip_extension_bytes(input.as_os_str()),
    };
    path.push(SORTED_FILE_SUFFIX);
    PathBuf::from(path)
}

#[cfg(unix)]
fn strip_extension_bytes(input: &OsStr) -> OsString {
    use std::os::unix::ffi::OsStrExt;

    let bytes = input.as_bytes();
    let end = if bytes.len() < 4 { bytes.len() } else { bytes.len() - 4 };
    OsStr::from_bytes(&bytes[..end]).to_os_string()
}

#[cfg(not(unix))]
fn strip_extension_bytes(input: &OsStr) -> OsString {
    let input = input.to_string_lossy();
    match input.char_indices().rev().nth(3) {
        Some((idx, _)) => OsString::from(&input[..idx]),
        None => OsString::from(&input[..]),
    }
}

/// Sorting outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSummary {
    /// Number of sorted records.
    pub records: u64,
    /// Number of generated runs.
    pub runs: usize,
    /// Sorted file path.
    pub output: PathBuf,
}

/// External sorter builder. Provides methods for [`ExternalSorter`] initialization.
#[derive(Clone)]
pub struct ExternalSorterBuilder<T: FixedSizeRecord> {
    /// Block and heap configuration.
    config: SortConfig,
    /// Directory to be used to store the run file.
    tmp_dir: Option<Box<Path>>,

    /// Record type.
    item_type: PhantomData<T>,
}

impl<T: FixedSizeRecord + Clone> ExternalSorterBuilder<T> {
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        ExternalSorterBuilder::default()
    }

    /// Builds an [`ExternalSorter`] instance using provided configuration.
    pub fn build(self) -> Result<ExternalSorter<T>, SortError> {
        ExternalSorter::new(self.config, self.tmp_dir.as_deref())
    }

    /// Sets block and heap configuration.
    pub fn with_config(mut self, config: SortConfig) -> ExternalSorterBuilder<T> {
        self.config = config;
        return self;
    }

    /// Sets directory to be used to store the run file.
    /// Without it the run file is placed next to the input file, see [`run_file_path`].
    pub fn with_tmp_dir(mut self, path: &Path) -> ExternalSorterBuilder<T> {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Sets file read/write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: usize) -> ExternalSorterBuilder<T> {
        self.config = self.config.with_rw_buf_size(buf_size);
        return self;
    }
}

impl<T: FixedSizeRecord> Default for ExternalSorterBuilder<T> {
    fn default() -> Self {
        ExternalSorterBuilder {
            config: SortConfig::default(),
            tmp_dir: None,
            item_type: PhantomData,
        }
    }
}

/// External sorter of fixed-size record files.
///
/// Sorting is done in two passes: replacement selection writes runs of at most the heap capacity into a
/// single run file, then the runs are merged into the output file.
pub struct ExternalSorter<T: FixedSizeRecord> {
    /// Block and heap configuration.
    config: SortConfig,
    /// Directory to be used to store the run file.
    tmp_dir: Option<PathBuf>,

    /// Record type.
    item_type: PhantomData<T>,
}

impl<T: FixedSizeRecord + Clone> ExternalSorter<T> {
    /// Creates a new external sorter instance.
    ///
    /// # Arguments
    /// * `config` - Block and heap configuration
    /// * `tmp_dir` - Directory to be used to store run files. If the parameter is [`None`] run files are
    ///   created next to the input files.
    pub fn new(config: SortConfig, tmp_dir: Option<&Path>) -> Result<Self, SortError> {
        config.validate(T::SIZE).map_err(SortError::InvalidConfig)?;

        log::info!(
            "sorter initialized (block: {}, run length: {} records)",
            ByteSize(config.block_size() as u64),
            config.run_len(T::SIZE)
        );

        return Ok(ExternalSorter {
            config,
            tmp_dir: tmp_dir.map(Path::to_path_buf),
            item_type: PhantomData,
        });
    }

    pub fn config(&self) -> &SortConfig {
        &self.config
    }

    /// Writes sorted runs of the input into `runs`. Returns the run file layout.
    ///
    /// # Arguments
    /// * `input` - Input record stream
    /// * `runs` - Run file writer
    /// * `compare` - Record order
    pub fn generate_runs<I, W, C>(&self, input: I, runs: W, compare: C) -> Result<RunLayout, SortError>
    where
        I: IntoIterator<Item = io::Result<T>>,
        W: Write,
        C: Compare<T> + Clone,
    {
        RunGenerator::new(self.config.run_len(T::SIZE), compare)?.generate(input, runs)
    }

    /// Merges the runs of `runs` into `output`. Returns the number of written records.
    ///
    /// # Arguments
    /// * `runs` - Run file
    /// * `layout` - Run file layout
    /// * `output` - Sorted output writer
    /// * `compare` - Record order, the same the runs were generated with
    pub fn merge_runs<S, W, C>(&self, runs: S, layout: &RunLayout, output: W, compare: C) -> Result<u64, SortError>
    where
        S: Read + Seek,
        W: Write,
        C: Compare<T>,
    {
        let block_records = self.config.records_per_block(T::SIZE);
        RunMerger::new(runs, layout, block_records, compare).write_to(output)
    }

    /// Sorts the `input` file into the `output` file using a custom compare function.
    /// The run file is created in the temporary directory if one is configured, otherwise next to the input.
    pub fn sort_file_by<C>(&self, input: &Path, output: &Path, compare: C) -> Result<SortSummary, SortError>
    where
        C: Compare<T> + Clone,
    {
        match &self.tmp_dir {
            Some(tmp_dir) => {
                let run_file = tempfile::Builder::new()
                    .prefix("runs-")
                    .suffix(".dat")
                    .tempfile_in(tmp_dir)?;
                log::info!("using {} as a run file", run_file.path().display());

                // the run file is removed when dropped
                self.sort_file_with_run_file_by(input, run_file.path(), output, compare)
            }
            None => self.sort_file_with_run_file_by(input, &run_file_path(input), output, compare),
        }
    }

    /// Sorts the `input` file into the `output` file through the `run_file` using a custom compare function.
    /// The run file is kept after sorting.
    pub fn sort_file_with_run_file_by<C>(
        &self,
        input: &Path,
        run_file: &Path,
        output: &Path,
        compare: C,
    ) -> Result<SortSummary, SortError>
    where
        C: Compare<T> + Clone,
    {
        let input_file = fs::File::open(input)?;
        let input_len = input_file.metadata()?.len();
        if input_len % T::SIZE as u64 != 0 {
            return Err(SortError::MisalignedFile {
                path: Some(input.to_path_buf()),
                len: input_len,
                unit: T::SIZE,
            });
        }
        log::info!("sorting {} ({})", input.display(), ByteSize(input_len));

        let generated = {
            let runs = fs::OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(run_file)?;
            let reader = RecordReader::new(self.buf_reader(input_file));
            self.generate_runs(reader, self.buf_writer(runs), compare.clone())?
        };

        let merged = self.merge_run_file_by(run_file, output, compare)?;
        debug_assert_eq!(merged, generated);

        log::info!("{} records sorted into {}", merged.records(), output.display());

        return Ok(SortSummary {
            records: merged.records(),
            runs: merged.run_count(),
            output: output.to_path_buf(),
        });
    }

    /// Merges the runs of the `run_file` into the `output` file using a custom compare function.
    /// Run boundaries are recomputed from the run file length and the configured run length.
    /// Returns the run file layout.
    pub fn merge_run_file_by<C>(&self, run_file: &Path, output: &Path, compare: C) -> Result<RunLayout, SortError>
    where
        C: Compare<T>,
    {
        let runs = fs::File::open(run_file)?;
        let runs_len = runs.metadata()?.len();
        let layout = match RunLayout::from_byte_len(runs_len, T::SIZE, self.config.run_len(T::SIZE)) {
            Ok(layout) => layout,
            Err(SortError::MisalignedFile { len, unit, .. }) => {
                return Err(SortError::MisalignedFile {
                    path: Some(run_file.to_path_buf()),
                    len,
                    unit,
                })
            }
            Err(err) => return Err(err),
        };
        log::debug!("merging {} ({})", run_file.display(), ByteSize(runs_len));

        let output = self.buf_writer(fs::File::create(output)?);
        let records = self.merge_runs(self.buf_reader(runs), &layout, output, compare)?;
        debug_assert_eq!(records, layout.records());

        return Ok(layout);
    }

    fn buf_reader(&self, file: fs::File) -> io::BufReader<fs::File> {
        match self.config.rw_buf_size() {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, file),
            None => io::BufReader::with_capacity(self.config.block_size(), file),
        }
    }

    fn buf_writer(&self, file: fs::File) -> io::BufWriter<fs::File> {
        match self.config.rw_buf_size() {
            Some(buf_size) => io::BufWriter::with_capacity(buf_size, file),
            None => io::BufWriter::with_capacity(self.config.block_size(), file),
        }
    }
}

impl ExternalSorter<Record> {
    /// Sorts the `input` file into the `output` file by the record key bit patterns.
    pub fn sort_file(&self, input: &Path, output: &Path) -> Result<SortSummary, SortError> {
        self.sort_file_by(input, output, Record::compare)
    }

    /// Sorts the `input` file into the `output` file through the `run_file` by the record key bit patterns.
    pub fn sort_file_with_run_file(
        &self,
        input: &Path,
        run_file: &Path,
        output: &Path,
    ) -> Result<SortSummary, SortError> {
        self.sort_file_with_run_file_by(input, run_file, output, Record::compare)
    }

    /// Merges the runs of the `run_file` into the `output` file by the record key bit patterns.
    pub fn merge_run_file(&self, run_file: &Path, output: &Path) -> Result<RunLayout, SortError> {
        self.merge_run_file_by(run_file, output, Record::compare)
    }
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::io::{self, Cursor};
    use std::path::Path;

    use rand::seq::SliceRandom;
    use rstest::*;

    use super::{run_file_path, sorted_file_path, ExternalSorter, ExternalSorterBuilder, SortError};
    use crate::config::SortConfig;
    use crate::record::{FixedSizeRecord, Record, RecordReader, RecordWriter};

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir_in("./").unwrap()
    }

    fn small_sorter() -> ExternalSorter<Record> {
        ExternalSorterBuilder::new()
            .with_config(SortConfig::new(32, 2))
            .build()
            .unwrap()
    }

    fn write_records(path: &Path, records: &[Record]) {
        let mut writer = RecordWriter::new(fs::File::create(path).unwrap());
        for record in records {
            writer.write(record).unwrap();
        }
        writer.finish().unwrap();
    }

    fn read_records(path: &Path) -> Vec<Record> {
        let records: Result<Vec<Record>, io::Error> = RecordReader::new(fs::File::open(path).unwrap()).collect();
        records.unwrap()
    }

    #[rstest]
    #[case("data/input.bin", "data/input.bin_runfile.dat", "data/input_sorted.bin")]
    #[case("sample.dat", "sample.dat_runfile.dat", "sample_sorted.bin")]
    #[case("ab", "ab_runfile.dat", "ab_sorted.bin")]
    #[case("abc", "abc_runfile.dat", "abc_sorted.bin")]
    #[case("abcd", "abcd_runfile.dat", "_sorted.bin")]
    #[case("naïve.bin", "naïve.bin_runfile.dat", "naïve_sorted.bin")]
    #[case("data/ab.bïn", "data/ab.bïn_runfile.dat", "data/ab_sorted.bin")]
    fn test_derived_paths(#[case] input: &str, #[case] run_file: &str, #[case] sorted_file: &str) {
        assert_eq!(run_file_path(Path::new(input)), Path::new(run_file));
        assert_eq!(sorted_file_path(Path::new(input)), Path::new(sorted_file));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_sorted_path() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let input = Path::new(OsStr::from_bytes(b"in\xffput.bin"));
        let expected = Path::new(OsStr::from_bytes(b"in\xffput_sorted.bin"));
        assert_eq!(sorted_file_path(input), expected);
    }

    #[rstest]
    #[case(SortConfig::new(24, 2))]
    #[case(SortConfig::new(Record::SIZE * (usize::MAX / Record::SIZE), 2))]
    fn test_invalid_config(#[case] config: SortConfig) {
        let result: Result<ExternalSorter<Record>, _> = ExternalSorterBuilder::new().with_config(config).build();

        assert!(matches!(result, Err(SortError::InvalidConfig(_))));
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn test_external_sorter(#[case] reversed: bool) {
        let mut input = Vec::from_iter((0..100).map(|id| Record::new(id, id as f64)));
        input.shuffle(&mut rand::thread_rng());

        let sorter = small_sorter();
        let compare = if reversed {
            |a: &Record, b: &Record| a.compare(b).reverse()
        } else {
            |a: &Record, b: &Record| a.compare(b)
        };

        let mut runs: Vec<u8> = Vec::new();
        let layout = sorter
            .generate_runs(input.iter().map(|record| Ok(*record)), &mut runs, compare)
            .unwrap();
        assert_eq!(layout.run_count(), 25);

        let mut output: Vec<u8> = Vec::new();
        let written = sorter
            .merge_runs(Cursor::new(runs), &layout, &mut output, compare)
            .unwrap();
        assert_eq!(written, 100);

        let ids = Vec::from_iter(output.chunks_exact(Record::SIZE).map(|buf| Record::decode(buf).id()));
        let expected = if reversed {
            Vec::from_iter((0..100).rev())
        } else {
            Vec::from_iter(0..100)
        };
        assert_eq!(ids, expected);
    }

    #[rstest]
    fn test_sort_file(tmp_dir: tempfile::TempDir) {
        let input_path = tmp_dir.path().join("input.bin");
        let mut input = Vec::from_iter((0..37).map(|id| Record::new(id, (id * 3 % 37) as f64)));
        input.shuffle(&mut rand::thread_rng());
        write_records(&input_path, &input);

        let output_path = sorted_file_path(&input_path);
        let summary = small_sorter().sort_file(&input_path, &output_path).unwrap();

        assert_eq!(summary.records, 37);
        assert_eq!(summary.runs, 10);
        assert_eq!(summary.output, output_path);
        assert!(run_file_path(&input_path).exists());

        let keys = Vec::from_iter(read_records(&output_path).iter().map(Record::key));
        assert_eq!(keys, Vec::from_iter((0..37).map(|key| key as f64)));
    }

    #[rstest]
    fn test_sort_file_in_tmp_dir(tmp_dir: tempfile::TempDir) {
        let input_path = tmp_dir.path().join("input.bin");
        write_records(&input_path, &[Record::new(0, 2.0), Record::new(1, 1.0)]);
        let runs_dir = tmp_dir.path().join("runs");
        fs::create_dir(&runs_dir).unwrap();

        let sorter: ExternalSorter<Record> = ExternalSorterBuilder::new()
            .with_config(SortConfig::new(32, 2))
            .with_tmp_dir(&runs_dir)
            .with_rw_buf_size(64)
            .build()
            .unwrap();
        let output_path = tmp_dir.path().join("output.bin");
        sorter.sort_file(&input_path, &output_path).unwrap();

        assert!(!run_file_path(&input_path).exists());
        assert_eq!(fs::read_dir(&runs_dir).unwrap().count(), 0);
        assert_eq!(read_records(&output_path), vec![Record::new(1, 1.0), Record::new(0, 2.0)]);
    }

    #[rstest]
    fn test_misaligned_input(tmp_dir: tempfile::TempDir) {
        let input_path = tmp_dir.path().join("input.bin");
        fs::write(&input_path, [0u8; 20]).unwrap();

        let result = small_sorter().sort_file(&input_path, &tmp_dir.path().join("output.bin"));
        assert!(matches!(
            result,
            Err(SortError::MisalignedFile { len: 20, unit: 16, .. })
        ));
    }

    #[rstest]
    fn test_merge_run_file(tmp_dir: tempfile::TempDir) {
        // three runs of at most four records, the last one shorter
        let run_path = tmp_dir.path().join("input.bin_runfile.dat");
        let keys = [1.0, 3.0, 5.0, 7.0, 0.0, 2.0, 4.0, 6.0, 3.0];
        write_records(
            &run_path,
            &Vec::from_iter(keys.iter().enumerate().map(|(id, key)| Record::new(id as i64, *key))),
        );

        let output_path = tmp_dir.path().join("output.bin");
        let layout = small_sorter().merge_run_file(&run_path, &output_path).unwrap();

        assert_eq!(layout.records(), 9);
        assert_eq!(layout.run_count(), 3);
        let ids = Vec::from_iter(read_records(&output_path).iter().map(Record::id));
        assert_eq!(ids, vec![4, 0, 5, 1, 8, 6, 2, 7, 3]);
    }

    #[rstest]
    fn test_misaligned_run_file(tmp_dir: tempfile::TempDir) {
        let run_path = tmp_dir.path().join("input.bin_runfile.dat");
        fs::write(&run_path, [0u8; 40]).unwrap();

        let result = small_sorter().merge_run_file(&run_path, &tmp_dir.path().join("output.bin"));
        match result {
            Err(SortError::MisalignedFile { path, len, unit }) => {
                assert_eq!(path, Some(run_path));
                assert_eq!(len, 40);
                assert_eq!(unit, 16);
            }
            _ => panic!("misaligned run file accepted"),
        }
    }

    #[rstest]
    fn test_missing_input(tmp_dir: tempfile::TempDir) {
        let result = small_sorter().sort_file(&tmp_dir.path().join("missing.bin"), &tmp_dir.path().join("out.bin"));
        assert!(matches!(result, Err(SortError::IO(_))));
    }
}
