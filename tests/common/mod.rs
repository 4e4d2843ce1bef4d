use std::fs;
use std::io;
use std::path::Path;

use ext_record_sort::{Record, RecordReader, RecordWriter};

pub fn tmp_dir() -> tempfile::TempDir {
    tempfile::tempdir().unwrap()
}

pub fn write_records(path: &Path, records: &[Record]) {
    let mut writer = RecordWriter::new(io::BufWriter::new(fs::File::create(path).unwrap()));
    for record in records {
        writer.write(record).unwrap();
    }
    writer.finish().unwrap();
}

pub fn read_records(path: &Path) -> Vec<Record> {
    let records: Result<Vec<Record>, io::Error> =
        RecordReader::new(io::BufReader::new(fs::File::open(path).unwrap())).collect();
    records.unwrap()
}

#[allow(dead_code)]
pub fn assert_sorted(records: &[Record]) {
    for (idx, pair) in records.windows(2).enumerate() {
        assert!(
            pair[0].sort_key() <= pair[1].sort_key(),
            "records {} and {} are out of order: {:?} {:?}",
            idx,
            idx + 1,
            pair[0],
            pair[1]
        );
    }
}

#[allow(dead_code)]
pub fn sorted_pairs(records: &[Record]) -> Vec<(i64, u64)> {
    let mut pairs = Vec::from_iter(records.iter().map(|record| (record.id(), record.sort_key())));
    pairs.sort();
    pairs
}
