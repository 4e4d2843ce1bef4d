use std::fs;
use std::io::{self, prelude::*};
use std::path;
use std::process;

use clap::ValueEnum;
use env_logger;
use log;

use ext_record_sort::{
    run_file_path, sorted_file_path, ExternalSorter, ExternalSorterBuilder, Record, ResultSampler,
};

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let input = path::Path::new(arg_parser.value_of("input").expect("value is required"));
    let run_file = run_file_path(input);
    let output = sorted_file_path(input);

    let sorter: ExternalSorter<Record> = match ExternalSorterBuilder::new().build() {
        Ok(sorter) => sorter,
        Err(err) => {
            log::error!("sorter initialization error: {}", err);
            process::exit(1);
        }
    };

    if let Err(err) = sorter.sort_file_with_run_file(input, &run_file, &output) {
        log::error!("data sorting error: {}", err);
        process::exit(1);
    }

    let sorted_stream = match fs::File::open(&output) {
        Ok(file) => io::BufReader::new(file),
        Err(err) => {
            log::error!("sorted file opening error: {}", err);
            process::exit(1);
        }
    };

    let sampled = ResultSampler::new(sorter.config().block_size()).and_then(|sampler| sampler.sample(sorted_stream));
    let digest = match sampled {
        Ok(digest) => digest,
        Err(err) => {
            log::error!("sorted file sampling error: {}", err);
            process::exit(1);
        }
    };

    let mut stdout = io::stdout().lock();
    if let Err(err) = write!(stdout, "{}", digest).and_then(|_| stdout.flush()) {
        log::error!("digest printing error: {}", err);
        process::exit(1);
    }
}

#[derive(Copy, Clone, clap::ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ValueEnum>::from_str(s, false)
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::Command::new("ext-record-sort")
        .about("external sorter of 16-byte binary records")
        .arg(
            clap::Arg::new("input")
                .help("file to be sorted")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}
