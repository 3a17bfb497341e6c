//! Logger setup
//!
//! Console output follows `-v` and `RUST_LOG`. Every run is also appended
//! at debug level to a log file (`~/.config/pflash/log.txt` unless
//! `--log-file` says otherwise), whatever the console shows.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use env_logger::{Builder, Env, Logger, Target};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use pflash_core::ConfigStore;

/// Console logger plus an optional file logger
struct TeeLogger {
    console: Logger,
    file: Option<Logger>,
}

impl TeeLogger {
    fn new(verbose: u8, file: Option<File>) -> Self {
        let (console_level, file_level) = match verbose {
            0 => ("info", LevelFilter::Debug),
            1 => ("debug", LevelFilter::Debug),
            _ => ("trace", LevelFilter::Trace),
        };
        let console = Builder::from_env(Env::default().default_filter_or(console_level)).build();
        let file = file.map(|file| {
            Builder::new()
                .filter_level(file_level)
                .target(Target::Pipe(Box::new(file)))
                .build()
        });
        Self { console, file }
    }

    fn max_level(&self) -> LevelFilter {
        let file = self.file.as_ref().map_or(LevelFilter::Off, Logger::filter);
        self.console.filter().max(file)
    }
}

impl Log for TeeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console.enabled(metadata) || self.file.as_ref().is_some_and(|f| f.enabled(metadata))
    }

    fn log(&self, record: &Record) {
        self.console.log(record);
        if let Some(file) = &self.file {
            file.log(record);
        }
    }

    fn flush(&self) {
        self.console.flush();
        if let Some(file) = &self.file {
            file.flush();
        }
    }
}

/// `~/.config/pflash/log.txt`
fn default_log_file() -> Option<PathBuf> {
    ConfigStore::user_dir().map(|dir| dir.join("log.txt"))
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the process logger
///
/// A log file that cannot be opened is reported on the console and skipped.
pub fn init(verbose: u8, log_file: Option<&Path>) -> Result<(), SetLoggerError> {
    let path = log_file.map(Path::to_path_buf).or_else(default_log_file);
    let (file, file_error) = match &path {
        Some(path) => match open_log_file(path) {
            Ok(file) => (Some(file), None),
            Err(e) => (None, Some(e)),
        },
        None => (None, None),
    };

    let logger = TeeLogger::new(verbose, file);
    log::set_max_level(logger.max_level());
    log::set_boxed_logger(Box::new(logger))?;

    if let (Some(path), Some(e)) = (&path, file_error) {
        log::warn!("Cannot write log file {}: {}", path.display(), e);
    }
    Ok(())
}
