use crate::AppError;
use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record};
use std::str::FromStr;

/// Prints `[timestamp] LEVEL message` lines to stdout.
pub struct KvLogger {
    level: LevelFilter,
}

impl KvLogger {
    pub fn new(level: LevelFilter) -> Self {
        Self { level }
    }

    pub fn format_line(level: log::Level, args: &std::fmt::Arguments) -> String {
        let now = Local::now();
        format!("[{}] {} {}", now.format("%Y-%m-%d %H:%M:%S"), level, args)
    }
}

impl Log for KvLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!("{}", Self::format_line(record.level(), record.args()));
        }
    }

    fn flush(&self) {}
}

/// Installs the logger process-wide. Fails if a logger is already installed.
pub fn init(level: LevelFilter) -> Result<(), AppError> {
    log::set_boxed_logger(Box::new(KvLogger::new(level)))?;
    log::set_max_level(level);
    Ok(())
}

pub fn init_from_str(level: &str) -> Result<(), AppError> {
    let filter = LevelFilter::from_str(level).map_err(|_| AppError::invalid(format!("unknown log level {}", level)))?;
    init(filter)
}
