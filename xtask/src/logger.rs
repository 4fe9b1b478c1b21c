//! Host logger: routes the driver's `log` records to stderr.

use anyhow::{Result, anyhow};
use log::{LevelFilter, Metadata, Record};

static LOGGER: StderrLogger = StderrLogger;

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

pub fn init(max_level: LevelFilter) -> Result<()> {
    log::set_logger(&LOGGER).map_err(|e| anyhow!("failed to set logger: {e}"))?;
    log::set_max_level(max_level);
    Ok(())
}
