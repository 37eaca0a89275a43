//! Kernel Logger
//!
//! Backend for the `log` facade. Records are formatted as
//! `[LEVEL] target: message` and written to the console collaborator.
//!
//! Until `init` runs, records are dropped.

use log::{Level, LevelFilter, Log, Metadata, Record};
use spin::Once;

use crate::cprintln;
use crate::drivers::Console;

/// Global logger instance.
static LOGGER: KernelLogger = KernelLogger {
    console: Once::new(),
};

struct KernelLogger {
    console: Once<&'static (dyn Console + Sync)>,
}

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(console) = self.console.get() {
            cprintln!(
                *console,
                "[{}] {}: {}",
                level_tag(record.level()),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARN",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

/// Install the logger, sending output to `console`.
///
/// Only the first call has any effect.
pub fn init(console: &'static (dyn Console + Sync), level: LevelFilter) {
    LOGGER.console.call_once(|| console);
    // A second registration fails harmlessly; the first console stays.
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}
