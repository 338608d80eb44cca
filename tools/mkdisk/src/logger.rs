use std::fmt;
use std::io::{self, Write};

use crossterm::tty::IsTty;
use log::{Level, LevelFilter, Log, Metadata, Record};

/// Writes each record to stderr behind an 8-column tag, colored when stderr
/// is a terminal.
pub struct TaggedLogger;

static LOGGER: TaggedLogger = TaggedLogger;

pub fn init(level: LevelFilter) -> anyhow::Result<()> {
    log::set_logger(&LOGGER)
        .map(|()| log::set_max_level(level))
        .map_err(|err| anyhow::anyhow!("{}", err))
}

fn tag_for(level: Level) -> (&'static str, u8) {
    match level {
        Level::Error => ("ERROR", 31),
        Level::Warn => ("WARN", 33),
        Level::Info => ("MKDISK", 32),
        Level::Debug => ("DEBUG", 36),
        Level::Trace => ("TRACE", 90),
    }
}

fn format_line(tag: &str, color: u8, args: &fmt::Arguments, colored: bool) -> String {
    if colored {
        format!("\x1b[{}m{:8}\x1b[0m: {}", color, tag, args)
    } else {
        format!("{:8}: {}", tag, args)
    }
}

impl Log for TaggedLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let (tag, color) = tag_for(record.level());
        let stderr = io::stderr();
        let line = format_line(tag, color, record.args(), stderr.is_tty());
        let _ = writeln!(stderr.lock(), "{}", line);
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}
