//! Terminal sink: ANSI-colored by level, writing to stdout, serialized by
//! an internal mutex since multiple consumer-loop iterations never overlap
//! but a fallback producer path could in principle call in from another
//! thread.

use crate::decode::DecodedRecord;
use crate::writer::Writer;
use ringlog_core::Level;
use std::io::Write as _;
use std::sync::Mutex;

fn level_color(level: Level) -> &'static str {
    match level {
        Level::Trace => "\x1b[37m",      // white
        Level::Debug => "\x1b[36m",      // cyan
        Level::Info => "\x1b[32m",       // green
        Level::Warn => "\x1b[1;33m",     // bright yellow
        Level::Error => "\x1b[31m",      // red
        Level::Critical => "\x1b[1;41m", // white-on-red
    }
}

const RESET: &str = "\x1b[0m";

/// Writes colorized lines to stdout. `threshold` gates which records reach
/// it at all; `color` can be forced off (e.g. when stdout isn't a tty).
pub struct ConsoleWriter {
    threshold: Level,
    color: bool,
    lock: Mutex<()>,
}

impl ConsoleWriter {
    pub fn new(threshold: Level, color: bool) -> Self {
        Self {
            threshold,
            color,
            lock: Mutex::new(()),
        }
    }

    fn format_line(&self, record: &DecodedRecord) -> String {
        let level_str = record.level.as_str();
        if self.color {
            format!(
                "{color}[{level}]{reset} [{logger}] {msg}",
                color = level_color(record.level),
                level = level_str,
                reset = RESET,
                logger = record.console_logger_name,
                msg = record.message,
            )
        } else {
            format!(
                "[{level}] [{logger}] {msg}",
                level = level_str,
                logger = strip_ansi(&record.console_logger_name),
                msg = record.message,
            )
        }
    }
}

/// Removes `\x1b[...m` SGR sequences so a non-color console still gets the
/// plain `NULL` text rather than raw escape bytes.
fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            while let Some(&next) = chars.peek() {
                chars.next();
                if next == 'm' {
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

impl Writer for ConsoleWriter {
    fn threshold(&self) -> Level {
        self.threshold
    }

    fn write(&self, record: &DecodedRecord) {
        let _guard = self.lock.lock().unwrap();
        println!("{}", self.format_line(record));
    }

    fn flush(&self) {
        let _guard = self.lock.lock().unwrap();
        let _ = std::io::stdout().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(level: Level) -> DecodedRecord {
        DecodedRecord {
            timestamp_ns: 0,
            level,
            pid: 1,
            thread_id: 1,
            console_logger_name: "core".to_string(),
            file_logger_name: "core".to_string(),
            message: "hello".to_string(),
        }
    }

    #[test]
    fn strips_ansi_when_color_disabled() {
        let w = ConsoleWriter::new(Level::Trace, false);
        let line = w.format_line(&DecodedRecord {
            console_logger_name: format!("{}NULL{}", "\x1b[1;33m", "\x1b[0m"),
            ..record(Level::Warn)
        });
        assert!(line.contains("NULL"));
        assert!(!line.contains('\x1b'));
    }

    #[test]
    fn includes_escape_codes_when_color_enabled() {
        let w = ConsoleWriter::new(Level::Trace, true);
        let line = w.format_line(&record(Level::Error));
        assert!(line.contains('\x1b'));
    }
}
