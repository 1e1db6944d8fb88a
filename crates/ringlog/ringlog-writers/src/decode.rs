//! Decodes a raw ring-buffer record into the two logger-name renderings a
//! downstream [`crate::Writer`] picks from: a possibly ANSI-colored form for
//! terminal-style sinks, and a plain form for everything else.
//!
//! Mirrors the reference consumer sink's two logger-name formats bit for
//! bit: "process-oriented" (onep) naming pads the process name to four
//! characters and centers the module name in six, substituting the literal
//! `NULL` for an absent field; standard naming just falls back to
//! `"default"` when the logger name is empty.

use ringlog_core::{Level, RawRecord};

/// ANSI SGR for bright yellow, matching the WARN-level color so an absent
/// process/module name reads as a warning rather than blending in.
const WARN_COLOR: &str = "\x1b[1;33m";
const RESET_COLOR: &str = "\x1b[0m";

/// A record ready for dispatch to writers: payload decoded to UTF-8 (lossy,
/// since producers hand over raw bytes) and the logger name rendered both
/// ways so each writer can pick the one it wants without re-deriving it.
#[derive(Debug, Clone)]
pub struct DecodedRecord {
    pub timestamp_ns: u64,
    pub level: Level,
    pub pid: u32,
    pub thread_id: u64,
    /// May contain ANSI escapes around a substituted `NULL`; only
    /// color-capable writers should use this field.
    pub console_logger_name: String,
    /// Never contains ANSI escapes.
    pub file_logger_name: String,
    pub message: String,
}

fn pad_process_name(name: &str) -> (String, bool) {
    if name.is_empty() {
        return ("NULL".to_string(), true);
    }
    let truncated: String = name.chars().take(4).collect();
    (format!("{truncated:<4}"), false)
}

fn center_module_name(name: &str) -> (String, bool) {
    if name.is_empty() {
        let padded = center(&"NULL".to_string(), 6);
        return (padded, true);
    }
    let truncated: String = name.chars().take(6).collect();
    (center(&truncated, 6), false)
}

fn center(s: &str, width: usize) -> String {
    let len = s.chars().count();
    if len >= width {
        return s.to_string();
    }
    let total = width - len;
    let left = total / 2;
    let right = total - left;
    format!("{}{}{}", " ".repeat(left), s, " ".repeat(right))
}

fn colorize_if(is_null: bool, text: &str) -> String {
    if is_null {
        format!("{WARN_COLOR}{text}{RESET_COLOR}")
    } else {
        text.to_string()
    }
}

/// Applies the consumer's decode policy to a raw slot record.
///
/// `enable_onep_format` selects the process-oriented naming scheme;
/// `debug_format` (only meaningful with onep format on) controls whether
/// the *console* rendering also carries `pid`/`thread_id` — the file
/// rendering always carries them, matching the reference implementation.
pub fn decode(raw: &RawRecord, enable_onep_format: bool, debug_format: bool) -> DecodedRecord {
    let message = String::from_utf8_lossy(&raw.payload).into_owned();

    let (console_logger_name, file_logger_name) = if enable_onep_format {
        let (process, process_is_null) = pad_process_name(&raw.process_name);
        let (module, module_is_null) = center_module_name(&raw.module_name);
        let console_process = colorize_if(process_is_null, &process);
        let console_module = colorize_if(module_is_null, &module);

        let file_name = format!("{process}:{pid}] [{module}:{tid}", pid = raw.pid, tid = raw.thread_id);
        let console_name = if debug_format {
            format!(
                "{console_process}:{pid}] [{console_module}:{tid}",
                pid = raw.pid,
                tid = raw.thread_id
            )
        } else {
            format!("{console_process}] [{console_module}")
        };
        (console_name, file_name)
    } else {
        let name = if raw.logger_name.is_empty() {
            "default".to_string()
        } else {
            raw.logger_name.clone()
        };
        (name.clone(), name)
    };

    DecodedRecord {
        timestamp_ns: raw.timestamp_ns,
        level: raw.level,
        pid: raw.pid,
        thread_id: raw.thread_id,
        console_logger_name,
        file_logger_name,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringlog_core::Level;

    fn raw(process: &str, module: &str, logger: &str, payload: &str) -> RawRecord {
        RawRecord {
            level: Level::Info,
            timestamp_ns: 1,
            pid: 100,
            thread_id: 7,
            process_name: process.to_string(),
            module_name: module.to_string(),
            logger_name: logger.to_string(),
            payload: payload.as_bytes().to_vec(),
        }
    }

    #[test]
    fn standard_format_falls_back_to_default() {
        let r = decode(&raw("", "", "", "hi"), false, false);
        assert_eq!(r.console_logger_name, "default");
        assert_eq!(r.file_logger_name, "default");
    }

    #[test]
    fn standard_format_passes_logger_name_through() {
        let r = decode(&raw("", "", "core", "hi"), false, false);
        assert_eq!(r.console_logger_name, "core");
    }

    #[test]
    fn onep_format_pads_and_centers_names() {
        let r = decode(&raw("obsd", "engine", "", "hi"), true, true);
        assert!(r.file_logger_name.starts_with("obsd:100] [engine:7"));
    }

    #[test]
    fn onep_format_substitutes_null_and_colors_console_only() {
        let r = decode(&raw("", "", "", "hi"), true, true);
        assert!(r.file_logger_name.starts_with("NULL:100] [ NULL :7"));
        assert!(r.console_logger_name.contains(WARN_COLOR));
        assert!(r.console_logger_name.contains("NULL"));
        assert!(!r.file_logger_name.contains(WARN_COLOR));
    }

    #[test]
    fn onep_release_format_omits_pid_and_tid_on_console_only() {
        let r = decode(&raw("obsd", "engine", "", "hi"), true, false);
        assert!(!r.console_logger_name.contains("100"));
        assert!(r.file_logger_name.contains("100"));
    }
}
