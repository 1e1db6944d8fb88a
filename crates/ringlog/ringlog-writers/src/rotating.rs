//! Size-based rotating file sink: `name.log`, `name.1.log`, `name.2.log`,
//! …, up to `max_files`, shifted up by one and the oldest dropped each time
//! the active file would exceed `max_size`. A representative instance of
//! the `Writer` contract's rotation policy — date-based rotation is out of
//! scope (see `spec.md`'s Non-goals).

use crate::decode::DecodedRecord;
use crate::writer::Writer;
use ringlog_core::Level;
use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RotatingWriterError {
    #[error("failed to open log file '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

struct Inner {
    file: File,
    size: u64,
}

/// Writes plain (never colorized) lines to a rotating file. Internally
/// synchronized so it can be shared across the consumer's writer list and
/// a producer's fallback path without external locking.
pub struct RotatingFileWriter {
    base_path: PathBuf,
    max_size: u64,
    max_files: u32,
    threshold: Level,
    inner: Mutex<Inner>,
}

impl RotatingFileWriter {
    pub fn create(
        path: impl AsRef<Path>,
        max_size: u64,
        max_files: u32,
        threshold: Level,
    ) -> Result<Self, RotatingWriterError> {
        let base_path = path.as_ref().to_path_buf();
        if let Some(parent) = base_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&base_path)
            .map_err(|source| RotatingWriterError::Open {
                path: base_path.clone(),
                source,
            })?;
        let size = file.metadata().map(|m| m.len()).unwrap_or(0);
        Ok(Self {
            base_path,
            max_size: max_size.max(1),
            max_files: max_files.max(1),
            threshold,
            inner: Mutex::new(Inner { file, size }),
        })
    }

    /// `name.log` -> `name.log`; `name.log` at index 1.. -> `name.{index}.log`,
    /// matching the conventional rotating-sink naming scheme.
    fn numbered_path(&self, index: u32) -> PathBuf {
        if index == 0 {
            return self.base_path.clone();
        }
        let stem = self.base_path.file_stem().unwrap_or_default();
        let ext = self.base_path.extension();
        let mut name = stem.to_os_string();
        name.push(format!(".{index}"));
        if let Some(ext) = ext {
            name.push(".");
            name.push(ext);
        }
        self.base_path.with_file_name(name)
    }

    fn rotate(&self, inner: &mut Inner) {
        for i in (1..self.max_files).rev() {
            let src = self.numbered_path(i);
            let dst = self.numbered_path(i + 1);
            if src.exists() {
                if i + 1 >= self.max_files {
                    let _ = std::fs::remove_file(&src);
                } else {
                    let _ = std::fs::rename(&src, &dst);
                }
            }
        }
        let _ = std::fs::rename(&self.base_path, self.numbered_path(1));

        match OpenOptions::new().create(true).append(true).open(&self.base_path) {
            Ok(file) => {
                inner.file = file;
                inner.size = 0;
            }
            Err(e) => {
                // Best-effort, like every other file op in this writer:
                // the consumer's single drainer thread must keep running
                // even if rotation itself failed. Subsequent writes fall
                // through to the still-open (now renamed) handle.
                tracing::warn!(
                    error = %e,
                    path = %self.base_path.display(),
                    "failed to reopen log file after rotation"
                );
            }
        }
    }
}

impl Writer for RotatingFileWriter {
    fn threshold(&self) -> Level {
        self.threshold
    }

    fn write(&self, record: &DecodedRecord) {
        let line = format!(
            "[{level}] [{logger}] {msg}\n",
            level = record.level.as_str(),
            logger = record.file_logger_name,
            msg = record.message,
        );
        let mut inner = self.inner.lock().unwrap();
        if inner.size + line.len() as u64 > self.max_size && inner.size > 0 {
            self.rotate(&mut inner);
        }
        if inner.file.write_all(line.as_bytes()).is_ok() {
            inner.size += line.len() as u64;
        }
    }

    fn flush(&self) {
        let mut inner = self.inner.lock().unwrap();
        let _ = inner.file.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(message: &str) -> DecodedRecord {
        DecodedRecord {
            timestamp_ns: 0,
            level: Level::Info,
            pid: 1,
            thread_id: 1,
            console_logger_name: "core".to_string(),
            file_logger_name: "core".to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn writes_and_rotates_when_over_max_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let w = RotatingFileWriter::create(&path, 40, 3, Level::Trace).unwrap();

        for _ in 0..10 {
            w.write(&record("0123456789"));
        }
        w.flush();

        assert!(path.exists());
        assert!(dir.path().join("app.1.log").exists());
    }

    #[test]
    fn numbered_path_preserves_extension() {
        let w = RotatingFileWriter::create(
            tempfile::tempdir().unwrap().path().join("x.log"),
            1024,
            3,
            Level::Trace,
        )
        .unwrap();
        let p = w.numbered_path(2);
        assert_eq!(p.file_name().unwrap().to_str().unwrap(), "x.2.log");
    }
}
