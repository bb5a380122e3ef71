//! JSONL activity log: append-only line-delimited JSON, one object per event.
//!
//! Each line is assembled in memory and written with a single `write_all` so
//! a tailing reader never sees a partial line.
//!
//! Three-level fallback chain:
//! 1. Configured file path
//! 2. stderr with `[AOPT-JSONL]` prefix
//! 3. Silent discard (a logging failure never aborts an optimization run)

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions, rename};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{AoptError, Result};

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Event types emitted during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RunStart,
    AssetEncoded,
    AssetReused,
    ReferencesRewritten,
    OriginalDeleted,
    OriginalKept,
    RunComplete,
    Error,
}

/// A single JSONL log entry. Only `ts`, `event` and `severity` are always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 UTC timestamp.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    /// Source asset, relative to the web root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Output asset, relative to the web root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_size: Option<u64>,
    /// Width cap handed to the encoder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cap: Option<u32>,
    /// Number of text files touched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Freeform details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            path: None,
            new_path: None,
            size: None,
            new_size: None,
            cap: None,
            files: None,
            dry_run: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }

    /// Info-level entry about one asset.
    pub fn asset(event: EventType, path: &str) -> Self {
        let mut entry = Self::new(event, Severity::Info);
        entry.path = Some(path.to_string());
        entry
    }

    /// Critical entry describing a fatal error.
    pub fn error(err: &AoptError) -> Self {
        let mut entry = Self::new(EventType::Error, Severity::Critical);
        entry.error_code = Some(err.code().to_string());
        entry.error_message = Some(err.to_string());
        entry
    }
}

/// Degradation state of the JSONL writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Normal,
    Stderr,
    Discard,
}

/// Configuration for the JSONL writer.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    pub path: PathBuf,
    /// Maximum file size before rotation (bytes). Default: 10 MiB.
    pub max_size_bytes: u64,
    /// Number of rotated files to keep. Default: 3.
    pub max_rotated_files: u32,
}

impl JsonlConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_size_bytes: 10 * 1024 * 1024,
            max_rotated_files: 3,
        }
    }
}

/// Append-only JSONL writer with size rotation and stderr fallback.
pub struct JsonlWriter {
    config: JsonlConfig,
    writer: Option<BufWriter<File>>,
    state: WriterState,
    bytes_written: u64,
}

impl JsonlWriter {
    /// Open the log file, degrading to stderr if it cannot be opened.
    pub fn open(config: JsonlConfig) -> Self {
        let mut w = Self {
            config,
            writer: None,
            state: WriterState::Discard,
            bytes_written: 0,
        };
        match open_append(&w.config.path) {
            Ok((file, size)) => {
                w.writer = Some(BufWriter::new(file));
                w.state = WriterState::Normal;
                w.bytes_written = size;
            }
            Err(e) => {
                let _ = writeln!(io::stderr(), "[AOPT-JSONL] {e}; using stderr");
                w.state = WriterState::Stderr;
            }
        }
        w
    }

    /// Write a single entry as one JSONL line.
    pub fn write_entry(&mut self, entry: &LogEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[AOPT-JSONL] serialize error: {e}");
                return;
            }
        };
        self.write_line(&line);
    }

    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }

    /// Current degradation state.
    pub fn state(&self) -> &str {
        match self.state {
            WriterState::Normal => "normal",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    fn write_line(&mut self, line: &str) {
        if self.state == WriterState::Normal
            && self.bytes_written + line.len() as u64 > self.config.max_size_bytes
        {
            self.rotate();
        }

        match self.state {
            WriterState::Normal => {
                let ok = self
                    .writer
                    .as_mut()
                    .is_some_and(|w| w.write_all(line.as_bytes()).is_ok());
                if ok {
                    self.bytes_written += line.len() as u64;
                } else {
                    self.degrade();
                    self.write_line(line);
                }
            }
            WriterState::Stderr => {
                if write!(io::stderr(), "[AOPT-JSONL] {line}").is_err() {
                    self.degrade();
                }
            }
            WriterState::Discard => {}
        }
    }

    fn degrade(&mut self) {
        self.writer = None;
        self.state = match self.state {
            WriterState::Normal => {
                let _ = writeln!(io::stderr(), "[AOPT-JSONL] write failed, using stderr");
                WriterState::Stderr
            }
            WriterState::Stderr | WriterState::Discard => WriterState::Discard,
        };
    }

    fn rotate(&mut self) {
        self.flush();
        self.writer = None;

        let base = self.config.path.clone();
        // Shift: .N-1 -> .N, ..., .1 -> .2, current -> .1
        for i in (1..self.config.max_rotated_files).rev() {
            let _ = rename(rotated_name(&base, i), rotated_name(&base, i + 1));
        }
        let _ = rename(&base, rotated_name(&base, 1));

        match open_append(&base) {
            Ok((file, _)) => {
                self.writer = Some(BufWriter::new(file));
                self.bytes_written = 0;
            }
            Err(_) => self.degrade(),
        }
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Run-scoped activity log; a no-op when no log path is configured.
pub struct ActivityLog {
    writer: Option<JsonlWriter>,
}

impl ActivityLog {
    pub fn disabled() -> Self {
        Self { writer: None }
    }

    pub fn open(path: Option<&Path>) -> Self {
        Self {
            writer: path.map(|p| JsonlWriter::open(JsonlConfig::new(p))),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    pub fn record(&mut self, entry: &LogEntry) {
        if let Some(w) = self.writer.as_mut() {
            w.write_entry(entry);
        }
    }

    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            w.flush();
        }
    }
}

/// Open or create a file for appending. Returns `(File, current_size)`.
fn open_append(path: &Path) -> Result<(File, u64)> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| AoptError::io(parent, e))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| AoptError::io(path, e))?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    Ok((file, size))
}

/// `foo.jsonl` -> `foo.jsonl.3`.
fn rotated_name(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
