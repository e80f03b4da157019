//! Diagnostic log sinks
//!
//! A sink appends one line of text per call. Writes are best effort: a sink
//! never reports failure to the recorder.

use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

/// Append-only destination for diagnostic lines
pub trait LogSink: Send + Sync {
    /// Append a single line. Must not contain the trailing newline.
    fn append_line(&self, line: &str);
}

/// Emits each line as an ERROR-level `tracing` event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn append_line(&self, line: &str) {
        tracing::error!(target: "faultline", "{}", line);
    }
}

/// Writes each line to standard error
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrSink;

impl LogSink for StderrSink {
    fn append_line(&self, line: &str) {
        let _ = writeln!(std::io::stderr().lock(), "{}", line);
    }
}

/// Appends timestamped lines to a file
///
/// The file is opened per line so that rotation by an external tool is
/// picked up without restarting the process.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn timestamp() -> String {
        Utc::now().format("%d-%b-%Y %H:%M:%S UTC").to_string()
    }
}

impl LogSink for FileSink {
    fn append_line(&self, line: &str) {
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| writeln!(file, "[{}] {}", Self::timestamp(), line));

        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to append log line");
        }
    }
}

/// In-memory sink; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every line written so far
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drop all recorded lines
    pub fn clear(&self) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl LogSink for MemorySink {
    fn append_line(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
}
