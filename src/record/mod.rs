//! Durable diagnostic logging of failure events
//!
//! Each event becomes one summary line:
//!
//! ```text
//! Warning: "divide by zero risk" in file calc.x #42
//! ```
//!
//! A message spanning several lines continues on the following sink lines.
//! In debug mode the summary is followed by a trace block bracketed by
//! [`TRACE_HEADER`] and [`TRACE_FOOTER`]. Every logical line is its own
//! sink call.

mod sink;

pub use sink::{FileSink, LogSink, MemorySink, StderrSink, TracingSink};

use std::sync::Arc;

use crate::config::RunConfiguration;
use crate::event::FailureEvent;
use crate::trace::{Trace, TraceCapture};

/// First line of a trace block
pub const TRACE_HEADER: &str = "Backtrace:";

/// Last line of a trace block
pub const TRACE_FOOTER: &str = "----------------------------------";

/// Writes failure events to a [`LogSink`]
#[derive(Clone)]
pub struct Recorder {
    sink: Arc<dyn LogSink>,
    capture: Arc<dyn TraceCapture>,
    debug_mode: bool,
    max_trace_lines: usize,
}

impl Recorder {
    pub fn new(
        config: &RunConfiguration,
        sink: Arc<dyn LogSink>,
        capture: Arc<dyn TraceCapture>,
    ) -> Self {
        Self {
            sink,
            capture,
            debug_mode: config.debug_mode,
            max_trace_lines: config.max_trace_lines,
        }
    }

    /// Summary line for an event. The location clause is omitted when either
    /// the file is empty or the line is zero.
    pub fn format_line(event: &FailureEvent) -> String {
        let mut line = format!("{}: \"{}\"", event.label(), event.message);
        if !event.file().is_empty() && event.line() != 0 {
            line.push_str(&format!(" in file {} #{}", event.file(), event.line()));
        }
        line
    }

    /// Log an event. Captures a trace only in debug mode and only when the
    /// event did not bring its own.
    pub fn log(&self, event: &FailureEvent) {
        self.emit(&Self::format_line(event));

        if !self.debug_mode {
            return;
        }

        match &event.trace {
            Some(trace) => self.log_trace(trace),
            None => self.log_trace(&self.capture.capture()),
        }
    }

    fn log_trace(&self, trace: &Trace) {
        self.sink.append_line(TRACE_HEADER);

        let frames = trace.frames();
        for frame in frames.iter().take(self.max_trace_lines) {
            self.emit(frame);
        }
        if frames.len() > self.max_trace_lines {
            self.sink.append_line(&format!(
                "... {} more frames",
                frames.len() - self.max_trace_lines
            ));
        }

        self.sink.append_line(TRACE_FOOTER);
    }

    fn emit(&self, text: &str) {
        for line in text.lines() {
            self.sink.append_line(line);
        }
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("debug_mode", &self.debug_mode)
            .field("max_trace_lines", &self.max_trace_lines)
            .finish_non_exhaustive()
    }
}
