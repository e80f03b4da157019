//! Call-stack traces attached to failure events
//!
//! Traces are kept as plain text frame lines. Capturing one is an injectable
//! capability so the recorder never depends on a specific introspection
//! mechanism.

use serde::{Deserialize, Serialize};
use std::backtrace::Backtrace;
use std::error::Error;

/// Ordered sequence of stack frame lines, innermost first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trace {
    frames: Vec<String>,
}

impl Trace {
    /// Empty trace
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a trace from frame lines
    pub fn from_frames<I, S>(frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            frames: frames.into_iter().map(Into::into).collect(),
        }
    }

    /// Split rendered trace text into frames.
    ///
    /// Leading and trailing blank lines are dropped; interior lines are kept
    /// verbatim.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim_matches(|c| c == '\n' || c == '\r');
        if trimmed.is_empty() {
            return Self::empty();
        }
        Self::from_frames(trimmed.lines())
    }

    /// Render a captured backtrace.
    pub fn from_backtrace(backtrace: &Backtrace) -> Self {
        Self::from_text(&backtrace.to_string())
    }

    /// Trace made of an error's source chain, one cause per frame.
    pub fn from_error_chain(error: &(dyn Error + 'static)) -> Self {
        let mut frames = Vec::new();
        let mut source = error.source();
        let mut depth = 0;
        while let Some(cause) = source {
            frames.push(format!("#{} caused by: {}", depth, cause));
            source = cause.source();
            depth += 1;
        }
        Self { frames }
    }

    /// Frame lines
    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True when there are no frames
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Capability for capturing the current call stack on demand
pub trait TraceCapture: Send + Sync {
    /// Capture the stack of the calling thread.
    fn capture(&self) -> Trace;
}

/// Captures the stack with `std::backtrace`, regardless of `RUST_BACKTRACE`
#[derive(Debug, Clone, Copy, Default)]
pub struct BacktraceCapture;

impl TraceCapture for BacktraceCapture {
    fn capture(&self) -> Trace {
        Trace::from_backtrace(&Backtrace::force_capture())
    }
}

/// Never captures anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCapture;

impl TraceCapture for NoCapture {
    fn capture(&self) -> Trace {
        Trace::empty()
    }
}
