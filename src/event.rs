//! Failure events flowing through the pipeline

use faultline_severity::{classify, Severity};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::error::Error;
use std::panic::PanicHookInfo;

use crate::trace::Trace;

/// Interception point that produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
    /// Warning-style signal raised while the process runs
    RuntimeSignal,
    /// Panic or error that escaped the application
    UncaughtException,
    /// Fatal condition found when inspecting the last error at exit
    ShutdownScan,
}

/// Source position of a failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

/// One classified occurrence of an abnormal condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEvent {
    /// Severity code; need not be a known [`Severity`]
    pub code: u32,

    /// Human-readable description
    pub message: String,

    /// Where the failure was raised, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,

    /// Stack trace, if one was supplied or captured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Trace>,

    /// Interception point
    pub origin: Origin,
}

impl FailureEvent {
    /// Create an event with no location or trace
    pub fn new(code: u32, message: impl Into<String>, origin: Origin) -> Self {
        Self {
            code,
            message: message.into(),
            location: None,
            trace: None,
            origin,
        }
    }

    /// Attach a source location
    pub fn with_location(mut self, file: impl Into<String>, line: u32) -> Self {
        self.location = Some(SourceLocation::new(file, line));
        self
    }

    /// Attach a trace
    pub fn with_trace(mut self, trace: Trace) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Display label for the code
    pub fn label(&self) -> Cow<'static, str> {
        classify(self.code)
    }

    /// File name, empty if unknown
    pub fn file(&self) -> &str {
        self.location.as_ref().map(|l| l.file.as_str()).unwrap_or("")
    }

    /// Line number, zero if unknown
    pub fn line(&self) -> u32 {
        self.location.as_ref().map(|l| l.line).unwrap_or(0)
    }
}

/// A runtime signal as reported by the host: `{code, message, file, line}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSignal {
    pub code: u32,
    pub message: String,
    pub file: String,
    pub line: u32,
}

impl RawSignal {
    pub fn new(code: u32, message: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            code,
            message: message.into(),
            file: file.into(),
            line,
        }
    }

    /// Convert into an event for the given interception point
    pub fn into_event(self, origin: Origin) -> FailureEvent {
        let event = FailureEvent::new(self.code, self.message, origin);
        if self.file.is_empty() && self.line == 0 {
            event
        } else {
            event.with_location(self.file, self.line)
        }
    }
}

/// Description of an uncaught exception, carrying its own trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionInfo {
    pub code: u32,
    pub message: String,
    pub location: Option<SourceLocation>,
    pub trace: Trace,
}

impl ExceptionInfo {
    /// Generic exception with the given message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: Severity::Exception.code(),
            message: message.into(),
            location: None,
            trace: Trace::empty(),
        }
    }

    /// Override the exception code
    pub fn with_code(mut self, code: u32) -> Self {
        self.code = code;
        self
    }

    /// Attach a source location
    pub fn with_location(mut self, file: impl Into<String>, line: u32) -> Self {
        self.location = Some(SourceLocation::new(file, line));
        self
    }

    /// Attach the trace captured when the exception was raised
    pub fn with_trace(mut self, trace: Trace) -> Self {
        self.trace = trace;
        self
    }

    /// Build from a panic, with a trace captured by the caller at hook time
    pub fn from_panic(info: &PanicHookInfo<'_>, trace: Trace) -> Self {
        let payload = info.payload();
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Box<dyn Any>".to_string()
        };

        let mut exception = Self::new(message).with_trace(trace);
        if let Some(location) = info.location() {
            exception = exception.with_location(location.file(), location.line());
        }
        exception
    }

    /// Build from an error that escaped the application; its source chain
    /// becomes the trace
    pub fn from_error(error: &(dyn Error + 'static)) -> Self {
        Self::new(error.to_string()).with_trace(Trace::from_error_chain(error))
    }

    /// Convert into an uncaught-exception event. The exception's own trace is
    /// kept even when empty, so the recorder never re-captures it.
    pub fn into_event(self) -> FailureEvent {
        FailureEvent {
            code: self.code,
            message: self.message,
            location: self.location,
            trace: Some(self.trace),
            origin: Origin::UncaughtException,
        }
    }
}
