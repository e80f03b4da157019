//! Faultline - process-wide failure reporting
//!
//! Routes every abnormal condition a process can produce (recoverable
//! runtime signals, uncaught exceptions, fatal errors found at exit) through
//! one pipeline: classify by severity, log to a diagnostic sink, decide what
//! the caller sees, decide whether the process ends.
//!
//! Caller-facing output is buffered from startup so that a fatal error found
//! during shutdown replaces partial output instead of trailing it.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod guard;
pub mod host;
pub mod present;
pub mod record;
pub mod trace;

pub use faultline_severity::{classify, Severity, SeverityClass, SeverityMask, UnknownSeverity};

pub use config::{EffectiveConfig, InterfaceKind, RunConfiguration, Settings};
pub use dispatch::{DispatchState, Dispatcher, Disposition, EXIT_CODE_FATAL};
pub use error::FaultlineError;
pub use event::{ExceptionInfo, FailureEvent, Origin, RawSignal, SourceLocation};
pub use guard::{OutputGuard, SharedOutput};
pub use host::{Host, HostOutput, ShutdownGuard};
pub use record::{LogSink, MemorySink, Recorder};
pub use trace::{BacktraceCapture, NoCapture, Trace, TraceCapture};
