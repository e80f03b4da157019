//! Dispatcher: the single pipeline behind every interception point
//!
//! Runtime signals, uncaught exceptions and the shutdown scan all funnel
//! into one internal entry point that logs the event, decides what reaches
//! the caller, and decides whether the process must terminate. The
//! dispatcher never exits the process itself; it returns a [`Disposition`]
//! and the host acts on it.
//!
//! Lifecycle:
//!
//! ```text
//! Uninitialized --initialize--> Armed --fatal--> Terminated
//!                                 \--clean shutdown--> Finished
//! ```

use faultline_severity::{SeverityClass, SeverityMask};
use std::io::Write;
use std::sync::Arc;

use crate::config::RunConfiguration;
use crate::event::{ExceptionInfo, FailureEvent, Origin, RawSignal};
use crate::guard::OutputGuard;
use crate::present;
use crate::record::{LogSink, Recorder};
use crate::trace::TraceCapture;

/// Exit status used for every termination the dispatcher forces
pub const EXIT_CODE_FATAL: i32 = 1;

/// Dispatcher lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Pipeline not armed yet
    Uninitialized,
    /// Interception active, output buffered
    Armed,
    /// A fatal event ended the run
    Terminated,
    /// Shutdown found nothing fatal; output delivered
    Finished,
}

impl DispatchState {
    /// True for the two end states
    pub fn is_terminal(&self) -> bool {
        matches!(self, DispatchState::Terminated | DispatchState::Finished)
    }
}

/// What the host must do after an interception callback returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Return control to the running program
    Continue,
    /// Run the shutdown scan, then exit with this status
    Terminate { exit_code: i32 },
}

impl Disposition {
    pub fn is_terminate(&self) -> bool {
        matches!(self, Disposition::Terminate { .. })
    }
}

/// How the shared pipeline treats an event, per interception point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PolicyHint {
    /// Display and terminate for fatal codes, or for anything in debug mode
    LiveSignal,
    /// Always display, never force an exit
    AlwaysDisplay,
    /// Discard buffered output, render the event alone, terminate
    DiscardThenRender,
}

/// Façade wiring interception points to recorder, presenter and output guard
pub struct Dispatcher {
    config: RunConfiguration,
    recorder: Recorder,
    guard: OutputGuard,
    state: DispatchState,
}

impl Dispatcher {
    pub fn new(
        config: RunConfiguration,
        sink: Arc<dyn LogSink>,
        capture: Arc<dyn TraceCapture>,
        guard: OutputGuard,
    ) -> Self {
        let recorder = Recorder::new(&config, sink, capture);
        Self {
            config,
            recorder,
            guard,
            state: DispatchState::Uninitialized,
        }
    }

    pub fn config(&self) -> &RunConfiguration {
        &self.config
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn guard(&self) -> &OutputGuard {
        &self.guard
    }

    /// Caller-facing writer; buffered while the pipeline is armed
    pub fn output(&mut self) -> &mut OutputGuard {
        &mut self.guard
    }

    /// Arm the pipeline and start output buffering.
    ///
    /// Returns the reporting mask the host must apply to incoming signals.
    pub fn initialize(&mut self) -> SeverityMask {
        if self.state == DispatchState::Uninitialized {
            self.guard.begin();
            self.state = DispatchState::Armed;
            tracing::debug!(
                debug_mode = self.config.debug_mode,
                interface = self.config.interface_kind.as_str(),
                "failure pipeline armed"
            );
        } else {
            tracing::warn!(state = ?self.state, "failure pipeline initialized twice");
        }
        self.config.reporting_mask()
    }

    /// Warning-style signal raised while the program runs.
    pub fn on_runtime_signal(&mut self, code: u32, message: &str, file: &str, line: u32) -> Disposition {
        let event = RawSignal::new(code, message, file, line).into_event(Origin::RuntimeSignal);
        self.handle_failure(event, PolicyHint::LiveSignal)
    }

    /// Exception (panic or error) that escaped the application.
    ///
    /// Always logged with the exception's own trace and always shown. Never
    /// forces an exit: the unwind already under way ends the process.
    pub fn on_uncaught_exception(&mut self, exception: ExceptionInfo) -> Disposition {
        self.handle_failure(exception.into_event(), PolicyHint::AlwaysDisplay)
    }

    /// Inspect the last unrecovered error once the program body is done.
    ///
    /// A fatal last error replaces all buffered output with its own
    /// rendering; otherwise the buffer is delivered as produced.
    pub fn on_shutdown_scan(&mut self, last_error: Option<RawSignal>) -> Disposition {
        if self.guard.state().is_finished() {
            tracing::debug!("shutdown scan already ran");
            return self.current_disposition();
        }

        // The event that terminated the run must stay the last one observed.
        if self.state == DispatchState::Terminated {
            self.guard.finish_clean();
            return self.current_disposition();
        }

        match last_error {
            Some(signal) if SeverityMask::SHUTDOWN_FATAL.contains(signal.code) => {
                let event = signal.into_event(Origin::ShutdownScan);
                self.handle_failure(event, PolicyHint::DiscardThenRender)
            }
            _ => {
                self.guard.finish_clean();
                self.state = DispatchState::Finished;
                tracing::debug!("failure pipeline finished cleanly");
                Disposition::Continue
            }
        }
    }

    fn handle_failure(&mut self, event: FailureEvent, hint: PolicyHint) -> Disposition {
        if self.state.is_terminal() {
            tracing::warn!(
                state = ?self.state,
                code = event.code,
                "failure observed after pipeline ended; ignoring"
            );
            return self.current_disposition();
        }

        self.recorder.log(&event);

        match hint {
            PolicyHint::LiveSignal => {
                let fatal = SeverityClass::of_code(event.code) == SeverityClass::Fatal;
                if self.config.debug_mode || fatal {
                    self.display(&event);
                    self.terminate()
                } else {
                    Disposition::Continue
                }
            }
            PolicyHint::AlwaysDisplay => {
                self.display(&event);
                Disposition::Continue
            }
            PolicyHint::DiscardThenRender => {
                let rendering = present::render(&event, &self.config);
                self.guard.finish_fatal(&rendering);
                self.terminate()
            }
        }
    }

    fn display(&mut self, event: &FailureEvent) {
        let rendering = present::render(event, &self.config);
        if let Err(e) = self.guard.write_all(rendering.as_bytes()) {
            tracing::warn!(error = %e, "failed to write failure rendering");
        }
    }

    fn terminate(&mut self) -> Disposition {
        self.state = DispatchState::Terminated;
        tracing::debug!("failure pipeline terminated");
        Disposition::Terminate {
            exit_code: EXIT_CODE_FATAL,
        }
    }

    fn current_disposition(&self) -> Disposition {
        match self.state {
            DispatchState::Terminated => Disposition::Terminate {
                exit_code: EXIT_CODE_FATAL,
            },
            _ => Disposition::Continue,
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InterfaceKind;
    use crate::guard::{GuardState, SharedOutput};
    use crate::record::{MemorySink, TRACE_FOOTER, TRACE_HEADER};
    use crate::trace::{NoCapture, Trace};
    use faultline_severity::Severity;

    struct Harness {
        dispatcher: Dispatcher,
        log: MemorySink,
        out: SharedOutput,
    }

    fn harness(debug: bool, interface: InterfaceKind) -> Harness {
        let log = MemorySink::new();
        let out = SharedOutput::new();
        let mut dispatcher = Dispatcher::new(
            RunConfiguration::with_interface(debug, interface),
            Arc::new(log.clone()),
            Arc::new(NoCapture),
            OutputGuard::new(Box::new(out.clone())),
        );
        dispatcher.initialize();
        Harness { dispatcher, log, out }
    }

    #[test]
    fn test_initialize_arms_and_buffers() {
        let log = MemorySink::new();
        let out = SharedOutput::new();
        let mut dispatcher = Dispatcher::new(
            RunConfiguration::with_interface(false, InterfaceKind::Cli),
            Arc::new(log),
            Arc::new(NoCapture),
            OutputGuard::new(Box::new(out)),
        );
        assert_eq!(dispatcher.state(), DispatchState::Uninitialized);

        let mask = dispatcher.initialize();
        assert_eq!(mask, SeverityMask::PRODUCTION);
        assert_eq!(dispatcher.state(), DispatchState::Armed);
        assert_eq!(dispatcher.guard().state(), GuardState::Buffering);
    }

    #[test]
    fn test_debug_initialize_reports_everything() {
        let mut h = harness(true, InterfaceKind::Cli);
        assert_eq!(h.dispatcher.initialize(), SeverityMask::ALL);
        assert_eq!(h.dispatcher.state(), DispatchState::Armed);
    }

    #[test]
    fn test_production_warning_logged_not_shown() {
        let mut h = harness(false, InterfaceKind::Cli);

        let disposition =
            h.dispatcher
                .on_runtime_signal(Severity::Warning.code(), "divide by zero risk", "calc.x", 42);

        assert_eq!(disposition, Disposition::Continue);
        assert_eq!(h.dispatcher.state(), DispatchState::Armed);
        assert_eq!(
            h.log.lines(),
            vec!["Warning: \"divide by zero risk\" in file calc.x #42"]
        );
        assert_eq!(h.dispatcher.guard().buffered_len(), 0);

        h.dispatcher.on_shutdown_scan(None);
        assert_eq!(h.out.contents(), "");
    }

    #[test]
    fn test_debug_warning_shown_and_terminates() {
        let mut h = harness(true, InterfaceKind::Cli);

        let disposition =
            h.dispatcher
                .on_runtime_signal(Severity::Warning.code(), "divide by zero risk", "calc.x", 42);

        assert_eq!(disposition, Disposition::Terminate { exit_code: 1 });
        assert_eq!(h.dispatcher.state(), DispatchState::Terminated);

        let lines = h.log.lines();
        assert_eq!(lines[0], "Warning: \"divide by zero risk\" in file calc.x #42");
        assert_eq!(lines[1], TRACE_HEADER);
        assert_eq!(lines.last().map(String::as_str), Some(TRACE_FOOTER));

        // The host runs the shutdown scan before exiting.
        let after = h.dispatcher.on_shutdown_scan(None);
        assert!(after.is_terminate());
        assert_eq!(
            h.out.contents(),
            "[Warning] divide by zero risk in file calc.x #42\n"
        );
    }

    #[test]
    fn test_fatal_signal_terminates_in_production() {
        for severity in [
            Severity::Error,
            Severity::Parse,
            Severity::CoreError,
            Severity::CompileError,
            Severity::UserError,
        ] {
            let mut h = harness(false, InterfaceKind::Network);
            let disposition = h.dispatcher.on_runtime_signal(severity.code(), "bad", "f.x", 1);
            assert_eq!(disposition, Disposition::Terminate { exit_code: 1 }, "{:?}", severity);

            h.dispatcher.on_shutdown_scan(None);
            assert!(!h.out.contents().is_empty(), "{:?}", severity);
        }
    }

    #[test]
    fn test_recoverable_signals_continue_in_production() {
        for severity in [
            Severity::Warning,
            Severity::Notice,
            Severity::CoreWarning,
            Severity::CompileWarning,
            Severity::UserWarning,
            Severity::UserNotice,
            Severity::Strict,
            Severity::Deprecated,
        ] {
            let mut h = harness(false, InterfaceKind::Cli);
            let disposition = h.dispatcher.on_runtime_signal(severity.code(), "soft", "f.x", 1);
            assert_eq!(disposition, Disposition::Continue, "{:?}", severity);
            assert_eq!(h.log.lines().len(), 1);

            h.dispatcher.on_shutdown_scan(None);
            assert_eq!(h.out.contents(), "", "{:?}", severity);
        }
    }

    #[test]
    fn test_unknown_code_degrades_gracefully() {
        let mut h = harness(false, InterfaceKind::Cli);
        let disposition = h.dispatcher.on_runtime_signal(3, "odd", "", 0);
        assert_eq!(disposition, Disposition::Continue);
        assert_eq!(h.log.lines(), vec!["3: \"odd\""]);
    }

    #[test]
    fn test_uncaught_exception_always_shown() {
        for debug in [false, true] {
            let mut h = harness(debug, InterfaceKind::Cli);
            write!(h.dispatcher.output(), "before;").unwrap();

            let exception = ExceptionInfo::new("boom")
                .with_location("app.x", 9)
                .with_trace(Trace::from_frames(["#0 app.x(9)"]));
            let disposition = h.dispatcher.on_uncaught_exception(exception);

            assert_eq!(disposition, Disposition::Continue);
            assert_eq!(h.dispatcher.state(), DispatchState::Armed);
            assert_eq!(h.log.lines()[0], "Exception: \"boom\" in file app.x #9");

            h.dispatcher.on_shutdown_scan(None);
            assert_eq!(h.out.contents(), "before;[Exception] boom in file app.x #9\n");
        }
    }

    #[test]
    fn test_uncaught_exception_logs_own_trace_in_debug() {
        let mut h = harness(true, InterfaceKind::Cli);
        let exception = ExceptionInfo::new("boom").with_trace(Trace::from_frames(["#0 own"]));
        h.dispatcher.on_uncaught_exception(exception);

        assert_eq!(
            h.log.lines(),
            vec!["Exception: \"boom\"", TRACE_HEADER, "#0 own", TRACE_FOOTER]
        );
    }

    #[test]
    fn test_shutdown_fatal_discards_buffered_output() {
        let mut h = harness(false, InterfaceKind::Cli);
        write!(h.dispatcher.output(), "partial page").unwrap();

        let disposition = h
            .dispatcher
            .on_shutdown_scan(Some(RawSignal::new(Severity::Error.code(), "OOM", "main.x", 10)));

        assert_eq!(disposition, Disposition::Terminate { exit_code: 1 });
        assert_eq!(h.dispatcher.state(), DispatchState::Terminated);
        assert_eq!(h.out.contents(), "[Error] OOM in file main.x #10\n");
        assert_eq!(h.log.lines(), vec!["Error: \"OOM\" in file main.x #10"]);
    }

    #[test]
    fn test_shutdown_treats_startup_warnings_as_fatal() {
        for severity in [Severity::CoreWarning, Severity::CompileWarning] {
            let mut h = harness(false, InterfaceKind::Cli);
            let disposition = h
                .dispatcher
                .on_shutdown_scan(Some(RawSignal::new(severity.code(), "w", "boot.x", 2)));
            assert!(disposition.is_terminate(), "{:?}", severity);
        }
    }

    #[test]
    fn test_shutdown_non_fatal_last_error_flushes() {
        for severity in [Severity::Warning, Severity::UserError, Severity::Notice] {
            let mut h = harness(false, InterfaceKind::Cli);
            write!(h.dispatcher.output(), "page").unwrap();

            let disposition = h
                .dispatcher
                .on_shutdown_scan(Some(RawSignal::new(severity.code(), "x", "a.x", 1)));

            assert_eq!(disposition, Disposition::Continue, "{:?}", severity);
            assert_eq!(h.dispatcher.state(), DispatchState::Finished);
            assert_eq!(h.out.contents(), "page");
            assert!(h.log.lines().is_empty());
        }
    }

    #[test]
    fn test_shutdown_runs_once() {
        let mut h = harness(false, InterfaceKind::Cli);
        write!(h.dispatcher.output(), "page").unwrap();

        assert_eq!(h.dispatcher.on_shutdown_scan(None), Disposition::Continue);
        let again = h
            .dispatcher
            .on_shutdown_scan(Some(RawSignal::new(Severity::Error.code(), "late", "", 0)));

        assert_eq!(again, Disposition::Continue);
        assert_eq!(h.dispatcher.state(), DispatchState::Finished);
        assert_eq!(h.out.contents(), "page");
        assert!(h.log.lines().is_empty());
    }

    #[test]
    fn test_terminating_event_is_last_observed() {
        let mut h = harness(false, InterfaceKind::Cli);
        h.dispatcher.on_runtime_signal(Severity::Error.code(), "first", "a.x", 1);
        let later = h.dispatcher.on_runtime_signal(Severity::Error.code(), "second", "a.x", 2);

        assert!(later.is_terminate());
        assert_eq!(h.log.lines().len(), 1);

        // Shutdown after a live termination does not promote another event.
        h.dispatcher
            .on_shutdown_scan(Some(RawSignal::new(Severity::Error.code(), "third", "a.x", 3)));
        assert_eq!(h.log.lines().len(), 1);
        assert_eq!(h.out.contents(), "[Error] first in file a.x #1\n");
    }

    #[test]
    fn test_network_production_fatal_rendering() {
        let mut h = harness(false, InterfaceKind::Network);
        write!(h.dispatcher.output(), "<html>partial").unwrap();
        h.dispatcher
            .on_shutdown_scan(Some(RawSignal::new(Severity::Parse.code(), "unexpected }", "t.x", 3)));

        assert_eq!(h.out.contents(), "<b>Parsing Error:</b> unexpected }<br>");
    }
}
