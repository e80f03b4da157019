//! Binding of the failure pipeline to the running Rust process
//!
//! The host supplies what the dispatcher treats as external capabilities:
//! - uncaught exceptions arrive through a panic hook, or as an `Err`
//!   escaping [`Host::run`]
//! - runtime signals arrive through [`Host::raise`] and the
//!   [`raise!`](crate::raise) macro
//! - the process-exit inspection runs when the [`ShutdownGuard`] is
//!   finished or dropped
//! - the last unrecovered error is kept in a slot filled by
//!   [`Host::record_unrecovered`]
//!
//! Forced termination runs the shutdown scan (so buffered output is
//! settled) and then exits with the dispatcher's status.

mod hook;

use faultline_severity::{Severity, SeverityMask};
use std::error::Error;
use std::io::{self, Write};
use std::process::ExitCode;
use std::cell::Cell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::{RunConfiguration, Settings};
use crate::dispatch::{Dispatcher, Disposition};
use crate::error::FaultlineError;
use crate::event::{ExceptionInfo, RawSignal};
use crate::guard::OutputGuard;
use crate::record::LogSink;
use crate::trace::{BacktraceCapture, TraceCapture};

/// Set once the panic hook has been registered for this process
static INSTALLED: AtomicBool = AtomicBool::new(false);

thread_local! {
    /// True while this thread holds the host state lock
    static HOLDS_LOCK: Cell<bool> = const { Cell::new(false) };
}

/// Whether the current thread is inside the pipeline
pub(crate) fn held_by_current_thread() -> bool {
    HOLDS_LOCK.with(Cell::get)
}

/// Lock the host state, recovering from poisoning, and mark the current
/// thread as the holder.
pub(crate) fn lock_state(state: &Mutex<HostState>) -> HostLock<'_> {
    let guard = state.lock().unwrap_or_else(PoisonError::into_inner);
    HOLDS_LOCK.with(|held| held.set(true));
    HostLock { guard }
}

/// Held host state; clears the holder mark on drop
pub(crate) struct HostLock<'a> {
    guard: MutexGuard<'a, HostState>,
}

impl Deref for HostLock<'_> {
    type Target = HostState;

    fn deref(&self) -> &HostState {
        &self.guard
    }
}

impl DerefMut for HostLock<'_> {
    fn deref_mut(&mut self) -> &mut HostState {
        &mut self.guard
    }
}

impl Drop for HostLock<'_> {
    fn drop(&mut self) {
        HOLDS_LOCK.with(|held| held.set(false));
    }
}

/// State shared between the host handle and the panic hook
#[derive(Debug)]
pub(crate) struct HostState {
    pub(crate) dispatcher: Dispatcher,
    reporting: SeverityMask,
    last_error: Option<RawSignal>,
}

/// Handle to the installed pipeline; clones share state
#[derive(Debug, Clone)]
pub struct Host {
    state: Arc<Mutex<HostState>>,
}

impl Host {
    /// Build and arm a pipeline without touching process-global state.
    pub fn new(
        config: RunConfiguration,
        sink: Arc<dyn LogSink>,
        capture: Arc<dyn TraceCapture>,
        output: OutputGuard,
    ) -> Self {
        let mut dispatcher = Dispatcher::new(config, sink, capture, output);
        let reporting = dispatcher.initialize();

        Self {
            state: Arc::new(Mutex::new(HostState {
                dispatcher,
                reporting,
                last_error: None,
            })),
        }
    }

    /// Arm the pipeline over stdout and register the panic hook.
    ///
    /// Must be called once, before the application produces output.
    pub fn install(settings: &Settings) -> Result<Self, FaultlineError> {
        if INSTALLED.swap(true, Ordering::SeqCst) {
            return Err(FaultlineError::AlreadyInstalled);
        }

        let host = Self::new(
            settings.run_configuration(),
            settings.log_sink(),
            Arc::new(BacktraceCapture),
            OutputGuard::stdout(),
        );
        hook::register(Arc::clone(&host.state));
        tracing::debug!("failure pipeline installed");
        Ok(host)
    }

    /// Install, run `body`, then settle output.
    ///
    /// An `Err` from `body` is reported as an uncaught exception and the
    /// process status becomes failure. A panic in `body` is reported by the
    /// hook and the buffered output is settled while unwinding.
    pub fn run<F, E>(settings: &Settings, body: F) -> ExitCode
    where
        F: FnOnce(&Host) -> Result<(), E>,
        E: Error + 'static,
    {
        let host = match Self::install(settings) {
            Ok(host) => host,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        };

        let guard = host.shutdown_guard();
        let failed = match body(&host) {
            Ok(()) => false,
            Err(e) => {
                host.uncaught(ExceptionInfo::from_error(&e));
                true
            }
        };

        match guard.finish() {
            Disposition::Terminate { exit_code } => exit_status(exit_code),
            Disposition::Continue if failed => ExitCode::FAILURE,
            Disposition::Continue => ExitCode::SUCCESS,
        }
    }

    fn lock(&self) -> HostLock<'_> {
        lock_state(&self.state)
    }

    /// Configuration the pipeline was armed with
    pub fn config(&self) -> RunConfiguration {
        self.lock().dispatcher.config().clone()
    }

    /// Reporting level for the run.
    ///
    /// Advisory only: every signal is still delivered and logged, and in
    /// production anything outside this mask continues silently.
    pub fn reporting(&self) -> SeverityMask {
        self.lock().reporting
    }

    /// Deliver a runtime signal and return the dispatcher's decision without
    /// acting on it.
    pub fn signal(&self, code: u32, message: &str, file: &str, line: u32) -> Disposition {
        self.lock()
            .dispatcher
            .on_runtime_signal(code, message, file, line)
    }

    /// Raise a runtime signal; exits the process if the pipeline decides to
    /// terminate.
    pub fn raise(&self, severity: Severity, message: &str, file: &str, line: u32) {
        if let Disposition::Terminate { exit_code } =
            self.signal(severity.code(), message, file, line)
        {
            self.shutdown();
            std::process::exit(exit_code);
        }
    }

    /// Report an exception that escaped the application.
    pub fn uncaught(&self, exception: ExceptionInfo) -> Disposition {
        self.lock().dispatcher.on_uncaught_exception(exception)
    }

    /// Remember a signal the live path could not intercept, for the
    /// shutdown scan. A later call replaces an earlier one.
    pub fn record_unrecovered(&self, signal: RawSignal) {
        self.lock().last_error = Some(signal);
    }

    /// Run the shutdown scan over the last unrecovered error.
    pub fn shutdown(&self) -> Disposition {
        let mut state = self.lock();
        let last_error = state.last_error.take();
        state.dispatcher.on_shutdown_scan(last_error)
    }

    /// RAII guard that runs the shutdown scan when finished or dropped
    pub fn shutdown_guard(&self) -> ShutdownGuard {
        ShutdownGuard {
            host: self.clone(),
            done: false,
        }
    }

    /// Writer for caller-facing output, buffered while the pipeline is armed
    pub fn output(&self) -> HostOutput {
        HostOutput { host: self.clone() }
    }
}

fn exit_status(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

/// Caller-facing writer routed through the output guard
#[derive(Debug, Clone)]
pub struct HostOutput {
    host: Host,
}

impl Write for HostOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.host.lock().dispatcher.output().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.host.lock().dispatcher.output().flush()
    }
}

/// Runs the shutdown scan exactly once
///
/// Dropping the guard runs the scan and exits with status 1 if it found a
/// fatal error; during a panic unwind the scan still runs so buffered output
/// is delivered.
#[derive(Debug)]
pub struct ShutdownGuard {
    host: Host,
    done: bool,
}

impl ShutdownGuard {
    /// Run the scan now and return the decision without exiting.
    pub fn finish(mut self) -> Disposition {
        self.done = true;
        self.host.shutdown()
    }
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        if let Disposition::Terminate { exit_code } = self.host.shutdown() {
            std::process::exit(exit_code);
        }
    }
}

/// Raise a runtime signal at the current source location.
///
/// ```no_run
/// # use faultline::{raise, Host, Severity};
/// # fn demo(host: &Host) {
/// raise!(host, Severity::Warning, "cache miss for {}", "user:42");
/// # }
/// ```
#[macro_export]
macro_rules! raise {
    ($host:expr, $severity:expr, $($arg:tt)+) => {
        $host.raise($severity, &format!($($arg)+), file!(), line!())
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InterfaceKind;
    use crate::dispatch::DispatchState;
    use crate::guard::SharedOutput;
    use crate::record::MemorySink;
    use crate::trace::NoCapture;

    fn host(debug: bool) -> (Host, MemorySink, SharedOutput) {
        let log = MemorySink::new();
        let out = SharedOutput::new();
        let host = Host::new(
            RunConfiguration::with_interface(debug, InterfaceKind::Cli),
            Arc::new(log.clone()),
            Arc::new(NoCapture),
            OutputGuard::new(Box::new(out.clone())),
        );
        (host, log, out)
    }

    #[test]
    fn test_new_arms_pipeline() {
        let (host, _, _) = host(false);
        assert_eq!(host.reporting(), SeverityMask::PRODUCTION);
        assert_eq!(host.lock().dispatcher.state(), DispatchState::Armed);
    }

    #[test]
    fn test_production_logs_notices_silently() {
        let (host, log, out) = host(false);

        let disposition = host.signal(Severity::Notice.code(), "undefined index", "a.x", 3);
        assert_eq!(disposition, Disposition::Continue);
        let disposition = host.signal(Severity::Deprecated.code(), "old api", "a.x", 4);
        assert_eq!(disposition, Disposition::Continue);

        assert_eq!(
            log.lines(),
            vec![
                "Notice: \"undefined index\" in file a.x #3",
                "Deprecated: \"old api\" in file a.x #4",
            ]
        );
        host.shutdown();
        assert_eq!(out.contents(), "");
    }

    #[test]
    fn test_zero_code_signal_is_logged() {
        let (host, log, out) = host(true);

        let disposition = host.signal(Severity::Exception.code(), "zero code", "a.x", 5);
        assert!(disposition.is_terminate());
        assert_eq!(log.lines()[0], "Exception: \"zero code\" in file a.x #5");

        host.shutdown();
        assert_eq!(out.contents(), "[Exception] zero code in file a.x #5\n");
    }

    #[test]
    fn test_zero_code_signal_logged_in_production() {
        let (host, log, _) = host(false);
        assert_eq!(host.signal(0, "zero code", "a.x", 5), Disposition::Continue);
        assert_eq!(log.lines(), vec!["Exception: \"zero code\" in file a.x #5"]);
    }

    #[test]
    fn test_debug_reports_notices() {
        let (host, log, _) = host(true);
        let disposition = host.signal(Severity::Notice.code(), "undefined index", "a.x", 3);
        assert!(disposition.is_terminate());
        assert_eq!(log.lines()[0], "Notice: \"undefined index\" in file a.x #3");
    }

    #[test]
    fn test_output_buffered_until_shutdown() {
        let (host, _, out) = host(false);
        write!(host.output(), "hello ").unwrap();
        write!(host.output(), "world").unwrap();
        assert_eq!(out.contents(), "");

        assert_eq!(host.shutdown(), Disposition::Continue);
        assert_eq!(out.contents(), "hello world");
    }

    #[test]
    fn test_unrecovered_fatal_replaces_output() {
        let (host, log, out) = host(false);
        write!(host.output(), "partial page").unwrap();
        host.record_unrecovered(RawSignal::new(Severity::Error.code(), "OOM", "main.x", 10));

        assert_eq!(host.shutdown(), Disposition::Terminate { exit_code: 1 });
        assert_eq!(out.contents(), "[Error] OOM in file main.x #10\n");
        assert_eq!(log.lines(), vec!["Error: \"OOM\" in file main.x #10"]);
    }

    #[test]
    fn test_shutdown_guard_finish_runs_once() {
        let (host, _, out) = host(false);
        write!(host.output(), "done").unwrap();

        let guard = host.shutdown_guard();
        assert_eq!(guard.finish(), Disposition::Continue);
        assert_eq!(out.contents(), "done");

        // A second scan finds the guard settled.
        host.record_unrecovered(RawSignal::new(Severity::Error.code(), "late", "", 0));
        assert_eq!(host.shutdown(), Disposition::Continue);
        assert_eq!(out.contents(), "done");
    }

    #[test]
    fn test_shutdown_guard_drop_flushes() {
        let (host, _, out) = host(false);
        {
            let _guard = host.shutdown_guard();
            write!(host.output(), "scoped").unwrap();
        }
        assert_eq!(out.contents(), "scoped");
    }

    #[test]
    fn test_shutdown_guard_flushes_while_unwinding() {
        let (host, _, out) = host(false);
        let scoped = host.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = scoped.shutdown_guard();
            write!(scoped.output(), "partial page").unwrap();
            panic!("unwinding");
        }));

        assert!(result.is_err());
        assert_eq!(out.contents(), "partial page");
        assert_eq!(host.lock().dispatcher.state(), DispatchState::Finished);
    }

    #[test]
    fn test_uncaught_error_is_displayed() {
        let (host, log, out) = host(false);
        let err = io::Error::new(io::ErrorKind::Other, "disk full");
        assert_eq!(host.uncaught(ExceptionInfo::from_error(&err)), Disposition::Continue);
        host.shutdown();

        assert_eq!(log.lines(), vec!["Exception: \"disk full\""]);
        assert_eq!(out.contents(), "[Exception] disk full in file  #0\n");
    }

    #[test]
    fn test_exit_status_mapping() {
        let one = format!("{:?}", ExitCode::from(1));
        assert_eq!(format!("{:?}", exit_status(1)), one);
        assert_eq!(format!("{:?}", exit_status(-1)), one);
        assert_eq!(format!("{:?}", exit_status(300)), one);
    }
}
