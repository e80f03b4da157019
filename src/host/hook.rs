//! Panic hook: the uncaught-exception interception point

use std::backtrace::Backtrace;
use std::io::Write;
use std::panic::{self, PanicHookInfo};
use std::sync::{Arc, Mutex};

use super::{held_by_current_thread, lock_state, HostState};
use crate::event::ExceptionInfo;
use crate::trace::Trace;

/// Replace the process panic hook with one that routes panics through the
/// dispatcher.
pub(crate) fn register(state: Arc<Mutex<HostState>>) {
    panic::set_hook(Box::new(move |info| on_panic(&state, info)));
}

fn on_panic(state: &Mutex<HostState>, info: &PanicHookInfo<'_>) {
    // The trace belongs to the panic; capture it here, not in the recorder.
    let trace = Trace::from_backtrace(&Backtrace::force_capture());
    deliver(state, ExceptionInfo::from_panic(info, trace));
}

/// Hand a panic to the dispatcher, waiting for any other thread that holds
/// the pipeline.
pub(super) fn deliver(state: &Mutex<HostState>, exception: ExceptionInfo) {
    if held_by_current_thread() {
        // Panicked inside the pipeline itself; report raw.
        let _ = writeln!(
            std::io::stderr(),
            "[Exception] {} (failure pipeline busy)",
            exception.message
        );
        return;
    }
    lock_state(state).dispatcher.on_uncaught_exception(exception);
}
