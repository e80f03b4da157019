//! Output guard: buffer-then-commit discipline over caller-visible output
//!
//! Everything the application writes toward the caller is held in memory
//! from [`OutputGuard::begin`] until shutdown. A clean finish delivers the
//! buffer as produced; a fatal finish throws it away and delivers only the
//! fatal rendering, so partial output never precedes or mixes with it.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// Lifecycle of the guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// `begin()` not called yet; writes pass straight through
    Idle,
    /// Writes are buffered
    Buffering,
    /// Buffer delivered by `finish_clean()`
    Flushed,
    /// Buffer dropped by `finish_fatal()`
    Discarded,
}

impl GuardState {
    /// True once one of the finish operations has run
    pub fn is_finished(&self) -> bool {
        matches!(self, GuardState::Flushed | GuardState::Discarded)
    }
}

/// Owner of the caller-facing channel
pub struct OutputGuard {
    target: Box<dyn Write + Send>,
    buffer: Vec<u8>,
    state: GuardState,
}

impl OutputGuard {
    pub fn new(target: Box<dyn Write + Send>) -> Self {
        Self {
            target,
            buffer: Vec::new(),
            state: GuardState::Idle,
        }
    }

    /// Guard over the process's standard output
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    /// Bytes currently held back
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Start buffering. Only the first call has an effect.
    pub fn begin(&mut self) {
        if self.state == GuardState::Idle {
            self.state = GuardState::Buffering;
        } else {
            tracing::debug!(state = ?self.state, "output guard already started");
        }
    }

    /// Deliver the buffered output in order and release the buffer.
    ///
    /// Returns false if the guard was already finished.
    pub fn finish_clean(&mut self) -> bool {
        if self.state.is_finished() {
            return false;
        }
        let buffered = std::mem::take(&mut self.buffer);
        self.deliver(&buffered);
        self.state = GuardState::Flushed;
        true
    }

    /// Drop everything buffered, even if non-empty, and deliver only
    /// `rendering`.
    ///
    /// Returns false if the guard was already finished; nothing is delivered
    /// in that case.
    pub fn finish_fatal(&mut self, rendering: &str) -> bool {
        if self.state.is_finished() {
            return false;
        }
        let dropped = std::mem::take(&mut self.buffer).len();
        if dropped > 0 {
            tracing::debug!(bytes = dropped, "discarding buffered output");
        }
        self.deliver(rendering.as_bytes());
        self.state = GuardState::Discarded;
        true
    }

    fn deliver(&mut self, bytes: &[u8]) {
        let result = self
            .target
            .write_all(bytes)
            .and_then(|_| self.target.flush());
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to deliver output to caller");
        }
    }
}

impl Write for OutputGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.state {
            GuardState::Buffering => {
                self.buffer.extend_from_slice(buf);
                Ok(buf.len())
            }
            _ => self.target.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        // Buffered bytes are only released by the finish operations.
        match self.state {
            GuardState::Buffering => Ok(()),
            _ => self.target.flush(),
        }
    }
}

impl std::fmt::Debug for OutputGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputGuard")
            .field("state", &self.state)
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}

/// Cloneable in-memory caller channel; clones share contents
#[derive(Debug, Clone, Default)]
pub struct SharedOutput {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far, lossily decoded
    pub fn contents(&self) -> String {
        let bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
