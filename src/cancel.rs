//! Cooperative cancellation shared between a signal handler and a poll loop.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::SigId;

/// A shared flag that a signal (or another thread) raises and a loop polls.
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Lower the flag, returning whether it was raised.
    pub fn reset(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }

    /// Raise this token whenever `signal` is delivered to the process.
    ///
    /// Registering replaces the default disposition, so a process that binds
    /// SIGINT here survives Ctrl-C.
    pub fn bind_signal(&self, signal: i32) -> io::Result<SigId> {
        signal_hook::flag::register(signal, Arc::clone(&self.flag))
    }
}
