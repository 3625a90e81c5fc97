use crate::config::types::{AuditError, Result};
use log::info;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
/// Async-safe signal handling
/// The handler only records the signal number; the pipeline observes it
/// through a `CancelToken` at each blocking-call boundary.
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// Last interrupt-class signal received by this process (0 if none)
static SIGNAL_RECEIVED: AtomicI32 = AtomicI32::new(0);

/// Signals that abort a run
pub const INTERRUPT_SIGNALS: [Signal; 4] = [
    Signal::SIGHUP,
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTERM,
];

/// Signal handler state
pub struct SignalHandler;

impl SignalHandler {
    /// Install handlers for SIGHUP, SIGINT, SIGQUIT, SIGTERM
    /// Must be called early in main() before any threads are spawned
    pub fn install() -> Result<Self> {
        let sig_action = SigAction::new(
            SigHandler::Handler(Self::signal_handler),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );

        for sig in INTERRUPT_SIGNALS {
            // SAFETY: the handler only performs an atomic store.
            unsafe { signal::sigaction(sig, &sig_action) }.map_err(|e| {
                AuditError::Config(format!("Failed to install {} handler: {}", sig, e))
            })?;
        }

        info!("Signal handlers installed (SIGHUP, SIGINT, SIGQUIT, SIGTERM)");
        Ok(Self)
    }

    /// Only performs an atomic store - no allocations, no locks, no I/O
    extern "C" fn signal_handler(signal: libc::c_int) {
        SIGNAL_RECEIVED.store(signal, Ordering::SeqCst);
    }

    /// Token observing the process-wide signal flag
    pub fn token(&self) -> CancelToken {
        CancelToken {
            requested: Arc::new(AtomicI32::new(0)),
            observe_signals: true,
        }
    }
}

/// Cancellation request observed at blocking-call boundaries
#[derive(Clone, Debug)]
pub struct CancelToken {
    requested: Arc<AtomicI32>,
    observe_signals: bool,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// Token that is only cancelled through `request`
    pub fn new() -> Self {
        Self {
            requested: Arc::new(AtomicI32::new(0)),
            observe_signals: false,
        }
    }

    /// Request cancellation as if `signal` had been delivered
    pub fn request(&self, signal: i32) {
        self.requested.store(signal, Ordering::SeqCst);
    }

    /// Pending signal number, if cancellation was requested
    pub fn pending(&self) -> Option<i32> {
        let local = self.requested.load(Ordering::SeqCst);
        if local != 0 {
            return Some(local);
        }
        if self.observe_signals {
            let received = SIGNAL_RECEIVED.load(Ordering::SeqCst);
            if received != 0 {
                return Some(received);
            }
        }
        None
    }

    /// Fail with `Interrupted` if cancellation is pending
    pub fn check(&self) -> Result<()> {
        match self.pending() {
            Some(signal) => Err(AuditError::Interrupted { signal }),
            None => Ok(()),
        }
    }
}
