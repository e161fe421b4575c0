//! Shutdown signalling.
//!
//! `Shutdown` is the flag every loop polls once per wait. It trips either
//! when `request()` is called on any clone, or when SIGINT/SIGTERM arrives
//! after `install_handlers()`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use epserve_core::error::ServeError;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

static SIGNALLED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(_sig: libc::c_int) {
    SIGNALLED.store(true, Ordering::Relaxed);
}

/// Route SIGINT and SIGTERM to the process-wide shutdown flag.
///
/// Installed without `SA_RESTART` so a blocked multiplexer wait returns
/// early.
pub fn install_handlers() -> Result<(), ServeError> {
    let action = SigAction::new(SigHandler::Handler(on_signal), SaFlags::empty(), SigSet::empty());
    for sig in [Signal::SIGINT, Signal::SIGTERM] {
        // SAFETY: the handler only stores to an atomic.
        unsafe { sigaction(sig, &action) }.map_err(|e| ServeError::setup("sigaction", e.into()))?;
    }
    Ok(())
}

/// Whether a termination signal has been received.
pub fn signalled() -> bool {
    SIGNALLED.load(Ordering::Relaxed)
}

#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire) || signalled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let a = Shutdown::new();
        let b = a.clone();
        assert!(!b.is_requested() || signalled());
        a.request();
        assert!(b.is_requested());
    }
}
