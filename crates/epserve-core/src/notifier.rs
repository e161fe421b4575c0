//! Cross-thread wakeup abstraction.
//!
//! A `Notifier` wakes a worker that is blocked in its multiplexer wait so
//! it can pick up connections handed to it by the acceptor.
//!
//! # Implementors
//!
//! - `EventFdNotifier` (default): writes 1 to an eventfd that the worker
//!   has registered for read interest.

use std::io;

/// Wakes the worker owning the other end.
///
/// **Contract:**
/// - `notify()` must NEVER block.
/// - Multiple calls before the worker wakes are coalesced
///   (eventfd semantics: counter increments, one read drains).
/// - `drain()` resets the pending state and is only called by the owner.
pub trait Notifier: Send + Sync {
    fn notify(&self) -> io::Result<()>;

    fn drain(&self) -> io::Result<()>;
}
