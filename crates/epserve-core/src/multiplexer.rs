//! Readiness multiplexer abstraction.
//!
//! A `Multiplexer` reports, without blocking past a bounded wait, which of
//! many registered descriptors are ready for reading or writing.
//!
//! # Implementors
//!
//! - `EpollMultiplexer` (default, Linux): level-triggered epoll.
//!
//! Each worker owns exactly one instance; instances are never shared
//! between threads.

use std::io;
use std::os::fd::BorrowedFd;
use std::time::Duration;

/// Typed handle carried through the multiplexer and back.
///
/// For connections it is the index into the owning worker's connection
/// table; a few high values are reserved for internal descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(pub usize);

impl Token {
    /// Reserved for a worker's wakeup descriptor.
    pub const WAKE: Token = Token(usize::MAX);
    /// Reserved for the acceptor's listening socket.
    pub const LISTENER: Token = Token(usize::MAX - 1);

    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// The single interest registered for a descriptor at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Readable,
    Writable,
}

/// One readiness report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub token: Token,
    pub readable: bool,
    pub writable: bool,
    /// Hang-up or error condition with neither direction ready.
    pub failed: bool,
}

impl Readiness {
    pub fn readable(token: Token) -> Self {
        Self { token, readable: true, writable: false, failed: false }
    }

    pub fn writable(token: Token) -> Self {
        Self { token, readable: false, writable: true, failed: false }
    }
}

/// Registration and bounded wait.
///
/// **Contract:**
/// - `wait()` returns after at most `timeout`, with zero or more reports.
/// - An interrupted wait is not an error; it reports zero events.
/// - After `deregister()` no further reports for that descriptor are
///   produced, even if the OS later reuses the descriptor number.
pub trait Multiplexer: Send {
    fn register(&self, fd: BorrowedFd<'_>, token: Token, interest: Interest) -> io::Result<()>;

    fn reregister(&self, fd: BorrowedFd<'_>, token: Token, interest: Interest) -> io::Result<()>;

    fn deregister(&self, fd: BorrowedFd<'_>) -> io::Result<()>;

    /// Clears `events` and fills it with the ready set.
    fn wait(&mut self, events: &mut Vec<Readiness>, timeout: Duration) -> io::Result<usize>;
}
