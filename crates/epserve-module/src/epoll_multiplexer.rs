//! `EpollMultiplexer`: default `Multiplexer` implementation.
//!
//! Level-triggered epoll: a descriptor keeps being reported while it
//! remains ready, so a connection that stops early (write budget, full
//! socket buffer) is picked up again on the next wait.
//!
//! The `Token` travels in the event's `u64` data word.

use std::io;
use std::os::fd::BorrowedFd;
use std::time::Duration;

use epserve_core::multiplexer::{Interest, Multiplexer, Readiness, Token};
use nix::errno::Errno;
use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags, EpollTimeout};

pub struct EpollMultiplexer {
    epoll: Epoll,
    buf: Vec<EpollEvent>,
}

impl EpollMultiplexer {
    /// `max_events` bounds the reports returned by a single `wait()`.
    pub fn new(max_events: usize) -> io::Result<Self> {
        let epoll = Epoll::new(EpollCreateFlags::EPOLL_CLOEXEC)?;
        Ok(Self { epoll, buf: vec![EpollEvent::empty(); max_events.max(1)] })
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }
}

fn flags(interest: Interest) -> EpollFlags {
    match interest {
        Interest::Readable => EpollFlags::EPOLLIN | EpollFlags::EPOLLRDHUP,
        Interest::Writable => EpollFlags::EPOLLOUT,
    }
}

/// epoll takes at most `u16::MAX` ms through `EpollTimeout`; longer waits
/// are clamped.
fn to_timeout(timeout: Duration) -> EpollTimeout {
    let ms = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
    EpollTimeout::from(ms)
}

impl Multiplexer for EpollMultiplexer {
    fn register(&self, fd: BorrowedFd<'_>, token: Token, interest: Interest) -> io::Result<()> {
        self.epoll.add(fd, EpollEvent::new(flags(interest), token.index() as u64))?;
        Ok(())
    }

    fn reregister(&self, fd: BorrowedFd<'_>, token: Token, interest: Interest) -> io::Result<()> {
        let mut event = EpollEvent::new(flags(interest), token.index() as u64);
        self.epoll.modify(fd, &mut event)?;
        Ok(())
    }

    fn deregister(&self, fd: BorrowedFd<'_>) -> io::Result<()> {
        self.epoll.delete(fd)?;
        Ok(())
    }

    fn wait(&mut self, events: &mut Vec<Readiness>, timeout: Duration) -> io::Result<usize> {
        events.clear();
        let n = match self.epoll.wait(&mut self.buf, to_timeout(timeout)) {
            Ok(n) => n,
            Err(Errno::EINTR) => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        for ev in &self.buf[..n] {
            let f = ev.events();
            let readable = f.intersects(EpollFlags::EPOLLIN | EpollFlags::EPOLLRDHUP);
            let writable = f.contains(EpollFlags::EPOLLOUT);
            let hangup = f.intersects(EpollFlags::EPOLLERR | EpollFlags::EPOLLHUP);
            events.push(Readiness {
                token: Token(ev.data() as usize),
                readable,
                writable,
                failed: hangup && !readable && !writable,
            });
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventfd_notifier::EventFdNotifier;
    use epserve_core::notifier::Notifier;
    use std::io::Write;
    use std::os::fd::AsFd;
    use std::os::unix::net::UnixStream;
    use std::time::Instant;

    #[test]
    fn empty_wait_honours_timeout() {
        let mut mux = EpollMultiplexer::new(8).unwrap();
        let mut events = Vec::new();
        let start = Instant::now();
        assert_eq!(mux.wait(&mut events, Duration::from_millis(20)).unwrap(), 0);
        assert!(events.is_empty());
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn reports_token_for_readable_fd() {
        let mut mux = EpollMultiplexer::new(8).unwrap();
        let wake = EventFdNotifier::create().unwrap();
        mux.register(wake.as_fd(), Token::WAKE, Interest::Readable).unwrap();

        wake.notify().unwrap();
        let mut events = Vec::new();
        assert_eq!(mux.wait(&mut events, Duration::from_millis(100)).unwrap(), 1);
        assert_eq!(events[0], Readiness::readable(Token::WAKE));

        // level-triggered: still ready until drained
        assert_eq!(mux.wait(&mut events, Duration::from_millis(0)).unwrap(), 1);
        wake.drain().unwrap();
        assert_eq!(mux.wait(&mut events, Duration::from_millis(0)).unwrap(), 0);
    }

    #[test]
    fn reregister_switches_interest_and_deregister_silences() {
        let mut mux = EpollMultiplexer::new(8).unwrap();
        let (a, mut b) = UnixStream::pair().unwrap();
        a.set_nonblocking(true).unwrap();
        let mut events = Vec::new();

        mux.register(a.as_fd(), Token(3), Interest::Readable).unwrap();
        assert_eq!(mux.wait(&mut events, Duration::from_millis(0)).unwrap(), 0);
        b.write_all(b"x").unwrap();
        mux.wait(&mut events, Duration::from_millis(100)).unwrap();
        assert_eq!(events, vec![Readiness::readable(Token(3))]);

        mux.reregister(a.as_fd(), Token(3), Interest::Writable).unwrap();
        mux.wait(&mut events, Duration::from_millis(100)).unwrap();
        assert_eq!(events, vec![Readiness::writable(Token(3))]);

        mux.deregister(a.as_fd()).unwrap();
        assert_eq!(mux.wait(&mut events, Duration::from_millis(0)).unwrap(), 0);
    }

    #[test]
    fn peer_close_is_reported_readable() {
        let mut mux = EpollMultiplexer::new(8).unwrap();
        let (a, b) = UnixStream::pair().unwrap();
        mux.register(a.as_fd(), Token(0), Interest::Readable).unwrap();
        drop(b);
        let mut events = Vec::new();
        mux.wait(&mut events, Duration::from_millis(100)).unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].readable);
        assert!(!events[0].failed);
    }
}
