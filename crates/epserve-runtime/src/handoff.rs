//! Acceptor → worker handoff.
//!
//! Each worker owns one `Inbox`: a bounded lock-free queue of accepted
//! sockets plus an eventfd the worker watches under `Token::WAKE`. The
//! acceptor pushes and notifies; the worker drains the eventfd, pops, and
//! registers the sockets itself. A socket crosses threads exactly once.

use std::io;
use std::net::TcpStream;
use std::os::fd::{AsFd, BorrowedFd};

use crossbeam_queue::ArrayQueue;
use epserve_core::notifier::Notifier;
use epserve_module::EventFdNotifier;
use tracing::warn;

pub struct Inbox {
    queue: ArrayQueue<TcpStream>,
    notifier: EventFdNotifier,
}

impl Inbox {
    pub fn new(capacity: usize) -> io::Result<Self> {
        Ok(Self {
            queue: ArrayQueue::new(capacity.max(1)),
            notifier: EventFdNotifier::create()?,
        })
    }

    /// Hand `stream` to the owning worker. Gives the stream back when the
    /// inbox is full.
    pub fn push(&self, stream: TcpStream) -> Result<(), TcpStream> {
        self.queue.push(stream)?;
        self.wake();
        Ok(())
    }

    pub fn pop(&self) -> Option<TcpStream> {
        self.queue.pop()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Interrupt the worker's wait without handing anything over.
    pub fn wake(&self) {
        if let Err(e) = self.notifier.notify() {
            warn!(error = %e, "worker wakeup failed");
        }
    }

    /// Reset pending wakeups; called by the worker only.
    pub fn clear_wakeups(&self) {
        if let Err(e) = self.notifier.drain() {
            warn!(error = %e, "wakeup drain failed");
        }
    }

    pub fn wake_fd(&self) -> BorrowedFd<'_> {
        self.notifier.as_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn stream(listener: &TcpListener) -> TcpStream {
        TcpStream::connect(listener.local_addr().unwrap()).unwrap()
    }

    #[test]
    fn fifo_and_bounded() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let inbox = Inbox::new(2).unwrap();

        let first = stream(&listener);
        let first_port = first.local_addr().unwrap().port();
        assert!(inbox.push(first).is_ok());
        assert!(inbox.push(stream(&listener)).is_ok());
        assert!(inbox.push(stream(&listener)).is_err());
        assert_eq!(inbox.len(), 2);

        let popped = inbox.pop().unwrap();
        assert_eq!(popped.local_addr().unwrap().port(), first_port);
        inbox.pop().unwrap();
        assert!(inbox.pop().is_none());
        assert!(inbox.is_empty());

        inbox.clear_wakeups();
        inbox.clear_wakeups();
    }
}
