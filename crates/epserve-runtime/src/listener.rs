//! Listening socket and the acceptor loop.
//!
//! Setup uses plain syscalls: a dual-stack IPv6 wildcard socket when the
//! host allows it, otherwise the IPv4 wildcard. Any failure here is fatal.
//!
//! The acceptor waits on its own multiplexer so it can notice shutdown
//! within one poll timeout, then accepts until the socket would block and
//! deals the new connections out round robin.

use std::io;
use std::mem;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::fd::{AsFd, AsRawFd, FromRawFd, OwnedFd};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use epserve_core::error::{Result, ServeError};
use epserve_core::multiplexer::{Interest, Multiplexer, Token};
use epserve_module::EpollMultiplexer;
use tracing::{debug, info, trace, warn};

use crate::handoff::Inbox;
use crate::signal::Shutdown;

/// Bind the wildcard address on `port` and listen.
pub fn bind(port: u16, backlog: i32) -> Result<TcpListener> {
    let fd = match bind_v6(port, backlog) {
        Ok(fd) => fd,
        Err(e) => {
            debug!(error = %e, "dual-stack bind unavailable, falling back to IPv4");
            bind_v4(port, backlog)?
        }
    };
    Ok(TcpListener::from(fd))
}

fn bind_v6(port: u16, backlog: i32) -> Result<OwnedFd> {
    let fd = open_socket(libc::AF_INET6)?;
    set_opt(&fd, libc::IPPROTO_IPV6, libc::IPV6_V6ONLY, 0, "setsockopt(IPV6_V6ONLY)")?;
    set_common_opts(&fd)?;

    let mut addr: libc::sockaddr_in6 = unsafe { mem::zeroed() };
    addr.sin6_family = libc::AF_INET6 as libc::sa_family_t;
    addr.sin6_port = port.to_be();
    // sin6_addr zeroed = in6addr_any
    let ret = unsafe {
        libc::bind(
            fd.as_raw_fd(),
            &addr as *const _ as *const libc::sockaddr,
            mem::size_of_val(&addr) as libc::socklen_t,
        )
    };
    check(ret, "bind")?;
    listen(&fd, backlog)?;
    Ok(fd)
}

fn bind_v4(port: u16, backlog: i32) -> Result<OwnedFd> {
    let fd = open_socket(libc::AF_INET)?;
    set_common_opts(&fd)?;

    let mut addr: libc::sockaddr_in = unsafe { mem::zeroed() };
    addr.sin_family = libc::AF_INET as libc::sa_family_t;
    addr.sin_addr.s_addr = libc::INADDR_ANY;
    addr.sin_port = port.to_be();
    let ret = unsafe {
        libc::bind(
            fd.as_raw_fd(),
            &addr as *const _ as *const libc::sockaddr,
            mem::size_of_val(&addr) as libc::socklen_t,
        )
    };
    check(ret, "bind")?;
    listen(&fd, backlog)?;
    Ok(fd)
}

fn open_socket(domain: libc::c_int) -> Result<OwnedFd> {
    let fd = unsafe {
        libc::socket(
            domain,
            libc::SOCK_STREAM | libc::SOCK_CLOEXEC | libc::SOCK_NONBLOCK,
            0,
        )
    };
    check(fd, "socket")?;
    // SAFETY: socket() just returned this descriptor.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

fn set_common_opts(fd: &OwnedFd) -> Result<()> {
    set_opt(fd, libc::SOL_SOCKET, libc::SO_REUSEADDR, 1, "setsockopt(SO_REUSEADDR)")?;
    set_opt(fd, libc::IPPROTO_TCP, libc::TCP_QUICKACK, 1, "setsockopt(TCP_QUICKACK)")
}

fn set_opt(fd: &OwnedFd, level: libc::c_int, name: libc::c_int, value: libc::c_int, op: &'static str) -> Result<()> {
    let ret = unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            level,
            name,
            &value as *const _ as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    check(ret, op)
}

fn listen(fd: &OwnedFd, backlog: i32) -> Result<()> {
    let ret = unsafe { libc::listen(fd.as_raw_fd(), backlog) };
    check(ret, "listen")
}

fn check(ret: libc::c_int, op: &'static str) -> Result<()> {
    if ret < 0 {
        return Err(ServeError::setup(op, io::Error::last_os_error()));
    }
    Ok(())
}

/// Cursor over `0..len` that wraps after the last index.
#[derive(Debug, Clone)]
pub struct RoundRobin {
    next: usize,
    len: usize,
}

impl RoundRobin {
    pub fn new(len: usize) -> Self {
        Self { next: 0, len: len.max(1) }
    }

    pub fn next_index(&mut self) -> usize {
        let idx = self.next;
        self.next = (self.next + 1) % self.len;
        idx
    }
}

/// Pause after a failed accept (EMFILE and friends). The listener stays
/// readable while the error persists, so without it the acceptor spins.
#[derive(Debug, Default)]
struct AcceptBackoff {
    streak: u32,
}

impl AcceptBackoff {
    const BASE: Duration = Duration::from_millis(10);
    const MAX: Duration = Duration::from_secs(1);

    /// Record a failure and return how long to wait before the next accept.
    fn fail(&mut self) -> Duration {
        self.streak = self.streak.saturating_add(1);
        let shift = (self.streak - 1).min(16);
        Self::BASE.saturating_mul(1 << shift).min(Self::MAX)
    }

    fn reset(&mut self) {
        self.streak = 0;
    }

    /// Log only on 1, 2, 4, 8, ... consecutive failures.
    fn should_log(&self) -> bool {
        self.streak.is_power_of_two()
    }
}

pub struct Acceptor {
    listener: TcpListener,
    mux: EpollMultiplexer,
    inboxes: Vec<Arc<Inbox>>,
    cursor: RoundRobin,
    shutdown: Shutdown,
    poll_timeout: Duration,
    backoff: AcceptBackoff,
}

impl Acceptor {
    pub fn new(
        listener: TcpListener,
        inboxes: Vec<Arc<Inbox>>,
        shutdown: Shutdown,
        poll_timeout: Duration,
    ) -> Result<Self> {
        if inboxes.is_empty() {
            return Err(ServeError::config("acceptor needs at least one worker"));
        }
        let mux = EpollMultiplexer::new(1).map_err(|e| ServeError::setup("epoll_create", e))?;
        mux.register(listener.as_fd(), Token::LISTENER, Interest::Readable)
            .map_err(|e| ServeError::setup("epoll_ctl", e))?;
        let cursor = RoundRobin::new(inboxes.len());
        Ok(Self {
            listener,
            mux,
            inboxes,
            cursor,
            shutdown,
            poll_timeout,
            backoff: AcceptBackoff::default(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept until shutdown. Accept failures are logged, never fatal.
    pub fn run(mut self) {
        let mut events = Vec::with_capacity(1);
        info!(addr = ?self.listener.local_addr().ok(), workers = self.inboxes.len(), "accepting connections");

        while !self.shutdown.is_requested() {
            match self.mux.wait(&mut events, self.poll_timeout) {
                Ok(0) => {}
                Ok(_) => self.accept_ready(),
                Err(e) => warn!(error = %e, "acceptor wait failed"),
            }
        }
        debug!("acceptor stopped");
    }

    fn accept_ready(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    self.backoff.reset();
                    self.hand_off(stream, peer);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let delay = self.backoff.fail();
                    if self.backoff.should_log() {
                        warn!(error = %e, failures = self.backoff.streak, ?delay, "accept failed");
                    }
                    thread::sleep(delay);
                    return;
                }
            }
        }
    }

    fn hand_off(&mut self, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = stream.set_nonblocking(true) {
            warn!(%peer, error = %e, "cannot make socket non-blocking; dropping");
            return;
        }
        let idx = self.cursor.next_index();
        trace!(%peer, worker = idx, "accepted");
        if self.inboxes[idx].push(stream).is_err() {
            warn!(%peer, worker = idx, "worker inbox full; dropping connection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn round_robin_wraps() {
        let mut rr = RoundRobin::new(3);
        let picks: Vec<usize> = (0..7).map(|_| rr.next_index()).collect();
        assert_eq!(picks, [0, 1, 2, 0, 1, 2, 0]);

        let mut one = RoundRobin::new(1);
        assert_eq!((one.next_index(), one.next_index()), (0, 0));
    }

    #[test]
    fn accept_backoff_doubles_to_cap_and_resets() {
        let mut b = AcceptBackoff::default();
        let delays: Vec<Duration> = (0..4).map(|_| b.fail()).collect();
        assert_eq!(
            delays,
            [10, 20, 40, 80].map(Duration::from_millis)
        );
        for _ in 0..40 {
            assert!(b.fail() <= AcceptBackoff::MAX);
        }
        assert_eq!(b.fail(), AcceptBackoff::MAX);

        b.reset();
        assert_eq!(b.fail(), AcceptBackoff::BASE);
    }

    #[test]
    fn accept_failures_log_sparsely() {
        let mut b = AcceptBackoff::default();
        let logged: Vec<u32> = (1..=20)
            .filter(|_| {
                b.fail();
                b.should_log()
            })
            .collect();
        assert_eq!(logged, [1, 2, 4, 8, 16]);
    }

    #[test]
    fn binds_ephemeral_port_reachable_over_ipv4() {
        let listener = bind(0, 16).unwrap();
        let port = listener.local_addr().unwrap().port();
        assert_ne!(port, 0);
        TcpStream::connect((Ipv4Addr::LOCALHOST, port)).unwrap();
    }

    #[test]
    fn port_in_use_is_a_setup_error() {
        let first = bind(0, 16).unwrap();
        let port = first.local_addr().unwrap().port();
        // SO_REUSEADDR does not allow two listeners on one port
        assert!(matches!(bind(port, 16), Err(ServeError::Setup { .. })));
    }

    #[test]
    fn acceptor_deals_round_robin_and_stops() {
        let listener = bind(0, 16).unwrap();
        let port = listener.local_addr().unwrap().port();
        let inboxes: Vec<Arc<Inbox>> = (0..2).map(|_| Arc::new(Inbox::new(8).unwrap())).collect();
        let shutdown = Shutdown::new();
        let acceptor = Acceptor::new(listener, inboxes.clone(), shutdown.clone(), Duration::from_millis(20)).unwrap();
        let handle = thread::spawn(move || acceptor.run());

        let _clients: Vec<TcpStream> = (0..4)
            .map(|_| TcpStream::connect((Ipv4Addr::LOCALHOST, port)).unwrap())
            .collect();

        for _ in 0..100 {
            if inboxes.iter().map(|i| i.len()).sum::<usize>() == 4 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(inboxes[0].len(), 2);
        assert_eq!(inboxes[1].len(), 2);

        shutdown.request();
        handle.join().unwrap();
    }

    #[test]
    fn acceptor_requires_a_worker() {
        let listener = bind(0, 16).unwrap();
        assert!(Acceptor::new(listener, Vec::new(), Shutdown::new(), Duration::from_millis(10)).is_err());
    }
}
