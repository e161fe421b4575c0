//! Worker event loop.
//!
//! One thread per worker. Each owns an `EpollMultiplexer`, a `ConnTable`
//! of the connections handed to it, and the receiving end of its `Inbox`.
//! Connections never leave the worker that registered them.
//!
//! Per poll cycle:
//! 1. wait (bounded by `poll_timeout`)
//! 2. drive every reported connection, in reported order
//! 3. adopt sockets waiting in the inbox
//! 4. close connections idle past `idle_timeout`

use std::net::TcpStream;
use std::os::fd::AsFd;
use std::sync::Arc;
use std::time::{Duration, Instant};

use epserve_core::multiplexer::{Interest, Multiplexer, Readiness, Token};
use epserve_module::EpollMultiplexer;
use tracing::{debug, trace, warn};

use crate::config::ServerConfig;
use crate::connection::{Connection, Limits, ReadOutcome, WriteOutcome};
use crate::handoff::Inbox;
use crate::responder::Responder;
use crate::signal::Shutdown;
use crate::state::{ConnState, Progress, Step};
use crate::table::ConnTable;

const STATS_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub accepted: u64,
    pub requests: u64,
    pub responses: u64,
    pub errors: u64,
    pub timeouts: u64,
}

pub struct Worker {
    id: usize,
    mux: EpollMultiplexer,
    conns: ConnTable<Connection<TcpStream>>,
    inbox: Arc<Inbox>,
    responder: Arc<Responder>,
    shutdown: Shutdown,
    limits: Limits,
    poll_timeout: Duration,
    idle_timeout: Duration,
    stats: WorkerStats,
    last_stats: Instant,
}

impl Worker {
    pub fn new(
        id: usize,
        config: &ServerConfig,
        inbox: Arc<Inbox>,
        responder: Arc<Responder>,
        shutdown: Shutdown,
    ) -> std::io::Result<Self> {
        let mux = EpollMultiplexer::new(config.max_events)?;
        mux.register(inbox.wake_fd(), Token::WAKE, Interest::Readable)?;
        Ok(Self {
            id,
            mux,
            conns: ConnTable::with_capacity(config.max_events),
            inbox,
            responder,
            shutdown,
            limits: Limits::from_config(config),
            poll_timeout: config.poll_timeout,
            idle_timeout: config.idle_timeout,
            stats: WorkerStats::default(),
            last_stats: Instant::now(),
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }

    pub fn active(&self) -> usize {
        self.conns.len()
    }

    /// Run until shutdown, then close every live connection.
    pub fn run(mut self) -> WorkerStats {
        debug!(worker = self.id, "worker started");
        let mut events = Vec::with_capacity(self.mux.capacity());

        while !self.shutdown.is_requested() {
            self.poll_once(&mut events);
        }

        for token in self.conns.tokens() {
            self.teardown(token);
        }
        self.log_stats();
        debug!(worker = self.id, "worker stopped");
        self.stats
    }

    pub fn poll_once(&mut self, events: &mut Vec<Readiness>) {
        if let Err(e) = self.mux.wait(events, self.poll_timeout) {
            warn!(worker = self.id, error = %e, "multiplexer wait failed");
            return;
        }

        let mut woken = false;
        for ev in events.iter() {
            if ev.token == Token::WAKE {
                woken = true;
            } else {
                self.dispatch(*ev);
            }
        }

        if woken {
            self.inbox.clear_wakeups();
        }
        self.adopt_pending();

        let now = Instant::now();
        self.sweep_idle(now);
        if now.duration_since(self.last_stats) >= STATS_INTERVAL {
            self.log_stats();
            self.last_stats = now;
        }
    }

    fn dispatch(&mut self, ev: Readiness) {
        let Some(conn) = self.conns.get(ev.token) else {
            trace!(worker = self.id, token = ev.token.index(), "event for closed connection");
            return;
        };

        match (conn.state(), ev) {
            (_, Readiness { failed: true, .. }) => {
                trace!(worker = self.id, token = ev.token.index(), "hang-up");
                self.teardown(ev.token);
            }
            (ConnState::ReadingRequest, Readiness { readable: true, .. }) => self.handle_readable(ev.token),
            (ConnState::WritingResponse, Readiness { writable: true, .. }) => self.handle_writable(ev.token),
            (state, _) => {
                warn!(worker = self.id, token = ev.token.index(), ?state, ?ev, "unexpected readiness");
                self.stats.errors += 1;
                self.teardown(ev.token);
            }
        }
    }

    fn handle_readable(&mut self, token: Token) {
        let Some(conn) = self.conns.get_mut(token) else { return };
        let outcome = conn.on_readable(self.responder.codec());
        let progress = outcome.progress();
        if let ReadOutcome::Complete(parsed) = outcome {
            self.stats.requests += 1;
            conn.start_response(self.responder.respond(parsed));
        }
        self.apply(token, progress);
    }

    fn handle_writable(&mut self, token: Token) {
        let Some(conn) = self.conns.get_mut(token) else { return };
        let outcome = conn.on_writable();
        match outcome {
            WriteOutcome::Done => self.stats.responses += 1,
            WriteOutcome::Closed => self.stats.errors += 1,
            WriteOutcome::NotDone => {}
        }
        self.apply(token, outcome.progress());
    }

    /// Advance the state machine and keep the registered interest in step
    /// with the state.
    fn apply(&mut self, token: Token, progress: Progress) {
        let Some(conn) = self.conns.get_mut(token) else { return };

        match conn.advance(progress) {
            Step::Remain => return,
            Step::Close => {
                self.teardown(token);
                return;
            }
            Step::Enter(ConnState::ReadingRequest) => {
                // A pipelined head may already be buffered; no further read
                // readiness is guaranteed for it.
                if let Some(parsed) = conn.try_buffered(self.responder.codec()) {
                    self.stats.requests += 1;
                    conn.start_response(self.responder.respond(parsed));
                    conn.advance(Progress::Finished);
                }
            }
            Step::Enter(ConnState::WritingResponse) => {}
        }

        let want = conn.state().interest();
        if want == conn.registered() {
            return;
        }
        match self.mux.reregister(conn.transport().as_fd(), token, want) {
            Ok(()) => conn.set_registered(want),
            Err(e) => {
                warn!(worker = self.id, token = token.index(), error = %e, "reregister failed");
                self.stats.errors += 1;
                self.teardown(token);
            }
        }
    }

    fn adopt_pending(&mut self) {
        while let Some(stream) = self.inbox.pop() {
            self.adopt(stream);
        }
    }

    fn adopt(&mut self, stream: TcpStream) {
        let peer = stream.peer_addr().ok();
        let token = self.conns.insert(Connection::new(stream, self.limits));
        self.stats.accepted += 1;

        let Some(conn) = self.conns.get(token) else { return };
        if let Err(e) = self.mux.register(conn.transport().as_fd(), token, Interest::Readable) {
            warn!(worker = self.id, error = %e, "register failed");
            self.stats.errors += 1;
            if let Some(conn) = self.conns.remove(token) {
                conn.close();
            }
            return;
        }
        trace!(worker = self.id, token = token.index(), ?peer, "connection adopted");
    }

    fn sweep_idle(&mut self, now: Instant) {
        if self.idle_timeout.is_zero() {
            return;
        }
        let idle: Vec<Token> = self
            .conns
            .iter()
            .filter(|(_, conn)| conn.is_idle(now, self.idle_timeout))
            .map(|(token, _)| token)
            .collect();
        for token in idle {
            debug!(worker = self.id, token = token.index(), "idle timeout");
            self.stats.timeouts += 1;
            self.teardown(token);
        }
    }

    /// The single teardown path: remove, deregister, shut down, drop.
    fn teardown(&mut self, token: Token) {
        let Some(conn) = self.conns.remove(token) else { return };
        if let Err(e) = self.mux.deregister(conn.transport().as_fd()) {
            warn!(worker = self.id, token = token.index(), error = %e, "deregister failed");
        }
        conn.close();
    }

    fn log_stats(&self) {
        let s = &self.stats;
        debug!(
            worker = self.id,
            conns = self.conns.len(),
            accepted = s.accepted,
            requests = s.requests,
            responses = s.responses,
            errors = s.errors,
            timeouts = s.timeouts,
            "worker stats"
        );
    }
}
