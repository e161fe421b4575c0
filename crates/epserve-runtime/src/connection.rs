//! One accepted socket and its exchange in progress.
//!
//! A `Connection` alternates strictly between reading one request head and
//! writing one response. Bytes that arrive after a head's terminator stay
//! in the inbound buffer and become the start of the next exchange.

use std::time::{Duration, Instant};

use bytes::BytesMut;
use epserve_core::codec::{find_head_end, Codec, HEAD_TERMINATOR};
use epserve_core::error::ParseError;
use epserve_core::multiplexer::Interest;
use epserve_core::request::Request;
use epserve_core::response::Body;
use tracing::trace;

use crate::config::ServerConfig;
use crate::responder::Prepared;
use crate::state::{step, ConnState, Progress, Step};
use crate::transport::Transport;

/// Per-connection I/O bounds, copied from `ServerConfig`.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub read_chunk: usize,
    pub max_header_bytes: usize,
    pub sendfile_chunk: usize,
    pub write_budget: usize,
}

impl Limits {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            read_chunk: config.read_chunk,
            max_header_bytes: config.max_header_bytes,
            sendfile_chunk: config.sendfile_chunk,
            write_budget: config.write_budget,
        }
    }
}

#[derive(Debug)]
pub enum ReadOutcome {
    NeedMoreData,
    /// A head was cut from the buffer; parse failures are carried through
    /// and answered with 400.
    Complete(Result<Request, ParseError>),
    Closed,
}

impl ReadOutcome {
    pub fn progress(&self) -> Progress {
        match self {
            ReadOutcome::NeedMoreData => Progress::Pending,
            ReadOutcome::Complete(_) => Progress::Finished,
            ReadOutcome::Closed => Progress::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    NotDone,
    Done,
    Closed,
}

impl WriteOutcome {
    pub fn progress(self) -> Progress {
        match self {
            WriteOutcome::NotDone => Progress::Pending,
            WriteOutcome::Done => Progress::Finished,
            WriteOutcome::Closed => Progress::Failed,
        }
    }
}

pub struct Connection<T> {
    transport: T,
    limits: Limits,
    state: ConnState,
    /// Interest currently registered with the worker's multiplexer.
    registered: Interest,
    inbound: BytesMut,
    keep_alive: bool,
    head: Vec<u8>,
    head_sent: usize,
    body: Option<Body>,
    body_sent: u64,
    last_activity: Instant,
}

impl<T: Transport> Connection<T> {
    pub fn new(transport: T, limits: Limits) -> Self {
        Self {
            transport,
            limits,
            state: ConnState::ReadingRequest,
            registered: ConnState::ReadingRequest.interest(),
            inbound: BytesMut::with_capacity(limits.read_chunk),
            keep_alive: false,
            head: Vec::new(),
            head_sent: 0,
            body: None,
            body_sent: 0,
            last_activity: Instant::now(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Bytes received but not yet consumed by an exchange.
    pub fn buffered(&self) -> usize {
        self.inbound.len()
    }

    pub fn registered(&self) -> Interest {
        self.registered
    }

    pub fn set_registered(&mut self, interest: Interest) {
        self.registered = interest;
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) > timeout
    }

    /// One non-blocking read, then look for a complete head.
    pub fn on_readable(&mut self, codec: &dyn Codec) -> ReadOutcome {
        let start = self.inbound.len();
        self.inbound.resize(start + self.limits.read_chunk, 0);

        match self.transport.recv(&mut self.inbound[start..]) {
            Ok(0) => {
                self.inbound.truncate(start);
                trace!("peer closed");
                return ReadOutcome::Closed;
            }
            Ok(n) => {
                self.inbound.truncate(start + n);
                self.last_activity = Instant::now();
            }
            Err(e) if is_retry(&e) => {
                self.inbound.truncate(start);
                return ReadOutcome::NeedMoreData;
            }
            Err(e) => {
                self.inbound.truncate(start);
                trace!(error = %e, "read failed");
                return ReadOutcome::Closed;
            }
        }

        match self.try_buffered(codec) {
            Some(parsed) => ReadOutcome::Complete(parsed),
            None => ReadOutcome::NeedMoreData,
        }
    }

    /// Cut one head out of the inbound buffer if a complete one is there.
    ///
    /// A buffer past `max_header_bytes` without a terminator, or a head
    /// longer than that, is reported as a parse error and discarded.
    pub fn try_buffered(&mut self, codec: &dyn Codec) -> Option<Result<Request, ParseError>> {
        let max = self.limits.max_header_bytes;
        match find_head_end(&self.inbound) {
            Some(pos) => {
                let head = self.inbound.split_to(pos + HEAD_TERMINATOR.len());
                if head.len() > max {
                    return Some(Err(ParseError::too_large_header(head.len(), max)));
                }
                Some(codec.decode(&head))
            }
            None if self.inbound.len() > max => {
                let size = self.inbound.len();
                self.inbound.clear();
                Some(Err(ParseError::too_large_header(size, max)))
            }
            None => None,
        }
    }

    /// Attach the response for the head just read.
    pub fn start_response(&mut self, prepared: Prepared) {
        self.head = prepared.head;
        self.head_sent = 0;
        self.body = prepared.body;
        self.body_sent = 0;
        self.keep_alive = prepared.keep_alive;
    }

    /// Header first, then the body via `send_file` in bounded chunks.
    pub fn on_writable(&mut self) -> WriteOutcome {
        while self.head_sent < self.head.len() {
            match self.transport.send(&self.head[self.head_sent..]) {
                Ok(0) => return WriteOutcome::Closed,
                Ok(n) => {
                    self.head_sent += n;
                    self.last_activity = Instant::now();
                }
                Err(e) if is_retry(&e) => return WriteOutcome::NotDone,
                Err(e) => {
                    trace!(error = %e, "header send failed");
                    return WriteOutcome::Closed;
                }
            }
        }

        let Some(body) = &self.body else {
            return WriteOutcome::Done;
        };

        let mut moved = 0usize;
        while self.body_sent < body.len() {
            if moved >= self.limits.write_budget {
                return WriteOutcome::NotDone;
            }
            let remaining = body.len() - self.body_sent;
            let count = remaining.min(self.limits.sendfile_chunk as u64) as usize;
            let mut offset = self.body_sent as libc::off_t;

            match self.transport.send_file(body.file(), &mut offset, count) {
                Ok(0) => {
                    trace!(sent = self.body_sent, len = body.len(), "file ended early");
                    return WriteOutcome::Closed;
                }
                Ok(n) => {
                    self.body_sent = offset as u64;
                    moved += n;
                    self.last_activity = Instant::now();
                }
                Err(e) if is_retry(&e) => return WriteOutcome::NotDone,
                Err(e) => {
                    trace!(error = %e, "sendfile failed");
                    return WriteOutcome::Closed;
                }
            }
        }

        self.body = None;
        WriteOutcome::Done
    }

    /// Apply `progress` to the state machine.
    ///
    /// Entering `ReadingRequest` clears the finished exchange; buffered
    /// bytes are kept.
    pub fn advance(&mut self, progress: Progress) -> Step {
        let next = step(self.state, progress, self.keep_alive);
        if let Step::Enter(state) = next {
            if state == ConnState::ReadingRequest {
                self.reset();
            }
            self.state = state;
        }
        next
    }

    fn reset(&mut self) {
        self.head.clear();
        self.head_sent = 0;
        self.body = None;
        self.body_sent = 0;
        self.keep_alive = false;
    }

    /// Shut down both directions; the socket closes when `self` drops.
    pub fn close(self) {
        if let Err(e) = self.transport.shutdown() {
            trace!(error = %e, "shutdown failed");
        }
    }
}

fn is_retry(e: &std::io::Error) -> bool {
    matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::Interrupted)
}
