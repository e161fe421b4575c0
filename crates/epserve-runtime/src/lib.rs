//! # epserve-runtime
//!
//! Server runtime for the epserve static-file server.
//!
//! This crate provides:
//! - Configuration (library defaults + `EPSERVE_*` environment overrides)
//! - Listening socket setup and the acceptor loop
//! - Per-worker epoll event loops over a worker-local connection table
//! - The per-connection read/write state machine (sendfile bodies)
//! - Response construction from codec + resolver
//! - Shutdown signalling (SIGINT/SIGTERM and programmatic)
//!
//! ## Threads
//!
//! ```text
//!   acceptor ──push──▶ Inbox[0] ──▶ worker 0 (epoll, ConnTable)
//!      │     ──push──▶ Inbox[1] ──▶ worker 1 (epoll, ConnTable)
//!      ▼                 ...
//!   round robin
//! ```

pub mod config;
pub mod connection;
pub mod handoff;
pub mod listener;
pub mod responder;
pub mod server;
pub mod signal;
pub mod state;
pub mod table;
pub mod transport;
pub mod worker;

cfg_if::cfg_if! {
    if #[cfg(not(target_os = "linux"))] {
        compile_error!("epserve-runtime requires Linux (epoll, eventfd, sendfile)");
    }
}

// Re-exports
pub use config::ServerConfig;
pub use connection::{Connection, Limits, ReadOutcome, WriteOutcome};
pub use responder::{Prepared, Responder};
pub use server::Server;
pub use signal::{install_handlers, Shutdown};
pub use state::{step, ConnState, Progress, Step};
pub use worker::WorkerStats;
