//! Library defaults for `ServerConfig`.
//!
//! Every value here can be overridden by an `EPSERVE_*` environment
//! variable (see `ServerConfig::from_env`) or, for port, root and worker
//! count, on the command line.

/// TCP port to listen on
pub const PORT: u16 = 8080;

/// Document root served by the resolver
pub const ROOT: &str = "www";

/// Number of worker threads
pub const NUM_WORKERS: usize = 2;

/// `listen(2)` backlog
pub const BACKLOG: i32 = 4096;

/// Upper bound on a single multiplexer wait; also bounds shutdown latency
pub const POLL_TIMEOUT_MS: u64 = 1000;

/// Connections idle longer than this are closed (0 disables)
pub const IDLE_TIMEOUT_SECS: u64 = 60;

/// Largest request head accepted before answering 400
pub const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Bytes requested from the socket per read
pub const READ_CHUNK: usize = 4 * 1024;

/// Largest single `sendfile(2)` transfer
pub const SENDFILE_CHUNK: usize = 1024 * 1024;

/// Body bytes one connection may move per write-readiness event
pub const WRITE_BUDGET: usize = 4 * 1024 * 1024;

/// Readiness reports returned by one multiplexer wait
pub const MAX_EVENTS: usize = 1024;

/// Accepted sockets that may wait in a worker's inbox
pub const INBOX_CAPACITY: usize = 1024;

/// Refuse targets that resolve outside the document root
pub const CONFINE_ROOT: bool = true;

/// Value of the `Server` response header
pub const SERVER_NAME: &str = concat!("epserve/", env!("CARGO_PKG_VERSION"));
