//! Server configuration
//!
//! Provides library defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Command-line flags (`-p`, `-f`, `-n`), applied by the binary
//! 2. Environment variables (`EPSERVE_*`)
//! 3. Library defaults (`config::defaults`)
//!
//! # Example
//!
//! ```rust,ignore
//! use epserve_runtime::config::ServerConfig;
//!
//! // Use defaults with env overrides
//! let config = ServerConfig::from_env();
//!
//! // Or customize programmatically
//! let config = ServerConfig::from_env()
//!     .port(0)
//!     .num_workers(4)
//!     .idle_timeout(Duration::from_secs(5));
//! ```

pub mod defaults;

use std::path::PathBuf;
use std::time::Duration;

use epserve_core::env::{env_get, env_get_bool, env_get_str};
use epserve_core::error::ServeError;
use tracing::info;

/// Server configuration with builder pattern.
///
/// Use `from_env()` to start with library defaults and apply any
/// environment variable overrides.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port; 0 picks an ephemeral port
    pub port: u16,
    /// Document root
    pub root: PathBuf,
    /// Number of worker threads
    pub num_workers: usize,
    /// `listen(2)` backlog
    pub backlog: i32,
    /// Bounded multiplexer wait
    pub poll_timeout: Duration,
    /// Idle connection timeout; zero disables the sweep
    pub idle_timeout: Duration,
    /// Request head size cap
    pub max_header_bytes: usize,
    /// Bytes per socket read
    pub read_chunk: usize,
    /// Bytes per `sendfile(2)` call
    pub sendfile_chunk: usize,
    /// Body bytes per connection per write event
    pub write_budget: usize,
    /// Reports per multiplexer wait
    pub max_events: usize,
    /// Per-worker handoff queue capacity
    pub inbox_capacity: usize,
    /// Confine resolved paths to the document root
    pub confine_root: bool,
    /// `Server` header value
    pub server_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ServerConfig {
    /// Create config from library defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `EPSERVE_PORT` - TCP port
    /// - `EPSERVE_ROOT` - Document root
    /// - `EPSERVE_WORKERS` - Number of worker threads
    /// - `EPSERVE_BACKLOG` - Listen backlog
    /// - `EPSERVE_POLL_TIMEOUT_MS` - Multiplexer wait in milliseconds
    /// - `EPSERVE_IDLE_TIMEOUT_SECS` - Idle timeout in seconds (0 disables)
    /// - `EPSERVE_MAX_HEADER_BYTES` - Request head size cap
    /// - `EPSERVE_READ_CHUNK` - Bytes per socket read
    /// - `EPSERVE_SENDFILE_CHUNK` - Bytes per sendfile call
    /// - `EPSERVE_WRITE_BUDGET` - Body bytes per connection per event
    /// - `EPSERVE_MAX_EVENTS` - Reports per multiplexer wait
    /// - `EPSERVE_INBOX_CAPACITY` - Per-worker handoff queue size
    /// - `EPSERVE_CONFINE_ROOT` - Root confinement (true/false)
    pub fn from_env() -> Self {
        Self {
            port: env_get("EPSERVE_PORT", defaults::PORT),
            root: PathBuf::from(env_get_str("EPSERVE_ROOT", defaults::ROOT)),
            num_workers: env_get("EPSERVE_WORKERS", defaults::NUM_WORKERS),
            backlog: env_get("EPSERVE_BACKLOG", defaults::BACKLOG),
            poll_timeout: Duration::from_millis(env_get(
                "EPSERVE_POLL_TIMEOUT_MS",
                defaults::POLL_TIMEOUT_MS,
            )),
            idle_timeout: Duration::from_secs(env_get(
                "EPSERVE_IDLE_TIMEOUT_SECS",
                defaults::IDLE_TIMEOUT_SECS,
            )),
            max_header_bytes: env_get("EPSERVE_MAX_HEADER_BYTES", defaults::MAX_HEADER_BYTES),
            read_chunk: env_get("EPSERVE_READ_CHUNK", defaults::READ_CHUNK),
            sendfile_chunk: env_get("EPSERVE_SENDFILE_CHUNK", defaults::SENDFILE_CHUNK),
            write_budget: env_get("EPSERVE_WRITE_BUDGET", defaults::WRITE_BUDGET),
            max_events: env_get("EPSERVE_MAX_EVENTS", defaults::MAX_EVENTS),
            inbox_capacity: env_get("EPSERVE_INBOX_CAPACITY", defaults::INBOX_CAPACITY),
            confine_root: env_get_bool("EPSERVE_CONFINE_ROOT", defaults::CONFINE_ROOT),
            server_name: defaults::SERVER_NAME.to_string(),
        }
    }

    /// Create config with explicit defaults (no env override).
    /// Useful for testing or when you want full control.
    pub fn new() -> Self {
        Self {
            port: defaults::PORT,
            root: PathBuf::from(defaults::ROOT),
            num_workers: defaults::NUM_WORKERS,
            backlog: defaults::BACKLOG,
            poll_timeout: Duration::from_millis(defaults::POLL_TIMEOUT_MS),
            idle_timeout: Duration::from_secs(defaults::IDLE_TIMEOUT_SECS),
            max_header_bytes: defaults::MAX_HEADER_BYTES,
            read_chunk: defaults::READ_CHUNK,
            sendfile_chunk: defaults::SENDFILE_CHUNK,
            write_budget: defaults::WRITE_BUDGET,
            max_events: defaults::MAX_EVENTS,
            inbox_capacity: defaults::INBOX_CAPACITY,
            confine_root: defaults::CONFINE_ROOT,
            server_name: defaults::SERVER_NAME.to_string(),
        }
    }

    // Builder methods

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    pub fn backlog(mut self, backlog: i32) -> Self {
        self.backlog = backlog;
        self
    }

    pub fn poll_timeout(mut self, d: Duration) -> Self {
        self.poll_timeout = d;
        self
    }

    pub fn idle_timeout(mut self, d: Duration) -> Self {
        self.idle_timeout = d;
        self
    }

    pub fn max_header_bytes(mut self, n: usize) -> Self {
        self.max_header_bytes = n;
        self
    }

    pub fn read_chunk(mut self, n: usize) -> Self {
        self.read_chunk = n;
        self
    }

    pub fn sendfile_chunk(mut self, n: usize) -> Self {
        self.sendfile_chunk = n;
        self
    }

    pub fn write_budget(mut self, n: usize) -> Self {
        self.write_budget = n;
        self
    }

    pub fn max_events(mut self, n: usize) -> Self {
        self.max_events = n;
        self
    }

    pub fn inbox_capacity(mut self, n: usize) -> Self {
        self.inbox_capacity = n;
        self
    }

    pub fn confine_root(mut self, enable: bool) -> Self {
        self.confine_root = enable;
        self
    }

    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ServeError> {
        if self.num_workers == 0 {
            return Err(ServeError::config("num_workers must be > 0"));
        }
        if self.num_workers > 1024 {
            return Err(ServeError::config("num_workers must be <= 1024"));
        }
        if self.backlog <= 0 {
            return Err(ServeError::config("backlog must be > 0"));
        }
        if self.poll_timeout.is_zero() {
            return Err(ServeError::config("poll_timeout must be > 0"));
        }
        if self.max_header_bytes == 0 {
            return Err(ServeError::config("max_header_bytes must be > 0"));
        }
        if self.read_chunk == 0 {
            return Err(ServeError::config("read_chunk must be > 0"));
        }
        if self.sendfile_chunk == 0 {
            return Err(ServeError::config("sendfile_chunk must be > 0"));
        }
        if self.write_budget == 0 {
            return Err(ServeError::config("write_budget must be > 0"));
        }
        if self.max_events == 0 {
            return Err(ServeError::config("max_events must be > 0"));
        }
        if self.inbox_capacity == 0 {
            return Err(ServeError::config("inbox_capacity must be > 0"));
        }
        Ok(())
    }

    /// Log the effective configuration at `info`.
    pub fn log_summary(&self) {
        info!(
            port = self.port,
            root = %self.root.display(),
            workers = self.num_workers,
            backlog = self.backlog,
            poll_timeout = ?self.poll_timeout,
            idle_timeout = ?self.idle_timeout,
            max_header_bytes = self.max_header_bytes,
            confine_root = self.confine_root,
            "server configuration"
        );
    }
}
