//! `Server`: wires config, listener, workers and acceptor together.
//!
//! ```rust,ignore
//! let server = Server::bind(ServerConfig::from_env().port(8080))?;
//! let stop = server.shutdown_handle();
//! server.run()?; // blocks until `stop.request()` or SIGINT/SIGTERM
//! ```

use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use epserve_core::error::{Result, ServeError};
use epserve_core::resolver::Resolver;
use epserve_module::{FsResolver, Http1Codec};
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::handoff::Inbox;
use crate::listener::{self, Acceptor};
use crate::responder::Responder;
use crate::signal::Shutdown;
use crate::worker::{Worker, WorkerStats};

pub struct Server {
    config: ServerConfig,
    listener: TcpListener,
    responder: Arc<Responder>,
    shutdown: Shutdown,
}

impl Server {
    /// Validate `config`, prepare the document root and bind the port.
    pub fn bind(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let resolver: Arc<dyn Resolver> = if config.confine_root {
            let fs = FsResolver::confined(&config.root).map_err(|e| {
                ServeError::config(format!("document root {}: {e}", config.root.display()))
            })?;
            Arc::new(fs)
        } else {
            Arc::new(FsResolver::new(&config.root))
        };
        let responder = Arc::new(Responder::new(
            Arc::new(Http1Codec::new()),
            resolver,
            config.server_name.as_str(),
        ));

        let listener = listener::bind(config.port, config.backlog)?;
        Ok(Self { config, listener, responder, shutdown: Shutdown::new() })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle that stops `run()` from any thread.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Spawn the workers, accept on the calling thread until shutdown,
    /// then join the workers.
    pub fn run(self) -> Result<()> {
        let Server { config, listener, responder, shutdown } = self;
        info!(
            addr = ?listener.local_addr().ok(),
            root = %config.root.display(),
            workers = config.num_workers,
            "server starting"
        );

        let mut inboxes = Vec::with_capacity(config.num_workers);
        let mut handles = Vec::with_capacity(config.num_workers);
        for id in 0..config.num_workers {
            match spawn_worker(id, &config, &responder, &shutdown) {
                Ok((inbox, handle)) => {
                    inboxes.push(inbox);
                    handles.push(handle);
                }
                Err(e) => {
                    stop_workers(&shutdown, &inboxes, handles);
                    return Err(e);
                }
            }
        }

        match Acceptor::new(listener, inboxes.clone(), shutdown.clone(), config.poll_timeout) {
            Ok(acceptor) => acceptor.run(),
            Err(e) => {
                stop_workers(&shutdown, &inboxes, handles);
                return Err(e);
            }
        }

        let total = stop_workers(&shutdown, &inboxes, handles);
        info!(
            accepted = total.accepted,
            requests = total.requests,
            responses = total.responses,
            errors = total.errors,
            timeouts = total.timeouts,
            "server stopped"
        );
        Ok(())
    }
}

fn spawn_worker(
    id: usize,
    config: &ServerConfig,
    responder: &Arc<Responder>,
    shutdown: &Shutdown,
) -> Result<(Arc<Inbox>, JoinHandle<WorkerStats>)> {
    let inbox = Arc::new(Inbox::new(config.inbox_capacity).map_err(|e| ServeError::setup("eventfd", e))?);
    let worker = Worker::new(id, config, inbox.clone(), responder.clone(), shutdown.clone())
        .map_err(|e| ServeError::setup("epoll_create", e))?;
    let handle = thread::Builder::new()
        .name(format!("epserve-worker-{id}"))
        .spawn(move || worker.run())
        .map_err(|source| ServeError::Spawn { id, source })?;
    Ok((inbox, handle))
}

/// Request shutdown, wake every worker, join them and sum their counters.
fn stop_workers(shutdown: &Shutdown, inboxes: &[Arc<Inbox>], handles: Vec<JoinHandle<WorkerStats>>) -> WorkerStats {
    shutdown.request();
    for inbox in inboxes {
        inbox.wake();
    }

    let mut total = WorkerStats::default();
    for handle in handles {
        match handle.join() {
            Ok(s) => {
                total.accepted += s.accepted;
                total.requests += s.requests;
                total.responses += s.responses;
                total.errors += s.errors;
                total.timeouts += s.timeouts;
            }
            Err(_) => error!("worker thread panicked"),
        }
    }
    total
}
