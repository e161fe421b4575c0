//! # epserve
//!
//! Static-file HTTP/1.x server. One acceptor thread deals connections
//! round robin to N worker threads, each running its own epoll loop;
//! file bodies go out with `sendfile(2)`.
//!
//! ## Usage
//!
//!     epserve [-p <port>] [-f <root dir>] [-n <num workers>]
//!
//! Flags override the `EPSERVE_*` environment variables, which override
//! the built-in defaults (port 8080, root `www`, 2 workers). Log verbosity
//! follows `RUST_LOG` (default `info`).
//!
//! ## Benchmark
//!
//!     wrk -t4 -c100 -d10s http://127.0.0.1:8080/

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use epserve_runtime::{install_handlers, Server, ServerConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "epserve [-p <port>] [-f <root dir>] [-n <num workers>]";

#[derive(Debug, Parser)]
#[command(
    name = "epserve",
    override_usage = USAGE,
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Cli {
    /// TCP port to listen on
    #[arg(short = 'p', value_name = "port")]
    port: Option<u16>,

    /// Document root
    #[arg(short = 'f', value_name = "root dir")]
    root: Option<PathBuf>,

    /// Number of worker threads
    #[arg(short = 'n', value_name = "num workers")]
    workers: Option<usize>,
}

impl Cli {
    fn apply(self, mut config: ServerConfig) -> ServerConfig {
        if let Some(port) = self.port {
            config = config.port(port);
        }
        if let Some(root) = self.root {
            config = config.root(root);
        }
        if let Some(n) = self.workers {
            config = config.num_workers(n);
        }
        config
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .init();
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // -h lands here too: every unrecognised flag is a usage error
            eprintln!("{e}");
            eprintln!("usage: {USAGE}");
            return ExitCode::FAILURE;
        }
    };

    init_logging();

    let config = cli.apply(ServerConfig::from_env());
    config.log_summary();

    if let Err(e) = install_handlers() {
        error!(error = %e, "startup failed");
        return ExitCode::FAILURE;
    }

    let server = match Server::bind(config) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "startup failed");
            return ExitCode::FAILURE;
        }
    };
    if let Ok(addr) = server.local_addr() {
        info!(%addr, "listening");
    }

    match server.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "server failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("epserve").chain(args.iter().copied()))
    }

    #[test]
    fn flags_override_config() {
        let cli = parse(&["-p", "9000", "-f", "/srv/www", "-n", "4"]).unwrap();
        let config = cli.apply(ServerConfig::new());
        assert_eq!(config.port, 9000);
        assert_eq!(config.root, PathBuf::from("/srv/www"));
        assert_eq!(config.num_workers, 4);
    }

    #[test]
    fn missing_flags_keep_config() {
        let config = parse(&[]).unwrap().apply(ServerConfig::new());
        assert_eq!(config.port, 8080);
        assert_eq!(config.root, PathBuf::from("www"));
        assert_eq!(config.num_workers, 2);
    }

    #[test]
    fn help_and_unknown_flags_are_errors() {
        assert!(parse(&["-h"]).is_err());
        assert!(parse(&["--help"]).is_err());
        assert!(parse(&["-x"]).is_err());
        assert!(parse(&["-p", "not-a-port"]).is_err());
    }
}
