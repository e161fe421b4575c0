//! epserve error types.

use std::io;
use thiserror::Error;

/// Startup and configuration failures. Always fatal.
#[derive(Debug, Error)]
pub enum ServeError {
    /// A socket, bind, listen, option, or multiplexer call failed during setup.
    #[error("{op} failed: {source}")]
    Setup {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    /// The configuration cannot be served (zero workers, unusable root, ...).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker {id}: {source}")]
    Spawn {
        id: usize,
        #[source]
        source: io::Error,
    },
}

impl ServeError {
    pub fn setup(op: &'static str, source: io::Error) -> Self {
        Self::Setup { op, source }
    }

    pub fn config<S: ToString>(reason: S) -> Self {
        Self::Config(reason.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServeError>;

/// A request head the codec could not turn into a `Request`.
///
/// Every variant maps to `400 Bad Request`; none of them is silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("request line has no method")]
    MissingMethod,

    #[error("request line has no target")]
    MissingTarget,

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("header block is incomplete")]
    Incomplete,

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("invalid request head: {reason}")]
    Invalid { reason: String },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid<S: ToString>(reason: S) -> Self {
        Self::Invalid { reason: reason.to_string() }
    }
}
