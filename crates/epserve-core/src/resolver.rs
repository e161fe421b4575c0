//! Static resource resolution.
//!
//! A `Resolver` maps a request target to an open file under the served
//! root and reports its size and MIME type.
//!
//! # Implementors
//!
//! - `FsResolver` (default): joins the target onto a root directory,
//!   optionally confining the result to that root.

use std::fs::File;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// An opened, ready-to-send file.
#[derive(Debug)]
pub struct Resource {
    pub file: File,
    pub path: PathBuf,
    pub len: u64,
    pub mime: &'static str,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    /// Maps to `403`.
    #[error("permission denied: {}", .0.display())]
    Forbidden(PathBuf),

    /// Maps to `404`.
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Maps to `500`. Open or metadata failed for any other reason.
    #[error("cannot serve {}: {source}", .path.display())]
    Internal {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Target → file lookup.
///
/// **Contract:** a file opened during `resolve()` is either returned inside
/// the `Resource` or closed before returning an error.
pub trait Resolver: Send + Sync {
    fn resolve(&self, target: &str) -> Result<Resource, ResolveError>;
}
