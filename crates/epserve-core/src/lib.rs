//! # epserve-core: Trait definitions and value types for epserve
//!
//! This crate defines the trait boundaries for every collaborator the
//! server runtime talks to. Each trait models one capability dimension.
//! Default implementations live in `epserve-module`.
//!
//! ## Design principle
//!
//! > "Program to the interface. Start safe. Optimize with a new impl,
//! >  not by modifying the existing one."
//!
//! The runtime depends on traits from this crate, never on concrete types.
//! Swapping an implementation is an `Arc<dyn Trait>` swap at server build time.
//!
//! ## Modules
//!
//! - `codec` - HTTP head parsing and response head serialization
//! - `resolver` - request target → open file + size + MIME
//! - `multiplexer` - readiness notification over many descriptors
//! - `notifier` - cross-thread wakeup of a blocked worker
//! - `request` / `response` / `status` - HTTP value types
//! - `error` - Error types
//! - `env` - Environment variable utilities

pub mod codec;
pub mod env;
pub mod error;
pub mod multiplexer;
pub mod notifier;
pub mod request;
pub mod resolver;
pub mod response;
pub mod status;

// Re-exports for convenience
pub use codec::{find_head_end, Codec, HEAD_TERMINATOR};
pub use env::{env_get, env_get_bool, env_get_opt, env_get_str};
pub use error::{ParseError, Result, ServeError};
pub use multiplexer::{Interest, Multiplexer, Readiness, Token};
pub use notifier::Notifier;
pub use request::{Method, Request, Version};
pub use resolver::{ResolveError, Resolver, Resource};
pub use response::{Body, Response};
pub use status::StatusCode;
