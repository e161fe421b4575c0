//! # epserve-module: Default implementations
//!
//! This crate provides the default implementation for every epserve trait.
//! Each impl prioritizes correctness and simplicity over performance.
//!
//! ## Default stack
//!
//! | Trait        | Default Impl      | Notes                                |
//! |--------------|-------------------|--------------------------------------|
//! | Codec        | Http1Codec        | httparse, HTTP/1.0 + HTTP/1.1        |
//! | Resolver     | FsResolver        | root join, optional confinement      |
//! | Multiplexer  | EpollMultiplexer  | level-triggered epoll (Linux)        |
//! | Notifier     | EventFdNotifier   | eventfd counter (Linux)              |

pub mod fs_resolver;
pub mod http1_codec;
pub mod mime_table;

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        pub mod epoll_multiplexer;
        pub mod eventfd_notifier;

        pub use epoll_multiplexer::EpollMultiplexer;
        pub use eventfd_notifier::EventFdNotifier;
    } else {
        compile_error!("epserve-module requires Linux (epoll, eventfd)");
    }
}

pub use fs_resolver::FsResolver;
pub use http1_codec::Http1Codec;
