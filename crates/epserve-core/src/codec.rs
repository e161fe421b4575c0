//! HTTP codec abstraction.
//!
//! A `Codec` turns a complete request head into a `Request` and a
//! `Response` into the bytes of its status line and header block.
//!
//! # Implementors
//!
//! - `Http1Codec` (default): httparse-based HTTP/1.0 and HTTP/1.1.

use crate::error::ParseError;
use crate::request::Request;
use crate::response::Response;

/// Marks the end of a request head.
pub const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Request head parsing and response head serialization.
///
/// **Contract:**
/// - `decode()` receives exactly one head, terminator included, and never
///   sees body or pipelined bytes.
/// - `encode_head()` writes the status line, every header in order, and the
///   blank line. It never writes body bytes.
pub trait Codec: Send + Sync {
    fn decode(&self, head: &[u8]) -> Result<Request, ParseError>;

    fn encode_head(&self, response: &Response, dst: &mut Vec<u8>);
}

/// Offset of the first `CRLF CRLF` in `buf`, if any.
pub fn find_head_end(buf: &[u8]) -> Option<usize> {
    if buf.len() < HEAD_TERMINATOR.len() {
        return None;
    }
    buf.windows(HEAD_TERMINATOR.len())
        .position(|w| w == HEAD_TERMINATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_first_terminator() {
        let buf = b"GET / HTTP/1.1\r\n\r\nGET /a HTTP/1.1\r\n\r\n";
        assert_eq!(find_head_end(buf), Some(14));
    }

    #[test]
    fn short_or_missing() {
        assert_eq!(find_head_end(b""), None);
        assert_eq!(find_head_end(b"\r\n\r"), None);
        assert_eq!(find_head_end(b"GET / HTTP/1.1\r\nHost: x\r\n"), None);
        assert_eq!(find_head_end(b"\r\n\r\n"), Some(0));
    }
}
