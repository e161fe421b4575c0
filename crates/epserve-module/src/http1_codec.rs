//! `Http1Codec`: default `Codec` implementation.
//!
//! Decoding uses `httparse` on the complete head block the connection has
//! already cut out of its inbound buffer. Only the request line and the
//! `Connection` header are interpreted; every other header is accepted and
//! ignored.
//!
//! Encoding always writes an `HTTP/1.1` status line followed by the
//! response's header lines in insertion order.

use epserve_core::codec::Codec;
use epserve_core::error::ParseError;
use epserve_core::request::{Method, Request, Version};
use epserve_core::response::Response;

use httparse::{Error, Status};
use tracing::trace;

/// Maximum number of headers allowed in a request
const MAX_HEADER_NUM: usize = 64;

/// Initial buffer size reserved for header serialization
const INIT_HEADER_SIZE: usize = 256;

#[derive(Debug, Default, Clone, Copy)]
pub struct Http1Codec;

impl Http1Codec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for Http1Codec {
    fn decode(&self, head: &[u8]) -> Result<Request, ParseError> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut req = httparse::Request::new(&mut headers);

        let status = req.parse(head).map_err(|e| match e {
            Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            Error::Version => ParseError::InvalidVersion(None),
            e => ParseError::invalid(e),
        })?;

        if let Status::Partial = status {
            return Err(ParseError::Incomplete);
        }

        let method = req.method.ok_or(ParseError::MissingMethod)?;
        let target = req.path.ok_or(ParseError::MissingTarget)?;
        if target.is_empty() {
            return Err(ParseError::MissingTarget);
        }
        let version = req
            .version
            .and_then(Version::from_minor)
            .ok_or(ParseError::InvalidVersion(req.version))?;

        let keep_alive = req
            .headers
            .iter()
            .any(|h| h.name.eq_ignore_ascii_case("Connection") && has_token(h.value, b"keep-alive"));

        trace!(method, uri = target, ?version, keep_alive, "decoded request head");

        Ok(Request::new(Method::parse(method), target.to_string(), version, keep_alive))
    }

    fn encode_head(&self, response: &Response, dst: &mut Vec<u8>) {
        let status = response.status();
        dst.reserve(INIT_HEADER_SIZE);

        dst.extend_from_slice(b"HTTP/1.1 ");
        dst.extend_from_slice(status.as_u16().to_string().as_bytes());
        dst.push(b' ');
        dst.extend_from_slice(status.reason_phrase().as_bytes());
        dst.extend_from_slice(b"\r\n");

        for (name, value) in response.headers() {
            dst.extend_from_slice(name.as_bytes());
            dst.extend_from_slice(b": ");
            dst.extend_from_slice(value.as_bytes());
            dst.extend_from_slice(b"\r\n");
        }
        dst.extend_from_slice(b"\r\n");
    }
}

/// Whether a comma-separated header value contains `token` (ASCII
/// case-insensitive).
fn has_token(value: &[u8], token: &[u8]) -> bool {
    value
        .split(|&b| b == b',')
        .any(|part| trim(part).eq_ignore_ascii_case(token))
}

fn trim(mut bytes: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = bytes {
        if !first.is_ascii_whitespace() {
            break;
        }
        bytes = rest;
    }
    while let [rest @ .., last] = bytes {
        if !last.is_ascii_whitespace() {
            break;
        }
        bytes = rest;
    }
    bytes
}
