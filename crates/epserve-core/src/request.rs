//! Parsed request head.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    /// Anything else. Kept verbatim so it can be logged.
    Other(String),
}

impl Method {
    pub fn parse(token: &str) -> Self {
        match token {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            other => Method::Other(other.to_string()),
        }
    }

    /// Methods the server answers. Everything else is `501`.
    #[inline]
    pub fn is_read(&self) -> bool {
        matches!(self, Method::Get | Method::Head)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Other(m) => m,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    /// Minor version as reported by HTTP/1.x parsers.
    pub fn from_minor(minor: u8) -> Option<Self> {
        match minor {
            0 => Some(Version::Http10),
            1 => Some(Version::Http11),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

/// One request head. Immutable once built; dropped at the end of its exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    target: String,
    version: Version,
    keep_alive: bool,
}

impl Request {
    /// `keep_alive_header` is whether a `Connection: Keep-Alive` header was
    /// present. HTTP/1.1 implies keep-alive without it.
    pub fn new(method: Method, target: String, version: Version, keep_alive_header: bool) -> Self {
        let keep_alive = keep_alive_header || version == Version::Http11;
        Self { method, target, version, keep_alive }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http11_implies_keep_alive() {
        let req = Request::new(Method::Get, "/".into(), Version::Http11, false);
        assert!(req.keep_alive());
    }

    #[test]
    fn http10_needs_the_header() {
        let plain = Request::new(Method::Get, "/".into(), Version::Http10, false);
        assert!(!plain.keep_alive());
        let asked = Request::new(Method::Get, "/".into(), Version::Http10, true);
        assert!(asked.keep_alive());
    }

    #[test]
    fn read_methods() {
        assert!(Method::parse("GET").is_read());
        assert!(Method::parse("HEAD").is_read());
        assert!(!Method::parse("POST").is_read());
        // Method tokens are case-sensitive.
        assert_eq!(Method::parse("get"), Method::Other("get".into()));
    }
}
