//! Response construction.
//!
//! Turns a parse outcome into the encoded head, optional file body and
//! keep-alive decision for one exchange.

use std::sync::Arc;
use std::time::SystemTime;

use epserve_core::codec::Codec;
use epserve_core::error::ParseError;
use epserve_core::request::{Method, Request};
use epserve_core::resolver::{ResolveError, Resolver};
use epserve_core::response::{Body, Response};
use epserve_core::status::StatusCode;
use tracing::{debug, warn};

/// A response ready to be written by a `Connection`.
#[derive(Debug)]
pub struct Prepared {
    pub status: StatusCode,
    /// Status line and headers, blank line included.
    pub head: Vec<u8>,
    pub body: Option<Body>,
    pub keep_alive: bool,
}

/// Shared by all workers; holds the codec and resolver.
pub struct Responder {
    codec: Arc<dyn Codec>,
    resolver: Arc<dyn Resolver>,
    server_name: String,
}

impl Responder {
    pub fn new(codec: Arc<dyn Codec>, resolver: Arc<dyn Resolver>, server_name: impl Into<String>) -> Self {
        Self { codec, resolver, server_name: server_name.into() }
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    pub fn respond(&self, parsed: Result<Request, ParseError>) -> Prepared {
        let request = match parsed {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "malformed request");
                return self.error(StatusCode::BadRequest);
            }
        };

        if !request.method().is_read() {
            debug!(method = %request.method(), uri = request.target(), "method not implemented");
            return self.error(StatusCode::NotImplemented);
        }

        let resource = match self.resolver.resolve(request.target()) {
            Ok(resource) => resource,
            Err(e) => {
                let status = match &e {
                    ResolveError::Forbidden(_) => StatusCode::Forbidden,
                    ResolveError::NotFound(_) => StatusCode::NotFound,
                    ResolveError::Internal { .. } => {
                        warn!(error = %e, "cannot serve resource");
                        StatusCode::InternalServerError
                    }
                };
                debug!(method = %request.method(), uri = request.target(), %status, "request refused");
                return self.error(status);
            }
        };

        let mut response = Response::new(StatusCode::Ok);
        self.common_headers(&mut response);
        if request.keep_alive() {
            response.append_header("Connection", "Keep-Alive");
        }
        response.append_header("Content-Length", resource.len.to_string());
        response.append_header("Content-Type", resource.mime);

        // HEAD drops the file here
        if *request.method() == Method::Get {
            response.set_body(Body::new(resource.file, resource.len));
        }

        debug!(
            method = %request.method(),
            uri = request.target(),
            len = resource.len,
            keep_alive = request.keep_alive(),
            "200 OK"
        );
        self.finish(response, request.keep_alive())
    }

    /// Error responses carry no body and close the connection.
    fn error(&self, status: StatusCode) -> Prepared {
        let mut response = Response::new(status);
        self.common_headers(&mut response);
        response.append_header("Content-Length", "0");
        self.finish(response, false)
    }

    fn common_headers(&self, response: &mut Response) {
        response.append_header("Server", self.server_name.as_str());
        response.append_header("Date", httpdate::fmt_http_date(SystemTime::now()));
    }

    fn finish(&self, mut response: Response, keep_alive: bool) -> Prepared {
        let mut head = Vec::new();
        self.codec.encode_head(&response, &mut head);
        Prepared {
            status: response.status(),
            head,
            body: response.take_body(),
            keep_alive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epserve_core::request::Version;
    use epserve_module::{FsResolver, Http1Codec};
    use std::fs;
    use tempfile::TempDir;

    fn responder(root: &std::path::Path) -> Responder {
        Responder::new(Arc::new(Http1Codec::new()), Arc::new(FsResolver::new(root)), "epserve/test")
    }

    fn docroot() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "hello world\n").unwrap();
        dir
    }

    fn get(target: &str, version: Version, keep_alive: bool) -> Result<Request, ParseError> {
        Ok(Request::new(Method::Get, target.to_string(), version, keep_alive))
    }

    fn parse_head(head: &[u8]) -> (u16, Vec<(String, String)>) {
        let mut headers = [httparse::EMPTY_HEADER; 16];
        let mut resp = httparse::Response::new(&mut headers);
        assert!(resp.parse(head).unwrap().is_complete());
        let pairs = resp
            .headers
            .iter()
            .map(|h| (h.name.to_string(), String::from_utf8_lossy(h.value).into_owned()))
            .collect();
        (resp.code.unwrap(), pairs)
    }

    fn names(headers: &[(String, String)]) -> Vec<&str> {
        headers.iter().map(|(n, _)| n.as_str()).collect()
    }

    #[test]
    fn success_headers_in_order_with_body() {
        let dir = docroot();
        let p = responder(dir.path()).respond(get("/", Version::Http11, false));
        assert_eq!(p.status, StatusCode::Ok);
        assert!(p.keep_alive);
        assert_eq!(p.body.as_ref().map(Body::len), Some(12));

        let (code, headers) = parse_head(&p.head);
        assert_eq!(code, 200);
        assert_eq!(
            names(&headers),
            ["Server", "Date", "Connection", "Content-Length", "Content-Type"]
        );
        assert_eq!(headers[0].1, "epserve/test");
        assert!(httpdate::parse_http_date(&headers[1].1).is_ok());
        assert_eq!(headers[2].1, "Keep-Alive");
        assert_eq!(headers[3].1, "12");
        assert_eq!(headers[4].1, "text/html");
    }

    #[test]
    fn http10_without_keep_alive_has_no_connection_header() {
        let dir = docroot();
        let p = responder(dir.path()).respond(get("/index.html", Version::Http10, false));
        assert!(!p.keep_alive);
        let (_, headers) = parse_head(&p.head);
        assert!(!names(&headers).contains(&"Connection"));
    }

    #[test]
    fn head_has_headers_but_no_body() {
        let dir = docroot();
        let req = Request::new(Method::Head, "/".into(), Version::Http11, false);
        let p = responder(dir.path()).respond(Ok(req));
        assert_eq!(p.status, StatusCode::Ok);
        assert!(p.body.is_none());
        let (_, headers) = parse_head(&p.head);
        assert!(headers.contains(&("Content-Length".to_string(), "12".to_string())));
    }

    #[test]
    fn error_statuses() {
        let dir = docroot();
        let r = responder(dir.path());

        let p = r.respond(Err(ParseError::MissingMethod));
        assert_eq!(p.status, StatusCode::BadRequest);

        let post = Request::new(Method::Other("POST".into()), "/".into(), Version::Http11, false);
        assert_eq!(r.respond(Ok(post)).status, StatusCode::NotImplemented);

        let p = r.respond(get("/missing.txt", Version::Http10, false));
        assert_eq!(p.status, StatusCode::NotFound);
        assert!(p.body.is_none());
        assert!(!p.keep_alive);
        let (code, headers) = parse_head(&p.head);
        assert_eq!(code, 404);
        assert_eq!(names(&headers), ["Server", "Date", "Content-Length"]);
        assert_eq!(headers[2].1, "0");
    }

    #[test]
    fn errors_close_even_when_keep_alive_requested() {
        let dir = docroot();
        let p = responder(dir.path()).respond(get("/nope", Version::Http11, true));
        assert_eq!(p.status, StatusCode::NotFound);
        assert!(!p.keep_alive);
    }

    #[test]
    fn unopenable_target_is_internal_error() {
        let dir = docroot();
        let lp = dir.path().join("loop");
        std::os::unix::fs::symlink(&lp, &lp).unwrap();

        let p = responder(dir.path()).respond(get("/loop", Version::Http11, true));
        assert_eq!(p.status, StatusCode::InternalServerError);
        assert!(p.body.is_none());
        assert!(!p.keep_alive);
        let (code, headers) = parse_head(&p.head);
        assert_eq!(code, 500);
        assert_eq!(names(&headers), ["Server", "Date", "Content-Length"]);
    }

    #[test]
    fn confined_traversal_is_forbidden() {
        let dir = docroot();
        let root = dir.path().join("www");
        fs::create_dir(&root).unwrap();
        let r = Responder::new(
            Arc::new(Http1Codec::new()),
            Arc::new(FsResolver::confined(&root).unwrap()),
            "epserve/test",
        );
        let p = r.respond(get("/../index.html", Version::Http11, false));
        assert_eq!(p.status, StatusCode::Forbidden);
    }
}
