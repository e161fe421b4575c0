//! `FsResolver`: default `Resolver` implementation.
//!
//! The request path is appended to the root directory as a string, so a
//! target of `/docs/a.html` under root `www` becomes `www/docs/a.html`.
//! A target ending in `/` gets `index.html` appended.
//!
//! With confinement enabled the joined path is canonicalized and must
//! stay inside the canonical root; anything escaping it (via `..` or a
//! symlink) is refused as `Forbidden`.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use epserve_core::resolver::{ResolveError, Resolver, Resource};
use tracing::{debug, warn};

use crate::mime_table;

const INDEX_FILE: &str = "index.html";

#[derive(Debug, Clone)]
pub struct FsResolver {
    root: PathBuf,
    /// Canonical root; `Some` when confinement is on.
    confine: Option<PathBuf>,
}

impl FsResolver {
    /// Resolver without confinement: targets are joined onto `root`
    /// verbatim.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), confine: None }
    }

    /// Resolver that refuses any path outside `root`.
    ///
    /// Fails if the root cannot be canonicalized.
    pub fn confined(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        let canonical = fs::canonicalize(&root)?;
        Ok(Self { root, confine: Some(canonical) })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_confined(&self) -> bool {
        self.confine.is_some()
    }

    /// Filesystem path for `target`, before any confinement check.
    pub fn target_path(&self, target: &str) -> PathBuf {
        let end = target.find(['?', '#']).unwrap_or(target.len());
        let request_path = &target[..end];

        let mut path = OsString::from(self.root.as_os_str());
        if !request_path.starts_with('/') {
            path.push("/");
        }
        path.push(request_path);
        if request_path.is_empty() || request_path.ends_with('/') {
            path.push(INDEX_FILE);
        }
        PathBuf::from(path)
    }
}

impl FsResolver {
    /// The path actually opened. Under confinement this is the canonical
    /// path that passed the root check, so a link swapped in afterwards is
    /// not followed.
    fn checked_path(&self, target: &str, path: &Path) -> Result<PathBuf, ResolveError> {
        let Some(root) = &self.confine else {
            return Ok(path.to_path_buf());
        };
        let canonical = fs::canonicalize(path).map_err(|e| classify(path, e))?;
        if !canonical.starts_with(root) {
            warn!(uri = target, path = %canonical.display(), "target escapes document root");
            return Err(ResolveError::Forbidden(path.to_path_buf()));
        }
        Ok(canonical)
    }
}

impl Resolver for FsResolver {
    fn resolve(&self, target: &str) -> Result<Resource, ResolveError> {
        let path = self.target_path(target);
        let open_path = self.checked_path(target, &path)?;

        let file = File::open(&open_path).map_err(|e| classify(&path, e))?;
        let meta = match file.metadata() {
            Ok(meta) => meta,
            Err(source) => return Err(ResolveError::Internal { path, source }),
        };
        if !meta.is_file() {
            debug!(path = %path.display(), "not a regular file");
            return Err(ResolveError::NotFound(path));
        }

        let mime = mime_table::lookup(&path);
        Ok(Resource { file, len: meta.len(), mime, path })
    }
}

fn classify(path: &Path, err: io::Error) -> ResolveError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => ResolveError::Forbidden(path.to_path_buf()),
        io::ErrorKind::NotFound => ResolveError::NotFound(path.to_path_buf()),
        _ if err.raw_os_error() == Some(libc::ENOTDIR) => ResolveError::NotFound(path.to_path_buf()),
        _ => ResolveError::Internal { path: path.to_path_buf(), source: err },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn docroot() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>hi</h1>").unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs/index.html"), "docs").unwrap();
        fs::write(dir.path().join("docs/data.JSON"), "{}").unwrap();
        dir
    }

    #[test]
    fn target_path_joins_and_appends_index() {
        let r = FsResolver::new("www");
        assert_eq!(r.target_path("/a/b.css"), PathBuf::from("www/a/b.css"));
        assert_eq!(r.target_path("/"), PathBuf::from("www/index.html"));
        assert_eq!(r.target_path("/docs/"), PathBuf::from("www/docs/index.html"));
        assert_eq!(r.target_path("/x.html?v=1#top"), PathBuf::from("www/x.html"));
        assert_eq!(r.target_path("?q"), PathBuf::from("www/index.html"));
        assert_eq!(r.target_path("rel.txt"), PathBuf::from("www/rel.txt"));
    }

    #[test]
    fn resolves_file_with_size_and_mime() {
        let dir = docroot();
        let r = FsResolver::new(dir.path());
        let mut res = r.resolve("/").unwrap();
        assert_eq!(res.len, 11);
        assert_eq!(res.mime, "text/html");
        let mut body = String::new();
        res.file.read_to_string(&mut body).unwrap();
        assert_eq!(body, "<h1>hi</h1>");

        let res = r.resolve("/docs/data.JSON").unwrap();
        assert_eq!(res.mime, "application/json");
        assert_eq!(res.len, 2);
    }

    #[test]
    fn missing_and_directory_are_not_found() {
        let dir = docroot();
        let r = FsResolver::new(dir.path());
        assert!(matches!(r.resolve("/missing.txt"), Err(ResolveError::NotFound(_))));
        assert!(matches!(r.resolve("/docs"), Err(ResolveError::NotFound(_))));
        assert!(matches!(r.resolve("/index.html/nope"), Err(ResolveError::NotFound(_))));
    }

    #[test]
    fn confinement_refuses_traversal() {
        let outer = TempDir::new().unwrap();
        fs::write(outer.path().join("secret.txt"), "secret").unwrap();
        let root = outer.path().join("www");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("index.html"), "ok").unwrap();

        let confined = FsResolver::confined(&root).unwrap();
        assert!(confined.is_confined());
        assert!(confined.resolve("/index.html").is_ok());
        assert!(matches!(
            confined.resolve("/../secret.txt"),
            Err(ResolveError::Forbidden(_))
        ));
        assert!(matches!(
            confined.resolve("/../nothing-here"),
            Err(ResolveError::NotFound(_))
        ));

        let open = FsResolver::new(&root);
        assert!(open.resolve("/../secret.txt").is_ok());
    }

    #[test]
    fn confinement_refuses_symlink_escape() {
        let outer = TempDir::new().unwrap();
        fs::write(outer.path().join("secret.txt"), "secret").unwrap();
        let root = outer.path().join("www");
        fs::create_dir(&root).unwrap();
        std::os::unix::fs::symlink(outer.path().join("secret.txt"), root.join("link.txt")).unwrap();

        let confined = FsResolver::confined(&root).unwrap();
        assert!(matches!(confined.resolve("/link.txt"), Err(ResolveError::Forbidden(_))));
    }

    #[test]
    fn confined_opens_the_checked_canonical_path() {
        let dir = docroot();
        let root = fs::canonicalize(dir.path()).unwrap();
        std::os::unix::fs::symlink(root.join("docs/index.html"), root.join("alias.html")).unwrap();

        let confined = FsResolver::confined(&root).unwrap();
        let path = confined.target_path("/alias.html");
        let opened = confined.checked_path("/alias.html", &path).unwrap();
        assert_eq!(opened, root.join("docs/index.html"));

        let mut res = confined.resolve("/alias.html").unwrap();
        let mut body = String::new();
        res.file.read_to_string(&mut body).unwrap();
        assert_eq!(body, "docs");

        let open = FsResolver::new(&root);
        assert_eq!(open.checked_path("/alias.html", &path).unwrap(), path);
    }

    #[test]
    fn symlink_loop_is_internal_error() {
        let dir = docroot();
        let lp = dir.path().join("loop");
        std::os::unix::fs::symlink(&lp, &lp).unwrap();

        let r = FsResolver::new(dir.path());
        assert!(matches!(r.resolve("/loop"), Err(ResolveError::Internal { .. })));

        let confined = FsResolver::confined(dir.path()).unwrap();
        assert!(matches!(confined.resolve("/loop"), Err(ResolveError::Internal { .. })));
    }

    #[test]
    fn confined_requires_existing_root() {
        let dir = TempDir::new().unwrap();
        assert!(FsResolver::confined(dir.path().join("absent")).is_err());
    }

    #[test]
    fn unreadable_file_is_forbidden() {
        use std::os::unix::fs::PermissionsExt;

        // root bypasses file permission bits
        if unsafe { libc::geteuid() } == 0 {
            return;
        }
        let dir = docroot();
        let path = dir.path().join("locked.html");
        fs::write(&path, "x").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();

        let r = FsResolver::new(dir.path());
        assert!(matches!(r.resolve("/locked.html"), Err(ResolveError::Forbidden(_))));
    }
}
