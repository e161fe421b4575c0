//! Extension → MIME type lookup.

use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;

/// Returned for unknown or missing extensions.
pub const DEFAULT_MIME: &str = "text/plain";

static MIME_TYPES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("html", "text/html"),
        ("htm", "text/html"),
        ("css", "text/css"),
        ("js", "text/javascript"),
        ("txt", "text/plain"),
        ("json", "application/json"),
        ("pdf", "application/pdf"),
        ("jpeg", "image/jpeg"),
        ("jpg", "image/jpeg"),
        ("gif", "image/gif"),
        ("png", "image/png"),
        ("svg", "image/svg+xml"),
        ("ico", "image/vnd.microsoft.icon"),
        ("mp3", "audio/mpeg"),
        ("mp4", "video/mp4"),
    ])
});

/// MIME type for `path`, keyed on its extension (ASCII case-insensitive).
pub fn lookup(path: &Path) -> &'static str {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| MIME_TYPES.get(ext.to_ascii_lowercase().as_str()).copied())
        .unwrap_or(DEFAULT_MIME)
}
