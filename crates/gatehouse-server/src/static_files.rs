//! Static content responder.
//!
//! Serves files from a single root directory with:
//!
//! - Index resource lookup for directory requests (never a listing)
//! - `ETag` and `Last-Modified` headers with `304 Not Modified`
//! - `HEAD` support; every other method except `GET` gets `405`
//! - MIME type detection by extension
//!
//! # Security
//!
//! - Request paths are percent-decoded once, and NUL bytes are refused
//! - `..` segments are refused with 403, and so are dot-prefixed (hidden)
//!   segments unless [`StaticFiles::serve_hidden`] is set; `.well-known` is
//!   always served so ACME HTTP-01 challenges can be answered
//! - The resolved path is canonicalized and must stay under the canonical
//!   root, which also catches symlinks pointing outside it
//! - Error responses carry a status code and nothing else
//!
//! # Example
//!
//! ```rust,no_run
//! use gatehouse_server::static_files::StaticFiles;
//! use http::{HeaderMap, Method};
//!
//! let files = StaticFiles::new("/srv/www")?.index("index.html");
//! let response = files.handle("/styles.css", &HeaderMap::new(), &Method::GET)?;
//! # Ok::<(), gatehouse_server::static_files::StaticFileError>(())
//! ```

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use gatehouse_middleware::{
    BoxFuture, Handler, MiddlewareContext, PipelineOutcome, Request, Response, ResponseExt,
};
use http::{header, HeaderMap, Method, StatusCode};
use http_body_util::Full;
use thiserror::Error;

/// Errors that can occur when serving static files.
///
/// The message is for logs only; clients see [`status_code`](Self::status_code).
#[derive(Debug, Error)]
pub enum StaticFileError {
    /// The requested file was not found.
    #[error("File not found: {0}")]
    NotFound(String),

    /// The path is forbidden (traversal, hidden file, NUL byte).
    #[error("Forbidden path: {0}")]
    Forbidden(String),

    /// Method other than GET or HEAD.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// The root directory is unusable.
    #[error("Invalid static root {path}: {source}")]
    InvalidRoot {
        /// Configured root.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// I/O error while reading a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StaticFileError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::InvalidRoot { .. } | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Static file server bound to one canonical root directory.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    /// Canonical root directory
    root: PathBuf,

    /// Index file name (e.g., "index.html")
    index_file: Option<String>,

    /// Serve dot-prefixed segments other than `.well-known`
    serve_hidden: bool,
}

/// Dot-prefixed directory that is served even when hidden files are not.
pub const WELL_KNOWN_DIR: &str = ".well-known";

impl StaticFiles {
    /// Creates a static file server rooted at `root`.
    ///
    /// The root is canonicalized once here and fixed for the lifetime of
    /// the value.
    ///
    /// # Errors
    ///
    /// Returns [`StaticFileError::InvalidRoot`] if the root does not exist or
    /// is not a directory.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StaticFileError> {
        let path = root.as_ref();
        let root = path
            .canonicalize()
            .map_err(|source| StaticFileError::InvalidRoot {
                path: path.to_path_buf(),
                source,
            })?;
        if !root.is_dir() {
            return Err(StaticFileError::InvalidRoot {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
            });
        }
        Ok(Self {
            root,
            index_file: None,
            serve_hidden: false,
        })
    }

    /// Sets the index file to serve for directory requests.
    #[must_use]
    pub fn index<S: Into<String>>(mut self, index: S) -> Self {
        let index = index.into();
        self.index_file = (!index.is_empty()).then_some(index);
        self
    }

    /// Sets whether dot-prefixed path segments are served.
    #[must_use]
    pub fn serve_hidden(mut self, serve: bool) -> Self {
        self.serve_hidden = serve;
        self
    }

    /// Returns the canonical root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the configured index file.
    #[must_use]
    pub fn index_file(&self) -> Option<&str> {
        self.index_file.as_deref()
    }

    /// Handles a request for a static file.
    ///
    /// `request_path` is the raw (still percent-encoded) URI path.
    ///
    /// # Errors
    ///
    /// Returns an error if the method is not GET or HEAD, the path is
    /// forbidden, nothing servable exists at the path, or reading fails.
    pub fn handle(
        &self,
        request_path: &str,
        headers: &HeaderMap,
        method: &Method,
    ) -> Result<Response, StaticFileError> {
        if method != Method::GET && method != Method::HEAD {
            return Err(StaticFileError::MethodNotAllowed);
        }

        let file_path = self.resolve_path(request_path)?;

        if file_path.is_dir() {
            if let Some(ref index) = self.index_file {
                let index_path = file_path.join(index);
                if index_path.is_file() {
                    return self.serve_file(&index_path, headers, method);
                }
            }
            return Err(StaticFileError::NotFound(request_path.to_string()));
        }

        self.serve_file(&file_path, headers, method)
    }

    /// Resolves a request path to a canonical file path under the root.
    fn resolve_path(&self, request_path: &str) -> Result<PathBuf, StaticFileError> {
        let decoded = urlencoding::decode(request_path)
            .map_err(|_| StaticFileError::NotFound(request_path.to_string()))?;
        if decoded.contains('\0') {
            return Err(StaticFileError::Forbidden("NUL byte in path".to_string()));
        }

        let path = decoded.trim_start_matches('/');

        for component in Path::new(path).components() {
            match component {
                Component::ParentDir => {
                    return Err(StaticFileError::Forbidden(
                        "Directory traversal not allowed".to_string(),
                    ));
                }
                Component::Normal(name) => {
                    if !self.serve_hidden && is_hidden(name) {
                        return Err(StaticFileError::Forbidden(
                            "Hidden files not allowed".to_string(),
                        ));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(StaticFileError::Forbidden(
                        "Absolute path not allowed".to_string(),
                    ));
                }
                Component::CurDir => {}
            }
        }

        let canonical = self
            .root
            .join(path)
            .canonicalize()
            .map_err(|_| StaticFileError::NotFound(request_path.to_string()))?;

        if !canonical.starts_with(&self.root) {
            return Err(StaticFileError::Forbidden(
                "Path escapes root directory".to_string(),
            ));
        }

        Ok(canonical)
    }

    /// Serves a file from the filesystem.
    fn serve_file(
        &self,
        path: &Path,
        headers: &HeaderMap,
        method: &Method,
    ) -> Result<Response, StaticFileError> {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(StaticFileError::NotFound(path.display().to_string()));
        }
        let file_size = metadata.len();
        let modified = metadata.modified().ok();
        let etag = generate_etag(&metadata);

        if is_not_modified(headers, etag.as_deref(), modified) {
            return Ok(not_modified_response(etag.as_deref()));
        }

        let body = if method == Method::HEAD {
            Bytes::new()
        } else {
            Bytes::from(std::fs::read(path)?)
        };

        Ok(build_response(
            body,
            file_size,
            detect_mime_type(path),
            etag.as_deref(),
            modified,
        ))
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str()
        .is_some_and(|n| n.starts_with('.') && n != WELL_KNOWN_DIR)
}

/// Generates an `ETag` from modification time and size.
fn generate_etag(metadata: &std::fs::Metadata) -> Option<String> {
    let modified = metadata.modified().ok()?;
    let duration = modified.duration_since(SystemTime::UNIX_EPOCH).ok()?;
    Some(format!("\"{:x}-{:x}\"", duration.as_secs(), metadata.len()))
}

/// Checks `If-None-Match`, then `If-Modified-Since`.
fn is_not_modified(headers: &HeaderMap, etag: Option<&str>, modified: Option<SystemTime>) -> bool {
    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH) {
        let Ok(value) = if_none_match.to_str() else {
            return false;
        };
        return etag.is_some_and(|etag| {
            value
                .split(',')
                .map(str::trim)
                .any(|candidate| candidate == "*" || candidate == etag)
        });
    }

    let (Some(modified), Some(since)) = (
        modified,
        headers
            .get(header::IF_MODIFIED_SINCE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| httpdate::parse_http_date(v).ok()),
    ) else {
        return false;
    };

    // HTTP dates have one-second resolution
    match (
        modified.duration_since(SystemTime::UNIX_EPOCH),
        since.duration_since(SystemTime::UNIX_EPOCH),
    ) {
        (Ok(modified), Ok(since)) => modified.as_secs() <= since.as_secs(),
        _ => false,
    }
}

/// Detects the MIME type for a file.
fn detect_mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match extension.as_str() {
        // Text
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "md" => "text/markdown; charset=utf-8",

        // Images
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "avif" => "image/avif",

        // Fonts
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",

        // Documents
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",

        // Media
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",

        // Web
        "wasm" => "application/wasm",
        "webmanifest" => "application/manifest+json",

        _ => "application/octet-stream",
    }
}

/// Builds a `200 OK` response.
///
/// `Content-Length` always reports the file size, so `HEAD` answers match
/// the corresponding `GET`.
fn build_response(
    body: Bytes,
    file_size: u64,
    mime_type: &'static str,
    etag: Option<&str>,
    modified: Option<SystemTime>,
) -> Response {
    let mut response = http::Response::new(Full::new(body));
    let headers = response.headers_mut();

    headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static(mime_type));
    headers.insert(header::CONTENT_LENGTH, header::HeaderValue::from(file_size));

    if let Some(value) = etag.and_then(|e| header::HeaderValue::from_str(e).ok()) {
        headers.insert(header::ETAG, value);
    }
    if let Some(value) = modified
        .map(httpdate::fmt_http_date)
        .and_then(|d| header::HeaderValue::from_str(&d).ok())
    {
        headers.insert(header::LAST_MODIFIED, value);
    }

    response
}

/// Builds a `304 Not Modified` response.
fn not_modified_response(etag: Option<&str>) -> Response {
    let mut response = Response::empty(StatusCode::NOT_MODIFIED);
    if let Some(value) = etag.and_then(|e| header::HeaderValue::from_str(e).ok()) {
        response.headers_mut().insert(header::ETAG, value);
    }
    response
}

/// Pipeline handler serving [`StaticFiles`].
///
/// Missing files are declined so the pipeline's own 404 applies; every
/// other result, success or refusal, is claimed. File reads run on the
/// blocking pool.
#[derive(Debug, Clone)]
pub struct StaticFilesHandler {
    files: Arc<StaticFiles>,
}

impl StaticFilesHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new(files: StaticFiles) -> Self {
        Self {
            files: Arc::new(files),
        }
    }

    /// Returns the underlying file server.
    #[must_use]
    pub fn files(&self) -> &StaticFiles {
        &self.files
    }
}

impl Handler for StaticFilesHandler {
    fn name(&self) -> &'static str {
        "static"
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: &'a Request,
    ) -> BoxFuture<'a, Option<Response>> {
        Box::pin(async move {
            let files = Arc::clone(&self.files);
            let path = request.uri().path().to_string();
            let headers = request.headers().clone();
            let method = request.method().clone();

            let result =
                tokio::task::spawn_blocking(move || files.handle(&path, &headers, &method)).await;

            let response = match result {
                Ok(Ok(response)) => response,
                Ok(Err(StaticFileError::NotFound(_))) => return None,
                Ok(Err(err)) => {
                    let status = err.status_code();
                    if status.is_server_error() {
                        tracing::error!(error = %err, path = %request.uri().path(), "Static file error");
                    } else {
                        tracing::debug!(error = %err, path = %request.uri().path(), "Static file refused");
                    }
                    Response::empty(status)
                }
                Err(join_err) => {
                    tracing::error!(error = %join_err, "Static file task failed");
                    Response::empty(StatusCode::INTERNAL_SERVER_ERROR)
                }
            };

            ctx.set_outcome(PipelineOutcome::Static);
            Some(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_middleware::Connector;
    use http::HeaderValue;
    use hyper::body::Body;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_dir() -> TempDir {
        let dir = TempDir::new().unwrap();

        fs::write(dir.path().join("index.html"), "<html>Hello</html>").unwrap();
        fs::write(dir.path().join("style.css"), "body { color: red }").unwrap();
        fs::write(dir.path().join("data.json"), r#"{"key": "value"}"#).unwrap();
        fs::write(dir.path().join("image.png"), [0x89, 0x50, 0x4e, 0x47]).unwrap();
        fs::write(dir.path().join("hello world.txt"), "spaced").unwrap();
        fs::write(dir.path().join(".hidden"), "secret").unwrap();

        let challenge = dir.path().join(".well-known/acme-challenge");
        fs::create_dir_all(&challenge).unwrap();
        fs::write(challenge.join("abc123"), "abc123.thumbprint").unwrap();

        let subdir = dir.path().join("sub");
        fs::create_dir(&subdir).unwrap();
        fs::write(subdir.join("page.html"), "<html>Sub</html>").unwrap();

        fs::create_dir(dir.path().join("empty")).unwrap();

        dir
    }

    fn get(files: &StaticFiles, path: &str) -> Result<Response, StaticFileError> {
        files.handle(path, &HeaderMap::new(), &Method::GET)
    }

    #[test]
    fn test_new_canonicalizes_root() {
        let dir = create_test_dir();
        let files = StaticFiles::new(dir.path().join("sub/..")).unwrap();
        assert_eq!(files.root(), dir.path().canonicalize().unwrap());
        assert!(files.index_file().is_none());
    }

    #[test]
    fn test_new_rejects_missing_or_file_root() {
        let dir = create_test_dir();
        assert!(matches!(
            StaticFiles::new(dir.path().join("missing")),
            Err(StaticFileError::InvalidRoot { .. })
        ));
        assert!(matches!(
            StaticFiles::new(dir.path().join("style.css")),
            Err(StaticFileError::InvalidRoot { .. })
        ));
    }

    #[test]
    fn test_serve_html_file() {
        let dir = create_test_dir();
        let files = StaticFiles::new(dir.path()).unwrap();

        let response = get(&files, "/index.html").unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );
        assert_eq!(response.headers().get(header::CONTENT_LENGTH).unwrap(), "18");
    }

    #[test]
    fn test_serve_subdirectory_file() {
        let dir = create_test_dir();
        let files = StaticFiles::new(dir.path()).unwrap();

        let response = get(&files, "/sub/page.html").unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_percent_decoded_path() {
        let dir = create_test_dir();
        let files = StaticFiles::new(dir.path()).unwrap();

        let response = get(&files, "/hello%20world.txt").unwrap();
        assert_eq!(response.body().size_hint().exact(), Some(6));
    }

    #[test]
    fn test_directory_with_index() {
        let dir = create_test_dir();
        let files = StaticFiles::new(dir.path()).unwrap().index("index.html");

        let response = get(&files, "/").unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_directory_without_index_is_not_found() {
        let dir = create_test_dir();
        let files = StaticFiles::new(dir.path()).unwrap().index("index.html");

        assert!(matches!(get(&files, "/empty/"), Err(StaticFileError::NotFound(_))));

        let no_index = StaticFiles::new(dir.path()).unwrap();
        assert!(matches!(get(&no_index, "/"), Err(StaticFileError::NotFound(_))));
    }

    #[test]
    fn test_directory_traversal_blocked() {
        let dir = create_test_dir();
        let files = StaticFiles::new(dir.path().join("sub")).unwrap();

        for path in ["/../index.html", "/a/../../index.html", "/%2e%2e/index.html", "/..%2findex.html"] {
            let err = get(&files, path).unwrap_err();
            assert_eq!(err.status_code(), StatusCode::FORBIDDEN, "{path}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_blocked() {
        let dir = create_test_dir();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), "x").unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), dir.path().join("link.txt"))
            .unwrap();

        let files = StaticFiles::new(dir.path()).unwrap();
        let err = get(&files, "/link.txt").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_hidden_files_blocked() {
        let dir = create_test_dir();
        let files = StaticFiles::new(dir.path()).unwrap();

        let err = get(&files, "/.hidden").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        let err = get(&files, "/.well-known/.hidden").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_acme_challenge_served() {
        let dir = create_test_dir();
        let files = StaticFiles::new(dir.path()).unwrap();

        let response = get(&files, "/.well-known/acme-challenge/abc123").unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().size_hint().exact(), Some(17));
    }

    #[test]
    fn test_serve_hidden_toggle() {
        let dir = create_test_dir();
        let files = StaticFiles::new(dir.path()).unwrap().serve_hidden(true);

        let response = get(&files, "/.hidden").unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let err = get(&files, "/../etc/passwd").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_nul_byte_blocked() {
        let dir = create_test_dir();
        let files = StaticFiles::new(dir.path()).unwrap();

        let err = get(&files, "/index.html%00.txt").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_file_not_found() {
        let dir = create_test_dir();
        let files = StaticFiles::new(dir.path()).unwrap();

        let err = get(&files, "/nonexistent.html").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_method_not_allowed() {
        let dir = create_test_dir();
        let files = StaticFiles::new(dir.path()).unwrap();

        let err = files
            .handle("/index.html", &HeaderMap::new(), &Method::POST)
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_head_request() {
        let dir = create_test_dir();
        let files = StaticFiles::new(dir.path()).unwrap();

        let response = files
            .handle("/index.html", &HeaderMap::new(), &Method::HEAD)
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().size_hint().exact(), Some(0));
        assert_eq!(response.headers().get(header::CONTENT_LENGTH).unwrap(), "18");
    }

    #[test]
    fn test_validators_present() {
        let dir = create_test_dir();
        let files = StaticFiles::new(dir.path()).unwrap();

        let response = get(&files, "/style.css").unwrap();
        assert!(response.headers().contains_key(header::ETAG));
        assert!(response.headers().contains_key(header::LAST_MODIFIED));
    }

    #[test]
    fn test_if_none_match_returns_304() {
        let dir = create_test_dir();
        let files = StaticFiles::new(dir.path()).unwrap();

        let response = get(&files, "/style.css").unwrap();
        let etag = response.headers().get(header::ETAG).unwrap().clone();

        let mut headers = HeaderMap::new();
        headers.insert(header::IF_NONE_MATCH, etag);
        let response = files.handle("/style.css", &headers, &Method::GET).unwrap();

        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(response.body().size_hint().exact(), Some(0));
    }

    #[test]
    fn test_if_none_match_mismatch_serves() {
        let dir = create_test_dir();
        let files = StaticFiles::new(dir.path()).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("\"other\""));
        let response = files.handle("/style.css", &headers, &Method::GET).unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_if_modified_since_returns_304() {
        let dir = create_test_dir();
        let files = StaticFiles::new(dir.path()).unwrap();

        let response = get(&files, "/style.css").unwrap();
        let last_modified = response.headers().get(header::LAST_MODIFIED).unwrap().clone();

        let mut headers = HeaderMap::new();
        headers.insert(header::IF_MODIFIED_SINCE, last_modified);
        let response = files.handle("/style.css", &headers, &Method::GET).unwrap();

        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    }

    #[test]
    fn test_mime_type_detection() {
        assert_eq!(detect_mime_type(Path::new("a.HTML")), "text/html; charset=utf-8");
        assert_eq!(detect_mime_type(Path::new("a.json")), "application/json");
        assert_eq!(detect_mime_type(Path::new("a.png")), "image/png");
        assert_eq!(detect_mime_type(Path::new("a.wasm")), "application/wasm");
        assert_eq!(detect_mime_type(Path::new("Makefile")), "application/octet-stream");
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(StaticFileError::NotFound(String::new()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(StaticFileError::Forbidden(String::new()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(StaticFileError::MethodNotAllowed.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    }

    fn request(method: Method, uri: &str) -> Request {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_handler_declines_missing_file() {
        let dir = create_test_dir();
        let handler = StaticFilesHandler::new(StaticFiles::new(dir.path()).unwrap());
        let mut ctx = MiddlewareContext::new(None, Connector::Plain);

        let response = handler.handle(&mut ctx, &request(Method::GET, "/missing")).await;
        assert!(response.is_none());
        assert!(ctx.outcome().is_none());
    }

    #[tokio::test]
    async fn test_handler_refusal_is_bare() {
        let dir = create_test_dir();
        let handler = StaticFilesHandler::new(StaticFiles::new(dir.path()).unwrap());
        let mut ctx = MiddlewareContext::new(None, Connector::Plain);

        let response = handler
            .handle(&mut ctx, &request(Method::GET, "/.hidden"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().is_empty());
        assert_eq!(response.body().size_hint().exact(), Some(0));
        assert_eq!(ctx.outcome(), Some(PipelineOutcome::Static));
    }

    #[tokio::test]
    async fn test_handler_serves_file() {
        let dir = create_test_dir();
        let handler = StaticFilesHandler::new(StaticFiles::new(dir.path()).unwrap());
        let mut ctx = MiddlewareContext::new(None, Connector::Plain);

        let response = handler
            .handle(&mut ctx, &request(Method::GET, "/data.json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(ctx.outcome(), Some(PipelineOutcome::Static));
    }
}
