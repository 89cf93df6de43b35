//! Runtime server configuration.
//!
//! [`ServerConfig`] is the immutable value the server is built from. It is
//! assembled once at startup, usually from a `GatehouseConfig` loaded by
//! `gatehouse-config`, and never changes afterwards.
//!
//! # Example
//!
//! ```rust
//! use gatehouse_server::ServerConfig;
//! use std::time::Duration;
//!
//! let config = ServerConfig::builder()
//!     .http_port(8080)
//!     .static_root("/srv/www")
//!     .shutdown_token("RIGHT")
//!     .shutdown_timeout(Duration::from_secs(5))
//!     .build();
//!
//! assert_eq!(config.http_port(), 8080);
//! assert!(!config.tls_enabled());
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ServerError;

/// Default plain HTTP port.
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default pre-shared shutdown token.
pub const DEFAULT_SHUTDOWN_TOKEN: &str = "679e6682dfbd7b22eeffef6bd02ac7b2";

/// Default index resource served for directory requests.
pub const DEFAULT_INDEX_FILE: &str = "index.html";

/// Default per-connection idle bound in seconds.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30;

/// Default drain bound for in-flight connections in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 10;

/// Default cap on a buffered request body.
pub const DEFAULT_MAX_BODY_BYTES: u64 = 64 * 1024;

/// PEM certificate chain and private key for the TLS connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    /// Certificate chain in PEM format.
    pub cert_path: PathBuf,
    /// Private key in PEM format.
    pub key_path: PathBuf,
}

/// Server configuration.
///
/// Use [`ServerConfig::builder()`] to construct instances.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    bind_host: IpAddr,
    http_port: u16,
    tls_port: u16,
    tls_files: Option<TlsFiles>,
    static_root: PathBuf,
    index_file: Option<String>,
    shutdown_token: String,
    require_token: bool,
    idle_timeout: Duration,
    shutdown_timeout: Duration,
    max_body_bytes: u64,
    serve_hidden: bool,
}

impl ServerConfig {
    /// Creates a new server configuration builder.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Returns the interface both connectors bind to.
    #[must_use]
    pub fn bind_host(&self) -> IpAddr {
        self.bind_host
    }

    /// Returns the plain HTTP port; 0 means the connector is disabled.
    #[must_use]
    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    /// Returns the TLS port; 0 means the connector is disabled.
    #[must_use]
    pub fn tls_port(&self) -> u16 {
        self.tls_port
    }

    /// Returns `true` if the TLS connector is enabled.
    #[must_use]
    pub fn tls_enabled(&self) -> bool {
        self.tls_port != 0
    }

    /// Returns the TLS key material, if configured.
    #[must_use]
    pub fn tls_files(&self) -> Option<&TlsFiles> {
        self.tls_files.as_ref()
    }

    /// Returns the plain HTTP socket address, or `None` when disabled.
    #[must_use]
    pub fn http_addr(&self) -> Option<SocketAddr> {
        (self.http_port != 0).then(|| SocketAddr::new(self.bind_host, self.http_port))
    }

    /// Returns the TLS socket address, or `None` when disabled.
    #[must_use]
    pub fn tls_addr(&self) -> Option<SocketAddr> {
        self.tls_enabled()
            .then(|| SocketAddr::new(self.bind_host, self.tls_port))
    }

    /// Returns the static root directory.
    #[must_use]
    pub fn static_root(&self) -> &Path {
        &self.static_root
    }

    /// Returns the index resource name, if directory requests use one.
    #[must_use]
    pub fn index_file(&self) -> Option<&str> {
        self.index_file.as_deref()
    }

    /// Returns the shutdown token.
    #[must_use]
    pub fn shutdown_token(&self) -> &str {
        &self.shutdown_token
    }

    /// Returns `true` if the shutdown endpoint checks the token.
    #[must_use]
    pub fn require_token(&self) -> bool {
        self.require_token
    }

    /// Returns the per-connection idle bound.
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Returns the drain bound for in-flight connections.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Returns the largest request body the server buffers.
    #[must_use]
    pub fn max_body_bytes(&self) -> u64 {
        self.max_body_bytes
    }

    /// Returns `true` if dot-prefixed path segments are served.
    #[must_use]
    pub fn serve_hidden(&self) -> bool {
        self.serve_hidden
    }

    /// Checks that the configuration can be served.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if no connector is enabled, both
    /// connectors share a port, TLS is enabled without key material, the
    /// static root is not a directory, a required token is empty, or a
    /// timeout is zero.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.http_port == 0 && self.tls_port == 0 {
            return Err(ServerError::config("both connectors are disabled"));
        }
        if self.http_port != 0 && self.http_port == self.tls_port {
            return Err(ServerError::config(format!(
                "plain and TLS connectors both use port {}",
                self.http_port
            )));
        }
        if self.tls_enabled() && self.tls_files.is_none() {
            return Err(ServerError::config(
                "TLS connector enabled without certificate and key",
            ));
        }
        if !self.static_root.is_dir() {
            return Err(ServerError::config(format!(
                "static root {} is not a directory",
                self.static_root.display()
            )));
        }
        if self.require_token && self.shutdown_token.is_empty() {
            return Err(ServerError::config("shutdown token required but empty"));
        }
        if self.idle_timeout.is_zero() || self.shutdown_timeout.is_zero() {
            return Err(ServerError::config("timeouts must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Clone)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ServerConfig {
                bind_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                http_port: DEFAULT_HTTP_PORT,
                tls_port: 0,
                tls_files: None,
                static_root: PathBuf::from("."),
                index_file: Some(DEFAULT_INDEX_FILE.to_string()),
                shutdown_token: DEFAULT_SHUTDOWN_TOKEN.to_string(),
                require_token: true,
                idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
                shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
                max_body_bytes: DEFAULT_MAX_BODY_BYTES,
                serve_hidden: false,
            },
        }
    }

    /// Sets the interface both connectors bind to.
    #[must_use]
    pub fn bind_host(mut self, host: IpAddr) -> Self {
        self.config.bind_host = host;
        self
    }

    /// Sets the plain HTTP port; 0 disables the connector.
    #[must_use]
    pub fn http_port(mut self, port: u16) -> Self {
        self.config.http_port = port;
        self
    }

    /// Enables the TLS connector on `port` with the given PEM files.
    ///
    /// A port of 0 disables the connector.
    #[must_use]
    pub fn tls(
        mut self,
        port: u16,
        cert_path: impl Into<PathBuf>,
        key_path: impl Into<PathBuf>,
    ) -> Self {
        self.config.tls_port = port;
        self.config.tls_files = Some(TlsFiles {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        });
        self
    }

    /// Sets the TLS port without key material.
    ///
    /// Useful for explicitly disabling TLS with 0.
    #[must_use]
    pub fn tls_port(mut self, port: u16) -> Self {
        self.config.tls_port = port;
        self
    }

    /// Sets the static root directory.
    #[must_use]
    pub fn static_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.static_root = root.into();
        self
    }

    /// Sets the index resource name; `None` disables index lookup.
    #[must_use]
    pub fn index_file(mut self, index: Option<String>) -> Self {
        self.config.index_file = index.filter(|name| !name.is_empty());
        self
    }

    /// Sets the shutdown token.
    #[must_use]
    pub fn shutdown_token(mut self, token: impl Into<String>) -> Self {
        self.config.shutdown_token = token.into();
        self
    }

    /// Sets whether the shutdown endpoint checks the token.
    #[must_use]
    pub fn require_token(mut self, require: bool) -> Self {
        self.config.require_token = require;
        self
    }

    /// Sets the per-connection idle bound.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Sets the drain bound for in-flight connections.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    /// Sets the largest request body the server buffers.
    ///
    /// Requests announcing or sending more are answered with 413.
    #[must_use]
    pub fn max_body_bytes(mut self, limit: u64) -> Self {
        self.config.max_body_bytes = limit;
        self
    }

    /// Sets whether dot-prefixed path segments are served.
    #[must_use]
    pub fn serve_hidden(mut self, serve: bool) -> Self {
        self.config.serve_hidden = serve;
        self
    }

    /// Builds the [`ServerConfig`].
    #[must_use]
    pub fn build(self) -> ServerConfig {
        self.config
    }
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
