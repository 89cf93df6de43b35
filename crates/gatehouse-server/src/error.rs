//! Error types for the server crate.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while configuring, binding or stopping the server.
///
/// All of these are fatal. Per-request failures never surface here; they
/// become bare status codes on the wire.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The runtime configuration is unusable.
    #[error("Invalid server configuration: {0}")]
    Config(String),

    /// TLS material could not be loaded.
    #[error(transparent)]
    Tls(#[from] TlsError),

    /// A listener could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address that could not be bound.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Termination did not complete cleanly.
    #[error("Shutdown incomplete: {0}")]
    Shutdown(String),
}

impl ServerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Errors raised while loading PEM certificate and key files.
#[derive(Debug, Error)]
pub enum TlsError {
    /// A PEM file could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The certificate file held no certificates.
    #[error("No certificates found in {0}")]
    NoCertificates(PathBuf),

    /// The key file held no private key.
    #[error("No private key found in {0}")]
    NoPrivateKey(PathBuf),

    /// rustls rejected the certificate or key.
    #[error("Invalid TLS configuration: {0}")]
    Rustls(#[from] rustls::Error),
}
