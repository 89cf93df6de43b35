//! # Gatehouse Server
//!
//! Listeners, static responder and shutdown coordination for the Gatehouse
//! static file server.
//!
//! This crate provides:
//!
//! - Plain HTTP/1.1 and HTTP/1.1 over TLS connectors via Hyper and rustls,
//!   each independently disabled by port `0`
//! - A traversal-safe static file responder that never lists directories
//! - The `POST /shutdown?token=...` endpoint and its client counterpart
//! - A forward-only lifecycle: `Created → Configured → Running → Stopping → Stopped`
//!
//! ## Example
//!
//! ```rust,no_run
//! use gatehouse_middleware::stages::AccessFilter;
//! use gatehouse_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::builder()
//!         .http_port(8080)
//!         .static_root(".")
//!         .build();
//!
//!     Server::new(config, AccessFilter::allow_all()).run().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/gatehouse-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod server;
pub mod shutdown;
pub mod static_files;
pub mod tls;

pub use client::{StopClient, StopOutcome};
pub use config::{ServerConfig, ServerConfigBuilder, TlsFiles};
pub use error::{ServerError, TlsError};
pub use lifecycle::ServerState;
pub use server::{BoundServer, Server};
pub use shutdown::{ShutdownHandler, ShutdownSignal, StopHandle};
pub use static_files::{StaticFileError, StaticFiles, StaticFilesHandler};
