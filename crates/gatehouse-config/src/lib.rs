//! Typed configuration system for Gatehouse.
//!
//! This crate provides a strongly-typed configuration system with support for:
//! - TOML and JSON configuration files
//! - Environment variable overrides
//! - Strict validation (fails on unknown fields)
//! - Layered configuration (defaults → file → env)
//!
//! # Overview
//!
//! [`GatehouseConfig`] groups the sections:
//!
//! - [`ServerSection`] - plain connector, static root, timeouts
//! - [`TlsSection`] - TLS connector and PEM material
//! - [`AccessSection`] - header allow-list and address rules
//! - [`ShutdownSection`] - shutdown token and stop client
//! - [`LoggingSection`] - log level and format
//!
//! # Example
//!
//! ```no_run
//! use gatehouse_config::ConfigLoader;
//!
//! # fn main() -> Result<(), gatehouse_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_defaults()
//!     .with_file("gatehouse.toml")?
//!     .with_env_prefix("GATEHOUSE")
//!     .load()?;
//!
//! println!("Serving {} on port {}", config.server.static_dir, config.server.http_port);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! bind_host = "0.0.0.0"
//! http_port = 8080
//! static_dir = "~/site"
//! index_file = "index.html"
//! max_body_bytes = 65536
//!
//! [tls]
//! port = 8443
//! cert_path = "/etc/letsencrypt/live/example.org/fullchain.pem"
//! key_path = "/etc/letsencrypt/live/example.org/privkey.pem"
//!
//! [access.header_rules]
//! "User-Agent" = ["gatehouse-stop", "Let's Encrypt validation server"]
//!
//! [shutdown]
//! token = "679e6682dfbd7b22eeffef6bd02ac7b2"
//! require_token = true
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Values can be overridden via environment variables using the format
//! `PREFIX__SECTION__KEY`, for example:
//!
//! - `GATEHOUSE__SERVER__HTTP_PORT=9000`
//! - `GATEHOUSE__TLS__PORT=0`
//! - `GATEHOUSE__SHUTDOWN__TOKEN=s3cret`

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::*;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
