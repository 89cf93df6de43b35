//! # Gatehouse
//!
//! A static file server with a header allow-list in front of every request
//! and a token-guarded `POST /shutdown` endpoint.
//!
//! This facade re-exports the workspace crates and holds the glue that turns
//! a loaded [`GatehouseConfig`](gatehouse_config::GatehouseConfig) into a
//! running server. The `gatehouse` binary is built on it:
//!
//! ```text
//! gatehouse [--config FILE] start [STATIC_DIR] [HTTP_PORT] [SECURE_PORT]
//! gatehouse [--config FILE] stop [HTTP_PORT]
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use gatehouse::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new().with_env_prefix("GATEHOUSE").load()?;
//!
//!     let server = Server::new(
//!         gatehouse::app::server_config(&config)?,
//!         gatehouse::app::access_filter(&config.access)?,
//!     );
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/gatehouse/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod app;

// Re-export configuration types
pub use gatehouse_config as config;

// Re-export middleware types
pub use gatehouse_middleware as middleware;

// Re-export server types
pub use gatehouse_server as server;

// Re-export telemetry types
pub use gatehouse_telemetry as telemetry;

/// Gatehouse version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use gatehouse::prelude::*;
///
/// let filter = AccessFilter::allow_all();
/// assert!(filter.is_allowed(None, &Default::default()));
/// ```
pub mod prelude {
    pub use gatehouse_config::{ConfigError, ConfigLoader, GatehouseConfig};

    pub use gatehouse_middleware::stages::{AccessFilter, AccessRuleSet, AddressRules};
    pub use gatehouse_middleware::{Pipeline, PipelineOutcome};

    pub use gatehouse_server::{
        BoundServer, Server, ServerConfig, ServerError, ServerState, StopClient, StopHandle,
        StopOutcome,
    };

    pub use gatehouse_telemetry::{init_logging, LogConfig};
}
