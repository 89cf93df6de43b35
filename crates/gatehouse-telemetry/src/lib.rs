//! Process-level logging for Gatehouse.
//!
//! Every Gatehouse crate logs through `tracing` macros; this crate owns the
//! one place where a subscriber is installed. The binary calls
//! [`init_logging`] once at startup, before any connector binds.
//!
//! ```rust,ignore
//! use gatehouse_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development())?;
//! ```

#![doc(html_root_url = "https://docs.rs/gatehouse-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, LogConfig, REQUEST_LOG_TARGET};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
