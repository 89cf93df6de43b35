//! Client side of the shutdown endpoint.
//!
//! [`StopClient::stop`] sends `POST /shutdown?token=...` to a running
//! instance. Stopping a server that is not running is not an error: every
//! outcome is reported as a [`StopOutcome`] and logged, never returned as
//! `Err`.
//!
//! # Example
//!
//! ```rust,no_run
//! use gatehouse_server::client::{StopClient, StopOutcome};
//!
//! # async fn example() {
//! match StopClient::new().stop(8080, "RIGHT").await {
//!     StopOutcome::Responded(status) if status.is_success() => println!("stopped"),
//!     StopOutcome::NotRunning => println!("nothing to stop"),
//!     other => println!("{other}"),
//! }
//! # }
//! ```

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use http::StatusCode;

use crate::shutdown::{SHUTDOWN_PATH, TOKEN_PARAM};

/// Default host the client connects to.
pub const DEFAULT_STOP_HOST: &str = "localhost";

/// Default bound on connecting plus reading the response.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of a stop attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// The server answered. `200` means the stop was accepted.
    Responded(StatusCode),
    /// Nothing was listening on the port.
    NotRunning,
    /// Any other transport failure, including timeouts.
    Failed(String),
}

impl StopOutcome {
    /// Returns `true` if the server accepted the stop.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Responded(status) if status.is_success())
    }
}

impl fmt::Display for StopOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Responded(status) => write!(
                f,
                "{} : {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            ),
            Self::NotRunning => f.write_str("server not running"),
            Self::Failed(reason) => write!(f, "stop failed: {reason}"),
        }
    }
}

/// One-shot client for the shutdown endpoint.
#[derive(Debug, Clone)]
pub struct StopClient {
    host: String,
    timeout: Duration,
    user_agent: String,
}

impl StopClient {
    /// Creates a client targeting `localhost` with the default timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            host: DEFAULT_STOP_HOST.to_string(),
            timeout: DEFAULT_STOP_TIMEOUT,
            user_agent: format!("gatehouse-stop/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Sets the host to connect to.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Targets a server bound to `bind_host`.
    ///
    /// A wildcard bind is reached through `localhost`.
    #[must_use]
    pub fn bind_host(self, bind_host: IpAddr) -> Self {
        match bind_host {
            ip if ip.is_unspecified() => self.host(DEFAULT_STOP_HOST),
            IpAddr::V4(ip) => self.host(ip.to_string()),
            IpAddr::V6(ip) => self.host(format!("[{ip}]")),
        }
    }

    /// Sets the connect and response timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the `User-Agent` sent with the request.
    ///
    /// The server's access filter must let this through.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Returns the URL a stop for `port` and `token` is sent to.
    #[must_use]
    pub fn stop_url(&self, port: u16, token: &str) -> String {
        format!(
            "http://{}:{}{}?{}={}",
            self.host,
            port,
            SHUTDOWN_PATH,
            TOKEN_PARAM,
            urlencoding::encode(token)
        )
    }

    /// Asks the server on `port` to stop.
    pub async fn stop(&self, port: u16, token: &str) -> StopOutcome {
        let client = match reqwest::Client::builder()
            .connect_timeout(self.timeout)
            .timeout(self.timeout)
            .user_agent(self.user_agent.as_str())
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to create stop client");
                return StopOutcome::Failed(e.to_string());
            }
        };

        let outcome = match client.post(self.stop_url(port, token)).send().await {
            Ok(response) => StopOutcome::Responded(response.status()),
            Err(e) if e.is_connect() && !e.is_timeout() => StopOutcome::NotRunning,
            Err(e) => StopOutcome::Failed(e.to_string()),
        };

        match &outcome {
            StopOutcome::Responded(status) if status.is_success() => {
                tracing::info!(port, "Server stopped. {outcome}");
            }
            StopOutcome::Responded(_) => {
                tracing::warn!(port, "Stop rejected. {outcome}");
            }
            StopOutcome::NotRunning => {
                tracing::info!(port, "Server not running");
            }
            StopOutcome::Failed(reason) => {
                tracing::warn!(port, reason = %reason, "Stop request failed");
            }
        }

        outcome
    }
}

impl Default for StopClient {
    fn default() -> Self {
        Self::new()
    }
}
