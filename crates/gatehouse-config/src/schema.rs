//! Configuration schema types.
//!
//! This module defines the structure of all configuration sections.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Token accepted by the shutdown endpoint when none is configured.
pub const DEFAULT_SHUTDOWN_TOKEN: &str = "679e6682dfbd7b22eeffef6bd02ac7b2";

/// User-Agent product token sent by the stop client.
pub const STOP_CLIENT_AGENT: &str = "gatehouse-stop";

/// Server configuration section.
///
/// # Example
///
/// ```
/// use gatehouse_config::ServerSection;
///
/// let config = ServerSection {
///     http_port: 9000,
///     static_dir: "~/site".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(config.index_file, "index.html");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Interface both connectors bind to.
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    /// Plain HTTP port. `0` disables the plain connector.
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Directory served as the static root. `~/` expands to the home directory.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,

    /// File served for directory requests. Empty disables index lookup.
    #[serde(default = "default_index_file")]
    pub index_file: String,

    /// Seconds a connection may take to deliver request headers.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Seconds in-flight connections get to finish once a stop is requested.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Largest request body read before the request is answered with 413.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: u64,

    /// Serve dot-prefixed path segments. `.well-known` is served regardless.
    #[serde(default)]
    pub serve_hidden: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            http_port: default_http_port(),
            static_dir: default_static_dir(),
            index_file: default_index_file(),
            idle_timeout_secs: default_idle_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            max_body_bytes: default_max_body_bytes(),
            serve_hidden: false,
        }
    }
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_static_dir() -> String {
    ".".to_string()
}

fn default_index_file() -> String {
    "index.html".to_string()
}

fn default_idle_timeout() -> u64 {
    30
}

fn default_shutdown_timeout() -> u64 {
    10
}

fn default_max_body_bytes() -> u64 {
    64 * 1024
}

/// TLS connector section. Certificates and keys are PEM encoded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct TlsSection {
    /// TLS port. `0` disables the TLS connector.
    #[serde(default)]
    pub port: u16,

    /// Path to the PEM certificate chain.
    #[serde(default)]
    pub cert_path: Option<String>,

    /// Path to the PEM private key.
    #[serde(default)]
    pub key_path: Option<String>,
}

/// Access filter section.
///
/// When `header_rules` is non-empty the filter runs in header mode and the
/// address lists are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AccessSection {
    /// Header name to the substrings allowed in its values.
    #[serde(default = "default_header_rules")]
    pub header_rules: BTreeMap<String, Vec<String>>,

    /// Addresses or CIDR blocks allowed in address mode.
    #[serde(default)]
    pub allow: Vec<String>,

    /// Addresses or CIDR blocks denied in address mode.
    #[serde(default)]
    pub deny: Vec<String>,
}

impl Default for AccessSection {
    fn default() -> Self {
        Self {
            header_rules: default_header_rules(),
            allow: Vec::new(),
            deny: Vec::new(),
        }
    }
}

fn default_header_rules() -> BTreeMap<String, Vec<String>> {
    let mut rules = BTreeMap::new();
    rules.insert(
        "User-Agent".to_string(),
        vec![
            STOP_CLIENT_AGENT.to_string(),
            "Let's Encrypt validation server".to_string(),
        ],
    );
    rules
}

/// Shutdown endpoint and stop client section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ShutdownSection {
    /// Shared secret carried in the `token` query parameter.
    #[serde(default = "default_token")]
    pub token: String,

    /// Whether the endpoint checks the token at all.
    #[serde(default = "default_true")]
    pub require_token: bool,

    /// Upper bound on the stop client's connect and request time.
    #[serde(default = "default_client_timeout")]
    pub client_timeout_secs: u64,

    /// User-Agent the stop client sends.
    #[serde(default = "default_client_user_agent")]
    pub client_user_agent: String,
}

impl Default for ShutdownSection {
    fn default() -> Self {
        Self {
            token: default_token(),
            require_token: true,
            client_timeout_secs: default_client_timeout(),
            client_user_agent: default_client_user_agent(),
        }
    }
}

fn default_token() -> String {
    DEFAULT_SHUTDOWN_TOKEN.to_string()
}

fn default_true() -> bool {
    true
}

fn default_client_timeout() -> u64 {
    5
}

fn default_client_user_agent() -> String {
    format!("{STOP_CLIENT_AGENT}/{}", env!("CARGO_PKG_VERSION"))
}

/// Log format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON formatted logs.
    #[default]
    Json,
    /// Human-readable format.
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Filter directive (trace, debug, info, warn, error or an `EnvFilter` string).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include ANSI color codes in output.
    #[serde(default)]
    pub ansi_enabled: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            ansi_enabled: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
