//! Glue between the file/env configuration and the runtime types.
//!
//! [`GatehouseConfig`] is what operators write; [`ServerConfig`],
//! [`AccessFilter`], [`LogConfig`] and [`StopClient`] are what the server and
//! the stop client run on. Command-line values are layered on top through
//! [`StartOverrides`] and [`StopOverrides`] before validation.

use std::net::IpAddr;
use std::time::Duration;

use gatehouse_config::{
    expand_home, parse_address_rule, AccessSection, ConfigError, GatehouseConfig, LogFormat,
    LoggingSection, ServerSection, ShutdownSection,
};
use gatehouse_middleware::stages::{AccessFilter, AccessRuleSet, AddressRules};
use gatehouse_server::{ServerConfig, StopClient};
use gatehouse_telemetry::LogConfig;
use ipnet::IpNet;

/// Command-line values for `gatehouse start`.
///
/// `None` leaves the configured value in place.
#[derive(Debug, Clone, Default)]
pub struct StartOverrides {
    /// Directory to serve.
    pub static_dir: Option<String>,
    /// Plain HTTP port.
    pub http_port: Option<u16>,
    /// TLS port.
    pub secure_port: Option<u16>,
    /// PEM certificate chain.
    pub cert_path: Option<String>,
    /// PEM private key.
    pub key_path: Option<String>,
    /// Shutdown token.
    pub token: Option<String>,
    /// Accept any `POST /shutdown`.
    pub no_require_token: bool,
}

impl StartOverrides {
    /// Layers these values onto `config`.
    pub fn apply(&self, config: &mut GatehouseConfig) {
        if let Some(dir) = &self.static_dir {
            config.server.static_dir.clone_from(dir);
        }
        if let Some(port) = self.http_port {
            config.server.http_port = port;
        }
        if let Some(port) = self.secure_port {
            config.tls.port = port;
        }
        if let Some(cert) = &self.cert_path {
            config.tls.cert_path = Some(cert.clone());
        }
        if let Some(key) = &self.key_path {
            config.tls.key_path = Some(key.clone());
        }
        if let Some(token) = &self.token {
            config.shutdown.token.clone_from(token);
        }
        if self.no_require_token {
            config.shutdown.require_token = false;
        }
    }
}

/// Command-line values for `gatehouse stop`.
#[derive(Debug, Clone, Default)]
pub struct StopOverrides {
    /// Port of the running server's plain connector.
    pub http_port: Option<u16>,
    /// Shutdown token.
    pub token: Option<String>,
    /// Connect and response bound in seconds.
    pub timeout_secs: Option<u64>,
}

impl StopOverrides {
    /// Layers these values onto `config`.
    pub fn apply(&self, config: &mut GatehouseConfig) {
        if let Some(port) = self.http_port {
            config.server.http_port = port;
        }
        if let Some(token) = &self.token {
            config.shutdown.token.clone_from(token);
        }
        if let Some(secs) = self.timeout_secs {
            config.shutdown.client_timeout_secs = secs;
        }
    }
}

/// Builds the runtime server configuration.
///
/// Resolves the static directory (with `~/` expansion) and the PEM paths.
///
/// # Errors
///
/// Returns `ConfigError` if the bind host is not an IP address or a path
/// cannot be resolved.
pub fn server_config(config: &GatehouseConfig) -> Result<ServerConfig, ConfigError> {
    let bind_host = config.server.bind_host.parse::<IpAddr>().map_err(|_| {
        ConfigError::invalid_value(
            "server.bind_host",
            format!("not an IP address: {}", config.server.bind_host),
        )
    })?;

    let builder = ServerConfig::builder()
        .bind_host(bind_host)
        .http_port(config.server.http_port)
        .static_root(config.static_root()?)
        .index_file(Some(config.server.index_file.clone()))
        .shutdown_token(config.shutdown.token.as_str())
        .require_token(config.shutdown.require_token)
        .idle_timeout(Duration::from_secs(config.server.idle_timeout_secs))
        .shutdown_timeout(Duration::from_secs(config.server.shutdown_timeout_secs))
        .max_body_bytes(config.server.max_body_bytes)
        .serve_hidden(config.server.serve_hidden);

    let builder = match (&config.tls.cert_path, &config.tls.key_path) {
        (Some(cert), Some(key)) if config.tls.port != 0 => {
            builder.tls(config.tls.port, expand_home(cert)?, expand_home(key)?)
        }
        _ => builder.tls_port(config.tls.port),
    };

    Ok(builder.build())
}

/// Builds the access filter.
///
/// Header rules, when present, are authoritative; the address lists apply
/// only when no header rule is configured.
///
/// # Errors
///
/// Returns `ConfigError` for an invalid header name or address rule.
pub fn access_filter(access: &AccessSection) -> Result<AccessFilter, ConfigError> {
    let rules = AccessRuleSet::from_pairs(
        access
            .header_rules
            .iter()
            .map(|(header, values)| (header.clone(), values.clone())),
    )
    .map_err(|e| ConfigError::invalid_value("access.header_rules", e.to_string()))?;

    let fallback = AddressRules::new(
        address_rules("access.allow", &access.allow)?,
        address_rules("access.deny", &access.deny)?,
    );

    Ok(AccessFilter::new(rules, fallback))
}

fn address_rules(field: &str, entries: &[String]) -> Result<Vec<IpNet>, ConfigError> {
    entries
        .iter()
        .map(|entry| {
            parse_address_rule(entry).ok_or_else(|| {
                ConfigError::invalid_value(
                    field,
                    format!("expected an IP address or CIDR block, got {entry:?}"),
                )
            })
        })
        .collect()
}

/// Builds the logging configuration.
#[must_use]
pub fn log_config(logging: &LoggingSection) -> LogConfig {
    LogConfig {
        level: logging.level.clone(),
        json_format: logging.format == LogFormat::Json,
        ansi: logging.ansi_enabled,
        ..LogConfig::production()
    }
}

/// Builds the stop client for the configured server.
///
/// A specific `server.bind_host` is targeted directly; a wildcard or
/// unparseable one falls back to `localhost`.
#[must_use]
pub fn stop_client(server: &ServerSection, shutdown: &ShutdownSection) -> StopClient {
    let client = match server.bind_host.parse::<IpAddr>() {
        Ok(host) => StopClient::new().bind_host(host),
        Err(_) => StopClient::new(),
    };
    client
        .timeout(Duration::from_secs(shutdown.client_timeout_secs.max(1)))
        .user_agent(shutdown.client_user_agent.as_str())
}
