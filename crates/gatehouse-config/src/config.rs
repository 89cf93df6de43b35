//! Main configuration types.
//!
//! This module provides the top-level [`GatehouseConfig`] struct, its
//! validation rules and static directory resolution.

use std::net::IpAddr;
use std::path::PathBuf;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::{
    AccessSection, ConfigError, LogFormat, LoggingSection, ServerSection, ShutdownSection,
    TlsSection,
};

/// Complete Gatehouse configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load configuration from files
/// and environment variables.
///
/// # Example
///
/// ```
/// use gatehouse_config::GatehouseConfig;
///
/// let config = GatehouseConfig::default();
/// assert_eq!(config.server.http_port, 8080);
/// assert_eq!(config.tls.port, 0);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct GatehouseConfig {
    /// Plain connector, static root and timeouts.
    #[serde(default)]
    pub server: ServerSection,

    /// TLS connector.
    #[serde(default)]
    pub tls: TlsSection,

    /// Access filter rules.
    #[serde(default)]
    pub access: AccessSection,

    /// Shutdown endpoint and stop client.
    #[serde(default)]
    pub shutdown: ShutdownSection,

    /// Process logging.
    #[serde(default)]
    pub logging: LoggingSection,
}

impl GatehouseConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if:
    /// - both connectors are disabled, or both use the same port
    /// - the TLS connector is enabled without a certificate or key path
    /// - `server.bind_host` is not an IP address
    /// - a header rule names an invalid header
    /// - an address rule is neither an IP address nor a CIDR block
    /// - the shutdown token is empty while tokens are required
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.http_port == 0 && self.tls.port == 0 {
            return Err(ConfigError::validation_error(
                "server.http_port and tls.port are both 0; at least one connector must be enabled",
            ));
        }

        if self.server.http_port != 0 && self.server.http_port == self.tls.port {
            return Err(ConfigError::validation_error(format!(
                "server.http_port and tls.port must differ (both are {})",
                self.tls.port
            )));
        }

        if self.tls.port != 0 {
            if self.tls.cert_path.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::missing_field("tls.cert_path"));
            }
            if self.tls.key_path.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::missing_field("tls.key_path"));
            }
        }

        if self.server.bind_host.parse::<IpAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "server.bind_host",
                format!("not an IP address: {}", self.server.bind_host),
            ));
        }

        for name in self.access.header_rules.keys() {
            if http::HeaderName::from_bytes(name.as_bytes()).is_err() {
                return Err(ConfigError::invalid_value(
                    "access.header_rules",
                    format!("invalid header name: {name}"),
                ));
            }
        }

        for (field, entries) in [("access.allow", &self.access.allow), ("access.deny", &self.access.deny)] {
            for entry in entries {
                if parse_address_rule(entry).is_none() {
                    return Err(ConfigError::invalid_value(
                        field,
                        format!("expected an IP address or CIDR block, got {entry:?}"),
                    ));
                }
            }
        }

        if self.shutdown.require_token && self.shutdown.token.is_empty() {
            return Err(ConfigError::invalid_value(
                "shutdown.token",
                "must not be empty while require_token is enabled",
            ));
        }

        Ok(())
    }

    /// Create a development configuration preset.
    ///
    /// Pretty, colored debug logs on the plain connector only.
    ///
    /// # Example
    ///
    /// ```
    /// use gatehouse_config::{GatehouseConfig, LogFormat};
    ///
    /// let config = GatehouseConfig::development();
    /// assert_eq!(config.logging.format, LogFormat::Pretty);
    /// ```
    #[must_use]
    pub fn development() -> Self {
        Self {
            logging: LoggingSection {
                level: "debug".to_string(),
                format: LogFormat::Pretty,
                ansi_enabled: true,
            },
            ..Self::default()
        }
    }

    /// Resolves `server.static_dir` to a canonical directory path.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::StaticDir` when home expansion is not possible
    /// or the directory does not exist.
    pub fn static_root(&self) -> Result<PathBuf, ConfigError> {
        resolve_static_dir(&self.server.static_dir)
    }
}

/// Expands a leading `~/` to the current user's home directory and
/// canonicalizes the result.
///
/// `~user` forms are rejected.
///
/// # Errors
///
/// Returns `ConfigError::StaticDir` when expansion is not possible, the path
/// does not exist, or it is not a directory.
pub fn resolve_static_dir(path: &str) -> Result<PathBuf, ConfigError> {
    let expanded = expand_home(path)?;
    let canonical = expanded
        .canonicalize()
        .map_err(|e| ConfigError::static_dir(path, e.to_string()))?;
    if !canonical.is_dir() {
        return Err(ConfigError::static_dir(path, "not a directory"));
    }
    Ok(canonical)
}

/// Applies `~/` home expansion without touching the filesystem.
///
/// # Errors
///
/// Returns `ConfigError::StaticDir` for `~user` paths or when no home
/// directory is known.
pub fn expand_home(path: &str) -> Result<PathBuf, ConfigError> {
    let Some(rest) = path.strip_prefix('~') else {
        return Ok(PathBuf::from(path));
    };

    if !rest.is_empty() && !rest.starts_with(std::path::MAIN_SEPARATOR) && !rest.starts_with('/') {
        return Err(ConfigError::static_dir(
            path,
            "home expansion is not supported for explicit user names",
        ));
    }

    let home = home_dir().ok_or_else(|| ConfigError::static_dir(path, "home directory is unknown"))?;
    let rest = rest.trim_start_matches(['/', std::path::MAIN_SEPARATOR]);
    Ok(if rest.is_empty() { home } else { home.join(rest) })
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}

/// Parses an address rule: a bare IP address or a CIDR block.
#[must_use]
pub fn parse_address_rule(entry: &str) -> Option<IpNet> {
    let entry = entry.trim();
    entry
        .parse::<IpNet>()
        .ok()
        .or_else(|| entry.parse::<IpAddr>().ok().map(IpNet::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn with_tls() -> GatehouseConfig {
        let mut config = GatehouseConfig::default();
        config.tls.port = 8443;
        config.tls.cert_path = Some("fullchain.pem".to_string());
        config.tls.key_path = Some("privkey.pem".to_string());
        config
    }

    #[test]
    fn test_default_is_valid() {
        assert!(GatehouseConfig::default().validate().is_ok());
    }

    #[test]
    fn test_both_ports_disabled_rejected() {
        let mut config = GatehouseConfig::default();
        config.server.http_port = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_tls_only_is_valid() {
        let mut config = with_tls();
        config.server.http_port = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_equal_ports_rejected() {
        let mut config = with_tls();
        config.tls.port = config.server.http_port;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tls_without_key_rejected() {
        let mut config = with_tls();
        config.tls.key_path = None;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tls.key_path"));
    }

    #[test]
    fn test_bind_host_must_be_ip() {
        let mut config = GatehouseConfig::default();
        config.server.bind_host = "example.invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_header_name_rejected() {
        let mut config = GatehouseConfig::default();
        config
            .access
            .header_rules
            .insert("Bad Header".to_string(), vec!["x".to_string()]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_address_rules_validated() {
        let mut config = GatehouseConfig::default();
        config.access.allow = vec!["10.0.0.0/8".to_string(), "::1".to_string()];
        assert!(config.validate().is_ok());

        config.access.deny = vec!["10.0.0.300".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_token_rejected_when_required() {
        let mut config = GatehouseConfig::default();
        config.shutdown.token = String::new();
        assert!(config.validate().is_err());

        config.shutdown.require_token = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_address_rule() {
        assert_eq!(
            parse_address_rule("192.168.1.7"),
            Some("192.168.1.7/32".parse().unwrap())
        );
        assert_eq!(
            parse_address_rule(" 2001:db8::/32 "),
            Some("2001:db8::/32".parse().unwrap())
        );
        assert!(parse_address_rule("localhost").is_none());
    }

    #[test]
    fn test_expand_home_plain_path_untouched() {
        assert_eq!(expand_home("./public").unwrap(), PathBuf::from("./public"));
    }

    #[test]
    fn test_expand_home_named_user_rejected() {
        let err = expand_home("~bob/site").unwrap_err();
        assert!(matches!(err, ConfigError::StaticDir { .. }));
    }

    #[test]
    fn test_expand_home_uses_home() {
        if let Some(home) = home_dir() {
            assert_eq!(expand_home("~/site").unwrap(), home.join("site"));
            assert_eq!(expand_home("~").unwrap(), home);
        }
    }

    #[test]
    fn test_resolve_static_dir_canonicalizes() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("www");
        std::fs::create_dir(&nested).unwrap();

        let raw = format!("{}/www/../www", dir.path().display());
        let resolved = resolve_static_dir(&raw).unwrap();
        assert_eq!(resolved, nested.canonicalize().unwrap());
    }

    #[test]
    fn test_resolve_static_dir_missing() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent");
        assert!(resolve_static_dir(missing.to_str().unwrap()).is_err());
    }

    #[test]
    fn test_resolve_static_dir_rejects_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("index.html");
        std::fs::write(&file, "<html></html>").unwrap();
        assert!(resolve_static_dir(file.to_str().unwrap()).is_err());
    }
}
