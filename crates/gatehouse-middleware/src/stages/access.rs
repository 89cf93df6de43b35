//! Header access filter.
//!
//! Runs before any content handler. The filter has two modes:
//!
//! - **Headers**: a default-deny allow-list keyed by header name. A request
//!   is allowed as soon as any value of a listed header contains any of the
//!   configured substrings for that header (case-sensitive containment).
//! - **Addresses**: used only when no header rules are configured. Requests
//!   are checked against CIDR allow and deny lists.
//!
//! Denied requests receive an empty `403 Forbidden`.
//!
//! # Example
//!
//! ```
//! use gatehouse_middleware::stages::access::{AccessFilter, AccessRuleSet, AddressRules};
//! use http::HeaderMap;
//!
//! let rules = AccessRuleSet::new()
//!     .allow("User-Agent", ["Let's Encrypt validation server"])
//!     .unwrap();
//! let filter = AccessFilter::new(rules, AddressRules::default());
//!
//! let mut headers = HeaderMap::new();
//! headers.insert("user-agent", "Mozilla/5.0 (Let's Encrypt validation server)".parse().unwrap());
//! assert!(filter.is_allowed(None, &headers));
//! assert!(!filter.is_allowed(None, &HeaderMap::new()));
//! ```

use std::net::IpAddr;
use std::sync::Arc;

use http::header::{HeaderName, InvalidHeaderName};
use http::{HeaderMap, StatusCode};
use ipnet::IpNet;

use crate::{
    context::MiddlewareContext,
    middleware::{BoxFuture, Middleware, Next},
    types::{PipelineOutcome, Request, Response, ResponseExt},
};

/// Header name to allowed substrings.
///
/// Header names are matched case-insensitively; substrings are matched
/// case-sensitively. Headers keep the order they were first added in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessRuleSet {
    rules: Vec<(HeaderName, Vec<String>)>,
}

impl AccessRuleSet {
    /// Creates an empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds allowed substrings for a header.
    ///
    /// Repeated calls for the same header extend its substring list.
    ///
    /// # Errors
    ///
    /// Returns an error if `header` is not a valid header name.
    pub fn allow<I, S>(mut self, header: &str, substrings: I) -> Result<Self, InvalidHeaderName>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = HeaderName::from_bytes(header.as_bytes())?;
        let substrings = substrings.into_iter().map(Into::<String>::into);
        match self.rules.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, list)) => list.extend(substrings),
            None => self.rules.push((name, substrings.collect())),
        }
        Ok(self)
    }

    /// Builds a rule set from `(header, substrings)` pairs.
    ///
    /// # Errors
    ///
    /// Returns an error on the first invalid header name.
    pub fn from_pairs<I, V>(pairs: I) -> Result<Self, InvalidHeaderName>
    where
        I: IntoIterator<Item = (String, V)>,
        V: IntoIterator<Item = String>,
    {
        pairs
            .into_iter()
            .try_fold(Self::new(), |set, (header, values)| set.allow(&header, values))
    }

    /// Returns `true` if no header is listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns the number of listed headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Iterates over listed headers and their substrings.
    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &[String])> {
        self.rules.iter().map(|(name, subs)| (name, subs.as_slice()))
    }

    /// Returns `true` if any value of a listed header contains one of its
    /// substrings.
    #[must_use]
    pub fn matches(&self, headers: &HeaderMap) -> bool {
        self.rules
            .iter()
            .filter(|(_, substrings)| !substrings.is_empty())
            .any(|(name, substrings)| {
                headers.get_all(name).iter().any(|value| {
                    let value = String::from_utf8_lossy(value.as_bytes());
                    substrings.iter().any(|s| value.contains(s.as_str()))
                })
            })
    }
}

/// Network-address allow and deny lists.
///
/// A deny match always refuses. A non-empty allow list refuses every
/// address it does not contain. With both lists empty every request passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressRules {
    /// Networks that may connect.
    pub allow: Vec<IpNet>,
    /// Networks that may not connect.
    pub deny: Vec<IpNet>,
}

impl AddressRules {
    /// Creates rules from allow and deny lists.
    #[must_use]
    pub fn new(allow: Vec<IpNet>, deny: Vec<IpNet>) -> Self {
        Self { allow, deny }
    }

    /// Returns `true` if the address passes both lists.
    ///
    /// IPv4-mapped IPv6 addresses are checked as IPv4. An unknown address
    /// passes only when no allow list is configured.
    #[must_use]
    pub fn is_allowed(&self, remote: Option<IpAddr>) -> bool {
        let Some(ip) = remote.map(|ip| ip.to_canonical()) else {
            return self.allow.is_empty();
        };
        if self.deny.iter().any(|net| net.contains(&ip)) {
            return false;
        }
        self.allow.is_empty() || self.allow.iter().any(|net| net.contains(&ip))
    }
}

/// Which check the filter applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessMode {
    /// Header allow-list.
    Headers(AccessRuleSet),
    /// Address allow/deny lists.
    Addresses(AddressRules),
}

/// Decides whether a request may proceed.
#[derive(Debug, Clone)]
pub struct AccessFilter {
    mode: AccessMode,
}

impl AccessFilter {
    /// Creates a filter.
    ///
    /// Header rules win whenever at least one header is listed; the address
    /// rules are then never consulted. Headers listed with no substrings can
    /// never match and are reported once here.
    #[must_use]
    pub fn new(rules: AccessRuleSet, fallback: AddressRules) -> Self {
        if rules.is_empty() {
            return Self {
                mode: AccessMode::Addresses(fallback),
            };
        }

        for (name, substrings) in rules.iter() {
            if substrings.is_empty() {
                tracing::warn!(
                    header = %name,
                    "Access rule has no allowed values and will never match"
                );
            }
        }

        Self {
            mode: AccessMode::Headers(rules),
        }
    }

    /// Creates a filter that lets everything through.
    #[must_use]
    pub fn allow_all() -> Self {
        Self::new(AccessRuleSet::new(), AddressRules::default())
    }

    /// Returns the active mode.
    #[must_use]
    pub fn mode(&self) -> &AccessMode {
        &self.mode
    }

    /// Returns `true` if the request may proceed.
    #[must_use]
    pub fn is_allowed(&self, remote: Option<IpAddr>, headers: &HeaderMap) -> bool {
        match &self.mode {
            AccessMode::Headers(rules) => rules.matches(headers),
            AccessMode::Addresses(rules) => rules.is_allowed(remote),
        }
    }
}

/// Middleware that refuses requests the [`AccessFilter`] denies.
#[derive(Debug, Clone)]
pub struct AccessMiddleware {
    filter: Arc<AccessFilter>,
}

impl AccessMiddleware {
    /// Creates the stage around a filter.
    #[must_use]
    pub fn new(filter: AccessFilter) -> Self {
        Self {
            filter: Arc::new(filter),
        }
    }

    /// Returns the filter.
    #[must_use]
    pub fn filter(&self) -> &AccessFilter {
        &self.filter
    }
}

impl Middleware for AccessMiddleware {
    fn name(&self) -> &'static str {
        "access"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let remote = ctx.remote_addr().map(|addr| addr.ip());
            if self.filter.is_allowed(remote, request.headers()) {
                return next.run(ctx, request).await;
            }

            tracing::debug!(
                remote = ?remote,
                path = %request.uri().path(),
                "Request denied by access filter"
            );
            ctx.set_outcome(PipelineOutcome::Rejected(StatusCode::FORBIDDEN));
            Response::empty(StatusCode::FORBIDDEN)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Connector;
    use crate::handler::BoxedHandler;
    use bytes::Bytes;
    use http::Request as HttpRequest;
    use http_body_util::Full;
    use proptest::prelude::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                value.parse().unwrap(),
            );
        }
        map
    }

    fn ua_rules() -> AccessRuleSet {
        AccessRuleSet::new()
            .allow("User-Agent", ["gatehouse-stop", "Let's Encrypt validation server"])
            .unwrap()
    }

    #[test]
    fn test_substring_match_allows() {
        let filter = AccessFilter::new(ua_rules(), AddressRules::default());
        let h = headers(&[("user-agent", "gatehouse-stop/0.1.0")]);
        assert!(filter.is_allowed(None, &h));
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let filter = AccessFilter::new(ua_rules(), AddressRules::default());
        let h = headers(&[("user-agent", "GATEHOUSE-STOP/0.1.0")]);
        assert!(!filter.is_allowed(None, &h));
    }

    #[test]
    fn test_header_name_is_case_insensitive() {
        let rules = AccessRuleSet::new().allow("X-Canary", ["ok"]).unwrap();
        let filter = AccessFilter::new(rules, AddressRules::default());
        assert!(filter.is_allowed(None, &headers(&[("x-canary", "ok")])));
    }

    #[test]
    fn test_any_value_of_repeated_header() {
        let rules = AccessRuleSet::new().allow("X-Tag", ["blue"]).unwrap();
        let filter = AccessFilter::new(rules, AddressRules::default());
        let h = headers(&[("x-tag", "red"), ("x-tag", "navy-blue")]);
        assert!(filter.is_allowed(None, &h));
    }

    #[test]
    fn test_missing_header_denies() {
        let filter = AccessFilter::new(ua_rules(), AddressRules::default());
        let h = headers(&[("accept", "gatehouse-stop")]);
        assert!(!filter.is_allowed(None, &h));
    }

    #[test]
    fn test_empty_substring_set_never_matches() {
        let rules = AccessRuleSet::new()
            .allow("X-Empty", Vec::<String>::new())
            .unwrap()
            .allow("X-Key", ["k"])
            .unwrap();
        let filter = AccessFilter::new(rules, AddressRules::default());

        assert!(matches!(filter.mode(), AccessMode::Headers(_)));
        assert!(!filter.is_allowed(None, &headers(&[("x-empty", "anything")])));
        assert!(filter.is_allowed(None, &headers(&[("x-key", "k")])));
    }

    #[test]
    fn test_only_empty_entries_deny_everything() {
        let rules = AccessRuleSet::new()
            .allow("X-Empty", Vec::<String>::new())
            .unwrap();
        let filter = AccessFilter::new(rules, AddressRules::default());
        assert!(!filter.is_allowed(Some("127.0.0.1".parse().unwrap()), &HeaderMap::new()));
    }

    #[test]
    fn test_invalid_header_name() {
        assert!(AccessRuleSet::new().allow("bad header", ["x"]).is_err());
    }

    #[test]
    fn test_from_pairs() {
        let set = AccessRuleSet::from_pairs(vec![
            ("User-Agent".to_string(), vec!["a".to_string()]),
            ("user-agent".to_string(), vec!["b".to_string()]),
        ])
        .unwrap();
        assert_eq!(set.len(), 1);
        let (_, subs) = set.iter().next().unwrap();
        assert_eq!(subs, ["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_address_mode_when_no_header_rules() {
        let fallback = AddressRules::new(vec!["10.0.0.0/8".parse().unwrap()], vec![]);
        let filter = AccessFilter::new(AccessRuleSet::new(), fallback);

        assert!(matches!(filter.mode(), AccessMode::Addresses(_)));
        assert!(filter.is_allowed(Some("10.1.2.3".parse().unwrap()), &HeaderMap::new()));
        assert!(!filter.is_allowed(Some("192.168.0.1".parse().unwrap()), &HeaderMap::new()));
        assert!(!filter.is_allowed(None, &HeaderMap::new()));
    }

    #[test]
    fn test_deny_beats_allow() {
        let rules = AddressRules::new(
            vec!["10.0.0.0/8".parse().unwrap()],
            vec!["10.9.0.0/16".parse().unwrap()],
        );
        assert!(rules.is_allowed(Some("10.1.0.1".parse().unwrap())));
        assert!(!rules.is_allowed(Some("10.9.0.1".parse().unwrap())));
    }

    #[test]
    fn test_ipv4_mapped_address() {
        let rules = AddressRules::new(vec!["127.0.0.0/8".parse().unwrap()], vec![]);
        assert!(rules.is_allowed(Some("::ffff:127.0.0.1".parse().unwrap())));
    }

    #[test]
    fn test_allow_all() {
        let filter = AccessFilter::allow_all();
        assert!(filter.is_allowed(None, &HeaderMap::new()));
        assert!(filter.is_allowed(Some("203.0.113.5".parse().unwrap()), &HeaderMap::new()));
    }

    #[tokio::test]
    async fn test_denied_request_is_bare_403() {
        let middleware = AccessMiddleware::new(AccessFilter::new(ua_rules(), AddressRules::default()));
        let handlers: Vec<BoxedHandler> = Vec::new();
        let mut ctx = MiddlewareContext::new(None, Connector::Plain);
        let request = HttpRequest::builder()
            .uri("/index.html")
            .header("user-agent", "curl/8.5.0")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let response = middleware
            .process(&mut ctx, request, Next::handlers(&handlers))
            .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().is_empty());
        assert_eq!(
            ctx.outcome(),
            Some(PipelineOutcome::Rejected(StatusCode::FORBIDDEN))
        );
    }

    #[tokio::test]
    async fn test_allowed_request_continues() {
        let middleware = AccessMiddleware::new(AccessFilter::new(ua_rules(), AddressRules::default()));
        let handlers: Vec<BoxedHandler> = Vec::new();
        let mut ctx = MiddlewareContext::new(None, Connector::Plain);
        let request = HttpRequest::builder()
            .uri("/index.html")
            .header("user-agent", "gatehouse-stop/1.0")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let response = middleware
            .process(&mut ctx, request, Next::handlers(&handlers))
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(ctx.outcome(), Some(PipelineOutcome::Unhandled));
    }

    fn header_text() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 ./;()-]{0,24}"
    }

    proptest! {
        #[test]
        fn prop_value_containing_substring_is_allowed(
            prefix in header_text(),
            needle in "[a-zA-Z0-9]{1,12}",
            suffix in header_text(),
        ) {
            let rules = AccessRuleSet::new().allow("User-Agent", [needle.clone()]).unwrap();
            let filter = AccessFilter::new(rules, AddressRules::default());
            let value = format!("{prefix}{needle}{suffix}");
            prop_assert!(filter.is_allowed(None, &headers(&[("user-agent", value.as_str())])));
        }

        #[test]
        fn prop_header_rules_ignore_address(
            value in header_text(),
            octets in any::<[u8; 4]>(),
        ) {
            let rules = ua_rules();
            let fallback = AddressRules::new(vec![], vec!["0.0.0.0/0".parse().unwrap()]);
            let filter = AccessFilter::new(rules.clone(), fallback);
            let h = headers(&[("user-agent", value.as_str())]);
            let ip = IpAddr::from(octets);

            prop_assert_eq!(filter.is_allowed(Some(ip), &h), filter.is_allowed(None, &h));
            prop_assert_eq!(filter.is_allowed(Some(ip), &h), rules.matches(&h));
        }

        #[test]
        fn prop_unlisted_headers_never_allow(
            value in header_text(),
        ) {
            let filter = AccessFilter::new(ua_rules(), AddressRules::default());
            let h = headers(&[("accept", value.as_str()), ("referer", value.as_str())]);
            prop_assert!(!filter.is_allowed(None, &h));
        }
    }
}
