//! Request log sink.
//!
//! Outermost stage of the pipeline. It observes every request, including
//! those refused by later stages, and writes one Extended NCSA line per
//! completed request:
//!
//! ```text
//! 127.0.0.1 - - [19/Oct/2026:10:02:11 +0000] "GET /index.html HTTP/1.1" 200 512 "-" "curl/8.5.0"
//! ```
//!
//! Lines are emitted at `INFO` under [`REQUEST_LOG_TARGET`], so they can be
//! routed or filtered independently of diagnostics. The value of a `token`
//! query parameter is replaced with `***` before it is logged.

use std::fmt;

use chrono::{DateTime, Local};
use http::header::{REFERER, USER_AGENT};
use http::HeaderMap;
use http_body::Body;

use gatehouse_telemetry::REQUEST_LOG_TARGET;

use crate::{
    context::MiddlewareContext,
    middleware::{BoxFuture, Middleware, Next},
    types::{Request, Response},
};

/// Query parameter whose value never reaches the log.
const MASKED_PARAM: &str = "token";

/// One completed request, as written to the request log.
///
/// The last entry is also stored on the [`MiddlewareContext`] so callers can
/// inspect what was logged.
#[derive(Debug, Clone)]
pub struct RequestLogEntry {
    /// Client address, or `-` when the transport did not report one.
    pub client: String,
    /// When the response was produced.
    pub timestamp: DateTime<Local>,
    /// Request method.
    pub method: String,
    /// Request target with sensitive query values masked.
    pub target: String,
    /// Protocol version, e.g. `HTTP/1.1`.
    pub version: String,
    /// Response status code.
    pub status: u16,
    /// Response body length, when known and non-zero.
    pub bytes: Option<u64>,
    /// `Referer` header value.
    pub referer: Option<String>,
    /// `User-Agent` header value.
    pub user_agent: Option<String>,
}

impl fmt::Display for RequestLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - - [{}] \"{} {} {}\" {} ",
            self.client,
            self.timestamp.format("%d/%b/%Y:%H:%M:%S %z"),
            self.method,
            self.target,
            self.version,
            self.status,
        )?;
        match self.bytes {
            Some(bytes) => write!(f, "{bytes}")?,
            None => f.write_str("-")?,
        }
        write!(
            f,
            " \"{}\" \"{}\"",
            self.referer.as_deref().unwrap_or("-"),
            self.user_agent.as_deref().unwrap_or("-"),
        )
    }
}

/// Middleware that writes the request log.
#[derive(Debug, Clone, Default)]
pub struct RequestLogMiddleware {
    _private: (),
}

impl RequestLogMiddleware {
    /// Creates the request log stage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Request fields captured before the request moves down the chain.
struct Captured {
    method: String,
    target: String,
    version: String,
    referer: Option<String>,
    user_agent: Option<String>,
}

impl Captured {
    fn from_request(request: &Request) -> Self {
        let target = match request.uri().path_and_query() {
            Some(pq) => match pq.query() {
                Some(query) => format!("{}?{}", pq.path(), mask_query(query)),
                None => pq.path().to_string(),
            },
            None => request.uri().path().to_string(),
        };

        Self {
            method: request.method().to_string(),
            target,
            version: format!("{:?}", request.version()),
            referer: header_text(request.headers(), REFERER.as_str()),
            user_agent: header_text(request.headers(), USER_AGENT.as_str()),
        }
    }
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
}

/// Replaces the value of every `token` parameter with `***`.
fn mask_query(query: &str) -> String {
    query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if key == MASKED_PARAM => format!("{key}=***"),
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join("&")
}

impl Middleware for RequestLogMiddleware {
    fn name(&self) -> &'static str {
        "request_log"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let captured = Captured::from_request(&request);

            let response = next.run(ctx, request).await;

            let entry = RequestLogEntry {
                client: ctx
                    .remote_addr()
                    .map_or_else(|| "-".to_string(), |addr| addr.ip().to_string()),
                timestamp: Local::now(),
                method: captured.method,
                target: captured.target,
                version: captured.version,
                status: response.status().as_u16(),
                bytes: response.body().size_hint().exact().filter(|n| *n > 0),
                referer: captured.referer,
                user_agent: captured.user_agent,
            };

            tracing::info!(target: REQUEST_LOG_TARGET, "{}", entry);
            ctx.set_extension(entry);

            response
        })
    }
}
