//! Common types used throughout the middleware pipeline.

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;

/// The HTTP request type used in the middleware pipeline.
///
/// Bodies are collected before the pipeline runs; no stage streams input.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type used in the middleware pipeline.
pub type Response = http::Response<Full<Bytes>>;

/// Per-request outcome recorded by whichever stage settled the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Refused before any content handler ran, or refused by the shutdown
    /// endpoint for a bad token.
    Rejected(StatusCode),
    /// Claimed by the static content responder.
    Static,
    /// Claimed by the shutdown endpoint.
    Shutdown,
    /// No handler claimed the request; the caller answered 404.
    Unhandled,
}

impl PipelineOutcome {
    /// Returns `true` unless the request fell through every handler.
    #[must_use]
    pub fn is_handled(self) -> bool {
        !matches!(self, Self::Unhandled)
    }
}

/// Extension trait for building bare responses.
pub trait ResponseExt {
    /// Creates a response carrying only a status code and an empty body.
    fn empty(status: StatusCode) -> Response;
}

impl ResponseExt for Response {
    fn empty(status: StatusCode) -> Response {
        let mut response = http::Response::new(Full::new(Bytes::new()));
        *response.status_mut() = status;
        response
    }
}
