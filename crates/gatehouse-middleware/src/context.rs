//! Middleware context types.
//!
//! The [`MiddlewareContext`] carries per-request state through the pipeline:
//! where the request came from, when it started, and which stage settled it.
//! It lives exactly as long as one request.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;

use crate::types::PipelineOutcome;

/// The connector a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connector {
    /// Plain HTTP.
    Plain,
    /// HTTP over TLS.
    Tls,
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Plain => "http",
            Self::Tls => "https",
        })
    }
}

/// Context that flows through the middleware pipeline.
///
/// # Example
///
/// ```
/// use gatehouse_middleware::context::{Connector, MiddlewareContext};
/// use gatehouse_middleware::PipelineOutcome;
///
/// let mut ctx = MiddlewareContext::new(Some("127.0.0.1:50000".parse().unwrap()), Connector::Plain);
/// assert!(ctx.outcome().is_none());
///
/// ctx.set_outcome(PipelineOutcome::Static);
/// assert_eq!(ctx.outcome(), Some(PipelineOutcome::Static));
/// ```
pub struct MiddlewareContext {
    /// Peer address, when the transport knows it.
    remote_addr: Option<SocketAddr>,

    /// Connector that accepted the connection.
    connector: Connector,

    /// When the request started processing.
    started_at: Instant,

    /// Outcome recorded by the stage that settled the request.
    outcome: Option<PipelineOutcome>,

    /// Type-erased extension data.
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl MiddlewareContext {
    /// Creates a context for a request from `remote_addr`.
    #[must_use]
    pub fn new(remote_addr: Option<SocketAddr>, connector: Connector) -> Self {
        Self {
            remote_addr,
            connector,
            started_at: Instant::now(),
            outcome: None,
            extensions: HashMap::new(),
        }
    }

    /// Returns the peer address.
    #[must_use]
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Returns the connector the request arrived on.
    #[must_use]
    pub fn connector(&self) -> Connector {
        self.connector
    }

    /// Returns when the request started processing.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the elapsed time since the request started.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Returns the recorded outcome, if any stage settled the request.
    #[must_use]
    pub fn outcome(&self) -> Option<PipelineOutcome> {
        self.outcome
    }

    /// Records the outcome of the request.
    pub fn set_outcome(&mut self, outcome: PipelineOutcome) {
        self.outcome = Some(outcome);
    }

    /// Stores a typed extension value.
    ///
    /// # Example
    ///
    /// ```
    /// use gatehouse_middleware::context::{Connector, MiddlewareContext};
    ///
    /// struct ResolvedFile(String);
    ///
    /// let mut ctx = MiddlewareContext::new(None, Connector::Plain);
    /// ctx.set_extension(ResolvedFile("index.html".to_string()));
    /// assert_eq!(ctx.get_extension::<ResolvedFile>().unwrap().0, "index.html");
    /// ```
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a typed extension value.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Removes and returns a typed extension value.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|b| *b)
    }
}

impl fmt::Debug for MiddlewareContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareContext")
            .field("remote_addr", &self.remote_addr)
            .field("connector", &self.connector)
            .field("outcome", &self.outcome)
            .field("extensions", &self.extensions.len())
            .finish_non_exhaustive()
    }
}
