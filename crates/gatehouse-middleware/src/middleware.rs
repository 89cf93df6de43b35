//! Core middleware trait and chain plumbing.
//!
//! A [`Middleware`] wraps everything after it: it sees the request on the
//! way in, decides whether to call [`Next::run`], and sees the response on
//! the way out. A middleware that does not call `next` short-circuits the
//! chain and its response is final.
//!
//! The end of every chain is the ordered list of [`Handler`]s; the first one
//! to claim the request produces the response.
//!
//! # Example
//!
//! ```ignore
//! use gatehouse_middleware::{BoxFuture, Middleware, MiddlewareContext, Next, Request, Response};
//!
//! struct Timing;
//!
//! impl Middleware for Timing {
//!     fn name(&self) -> &'static str {
//!         "timing"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut MiddlewareContext,
//!         request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Response> {
//!         Box::pin(async move {
//!             let response = next.run(ctx, request).await;
//!             tracing::debug!(elapsed = ?ctx.elapsed(), "request finished");
//!             response
//!         })
//!     }
//! }
//! ```

use std::future::Future;
use std::pin::Pin;

use http::StatusCode;

use crate::context::MiddlewareContext;
use crate::handler::BoxedHandler;
use crate::types::{PipelineOutcome, Request, Response, ResponseExt};

/// A boxed future that returns a response.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The core middleware trait.
///
/// # Invariants
///
/// - Middleware calls `next.run()` at most once
/// - A middleware that declines to call `next` must return a complete response
pub trait Middleware: Send + Sync + 'static {
    /// Returns the name of this stage, used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Process the request through this middleware.
    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response>;
}

/// Callback to invoke the rest of the chain.
///
/// Consumed by [`Next::run`], so it can only be called once.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    /// More middleware to process
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    /// End of chain: offer the request to each handler in order
    Handlers(&'a [BoxedHandler]),
    /// End of chain: the caller already settled the request
    Status(StatusCode),
}

impl<'a> Next<'a> {
    /// Creates a `Next` that will invoke the given middleware.
    pub(crate) fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// Creates a terminal `Next` that dispatches to `handlers`.
    pub fn handlers(handlers: &'a [BoxedHandler]) -> Self {
        Self {
            inner: NextInner::Handlers(handlers),
        }
    }

    /// Creates a terminal `Next` that answers a bare `status`.
    pub fn status(status: StatusCode) -> Self {
        Self {
            inner: NextInner::Status(status),
        }
    }

    /// Invokes the next middleware, or the handlers at the end of the chain.
    pub async fn run(self, ctx: &mut MiddlewareContext, request: Request) -> Response {
        match self.inner {
            NextInner::Chain { middleware, next } => middleware.process(ctx, request, *next).await,
            NextInner::Handlers(handlers) => {
                for handler in handlers {
                    if let Some(response) = handler.handle(ctx, &request).await {
                        return response;
                    }
                }
                ctx.set_outcome(PipelineOutcome::Unhandled);
                Response::empty(StatusCode::NOT_FOUND)
            }
            NextInner::Status(status) => {
                ctx.set_outcome(PipelineOutcome::Rejected(status));
                Response::empty(status)
            }
        }
    }
}
