//! Content handlers at the end of the pipeline.
//!
//! Handlers are offered the request in registration order. A handler either
//! claims it by returning `Some(response)` or passes by returning `None`.
//! Claiming is exclusive: once one handler answers, no later handler sees
//! the request.

use std::sync::Arc;

use crate::context::MiddlewareContext;
use crate::middleware::BoxFuture;
use crate::types::{Request, Response};

/// A request handler that may decline requests it does not own.
pub trait Handler: Send + Sync + 'static {
    /// Returns the name of this handler.
    fn name(&self) -> &'static str;

    /// Offers the request to this handler.
    ///
    /// Returns `None` to let the next handler try. A handler that claims the
    /// request should record the outcome on `ctx`.
    fn handle<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: &'a Request,
    ) -> BoxFuture<'a, Option<Response>>;
}

/// A type-erased handler that can be stored in the pipeline.
pub type BoxedHandler = Arc<dyn Handler>;
