//! Ordered request pipeline.
//!
//! A [`Pipeline`] is assembled once, before any connector accepts traffic,
//! and is immutable afterwards. Requests flow through the stages in the
//! order they were added and then reach the handlers in registration order.
//!
//! ```text
//! Request → RequestLog → Access → [Shutdown, Static] → 404
//!              ↑                                        │
//! Response ←───┴────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use crate::context::MiddlewareContext;
use http::StatusCode;

use crate::handler::{BoxedHandler, Handler};
use crate::middleware::{Middleware, Next};
use crate::types::{Request, Response};

/// A type-erased middleware that can be stored in a vector.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// The assembled, immutable request pipeline.
///
/// # Example
///
/// ```ignore
/// use gatehouse_middleware::{Pipeline, RequestLogMiddleware};
///
/// let pipeline = Pipeline::builder()
///     .stage(RequestLogMiddleware::new())
///     .stage(access)
///     .handler(shutdown)
///     .handler(static_files)
///     .build();
///
/// let response = pipeline.process(&mut ctx, request).await;
/// ```
#[derive(Clone)]
pub struct Pipeline {
    stages: Arc<[BoxedMiddleware]>,
    handlers: Arc<[BoxedHandler]>,
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Runs a request through every stage and then the handlers.
    ///
    /// The outcome recorded by whichever stage settled the request is left
    /// on `ctx` for the caller.
    pub async fn process(&self, ctx: &mut MiddlewareContext, request: Request) -> Response {
        self.chain_to(Next::handlers(&self.handlers))
            .run(ctx, request)
            .await
    }

    /// Runs a request the caller could not accept through every stage,
    /// answering `status` instead of offering it to the handlers.
    ///
    /// Stages still see the request, so it is logged, and a stage that
    /// refuses it first wins.
    pub async fn refuse(
        &self,
        ctx: &mut MiddlewareContext,
        request: Request,
        status: StatusCode,
    ) -> Response {
        self.chain_to(Next::status(status)).run(ctx, request).await
    }

    fn chain_to<'a>(&'a self, mut next: Next<'a>) -> Next<'a> {
        for middleware in self.stages.iter().rev() {
            next = Next::new(middleware.as_ref(), next);
        }
        next
    }

    /// Returns the names of all stages in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|m| m.name()).collect()
    }

    /// Returns the names of all handlers in order.
    #[must_use]
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .field("handlers", &self.handler_names())
            .finish()
    }
}

/// Builder for constructing a [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<BoxedMiddleware>,
    handlers: Vec<BoxedHandler>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware stage.
    #[must_use]
    pub fn stage<M: Middleware>(mut self, middleware: M) -> Self {
        self.stages.push(Arc::new(middleware));
        self
    }

    /// Appends a content handler.
    ///
    /// Handlers are offered requests in the order they are added.
    #[must_use]
    pub fn handler<H: Handler>(mut self, handler: H) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Freezes the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.stages.into(),
            handlers: self.handlers.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Connector;
    use crate::middleware::BoxFuture;
    use crate::types::{PipelineOutcome, ResponseExt};
    use bytes::Bytes;
    use http::Request as HttpRequest;
    use http_body_util::Full;
    use std::sync::Mutex;

    struct Recording {
        name: &'static str,
        order: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Middleware for Recording {
        fn name(&self) -> &'static str {
            self.name
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut MiddlewareContext,
            request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, Response> {
            Box::pin(async move {
                self.order.lock().unwrap().push(self.name);
                next.run(ctx, request).await
            })
        }
    }

    struct Refuse;

    impl Middleware for Refuse {
        fn name(&self) -> &'static str {
            "refuse"
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut MiddlewareContext,
            _request: Request,
            _next: Next<'a>,
        ) -> BoxFuture<'a, Response> {
            Box::pin(async move {
                ctx.set_outcome(PipelineOutcome::Rejected(StatusCode::FORBIDDEN));
                Response::empty(StatusCode::FORBIDDEN)
            })
        }
    }

    struct Ok200;

    impl Handler for Ok200 {
        fn name(&self) -> &'static str {
            "ok"
        }

        fn handle<'a>(
            &'a self,
            ctx: &'a mut MiddlewareContext,
            _request: &'a Request,
        ) -> BoxFuture<'a, Option<Response>> {
            Box::pin(async move {
                ctx.set_outcome(PipelineOutcome::Static);
                Some(Response::empty(StatusCode::OK))
            })
        }
    }

    fn request() -> Request {
        HttpRequest::builder()
            .uri("/")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_stages_run_in_insertion_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .stage(Recording { name: "one", order: order.clone() })
            .stage(Recording { name: "two", order: order.clone() })
            .stage(Recording { name: "three", order: order.clone() })
            .handler(Ok200)
            .build();

        assert_eq!(pipeline.stage_names(), vec!["one", "two", "three"]);

        let mut ctx = MiddlewareContext::new(None, Connector::Plain);
        let response = pipeline.process(&mut ctx, request()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*order.lock().unwrap(), vec!["one", "two", "three"]);
        assert_eq!(ctx.outcome(), Some(PipelineOutcome::Static));
    }

    #[tokio::test]
    async fn test_refusing_stage_skips_rest() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .stage(Recording { name: "before", order: order.clone() })
            .stage(Refuse)
            .stage(Recording { name: "after", order: order.clone() })
            .handler(Ok200)
            .build();

        let mut ctx = MiddlewareContext::new(None, Connector::Plain);
        let response = pipeline.process(&mut ctx, request()).await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(*order.lock().unwrap(), vec!["before"]);
        assert_eq!(
            ctx.outcome(),
            Some(PipelineOutcome::Rejected(StatusCode::FORBIDDEN))
        );
    }

    #[tokio::test]
    async fn test_empty_pipeline_is_404() {
        let pipeline = Pipeline::builder().build();
        let mut ctx = MiddlewareContext::new(None, Connector::Plain);
        let response = pipeline.process(&mut ctx, request()).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(ctx.outcome(), Some(PipelineOutcome::Unhandled));
    }

    #[tokio::test]
    async fn test_refuse_skips_handlers_but_runs_stages() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .stage(Recording { name: "log", order: order.clone() })
            .handler(Ok200)
            .build();

        let mut ctx = MiddlewareContext::new(None, Connector::Plain);
        let response = pipeline
            .refuse(&mut ctx, request(), StatusCode::PAYLOAD_TOO_LARGE)
            .await;

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(*order.lock().unwrap(), vec!["log"]);
        assert_eq!(
            ctx.outcome(),
            Some(PipelineOutcome::Rejected(StatusCode::PAYLOAD_TOO_LARGE))
        );
    }

    #[tokio::test]
    async fn test_refusing_stage_wins_over_refuse_status() {
        let pipeline = Pipeline::builder().stage(Refuse).handler(Ok200).build();

        let mut ctx = MiddlewareContext::new(None, Connector::Plain);
        let response = pipeline
            .refuse(&mut ctx, request(), StatusCode::REQUEST_TIMEOUT)
            .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_pipeline_is_cheap_to_clone() {
        let pipeline = Pipeline::builder().handler(Ok200).build();
        let copy = pipeline.clone();
        assert_eq!(copy.handler_names(), vec!["ok"]);
    }
}
