//! End-to-end pipeline tests.
//!
//! These run the production stages in production order, with simple
//! handlers standing in for the shutdown and static content handlers:
//!
//! 1. Request log
//! 2. Access filter
//! 3. Handlers, first claim wins
//! 4. 404 when nobody claims

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use gatehouse_middleware::{
    stages::{
        AccessFilter, AccessMiddleware, AccessRuleSet, AddressRules, RequestLogEntry,
        RequestLogMiddleware,
    },
    BoxFuture, Connector, Handler, MiddlewareContext, Pipeline, PipelineOutcome, Request,
    Response, ResponseExt,
};
use http::{Method, Request as HttpRequest, StatusCode};
use http_body_util::Full;

/// Claims `/shutdown` and counts how often it ran.
struct FakeShutdown {
    calls: Arc<AtomicUsize>,
}

impl Handler for FakeShutdown {
    fn name(&self) -> &'static str {
        "shutdown"
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: &'a Request,
    ) -> BoxFuture<'a, Option<Response>> {
        Box::pin(async move {
            if request.uri().path() != "/shutdown" {
                return None;
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            ctx.set_outcome(PipelineOutcome::Shutdown);
            let status = if request.method() == Method::POST {
                StatusCode::OK
            } else {
                StatusCode::BAD_REQUEST
            };
            Some(Response::empty(status))
        })
    }
}

/// Serves `/index.html` and counts how often it ran.
struct FakeStatic {
    calls: Arc<AtomicUsize>,
}

impl Handler for FakeStatic {
    fn name(&self) -> &'static str {
        "static"
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: &'a Request,
    ) -> BoxFuture<'a, Option<Response>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if request.uri().path() != "/index.html" {
                return None;
            }
            ctx.set_outcome(PipelineOutcome::Static);
            Some(http::Response::new(Full::new(Bytes::from_static(b"<html></html>"))))
        })
    }
}

struct Fixture {
    pipeline: Pipeline,
    shutdown_calls: Arc<AtomicUsize>,
    static_calls: Arc<AtomicUsize>,
}

fn fixture(filter: AccessFilter) -> Fixture {
    let shutdown_calls = Arc::new(AtomicUsize::new(0));
    let static_calls = Arc::new(AtomicUsize::new(0));
    let pipeline = Pipeline::builder()
        .stage(RequestLogMiddleware::new())
        .stage(AccessMiddleware::new(filter))
        .handler(FakeShutdown {
            calls: shutdown_calls.clone(),
        })
        .handler(FakeStatic {
            calls: static_calls.clone(),
        })
        .build();
    Fixture {
        pipeline,
        shutdown_calls,
        static_calls,
    }
}

fn ua_filter() -> AccessFilter {
    let rules = AccessRuleSet::new()
        .allow("User-Agent", ["gatehouse-stop", "Let's Encrypt validation server"])
        .unwrap();
    AccessFilter::new(rules, AddressRules::default())
}

fn make_request(method: Method, path: &str, user_agent: Option<&str>) -> Request {
    let mut builder = HttpRequest::builder().method(method).uri(path);
    if let Some(ua) = user_agent {
        builder = builder.header("user-agent", ua);
    }
    builder.body(Full::new(Bytes::new())).unwrap()
}

async fn run(pipeline: &Pipeline, request: Request) -> (Response, MiddlewareContext) {
    let mut ctx = MiddlewareContext::new(Some("127.0.0.1:52000".parse().unwrap()), Connector::Plain);
    let response = pipeline.process(&mut ctx, request).await;
    (response, ctx)
}

#[test]
fn test_stage_order() {
    let f = fixture(AccessFilter::allow_all());
    assert_eq!(f.pipeline.stage_names(), vec!["request_log", "access"]);
    assert_eq!(f.pipeline.handler_names(), vec!["shutdown", "static"]);
}

#[tokio::test]
async fn test_denied_request_reaches_no_handler() {
    let f = fixture(ua_filter());

    let (response, ctx) = run(
        &f.pipeline,
        make_request(Method::POST, "/shutdown?token=x", Some("curl/8.5.0")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(f.shutdown_calls.load(Ordering::SeqCst), 0);
    assert_eq!(f.static_calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        ctx.outcome(),
        Some(PipelineOutcome::Rejected(StatusCode::FORBIDDEN))
    );

    // The log stage sits outside the filter and still records the refusal.
    let entry = ctx.get_extension::<RequestLogEntry>().unwrap();
    assert_eq!(entry.status, 403);
    assert_eq!(entry.target, "/shutdown?token=***");
}

#[tokio::test]
async fn test_allowed_request_is_served() {
    let f = fixture(ua_filter());

    let (response, ctx) = run(
        &f.pipeline,
        make_request(
            Method::GET,
            "/index.html",
            Some("Mozilla/5.0 (compatible; Let's Encrypt validation server)"),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(ctx.outcome(), Some(PipelineOutcome::Static));
    assert_eq!(ctx.get_extension::<RequestLogEntry>().unwrap().bytes, Some(13));
}

#[tokio::test]
async fn test_shutdown_claim_is_exclusive() {
    let f = fixture(AccessFilter::allow_all());

    let (response, ctx) = run(&f.pipeline, make_request(Method::POST, "/shutdown", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(ctx.outcome(), Some(PipelineOutcome::Shutdown));
    assert_eq!(f.shutdown_calls.load(Ordering::SeqCst), 1);
    assert_eq!(f.static_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_wrong_method_on_shutdown_is_claimed() {
    let f = fixture(AccessFilter::allow_all());

    let (response, ctx) = run(&f.pipeline, make_request(Method::GET, "/shutdown", None)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(ctx.outcome(), Some(PipelineOutcome::Shutdown));
    assert_eq!(f.static_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unclaimed_request_is_empty_404() {
    let f = fixture(AccessFilter::allow_all());

    let (response, ctx) = run(&f.pipeline, make_request(Method::GET, "/nope.txt", None)).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().is_empty());
    assert_eq!(ctx.outcome(), Some(PipelineOutcome::Unhandled));
    assert_eq!(f.static_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_address_fallback_applies_without_header_rules() {
    let fallback = AddressRules::new(vec![], vec!["127.0.0.0/8".parse().unwrap()]);
    let f = fixture(AccessFilter::new(AccessRuleSet::new(), fallback));

    let (response, _) = run(&f.pipeline, make_request(Method::GET, "/index.html", None)).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(f.static_calls.load(Ordering::SeqCst), 0);
}
