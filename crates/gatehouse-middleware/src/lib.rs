//! # Gatehouse Middleware
//!
//! The ordered request pipeline of the Gatehouse static file server.
//!
//! Every request passes through the same chain:
//!
//! ```text
//! Request → RequestLog → Access ─┬→ Shutdown ─┬→ Static ─┬→ 404
//!                                │            │          │
//!                               403          claim      claim
//! ```
//!
//! | Position | Component      | Purpose                                        |
//! |----------|----------------|------------------------------------------------|
//! | 1        | Request log    | One Extended NCSA line per completed request   |
//! | 2        | Access filter  | Header allow-list, address lists as fallback   |
//! | handler  | Shutdown       | `POST /shutdown?token=` stops the server       |
//! | handler  | Static content | Files under the static root                    |
//!
//! Stages implement [`Middleware`] and may short-circuit by not calling
//! [`Next::run`]. Content producers implement [`Handler`] and may decline a
//! request by returning `None`; if every handler declines, the pipeline
//! answers with an empty `404` and records [`PipelineOutcome::Unhandled`].
//!
//! The shutdown and static handlers live in `gatehouse-server`, which owns
//! the listeners they control.
//!
//! ## Example
//!
//! ```
//! use gatehouse_middleware::stages::{AccessFilter, AccessMiddleware, RequestLogMiddleware};
//! use gatehouse_middleware::Pipeline;
//!
//! let pipeline = Pipeline::builder()
//!     .stage(RequestLogMiddleware::new())
//!     .stage(AccessMiddleware::new(AccessFilter::allow_all()))
//!     .build();
//!
//! assert_eq!(pipeline.stage_names(), vec!["request_log", "access"]);
//! ```

#![doc(html_root_url = "https://docs.rs/gatehouse-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod handler;
pub mod middleware;
pub mod pipeline;
pub mod stages;
pub mod types;

// Re-export main types at crate root
pub use context::{Connector, MiddlewareContext};
pub use handler::{BoxedHandler, Handler};
pub use middleware::{BoxFuture, Middleware, Next};
pub use pipeline::{BoxedMiddleware, Pipeline, PipelineBuilder};
pub use types::{PipelineOutcome, Request, Response, ResponseExt};
