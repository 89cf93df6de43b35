//! Shutdown coordination.
//!
//! A stop can be requested three ways, all ending in the same
//! [`ShutdownSignal`]:
//!
//! - `POST /shutdown?token=...`, handled by [`ShutdownHandler`]
//! - SIGINT or SIGTERM, see [`wait_for_os_signal`]
//! - a [`StopHandle`] held by the embedding program
//!
//! Once the signal fires the accept loop ends, every open connection is
//! told to finish its current response and close, and the
//! [`ConnectionTracker`] lets the server wait for them within a bound.
//!
//! # Example
//!
//! ```rust
//! use gatehouse_server::ShutdownSignal;
//!
//! let shutdown = ShutdownSignal::new();
//! let clone = shutdown.clone();
//!
//! shutdown.trigger();
//! assert!(clone.is_shutdown());
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use gatehouse_middleware::{
    BoxFuture, Handler, MiddlewareContext, PipelineOutcome, Request, Response, ResponseExt,
};
use http::{Method, StatusCode};
use tokio::sync::{watch, Notify};

/// Path claimed by the shutdown endpoint.
pub const SHUTDOWN_PATH: &str = "/shutdown";

/// Query parameter carrying the shutdown token.
pub const TOKEN_PARAM: &str = "token";

/// One-shot stop flag shared by the accept loop and every connection.
///
/// Clones share state; triggering any clone wakes every pending
/// [`recv`](Self::recv), including ones created after the trigger.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    fired: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    /// Creates an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        let (fired, _) = watch::channel(false);
        Self {
            fired: Arc::new(fired),
        }
    }

    /// Fires the signal.
    ///
    /// Returns `true` only for the call that flipped it.
    pub fn trigger(&self) -> bool {
        self.fired.send_if_modified(|fired| !std::mem::replace(fired, true))
    }

    /// Returns `true` once the signal has fired.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        *self.fired.borrow()
    }

    /// Returns a future that resolves once the signal has fired.
    pub fn recv(&self) -> ShutdownReceiver {
        let mut fired = self.fired.subscribe();
        ShutdownReceiver {
            wait: Box::pin(async move {
                // An error means every sender is gone, so nothing can fire
                // any more; resolve rather than hang
                let _ = fired.wait_for(|done| *done).await;
            }),
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Future returned by [`ShutdownSignal::recv()`].
pub struct ShutdownReceiver {
    wait: BoxFuture<'static, ()>,
}

impl Future for ShutdownReceiver {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.wait.as_mut().poll(cx)
    }
}

impl std::fmt::Debug for ShutdownReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownReceiver").finish_non_exhaustive()
    }
}

/// Waits for SIGTERM or SIGINT (Ctrl+C elsewhere).
///
/// # Errors
///
/// Returns an error if the signal handlers cannot be registered.
pub async fn wait_for_os_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, stopping");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT, stopping");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received Ctrl+C, stopping");
    }

    Ok(())
}

/// Requests that a running server stop.
///
/// Cheap to clone. Requesting a stop more than once has no further effect.
#[derive(Debug, Clone)]
pub struct StopHandle {
    signal: ShutdownSignal,
}

impl StopHandle {
    pub(crate) fn new(signal: ShutdownSignal) -> Self {
        Self { signal }
    }

    /// Asks the server to stop accepting and drain.
    ///
    /// Returns `true` if this call initiated the stop.
    pub fn request_stop(&self) -> bool {
        self.signal.trigger()
    }

    /// Returns `true` once a stop has been requested.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.signal.is_shutdown()
    }
}

/// Tracks open connections so shutdown can wait for them.
///
/// # Example
///
/// ```rust
/// use gatehouse_server::shutdown::ConnectionTracker;
///
/// let tracker = ConnectionTracker::new();
/// let token = tracker.acquire();
/// assert_eq!(tracker.active_connections(), 1);
///
/// drop(token);
/// assert_eq!(tracker.active_connections(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    active: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl ConnectionTracker {
    /// Creates a new connection tracker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Acquires a token to hold for the lifetime of one connection.
    #[must_use]
    pub fn acquire(&self) -> ConnectionToken {
        self.active.fetch_add(1, Ordering::SeqCst);
        ConnectionToken {
            active: Arc::clone(&self.active),
            notify: Arc::clone(&self.notify),
        }
    }

    /// Returns the number of open connections.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Waits until every connection has closed.
    pub async fn wait_for_idle(&self) {
        loop {
            let notified = self.notify.notified();
            if self.active.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// A token representing an open connection.
#[derive(Debug)]
pub struct ConnectionToken {
    active: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl Drop for ConnectionToken {
    fn drop(&mut self) {
        if self.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify.notify_waiters();
        }
    }
}

/// Handler for `POST /shutdown?token=...`.
///
/// | Request                                   | Response | Stops |
/// |-------------------------------------------|----------|-------|
/// | any path other than `/shutdown`           | declined | no    |
/// | `/shutdown` with a method other than POST | 400      | no    |
/// | POST, token required, token wrong/missing | 401      | no    |
/// | POST, token matches or not required       | 200      | yes   |
///
/// The stop is requested from a separate task after the handler returns,
/// and connections drain gracefully, so the `200` reaches the client intact.
#[derive(Debug, Clone)]
pub struct ShutdownHandler {
    token: String,
    require_token: bool,
    stop: StopHandle,
}

impl ShutdownHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new(token: impl Into<String>, require_token: bool, stop: StopHandle) -> Self {
        Self {
            token: token.into(),
            require_token,
            stop,
        }
    }

    fn token_matches(&self, request: &Request) -> bool {
        query_param(request.uri().query(), TOKEN_PARAM)
            .is_some_and(|supplied| constant_time_eq(supplied.as_bytes(), self.token.as_bytes()))
    }
}

impl Handler for ShutdownHandler {
    fn name(&self) -> &'static str {
        "shutdown"
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: &'a Request,
    ) -> BoxFuture<'a, Option<Response>> {
        Box::pin(async move {
            if request.uri().path() != SHUTDOWN_PATH {
                return None;
            }

            if request.method() != Method::POST {
                ctx.set_outcome(PipelineOutcome::Shutdown);
                return Some(Response::empty(StatusCode::BAD_REQUEST));
            }

            if self.require_token && !self.token_matches(request) {
                tracing::warn!(
                    remote = ?ctx.remote_addr(),
                    "Shutdown refused: token mismatch"
                );
                ctx.set_outcome(PipelineOutcome::Rejected(StatusCode::UNAUTHORIZED));
                return Some(Response::empty(StatusCode::UNAUTHORIZED));
            }

            tracing::info!(remote = ?ctx.remote_addr(), "Shutdown requested");
            ctx.set_outcome(PipelineOutcome::Shutdown);

            let stop = self.stop.clone();
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                stop.request_stop();
            });

            Some(Response::empty(StatusCode::OK))
        })
    }
}

/// Returns the percent-decoded value of the first `name` parameter.
fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    query?
        .split('&')
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .find(|(key, _)| *key == name)
        .and_then(|(_, value)| {
            urlencoding::decode(&value.replace('+', " "))
                .ok()
                .map(|v| v.into_owned())
        })
}

/// Compares two byte strings without short-circuiting on the first
/// differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
