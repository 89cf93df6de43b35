//! Listener ownership and the serve loop.
//!
//! # Architecture
//!
//! - [`Server::bind`] validates the configuration, loads TLS material,
//!   binds the plain and TLS listeners (either may be disabled) and assembles
//!   the pipeline. Any failure here is fatal and nothing is left listening.
//! - [`BoundServer::serve`] accepts on every enabled listener and hands each
//!   connection to its own task, until the [`StopHandle`] fires.
//! - Request bodies are buffered up to the configured cap and within the
//!   idle timeout. A body that cannot be read is answered 413, 408 or 400
//!   through [`Pipeline::refuse`], so it is logged and filtered like any
//!   other request.
//! - On stop the listeners are closed at once, open connections finish
//!   their current exchange, and the drain is bounded by the configured
//!   shutdown timeout.
//!
//! The pipeline order is fixed:
//!
//! ```text
//! request log -> access filter -> shutdown handler -> static files -> 404
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use gatehouse_middleware::stages::AccessFilter;
//! use gatehouse_server::{Server, ServerConfig};
//!
//! # async fn example() -> Result<(), gatehouse_server::ServerError> {
//! let config = ServerConfig::builder()
//!     .http_port(8080)
//!     .static_root("/srv/www")
//!     .build();
//!
//! let server = Server::new(config, AccessFilter::allow_all()).bind().await?;
//! server.run().await
//! # }
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use gatehouse_middleware::stages::{AccessFilter, AccessMiddleware, RequestLogMiddleware};
use gatehouse_middleware::{Connector, MiddlewareContext, Pipeline, Request, Response};
use http::StatusCode;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_rustls::TlsAcceptor;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::lifecycle::{Lifecycle, ServerState};
use crate::shutdown::{
    wait_for_os_signal, ConnectionTracker, ShutdownHandler, ShutdownSignal, StopHandle,
};
use crate::static_files::{StaticFiles, StaticFilesHandler};
use crate::tls::load_tls_acceptor;

/// A configured but not yet bound server.
///
/// State: [`ServerState::Created`].
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    access: AccessFilter,
    lifecycle: Lifecycle,
}

impl Server {
    /// Creates a server from its runtime configuration and access filter.
    #[must_use]
    pub fn new(config: ServerConfig, access: AccessFilter) -> Self {
        Self {
            config,
            access,
            lifecycle: Lifecycle::new(),
        }
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Subscribes to lifecycle state changes.
    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.lifecycle.subscribe()
    }

    /// Binds every enabled listener and assembles the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the static root is
    /// unusable, TLS material cannot be loaded, or a port cannot be bound.
    /// Listeners bound before the failure are released.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let Self {
            config,
            access,
            lifecycle,
        } = self;

        config.validate()?;

        let files = StaticFiles::new(config.static_root())
            .map_err(|e| ServerError::config(e.to_string()))?;
        let files = match config.index_file() {
            Some(index) => files.index(index),
            None => files,
        }
        .serve_hidden(config.serve_hidden());

        let acceptor = config
            .tls_addr()
            .and(config.tls_files())
            .map(load_tls_acceptor)
            .transpose()?;

        let http = match config.http_addr() {
            Some(addr) => Some(bind_listener(addr).await?),
            None => None,
        };
        let tls = match (config.tls_addr(), acceptor) {
            (Some(addr), Some(acceptor)) => Some((bind_listener(addr).await?, acceptor)),
            _ => None,
        };

        let signal = ShutdownSignal::new();
        let stop = StopHandle::new(signal.clone());

        let pipeline = Pipeline::builder()
            .stage(RequestLogMiddleware::new())
            .stage(AccessMiddleware::new(access))
            .handler(ShutdownHandler::new(
                config.shutdown_token(),
                config.require_token(),
                stop.clone(),
            ))
            .handler(StaticFilesHandler::new(files))
            .build();

        lifecycle.advance(ServerState::Configured);

        let shared = Arc::new(Shared {
            pipeline,
            signal,
            idle_timeout: config.idle_timeout(),
            max_body_bytes: config.max_body_bytes(),
        });
        Ok(BoundServer {
            config,
            shared,
            http,
            tls,
            stop,
            lifecycle,
            tracker: ConnectionTracker::new(),
        })
    }

    /// Binds and serves until stopped, also stopping on SIGINT/SIGTERM.
    ///
    /// # Errors
    ///
    /// See [`Server::bind`] and [`BoundServer::serve`].
    pub async fn run(self) -> Result<(), ServerError> {
        self.bind().await?.run().await
    }
}

/// A server whose listeners are bound.
///
/// State: [`ServerState::Configured`] until [`serve`](Self::serve) is
/// called.
pub struct BoundServer {
    config: ServerConfig,
    shared: Arc<Shared>,
    http: Option<TcpListener>,
    tls: Option<(TcpListener, TlsAcceptor)>,
    stop: StopHandle,
    lifecycle: Lifecycle,
    tracker: ConnectionTracker,
}

impl BoundServer {
    /// Returns the bound address of the plain HTTP listener.
    #[must_use]
    pub fn local_http_addr(&self) -> Option<SocketAddr> {
        self.http.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Returns the bound address of the TLS listener.
    #[must_use]
    pub fn local_tls_addr(&self) -> Option<SocketAddr> {
        self.tls.as_ref().and_then(|(l, _)| l.local_addr().ok())
    }

    /// Returns a handle that stops the server.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Subscribes to lifecycle state changes.
    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.lifecycle.subscribe()
    }

    /// Returns the assembled pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.shared.pipeline
    }

    /// Serves until stopped, also stopping on SIGINT/SIGTERM.
    ///
    /// # Errors
    ///
    /// See [`serve`](Self::serve).
    pub async fn run(self) -> Result<(), ServerError> {
        let stop = self.stop_handle();
        let watcher = tokio::spawn(async move {
            match wait_for_os_signal().await {
                Ok(()) => {
                    stop.request_stop();
                }
                Err(e) => tracing::warn!(error = %e, "Failed to install signal handlers"),
            }
        });

        let result = self.serve().await;
        watcher.abort();
        result
    }

    /// Accepts connections until a stop is requested, then drains.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Shutdown`] if connections are still open when
    /// the shutdown timeout elapses. The listeners are released either way.
    pub async fn serve(self) -> Result<(), ServerError> {
        let Self {
            config,
            shared,
            http,
            tls,
            stop: _,
            lifecycle,
            tracker,
        } = self;

        lifecycle.advance(ServerState::Running);
        tracing::info!(
            http = ?http.as_ref().and_then(|l| l.local_addr().ok()),
            https = ?tls.as_ref().and_then(|(l, _)| l.local_addr().ok()),
            root = %config.static_root().display(),
            "Server started"
        );

        let mut shutdown = shared.signal.recv();
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    break;
                }
                accepted = accept_on(http.as_ref()) => match accepted {
                    Ok((stream, remote)) => {
                        let token = tracker.acquire();
                        let shared = Arc::clone(&shared);
                        tokio::spawn(async move {
                            serve_connection(stream, remote, Connector::Plain, shared).await;
                            drop(token);
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "Failed to accept connection"),
                },
                accepted = accept_on(tls.as_ref().map(|(l, _)| l)) => match accepted {
                    Ok((stream, remote)) => {
                        let token = tracker.acquire();
                        let shared = Arc::clone(&shared);
                        let acceptor = tls.as_ref().map(|(_, a)| a.clone());
                        tokio::spawn(async move {
                            if let Some(acceptor) = acceptor {
                                serve_tls_connection(stream, remote, acceptor, shared).await;
                            }
                            drop(token);
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "Failed to accept TLS connection"),
                },
            }
        }

        lifecycle.advance(ServerState::Stopping);

        // Refuse anything new while in-flight exchanges finish
        drop(http);
        drop(tls);

        let timeout = config.shutdown_timeout();
        tracing::info!(
            active = tracker.active_connections(),
            timeout = ?timeout,
            "Draining connections"
        );
        let drained = tokio::time::timeout(timeout, tracker.wait_for_idle())
            .await
            .is_ok();

        lifecycle.advance(ServerState::Stopped);

        if drained {
            tracing::info!("Server stopped");
            Ok(())
        } else {
            let active = tracker.active_connections();
            tracing::warn!(active, "Shutdown timeout reached");
            Err(ServerError::Shutdown(format!(
                "{active} connection(s) still open after {timeout:?}"
            )))
        }
    }
}

impl std::fmt::Debug for BoundServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundServer")
            .field("http", &self.local_http_addr())
            .field("https", &self.local_tls_addr())
            .field("state", &self.lifecycle.current())
            .field("pipeline", &self.shared.pipeline)
            .finish_non_exhaustive()
    }
}

/// State shared by every connection task.
#[derive(Debug)]
struct Shared {
    pipeline: Pipeline,
    signal: ShutdownSignal,
    idle_timeout: std::time::Duration,
    max_body_bytes: u64,
}

impl Shared {
    async fn handle_request(
        &self,
        request: hyper::Request<Incoming>,
        remote: SocketAddr,
        connector: Connector,
    ) -> Response {
        let (parts, body) = request.into_parts();
        let mut ctx = MiddlewareContext::new(Some(remote), connector);

        match self.read_body(body, remote).await {
            Ok(body) => {
                let request: Request = http::Request::from_parts(parts, Full::new(body));
                self.pipeline.process(&mut ctx, request).await
            }
            Err(status) => {
                let request: Request = http::Request::from_parts(parts, Full::default());
                self.pipeline.refuse(&mut ctx, request, status).await
            }
        }
    }

    /// Buffers the request body within the size cap and the idle bound.
    async fn read_body(&self, body: Incoming, remote: SocketAddr) -> Result<Bytes, StatusCode> {
        if body.size_hint().lower() > self.max_body_bytes {
            tracing::debug!(%remote, limit = self.max_body_bytes, "Announced body too large");
            return Err(StatusCode::PAYLOAD_TOO_LARGE);
        }

        let limit = usize::try_from(self.max_body_bytes).unwrap_or(usize::MAX);
        let read = tokio::time::timeout(self.idle_timeout, Limited::new(body, limit).collect());
        match read.await {
            Ok(Ok(collected)) => Ok(collected.to_bytes()),
            Ok(Err(e)) if e.is::<LengthLimitError>() => {
                tracing::debug!(%remote, limit = self.max_body_bytes, "Request body too large");
                Err(StatusCode::PAYLOAD_TOO_LARGE)
            }
            Ok(Err(e)) => {
                tracing::debug!(error = %e, %remote, "Failed to read request body");
                Err(StatusCode::BAD_REQUEST)
            }
            Err(_) => {
                tracing::debug!(%remote, "Request body timed out");
                Err(StatusCode::REQUEST_TIMEOUT)
            }
        }
    }
}

async fn bind_listener(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    tracing::info!(addr = %listener.local_addr().unwrap_or(addr), "Listening");
    Ok(listener)
}

/// Accepts on `listener`, or never completes if it is disabled.
async fn accept_on(listener: Option<&TcpListener>) -> std::io::Result<(TcpStream, SocketAddr)> {
    match listener {
        Some(listener) => listener.accept().await,
        None => std::future::pending().await,
    }
}

async fn serve_tls_connection(
    stream: TcpStream,
    remote: SocketAddr,
    acceptor: TlsAcceptor,
    shared: Arc<Shared>,
) {
    let handshake = tokio::time::timeout(shared.idle_timeout, acceptor.accept(stream));
    let stream = tokio::select! {
        result = handshake => match result {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                tracing::debug!(error = %e, %remote, "TLS handshake failed");
                return;
            }
            Err(_) => {
                tracing::debug!(%remote, "TLS handshake timed out");
                return;
            }
        },
        () = shared.signal.recv() => return,
    };
    serve_connection(stream, remote, Connector::Tls, shared).await;
}

async fn serve_connection<I>(io: I, remote: SocketAddr, connector: Connector, shared: Arc<Shared>)
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service_shared = Arc::clone(&shared);
    let service = service_fn(move |request: hyper::Request<Incoming>| {
        let shared = Arc::clone(&service_shared);
        async move {
            Ok::<_, Infallible>(shared.handle_request(request, remote, connector).await)
        }
    });

    let conn = http1::Builder::new()
        .timer(TokioTimer::new())
        .header_read_timeout(shared.idle_timeout)
        .serve_connection(TokioIo::new(io), service);
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => {
            if let Err(e) = result {
                tracing::debug!(error = %e, %remote, "Connection error");
            }
            return;
        }
        () = shared.signal.recv() => {}
    }

    // Let the in-flight response finish, then close
    conn.as_mut().graceful_shutdown();
    if let Err(e) = conn.await {
        tracing::debug!(error = %e, %remote, "Connection error during shutdown");
    }
}
