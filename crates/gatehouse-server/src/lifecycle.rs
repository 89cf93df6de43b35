//! Server lifecycle state machine.
//!
//! ```text
//! Created → Configured → Running → Stopping → Stopped
//! ```
//!
//! - `Created`: a [`Server`](crate::Server) exists; nothing is bound.
//! - `Configured`: listeners are bound, TLS material is loaded and the
//!   pipeline is assembled.
//! - `Running`: connectors accept connections.
//! - `Stopping`: a stop was requested; accepting has ended and in-flight
//!   connections are draining.
//! - `Stopped`: every listening socket has been released.
//!
//! Transitions only move forward. The current state is published on a
//! `tokio::sync::watch` channel so callers can await a particular state.

use std::fmt;

use tokio::sync::watch;

/// Lifecycle state of a server instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ServerState {
    /// Constructed, nothing bound.
    Created,
    /// Listeners bound and pipeline assembled.
    Configured,
    /// Accepting connections.
    Running,
    /// Draining in-flight connections.
    Stopping,
    /// All listeners released.
    Stopped,
}

impl ServerState {
    /// Returns `true` once the server can no longer accept connections.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Configured => "configured",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        })
    }
}

/// Owner side of the state channel.
#[derive(Debug, Clone)]
pub(crate) struct Lifecycle {
    tx: watch::Sender<ServerState>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(ServerState::Created);
        Self { tx }
    }

    /// Moves to `next` if it is later than the current state.
    ///
    /// Returns `true` if the state changed.
    pub(crate) fn advance(&self, next: ServerState) -> bool {
        let mut previous = None;
        let changed = self.tx.send_if_modified(|current| {
            if next > *current {
                previous = Some(*current);
                *current = next;
                true
            } else {
                false
            }
        });
        if let Some(from) = previous {
            tracing::debug!(from = %from, to = %next, "Server state changed");
        }
        changed
    }

    pub(crate) fn current(&self) -> ServerState {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.tx.subscribe()
    }
}
