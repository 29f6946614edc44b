//! Transport seam.
//!
//! A [`Transport`] builds [`Connection`]s. Each connection reports what
//! happens to it through the [`TransportEvents`] it was created with; the
//! events land in the manager's inbox and are applied in arrival order.

mod memory;
mod ws;

use std::fmt;

use tokio::sync::mpsc;

use crate::error::Result;
use crate::notification::ErrorDetail;

pub use memory::{MemoryConnection, MemoryRemote, MemoryTransport};
pub use ws::{parse_ws_url, WsConnection, WsTransport};

/// Identifies one transport handle for the lifetime of a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Something a transport handle reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The handle finished connecting.
    Opened,
    /// The handle closed, for whatever reason.
    Closed,
    /// The handle reported a failure.
    Error(ErrorDetail),
    /// A message arrived.
    Message(String),
}

/// Work items for a connection manager, delivered serially.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// An event from a transport handle.
    Transport {
        /// The handle that produced it.
        id: ConnectionId,
        /// What happened.
        event: TransportEvent,
    },
    /// A reconnect timer fired.
    ReconnectDue(u64),
}

/// Event sink handed to a transport for one connection.
#[derive(Debug, Clone)]
pub struct TransportEvents {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Inbound>,
}

impl TransportEvents {
    pub(crate) const fn new(id: ConnectionId, tx: mpsc::UnboundedSender<Inbound>) -> Self {
        Self { id, tx }
    }

    /// The connection these events belong to.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Report an event. Returns `false` if the manager is gone.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx.send(Inbound::Transport { id: self.id, event }).is_ok()
    }

    /// Report that the connection opened.
    pub fn opened(&self) -> bool {
        self.emit(TransportEvent::Opened)
    }

    /// Report that the connection closed.
    pub fn closed(&self) -> bool {
        self.emit(TransportEvent::Closed)
    }

    /// Report a failure.
    pub fn error(&self, detail: ErrorDetail) -> bool {
        self.emit(TransportEvent::Error(detail))
    }

    /// Report a received message.
    pub fn message(&self, payload: impl Into<String>) -> bool {
        self.emit(TransportEvent::Message(payload.into()))
    }
}

/// A live transport handle.
pub trait Connection: Send {
    /// Whether the handle can send right now.
    fn is_open(&self) -> bool;

    /// Send one payload.
    ///
    /// # Errors
    ///
    /// Fails when the handle is not open or the underlying write fails.
    fn send(&mut self, payload: &str) -> Result<()>;

    /// Start closing. A [`TransportEvent::Closed`] follows.
    fn close(&mut self);
}

/// Builds transport handles.
pub trait Transport: Send {
    /// The handle type this transport produces.
    type Connection: Connection;

    /// Begin connecting to `url`.
    ///
    /// Returning `Ok` means a handle exists; whether it opens is reported
    /// later through `events`.
    ///
    /// # Errors
    ///
    /// Fails when no handle could be constructed at all, e.g. for a
    /// malformed URL.
    fn connect(&mut self, url: &str, events: TransportEvents) -> Result<Self::Connection>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_are_tagged_with_connection_id() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let events = TransportEvents::new(ConnectionId(7), tx);

        assert!(events.opened());
        assert!(events.message("hello"));

        assert_eq!(
            rx.try_recv().unwrap(),
            Inbound::Transport {
                id: ConnectionId(7),
                event: TransportEvent::Opened
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            Inbound::Transport {
                id: ConnectionId(7),
                event: TransportEvent::Message("hello".to_string())
            }
        );
    }

    #[test]
    fn test_emit_after_manager_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        let events = TransportEvents::new(ConnectionId(1), tx);
        drop(rx);
        assert!(!events.closed());
    }

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId(3).to_string(), "conn-3");
    }
}
