//! In-process transport driven by the test or embedding code.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Connection, ConnectionId, Transport, TransportEvents};
use crate::error::{Result, SocketError};
use crate::notification::ErrorDetail;

#[derive(Debug, Default)]
struct RemoteState {
    open: bool,
    close_requested: bool,
    sent: Vec<String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    remotes: Vec<MemoryRemote>,
    failures: VecDeque<String>,
}

/// Transport whose connections are driven through [`MemoryRemote`]s.
///
/// Nothing happens on its own: a connection only opens when its remote
/// calls [`MemoryRemote::accept`].
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    /// Create a transport with no connections.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `connect` fail synchronously with `reason`.
    pub fn fail_next_connect(&self, reason: impl Into<String>) {
        self.state.lock().failures.push_back(reason.into());
    }

    /// Number of handles built so far.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.state.lock().remotes.len()
    }

    /// Remote end of the `index`-th handle built.
    #[must_use]
    pub fn remote(&self, index: usize) -> Option<MemoryRemote> {
        self.state.lock().remotes.get(index).cloned()
    }

    /// Remote end of the most recent handle.
    #[must_use]
    pub fn latest(&self) -> Option<MemoryRemote> {
        self.state.lock().remotes.last().cloned()
    }
}

impl Transport for MemoryTransport {
    type Connection = MemoryConnection;

    fn connect(&mut self, url: &str, events: TransportEvents) -> Result<MemoryConnection> {
        let mut state = self.state.lock();
        if let Some(reason) = state.failures.pop_front() {
            return Err(SocketError::Transport(reason));
        }

        let shared = Arc::new(Mutex::new(RemoteState::default()));
        state.remotes.push(MemoryRemote {
            url: url.to_string(),
            shared: Arc::clone(&shared),
            events: events.clone(),
        });

        Ok(MemoryConnection { shared, events })
    }
}

/// The far end of a [`MemoryConnection`].
#[derive(Debug, Clone)]
pub struct MemoryRemote {
    url: String,
    shared: Arc<Mutex<RemoteState>>,
    events: TransportEvents,
}

impl MemoryRemote {
    /// Handle this remote belongs to.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.events.id()
    }

    /// URL the handle was built for.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Complete the connection.
    pub fn accept(&self) {
        self.shared.lock().open = true;
        self.events.opened();
    }

    /// Close the connection from the remote side.
    pub fn disconnect(&self) {
        self.shared.lock().open = false;
        self.events.closed();
    }

    /// Report a transport failure.
    pub fn fail(&self, message: impl Into<String>) {
        self.events.error(ErrorDetail::new("TransportError", message));
    }

    /// Deliver a message to the client.
    pub fn push(&self, payload: impl Into<String>) {
        self.events.message(payload);
    }

    /// Payloads the client has sent, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        self.shared.lock().sent.clone()
    }

    /// Whether the handle is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.shared.lock().open
    }

    /// Whether the client asked to close the handle.
    #[must_use]
    pub fn close_requested(&self) -> bool {
        self.shared.lock().close_requested
    }
}

/// Client end of a [`MemoryTransport`] connection.
#[derive(Debug)]
pub struct MemoryConnection {
    shared: Arc<Mutex<RemoteState>>,
    events: TransportEvents,
}

impl Connection for MemoryConnection {
    fn is_open(&self) -> bool {
        self.shared.lock().open
    }

    fn send(&mut self, payload: &str) -> Result<()> {
        let mut state = self.shared.lock();
        if !state.open {
            return Err(SocketError::NotConnected);
        }
        state.sent.push(payload.to_string());
        Ok(())
    }

    fn close(&mut self) {
        {
            let mut state = self.shared.lock();
            if state.close_requested {
                return;
            }
            state.close_requested = true;
            state.open = false;
        }
        self.events.closed();
    }
}
