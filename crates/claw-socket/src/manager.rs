//! Connection manager: lifecycle, reconnection and subscription replay.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::config::SocketConfig;
use crate::dispatch::EventDispatcher;
use crate::error::SocketError;
use crate::hooks::{ConnectionHooks, NoopHooks};
use crate::notification::{ConnectionInfo, ErrorDetail, Notification};
use crate::reconnect::ReconnectScheduler;
use crate::state::{AtomicConnectionStatus, ConnectionStateMachine, ConnectionStatus};
use crate::store::SubscriptionStore;
use crate::transport::{
    Connection, ConnectionId, Inbound, Transport, TransportEvent, TransportEvents,
};

/// Message carried by the error notification for a send without an open
/// transport.
pub const NOT_CONNECTED_MESSAGE: &str = "socket is not connected";

// Lifecycle lines are only emitted when `debug_logging` is set.
macro_rules! lifecycle {
    ($self:ident, $level:ident, $($arg:tt)+) => {
        if $self.config.debug_logging {
            tracing::$level!(
                connection = %$self.config.connection_name,
                status = %$self.machine.status(),
                $($arg)+
            );
        }
    };
}

struct ActiveConnection<C> {
    id: ConnectionId,
    conn: C,
}

/// Owns one logical connection and keeps it alive.
///
/// All methods take `&mut self` and run to completion; transport events
/// and reconnect timers are queued in an inbox and applied through
/// [`handle`](Self::handle), [`pump`](Self::pump) or a
/// [`SocketHandle`](crate::SocketHandle) driver task.
pub struct ConnectionManager<T: Transport> {
    config: SocketConfig,
    transport: T,
    connection: Option<ActiveConnection<T::Connection>>,
    next_connection_id: u64,
    machine: ConnectionStateMachine,
    status: Arc<AtomicConnectionStatus>,
    scheduler: ReconnectScheduler,
    store: SubscriptionStore,
    dispatcher: EventDispatcher,
    stopped: bool,
    disposed: bool,
    inbox_tx: mpsc::UnboundedSender<Inbound>,
    inbox_rx: mpsc::UnboundedReceiver<Inbound>,
}

impl<T: Transport> std::fmt::Debug for ConnectionManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connection_name", &self.config.connection_name)
            .field("url", &self.config.url)
            .field("status", &self.machine.status())
            .field("connection", &self.connection.as_ref().map(|c| c.id))
            .field("stored_requests", &self.store.len())
            .field("scheduler", &self.scheduler)
            .field("stopped", &self.stopped)
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl<T: Transport> ConnectionManager<T> {
    /// Create a manager in [`ConnectionStatus::Init`] with no hooks.
    #[must_use]
    pub fn new(config: SocketConfig, transport: T) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            scheduler: ReconnectScheduler::new(config.reconnect),
            store: SubscriptionStore::new(config.max_stored_requests),
            config,
            transport,
            connection: None,
            next_connection_id: 0,
            machine: ConnectionStateMachine::new(),
            status: Arc::new(AtomicConnectionStatus::new(ConnectionStatus::Init)),
            dispatcher: EventDispatcher::new(NoopHooks),
            stopped: false,
            disposed: false,
            inbox_tx,
            inbox_rx,
        }
    }

    /// Install lifecycle hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: impl ConnectionHooks + 'static) -> Self {
        self.dispatcher = EventDispatcher::new(hooks);
        self
    }

    /// The configuration this manager was built with.
    #[must_use]
    pub const fn config(&self) -> &SocketConfig {
        &self.config
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> ConnectionStatus {
        self.machine.status()
    }

    /// Snapshot of name, URL and status.
    #[must_use]
    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            name: self.config.connection_name.clone(),
            url: self.config.url.clone(),
            status: self.machine.status(),
        }
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub const fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Whether a transport handle is currently held.
    #[must_use]
    pub const fn has_connection(&self) -> bool {
        self.connection.is_some()
    }

    /// Whether a reconnect attempt is pending.
    #[must_use]
    pub const fn reconnect_pending(&self) -> bool {
        self.scheduler.is_armed()
    }

    /// Delay the next reconnect attempt will wait.
    #[must_use]
    pub const fn reconnect_delay(&self) -> std::time::Duration {
        self.scheduler.current_delay()
    }

    pub(crate) fn status_handle(&self) -> Arc<AtomicConnectionStatus> {
        Arc::clone(&self.status)
    }

    /// Start connecting. Does nothing when already connected or disposed.
    ///
    /// A transport that cannot even build a handle is reported through the
    /// error hook; the status stays where the state machine put it and no
    /// retry is scheduled.
    pub fn open(&mut self) {
        if self.disposed {
            warn!(
                connection = %self.config.connection_name,
                "open called on disposed connection manager"
            );
            return;
        }
        if self.machine.status() == ConnectionStatus::Connected {
            lifecycle!(self, debug, "connection already established");
            return;
        }

        if self.machine.request_open() {
            self.publish_status();
            lifecycle!(self, debug, "initializing connection");
            let notification = self.notification();
            self.dispatcher.connecting(&notification);
        }

        self.scheduler.cancel();
        self.retire_connection();
        self.stopped = false;

        self.next_connection_id += 1;
        let id = ConnectionId(self.next_connection_id);
        let events = TransportEvents::new(id, self.inbox_tx.clone());

        match self.transport.connect(&self.config.url, events) {
            Ok(conn) => {
                lifecycle!(self, trace, %id, "transport handle created");
                self.connection = Some(ActiveConnection { id, conn });
            }
            Err(err) => {
                lifecycle!(self, error, error = %err, "error creating connection");
                self.report_error(&err);
            }
        }
    }

    /// Stop the connection on request. Only applies while connected or
    /// connecting; no reconnect follows.
    pub fn close(&mut self) {
        if !self.machine.is_active() {
            return;
        }

        self.stopped = true;
        self.scheduler.cancel();
        self.retire_connection();
        self.machine.request_stop();
        self.publish_status();

        lifecycle!(self, info, "connection closed");
        let notification = self.notification();
        self.dispatcher.closed(&notification);
    }

    /// Force the transport closed as if the network dropped it.
    ///
    /// The resulting close event fires the closed hook and schedules a
    /// reconnect.
    pub fn break_connection(&mut self) {
        if !self.machine.is_active() {
            return;
        }

        lifecycle!(self, warn, "connection forcibly broken");
        if let Some(active) = self.connection.as_mut() {
            active.conn.close();
        }
    }

    /// Send a payload if the transport is open.
    ///
    /// Returns `false` and fires the error hook otherwise.
    pub fn send_message(&mut self, payload: &str) -> bool {
        self.transmit(payload)
    }

    /// Send a subscription request and remember it for replay.
    ///
    /// The store is only touched when the send succeeds.
    pub fn subscribe(&mut self, payload: &str) -> bool {
        if !self.transmit(payload) {
            return false;
        }
        if let Some(evicted) = self.store.add(payload) {
            lifecycle!(self, debug, evicted = %evicted, "stored request evicted");
        }
        true
    }

    /// Send an unsubscribe request and forget the matching stored request.
    ///
    /// The store is only touched when the send succeeds.
    pub fn unsubscribe(&mut self, payload: &str) -> bool {
        if !self.transmit(payload) {
            return false;
        }
        self.store.remove(payload);
        true
    }

    /// Forget a stored request without sending anything.
    pub fn remove_store_key(&mut self, key: &str) -> bool {
        self.store.remove(key)
    }

    /// Forget every stored request.
    pub fn clear_stored_requests(&mut self) {
        self.store.clear();
    }

    /// Copy of the stored requests in replay order.
    #[must_use]
    pub fn stored_requests(&self) -> Vec<String> {
        self.store.snapshot()
    }

    /// Close, cancel any pending reconnect and forget stored requests.
    ///
    /// The manager ignores every later call and event.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.close();
        self.scheduler.cancel();
        self.retire_connection();
        self.store.clear();
        self.disposed = true;
        lifecycle!(self, debug, "connection manager disposed");
    }

    /// Wait for the next queued transport event or timer fire.
    pub async fn next_inbound(&mut self) -> Option<Inbound> {
        self.inbox_rx.recv().await
    }

    /// Apply every queued item without waiting. Returns how many ran.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(inbound) = self.inbox_rx.try_recv() {
            self.handle(inbound);
            handled += 1;
        }
        handled
    }

    /// Apply one queued item.
    pub fn handle(&mut self, inbound: Inbound) {
        if self.disposed {
            return;
        }

        match inbound {
            Inbound::Transport { id, event } => {
                if !self.is_current(id) {
                    match event {
                        TransportEvent::Message(payload) => self.on_unexpected_message(payload),
                        event => {
                            trace!(
                                connection = %self.config.connection_name,
                                %id,
                                ?event,
                                "discarding event from retired transport"
                            );
                        }
                    }
                    return;
                }
                match event {
                    TransportEvent::Opened => self.on_transport_open(),
                    TransportEvent::Closed => self.on_transport_close(),
                    TransportEvent::Error(detail) => self.on_transport_error(detail),
                    TransportEvent::Message(payload) => self.on_transport_message(payload),
                }
            }
            Inbound::ReconnectDue(token) => self.on_reconnect_due(token),
        }
    }

    fn on_transport_open(&mut self) {
        let resumed = self.machine.has_connected();
        if !self.machine.mark_opened() {
            return;
        }
        self.publish_status();
        self.scheduler.cancel();
        self.scheduler.reset();

        lifecycle!(self, info, resumed, "connection established");
        let notification = self.notification();
        self.dispatcher.opened(&notification);

        if resumed {
            self.replay_subscriptions();
        }
    }

    fn replay_subscriptions(&mut self) {
        let stored = self.store.snapshot();
        if let Some(replacement) = self.dispatcher.restore(&stored) {
            self.store.replace(replacement);
        }

        let entries = self.store.snapshot();
        lifecycle!(self, debug, count = entries.len(), "replaying stored requests");
        for entry in &entries {
            if !self.transmit(entry) {
                break;
            }
        }
    }

    fn on_transport_close(&mut self) {
        if self.machine.status() == ConnectionStatus::Stopped {
            return;
        }
        if !self.machine.mark_closed() {
            return;
        }
        self.publish_status();
        self.connection = None;

        lifecycle!(self, info, "connection closed");
        let notification = self.notification();
        self.dispatcher.closed(&notification);

        if !self.stopped {
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(&mut self) {
        let delay = self.scheduler.current_delay();
        self.machine.mark_reconnecting();
        self.publish_status();

        let inbox = self.inbox_tx.clone();
        self.scheduler.arm(delay, move |token| {
            let _ = inbox.send(Inbound::ReconnectDue(token));
        });
        self.scheduler.grow();

        lifecycle!(
            self,
            info,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "reconnect scheduled"
        );
    }

    fn on_reconnect_due(&mut self, token: u64) {
        if !self.scheduler.claim(token) {
            trace!(
                connection = %self.config.connection_name,
                token,
                "discarding cancelled reconnect timer"
            );
            return;
        }
        if self.stopped {
            return;
        }
        lifecycle!(self, info, "trying to reconnect");
        self.open();
    }

    fn on_transport_error(&mut self, detail: ErrorDetail) {
        lifecycle!(self, error, kind = %detail.kind, message = %detail.message, "transport error");
        let notification = self
            .notification()
            .with_data(detail.message.clone())
            .with_error(detail);
        self.dispatcher.error(&notification);
    }

    fn on_transport_message(&mut self, payload: String) {
        let status = self.machine.status();
        if status == ConnectionStatus::Connected {
            if self.config.debug_message_logging {
                debug!(
                    connection = %self.config.connection_name,
                    payload = %describe_payload(&payload),
                    "received message"
                );
            }
            let notification = self.notification().with_data(payload);
            self.dispatcher.update(&notification);
        } else {
            self.on_unexpected_message(payload);
        }
    }

    // Also used for late frames from a handle that has already been retired.
    fn on_unexpected_message(&mut self, payload: String) {
        let status = self.machine.status();
        lifecycle!(self, warn, "message received while not connected");
        let detail = ErrorDetail::new(
            "UnexpectedMessage",
            format!("message received while {status}"),
        );
        let notification = self.notification().with_data(payload).with_error(detail);
        self.dispatcher.error(&notification);
    }

    fn transmit(&mut self, payload: &str) -> bool {
        let result = match self.connection.as_mut() {
            Some(active) if active.conn.is_open() => active.conn.send(payload),
            _ => Err(SocketError::NotConnected),
        };

        match result {
            Ok(()) => {
                if self.config.debug_message_logging {
                    debug!(
                        connection = %self.config.connection_name,
                        payload = %describe_payload(payload),
                        "sent message"
                    );
                }
                true
            }
            Err(err) => {
                lifecycle!(self, warn, error = %err, "failed to send data");
                self.report_error(&err);
                false
            }
        }
    }

    fn report_error(&mut self, err: &SocketError) {
        let detail = ErrorDetail::from(err);
        let notification = self
            .notification()
            .with_data(detail.message.clone())
            .with_error(detail);
        self.dispatcher.error(&notification);
    }

    fn retire_connection(&mut self) {
        if let Some(mut active) = self.connection.take() {
            lifecycle!(self, trace, id = %active.id, "retiring transport handle");
            active.conn.close();
        }
    }

    fn is_current(&self, id: ConnectionId) -> bool {
        self.connection.as_ref().is_some_and(|active| active.id == id)
    }

    fn publish_status(&self) {
        self.status.store(self.machine.status());
    }

    fn notification(&self) -> Notification {
        Notification::new(self.info())
    }
}

/// Pretty-print JSON payloads for logging; anything else is passed through.
fn describe_payload(payload: &str) -> String {
    serde_json::from_str::<serde_json::Value>(payload)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or_else(|_| payload.to_string())
}
