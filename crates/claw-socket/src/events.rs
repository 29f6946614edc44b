//! Socket events for channel-based consumers.

use tokio::sync::mpsc;

use crate::hooks::ConnectionHooks;
use crate::notification::Notification;

/// Lifecycle events emitted by a connection manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// A connect attempt is starting.
    Connecting(Notification),
    /// The transport opened.
    Opened(Notification),
    /// Something failed.
    Error(Notification),
    /// The connection closed.
    Closed(Notification),
    /// A message arrived while connected.
    Update(Notification),
}

impl SocketEvent {
    /// The notification carried by this event.
    #[must_use]
    pub const fn notification(&self) -> &Notification {
        match self {
            Self::Connecting(n)
            | Self::Opened(n)
            | Self::Error(n)
            | Self::Closed(n)
            | Self::Update(n) => n,
        }
    }

    /// Short lowercase name of the event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Connecting(_) => "connecting",
            Self::Opened(_) => "opened",
            Self::Error(_) => "error",
            Self::Closed(_) => "closed",
            Self::Update(_) => "update",
        }
    }
}

/// Hooks that forward every notification as a [`SocketEvent`].
///
/// The restore hook keeps the stored subscriptions unchanged. Events sent
/// after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelHooks {
    tx: mpsc::UnboundedSender<SocketEvent>,
}

impl ChannelHooks {
    /// Create hooks and the receiver their events arrive on.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SocketEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: SocketEvent) {
        let _ = self.tx.send(event);
    }
}

impl ConnectionHooks for ChannelHooks {
    fn on_connection(&mut self, notification: &Notification) {
        self.forward(SocketEvent::Connecting(notification.clone()));
    }

    fn on_opened(&mut self, notification: &Notification) {
        self.forward(SocketEvent::Opened(notification.clone()));
    }

    fn on_error(&mut self, notification: &Notification) {
        self.forward(SocketEvent::Error(notification.clone()));
    }

    fn on_closed(&mut self, notification: &Notification) {
        self.forward(SocketEvent::Closed(notification.clone()));
    }

    fn on_update(&mut self, notification: &Notification) {
        self.forward(SocketEvent::Update(notification.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::ConnectionInfo;
    use crate::state::ConnectionStatus;

    fn notification(status: ConnectionStatus) -> Notification {
        Notification::new(ConnectionInfo {
            name: "feed".to_string(),
            url: "ws://localhost:9000".to_string(),
            status,
        })
    }

    #[test]
    fn test_channel_hooks_forward_in_order() {
        let (mut hooks, mut rx) = ChannelHooks::new();

        hooks.on_connection(&notification(ConnectionStatus::Connecting));
        hooks.on_opened(&notification(ConnectionStatus::Connected));
        hooks.on_update(&notification(ConnectionStatus::Connected).with_data("tick"));

        assert!(matches!(rx.try_recv(), Ok(SocketEvent::Connecting(_))));
        assert!(matches!(rx.try_recv(), Ok(SocketEvent::Opened(_))));
        match rx.try_recv() {
            Ok(SocketEvent::Update(n)) => assert_eq!(n.data.as_deref(), Some("tick")),
            other => panic!("expected Update, got {other:?}"),
        }
    }

    #[test]
    fn test_channel_hooks_survive_dropped_receiver() {
        let (mut hooks, rx) = ChannelHooks::new();
        drop(rx);
        hooks.on_closed(&notification(ConnectionStatus::Disconnected));
        assert!(hooks.on_restore(&["a".to_string()]).is_none());
    }

    #[test]
    fn test_event_notification_accessor() {
        let event = SocketEvent::Closed(notification(ConnectionStatus::Stopped));
        assert_eq!(event.notification().conn.status, ConnectionStatus::Stopped);
    }
}
