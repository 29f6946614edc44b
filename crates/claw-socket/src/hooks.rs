//! Lifecycle hooks.
//!
//! Implement [`ConnectionHooks`] directly, or build a [`CallbackHooks`] from
//! closures.

use crate::notification::Notification;

/// Receives lifecycle notifications from a connection manager.
///
/// Every method has a no-op default. Hooks run synchronously on the task
/// driving the manager and should return quickly.
pub trait ConnectionHooks: Send {
    /// A connect attempt is starting.
    fn on_connection(&mut self, _notification: &Notification) {}

    /// The transport opened.
    fn on_opened(&mut self, _notification: &Notification) {}

    /// Something failed. `notification.error` describes what.
    fn on_error(&mut self, _notification: &Notification) {}

    /// The connection closed.
    fn on_closed(&mut self, _notification: &Notification) {}

    /// A message arrived while connected.
    fn on_update(&mut self, _notification: &Notification) {}

    /// Offered the stored subscriptions before they are replayed on a
    /// resumed connection. Returning `Some` replaces them.
    fn on_restore(&mut self, _stored: &[String]) -> Option<Vec<String>> {
        None
    }
}

/// Hooks that ignore every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl ConnectionHooks for NoopHooks {}

type NotifyFn = Box<dyn FnMut(&Notification) + Send>;
type RestoreFn = Box<dyn FnMut(&[String]) -> Option<Vec<String>> + Send>;

/// Closure-per-event hooks. Unset events are ignored.
#[derive(Default)]
pub struct CallbackHooks {
    on_connection: Option<NotifyFn>,
    on_opened: Option<NotifyFn>,
    on_error: Option<NotifyFn>,
    on_closed: Option<NotifyFn>,
    on_update: Option<NotifyFn>,
    on_restore: Option<RestoreFn>,
}

impl std::fmt::Debug for CallbackHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackHooks")
            .field("on_connection", &self.on_connection.is_some())
            .field("on_opened", &self.on_opened.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_closed", &self.on_closed.is_some())
            .field("on_update", &self.on_update.is_some())
            .field("on_restore", &self.on_restore.is_some())
            .finish()
    }
}

impl CallbackHooks {
    /// Empty set of hooks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Called when a connect attempt starts.
    #[must_use]
    pub fn on_connection(mut self, f: impl FnMut(&Notification) + Send + 'static) -> Self {
        self.on_connection = Some(Box::new(f));
        self
    }

    /// Called when the transport opens.
    #[must_use]
    pub fn on_opened(mut self, f: impl FnMut(&Notification) + Send + 'static) -> Self {
        self.on_opened = Some(Box::new(f));
        self
    }

    /// Called on every failure notification.
    #[must_use]
    pub fn on_error(mut self, f: impl FnMut(&Notification) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Called when the connection closes.
    #[must_use]
    pub fn on_closed(mut self, f: impl FnMut(&Notification) + Send + 'static) -> Self {
        self.on_closed = Some(Box::new(f));
        self
    }

    /// Called for every message received while connected.
    #[must_use]
    pub fn on_update(mut self, f: impl FnMut(&Notification) + Send + 'static) -> Self {
        self.on_update = Some(Box::new(f));
        self
    }

    /// Called before subscriptions are replayed on a resumed connection.
    #[must_use]
    pub fn on_restore(
        mut self,
        f: impl FnMut(&[String]) -> Option<Vec<String>> + Send + 'static,
    ) -> Self {
        self.on_restore = Some(Box::new(f));
        self
    }
}

impl ConnectionHooks for CallbackHooks {
    fn on_connection(&mut self, notification: &Notification) {
        if let Some(f) = self.on_connection.as_mut() {
            f(notification);
        }
    }

    fn on_opened(&mut self, notification: &Notification) {
        if let Some(f) = self.on_opened.as_mut() {
            f(notification);
        }
    }

    fn on_error(&mut self, notification: &Notification) {
        if let Some(f) = self.on_error.as_mut() {
            f(notification);
        }
    }

    fn on_closed(&mut self, notification: &Notification) {
        if let Some(f) = self.on_closed.as_mut() {
            f(notification);
        }
    }

    fn on_update(&mut self, notification: &Notification) {
        if let Some(f) = self.on_update.as_mut() {
            f(notification);
        }
    }

    fn on_restore(&mut self, stored: &[String]) -> Option<Vec<String>> {
        self.on_restore.as_mut().and_then(|f| f(stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::ConnectionInfo;
    use crate::state::ConnectionStatus;
    use std::sync::{Arc, Mutex};

    fn notification() -> Notification {
        Notification::new(ConnectionInfo {
            name: "test".to_string(),
            url: "ws://localhost".to_string(),
            status: ConnectionStatus::Connecting,
        })
    }

    #[test]
    fn test_noop_hooks_restore_keeps_store() {
        let mut hooks = NoopHooks;
        hooks.on_opened(&notification());
        assert!(hooks.on_restore(&["a".to_string()]).is_none());
    }

    #[test]
    fn test_callback_hooks_route_to_closures() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let opened = Arc::clone(&seen);
        let closed = Arc::clone(&seen);

        let mut hooks = CallbackHooks::new()
            .on_opened(move |n| opened.lock().unwrap().push(format!("opened:{}", n.conn.status)))
            .on_closed(move |n| closed.lock().unwrap().push(format!("closed:{}", n.conn.status)));

        ConnectionHooks::on_opened(&mut hooks, &notification());
        ConnectionHooks::on_update(&mut hooks, &notification());
        ConnectionHooks::on_closed(&mut hooks, &notification());

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["opened:CONNECTING", "closed:CONNECTING"]
        );
    }

    #[test]
    fn test_callback_restore_replacement() {
        let mut hooks = CallbackHooks::new().on_restore(|stored| {
            Some(stored.iter().filter(|s| s.starts_with("keep")).cloned().collect())
        });

        let restored =
            ConnectionHooks::on_restore(&mut hooks, &["keep-1".to_string(), "drop".to_string()]);
        assert_eq!(restored, Some(vec!["keep-1".to_string()]));
    }

    #[test]
    fn test_callback_hooks_debug_lists_set_hooks() {
        let hooks = CallbackHooks::new().on_error(|_| {});
        let debug = format!("{hooks:?}");
        assert!(debug.contains("on_error: true"));
        assert!(debug.contains("on_update: false"));
    }
}
