//! Hook invocation with panic isolation.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::warn;

use crate::hooks::ConnectionHooks;
use crate::notification::Notification;

/// Invokes the registered hooks.
///
/// A panicking hook is logged and swallowed so the manager always finishes
/// its own state update. A panicking restore hook counts as returning `None`.
pub struct EventDispatcher {
    hooks: Box<dyn ConnectionHooks>,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher").finish_non_exhaustive()
    }
}

impl EventDispatcher {
    /// Wrap a set of hooks.
    #[must_use]
    pub fn new(hooks: impl ConnectionHooks + 'static) -> Self {
        Self {
            hooks: Box::new(hooks),
        }
    }

    /// Fire the connecting hook.
    pub fn connecting(&mut self, notification: &Notification) {
        self.isolate("on_connection", |h| h.on_connection(notification));
    }

    /// Fire the opened hook.
    pub fn opened(&mut self, notification: &Notification) {
        self.isolate("on_opened", |h| h.on_opened(notification));
    }

    /// Fire the error hook.
    pub fn error(&mut self, notification: &Notification) {
        self.isolate("on_error", |h| h.on_error(notification));
    }

    /// Fire the closed hook.
    pub fn closed(&mut self, notification: &Notification) {
        self.isolate("on_closed", |h| h.on_closed(notification));
    }

    /// Fire the update hook.
    pub fn update(&mut self, notification: &Notification) {
        self.isolate("on_update", |h| h.on_update(notification));
    }

    /// Ask the restore hook for replacement subscriptions.
    pub fn restore(&mut self, stored: &[String]) -> Option<Vec<String>> {
        self.isolate("on_restore", |h| h.on_restore(stored)).flatten()
    }

    fn isolate<R>(
        &mut self,
        hook: &'static str,
        call: impl FnOnce(&mut Box<dyn ConnectionHooks>) -> R,
    ) -> Option<R> {
        let hooks = &mut self.hooks;
        match catch_unwind(AssertUnwindSafe(|| call(hooks))) {
            Ok(value) => Some(value),
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                warn!(hook, %reason, "connection hook panicked");
                None
            }
        }
    }
}
