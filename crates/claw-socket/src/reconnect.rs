//! Reconnection configuration, exponential backoff and the single-shot
//! reconnect timer.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt, and after every
    /// successful open.
    #[serde(rename = "initial_delay_ms", with = "duration_ms")]
    pub initial_delay: Duration,
    /// Maximum delay between reconnection attempts.
    #[serde(rename = "max_delay_ms", with = "duration_ms")]
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

struct PendingTimer {
    token: u64,
    task: JoinHandle<()>,
}

/// Owns the backoff delay and at most one pending reconnect timer.
///
/// Every [`arm`](Self::arm) hands out a token. A fire is only honoured when
/// [`claim`](Self::claim) finds its token still armed, so a timer cancelled
/// after its message was queued is still discarded.
pub struct ReconnectScheduler {
    min_delay: Duration,
    max_delay: Duration,
    current_delay: Duration,
    pending: Option<PendingTimer>,
    next_token: u64,
}

impl std::fmt::Debug for ReconnectScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectScheduler")
            .field("min_delay", &self.min_delay)
            .field("max_delay", &self.max_delay)
            .field("current_delay", &self.current_delay)
            .field("armed", &self.pending.as_ref().map(|p| p.token))
            .finish()
    }
}

impl ReconnectScheduler {
    /// Create a scheduler from the given configuration.
    ///
    /// A maximum below the initial delay is raised to match it.
    #[must_use]
    pub fn new(config: ReconnectConfig) -> Self {
        let min_delay = config.initial_delay;
        let max_delay = config.max_delay.max(min_delay);
        Self {
            min_delay,
            max_delay,
            current_delay: min_delay,
            pending: None,
            next_token: 0,
        }
    }

    /// Delay the next armed attempt will wait.
    #[must_use]
    pub const fn current_delay(&self) -> Duration {
        self.current_delay
    }

    /// Upper bound on the delay.
    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Double the delay, capped at the maximum.
    pub fn grow(&mut self) {
        self.current_delay = self.current_delay.saturating_mul(2).min(self.max_delay);
    }

    /// Return the delay to its initial value.
    pub fn reset(&mut self) {
        self.current_delay = self.min_delay;
    }

    /// Whether a timer is pending.
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Schedule `fire` to run once after `delay`, replacing any pending timer.
    ///
    /// `fire` receives the token to pass back to [`claim`](Self::claim).
    /// Must be called from within a tokio runtime.
    pub fn arm<F>(&mut self, delay: Duration, fire: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.cancel();
        self.next_token = self.next_token.wrapping_add(1);
        let token = self.next_token;

        let task = tokio::spawn(async move {
            sleep(delay).await;
            fire(token);
        });

        self.pending = Some(PendingTimer { token, task });
        token
    }

    /// Cancel the pending timer, if any. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                pending.task.abort();
                true
            }
            None => false,
        }
    }

    /// Consume a fired timer. Returns `false` when `token` is not the armed
    /// one, meaning the timer was cancelled or replaced.
    pub fn claim(&mut self, token: u64) -> bool {
        match &self.pending {
            Some(pending) if pending.token == token => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }
}

impl Drop for ReconnectScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tokio::sync::mpsc;

    fn scheduler(initial_ms: u64, max_ms: u64) -> ReconnectScheduler {
        ReconnectScheduler::new(ReconnectConfig {
            initial_delay: Duration::from_millis(initial_ms),
            max_delay: Duration::from_millis(max_ms),
        })
    }

    #[test]
    fn test_reconnect_config_default() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(60));
    }

    #[test]
    fn test_reconnect_config_serde_millis() {
        let config: ReconnectConfig =
            serde_json::from_str(r#"{"initial_delay_ms": 250, "max_delay_ms": 4000}"#).unwrap();
        assert_eq!(config.initial_delay, Duration::from_millis(250));
        assert_eq!(config.max_delay, Duration::from_secs(4));

        let json = serde_json::to_value(config).unwrap();
        assert_eq!(json["initial_delay_ms"], 250);
    }

    #[test]
    fn test_grow_doubles_and_caps() {
        let mut s = scheduler(1000, 10_000);
        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(s.current_delay().as_millis());
            s.grow();
        }
        assert_eq!(seen, vec![1000, 2000, 4000, 8000, 10_000, 10_000]);
    }

    #[test]
    fn test_reset_returns_to_initial() {
        let mut s = scheduler(100, 1000);
        s.grow();
        s.grow();
        s.reset();
        assert_eq!(s.current_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_max_below_initial_is_raised() {
        let s = scheduler(500, 100);
        assert_eq!(s.max_delay(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_fires_once_after_delay() {
        let mut s = scheduler(100, 1000);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let token = s.arm(Duration::from_millis(100), move |t| {
            let _ = tx.send(t);
        });
        assert!(s.is_armed());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(rx.recv().await, Some(token));
        assert!(s.claim(token));
        assert!(!s.is_armed());
        assert!(!s.claim(token));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_fire() {
        let mut s = scheduler(100, 1000);
        let (tx, mut rx) = mpsc::unbounded_channel::<u64>();

        s.arm(Duration::from_millis(100), move |t| {
            let _ = tx.send(t);
        });
        assert!(s.cancel());
        assert!(!s.cancel());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_pending_timer() {
        let mut s = scheduler(100, 1000);
        let (tx, mut rx) = mpsc::unbounded_channel::<u64>();

        let tx1 = tx.clone();
        let first = s.arm(Duration::from_millis(100), move |t| {
            let _ = tx1.send(t);
        });
        let second = s.arm(Duration::from_millis(200), move |t| {
            let _ = tx.send(t);
        });
        assert_ne!(first, second);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(rx.recv().await, Some(second));
        assert!(rx.try_recv().is_err());
        assert!(!s.claim(first));
        assert!(s.claim(second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_token_rejected_after_cancel() {
        let mut s = scheduler(10, 100);
        let (tx, mut rx) = mpsc::unbounded_channel::<u64>();

        s.arm(Duration::from_millis(10), move |t| {
            let _ = tx.send(t);
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let token = rx.recv().await.unwrap();

        // Fired and queued, then cancelled before being consumed.
        s.cancel();
        assert!(!s.claim(token));
    }

    proptest! {
        #[test]
        fn prop_delay_bounded_and_non_decreasing(
            initial in 1u64..5_000,
            extra in 0u64..100_000,
            grows in 0usize..40,
        ) {
            let mut s = scheduler(initial, initial + extra);
            let mut last = s.current_delay();
            for _ in 0..grows {
                s.grow();
                let now = s.current_delay();
                prop_assert!(now >= last);
                prop_assert!(now <= s.max_delay());
                prop_assert!(now >= Duration::from_millis(initial));
                last = now;
            }
            s.reset();
            prop_assert_eq!(s.current_delay(), Duration::from_millis(initial));
        }
    }
}
