//! Connection status and the lifecycle state machine.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Lifecycle status of a managed connection.
///
/// The serialized and displayed literals (`INIT`, `CONNECTING`, ...) are
/// part of the public contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum ConnectionStatus {
    /// Constructed, never opened.
    Init,
    /// A connect attempt is in flight or a reconnect is pending.
    Connecting,
    /// The transport is open.
    Connected,
    /// The transport closed without being asked to.
    Disconnected,
    /// Closed on request; stays here until opened again.
    Stopped,
}

impl ConnectionStatus {
    /// The literal used on the wire and in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Disconnected => "DISCONNECTED",
            Self::Stopped => "STOPPED",
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Init,
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Disconnected,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic wrapper for connection status.
///
/// Lets handles observe the status without a round trip to the task that
/// owns the manager.
#[derive(Debug)]
pub struct AtomicConnectionStatus(AtomicU8);

impl AtomicConnectionStatus {
    /// Create a new atomic status.
    #[must_use]
    pub const fn new(status: ConnectionStatus) -> Self {
        Self(AtomicU8::new(status as u8))
    }

    /// Load the current status.
    #[must_use]
    pub fn load(&self) -> ConnectionStatus {
        ConnectionStatus::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Store a new status.
    pub fn store(&self, status: ConnectionStatus) {
        self.0.store(status as u8, Ordering::SeqCst);
    }
}

/// Enforces the legal lifecycle transitions.
///
/// Every transition attempted from a state where it is not legal is a
/// silent no-op.
#[derive(Debug, Clone)]
pub struct ConnectionStateMachine {
    status: ConnectionStatus,
    has_connected: bool,
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateMachine {
    /// Create a machine in [`ConnectionStatus::Init`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            status: ConnectionStatus::Init,
            has_connected: false,
        }
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Whether an open has ever succeeded. Any later open is a resumed one.
    #[must_use]
    pub const fn has_connected(&self) -> bool {
        self.has_connected
    }

    /// Enter `Connecting` from `Init`, `Stopped` or `Connecting`.
    ///
    /// Returns `true` when the caller should announce a connect attempt.
    pub fn request_open(&mut self) -> bool {
        match self.status {
            ConnectionStatus::Init | ConnectionStatus::Stopped | ConnectionStatus::Connecting => {
                self.status = ConnectionStatus::Connecting;
                true
            }
            ConnectionStatus::Connected | ConnectionStatus::Disconnected => false,
        }
    }

    /// Enter `Connected`. Returns `false` if already connected.
    pub fn mark_opened(&mut self) -> bool {
        if self.status == ConnectionStatus::Connected {
            return false;
        }
        self.status = ConnectionStatus::Connected;
        self.has_connected = true;
        true
    }

    /// Enter `Disconnected` from `Connected`, `Connecting` or `Disconnected`.
    pub fn mark_closed(&mut self) -> bool {
        match self.status {
            ConnectionStatus::Connected
            | ConnectionStatus::Connecting
            | ConnectionStatus::Disconnected => {
                self.status = ConnectionStatus::Disconnected;
                true
            }
            ConnectionStatus::Init | ConnectionStatus::Stopped => false,
        }
    }

    /// Leave `Disconnected` for `Connecting` while a retry is pending.
    pub fn mark_reconnecting(&mut self) -> bool {
        if self.status != ConnectionStatus::Disconnected {
            return false;
        }
        self.status = ConnectionStatus::Connecting;
        true
    }

    /// Enter `Stopped` from `Connected` or `Connecting`.
    pub fn request_stop(&mut self) -> bool {
        match self.status {
            ConnectionStatus::Connected | ConnectionStatus::Connecting => {
                self.status = ConnectionStatus::Stopped;
                true
            }
            _ => false,
        }
    }

    /// Whether `close()` and `break_connection()` apply in the current status.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(
            self.status,
            ConnectionStatus::Connected | ConnectionStatus::Connecting
        )
    }
}
