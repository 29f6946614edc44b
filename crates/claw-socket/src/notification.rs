//! Notification payloads delivered to connection hooks.

use serde::{Deserialize, Serialize};

use crate::error::SocketError;
use crate::state::ConnectionStatus;

/// Immutable snapshot of a connection's identity and status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Name given to the connection in its configuration.
    #[serde(rename = "connectionName")]
    pub name: String,
    /// Endpoint URL.
    pub url: String,
    /// Status at the time the snapshot was taken.
    pub status: ConnectionStatus,
}

/// Normalized error description, independent of the transport in use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Stable error kind, e.g. `NotConnected` or `TransportError`.
    pub kind: String,
    /// Human-readable message.
    pub message: String,
}

impl ErrorDetail {
    /// Create a detail from a kind and message.
    #[must_use]
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl From<&SocketError> for ErrorDetail {
    fn from(err: &SocketError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<SocketError> for ErrorDetail {
    fn from(err: SocketError) -> Self {
        Self::from(&err)
    }
}

/// What every hook receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// The connection the event belongs to.
    pub conn: ConnectionInfo,
    /// Raw payload or diagnostic text, when the event has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Present only on failure notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl Notification {
    /// A notification carrying only the connection snapshot.
    #[must_use]
    pub const fn new(conn: ConnectionInfo) -> Self {
        Self {
            conn,
            data: None,
            error: None,
        }
    }

    /// Attach a payload.
    #[must_use]
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Attach an error detail.
    #[must_use]
    pub fn with_error(mut self, error: ErrorDetail) -> Self {
        self.error = Some(error);
        self
    }

    /// Whether this is a failure notification.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> ConnectionInfo {
        ConnectionInfo {
            name: "prices".to_string(),
            url: "wss://feed.example.com".to_string(),
            status: ConnectionStatus::Connected,
        }
    }

    #[test]
    fn test_notification_json_shape() {
        let n = Notification::new(info()).with_data("{\"px\":1}");
        let json = serde_json::to_value(&n).unwrap();

        assert_eq!(json["conn"]["connectionName"], "prices");
        assert_eq!(json["conn"]["url"], "wss://feed.example.com");
        assert_eq!(json["conn"]["status"], "CONNECTED");
        assert_eq!(json["data"], "{\"px\":1}");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_error_notification() {
        let n = Notification::new(info())
            .with_error(ErrorDetail::from(&SocketError::NotConnected));
        assert!(n.is_error());
        let detail = n.error.unwrap();
        assert_eq!(detail.kind, "NotConnected");
        assert_eq!(detail.message, "socket is not connected");
    }

    #[test]
    fn test_notification_roundtrip_without_optionals() {
        let json = r#"{"conn":{"connectionName":"a","url":"ws://x","status":"INIT"}}"#;
        let n: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(n.conn.status, ConnectionStatus::Init);
        assert!(n.data.is_none());
        assert!(!n.is_error());
    }
}
