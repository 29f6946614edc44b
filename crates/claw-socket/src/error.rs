//! Error types for claw-socket.

use thiserror::Error;

/// Errors that can occur in socket operations.
///
/// Core [`ConnectionManager`](crate::ConnectionManager) operations never
/// return these to the caller; they are normalized into an
/// [`ErrorDetail`](crate::ErrorDetail) and delivered through the error hook.
#[derive(Debug, Error)]
pub enum SocketError {
    /// The endpoint URL could not be used to build a transport.
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The transport reported a failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// A send was attempted without an open transport.
    #[error("socket is not connected")]
    NotConnected,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The task driving the connection manager has exited.
    #[error("connection manager has shut down")]
    ManagerClosed,

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SocketError {
    /// Stable, transport-independent name of the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidUrl { .. } => "InvalidUrl",
            Self::Transport(_) => "TransportError",
            Self::NotConnected => "NotConnected",
            Self::Config(_) => "ConfigError",
            Self::ManagerClosed => "ManagerClosed",
            Self::Io(_) => "IoError",
            Self::Serialization(_) => "SerializationError",
        }
    }
}

/// Result type alias for socket operations.
pub type Result<T> = std::result::Result<T, SocketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = SocketError::InvalidUrl {
            url: "nope".to_string(),
            reason: "relative URL without a base".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid url 'nope': relative URL without a base"
        );

        let err = SocketError::Transport("connection refused".to_string());
        assert_eq!(err.to_string(), "transport error: connection refused");

        let err = SocketError::NotConnected;
        assert_eq!(err.to_string(), "socket is not connected");

        let err = SocketError::ManagerClosed;
        assert_eq!(err.to_string(), "connection manager has shut down");
    }

    #[test]
    fn error_kinds_are_stable() {
        assert_eq!(SocketError::NotConnected.kind(), "NotConnected");
        assert_eq!(SocketError::Transport(String::new()).kind(), "TransportError");
        assert_eq!(SocketError::Config(String::new()).kind(), "ConfigError");
        assert_eq!(SocketError::ManagerClosed.kind(), "ManagerClosed");
    }

    #[test]
    fn error_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SocketError = io_err.into();
        assert!(err.to_string().contains("io error"));
        assert_eq!(err.kind(), "IoError");
    }

    #[test]
    fn error_serialization_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: SocketError = json_err.into();
        assert!(err.to_string().starts_with("serialization error"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SocketError>();
    }
}
