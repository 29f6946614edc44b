//! WebSocket transport over tokio-tungstenite.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};
use url::Url;

use super::{Connection, Transport, TransportEvents};
use crate::error::{Result, SocketError};
use crate::notification::ErrorDetail;

/// Builds WebSocket connections. Must be used within a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl WsTransport {
    /// Create a WebSocket transport.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Validate a WebSocket endpoint URL.
///
/// # Errors
///
/// Returns [`SocketError::InvalidUrl`] for unparseable URLs and for schemes
/// other than `ws` and `wss`.
pub fn parse_ws_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).map_err(|e| SocketError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "ws" | "wss" => Ok(parsed),
        other => Err(SocketError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme '{other}', expected ws or wss"),
        }),
    }
}

enum Outgoing {
    Text(String),
    Close,
}

impl Transport for WsTransport {
    type Connection = WsConnection;

    fn connect(&mut self, url: &str, events: TransportEvents) -> Result<WsConnection> {
        let url = parse_ws_url(url)?;

        let open = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(run_socket(url, Arc::clone(&open), rx, events.clone()));

        Ok(WsConnection {
            open,
            tx,
            events,
            task,
            closing: false,
        })
    }
}

/// Client end of a WebSocket connection.
///
/// The socket itself lives in a background task; sends are queued to it.
pub struct WsConnection {
    open: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<Outgoing>,
    events: TransportEvents,
    task: JoinHandle<()>,
    closing: bool,
}

impl std::fmt::Debug for WsConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsConnection")
            .field("id", &self.events.id())
            .field("open", &self.open.load(Ordering::SeqCst))
            .field("closing", &self.closing)
            .finish()
    }
}

impl Connection for WsConnection {
    fn is_open(&self) -> bool {
        !self.closing && self.open.load(Ordering::SeqCst)
    }

    fn send(&mut self, payload: &str) -> Result<()> {
        if !self.is_open() {
            return Err(SocketError::NotConnected);
        }
        self.tx
            .send(Outgoing::Text(payload.to_string()))
            .map_err(|_| SocketError::Transport("socket task has exited".to_string()))
    }

    fn close(&mut self) {
        if self.closing {
            return;
        }
        self.closing = true;

        if self.open.load(Ordering::SeqCst) {
            let _ = self.tx.send(Outgoing::Close);
        } else {
            // Still handshaking: abandon the attempt.
            self.task.abort();
            self.events.closed();
        }
    }
}

async fn run_socket(
    url: Url,
    open: Arc<AtomicBool>,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    events: TransportEvents,
) {
    let id = events.id();
    let stream = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            debug!(%id, error = %e, "websocket handshake failed");
            events.error(ErrorDetail::new("TransportError", e.to_string()));
            events.closed();
            return;
        }
    };

    let (mut write, mut read) = stream.split();
    open.store(true, Ordering::SeqCst);
    events.opened();

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        events.message(text.as_str().to_owned());
                    }
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => {
                            events.message(text);
                        }
                        Err(_) => {
                            events.error(ErrorDetail::new(
                                "TransportError",
                                "received binary frame that is not valid UTF-8",
                            ));
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {
                        // Ping/Pong are answered by tungstenite.
                    }
                    Some(Err(e)) => {
                        events.error(ErrorDetail::new("TransportError", e.to_string()));
                        break;
                    }
                }
            }

            out = outgoing.recv() => {
                match out {
                    Some(Outgoing::Text(text)) => {
                        if let Err(e) = write.send(Message::text(text)).await {
                            events.error(ErrorDetail::new("TransportError", e.to_string()));
                            break;
                        }
                    }
                    Some(Outgoing::Close) | None => {
                        let _ = write.send(Message::Close(None)).await;
                        let _ = write.close().await;
                        break;
                    }
                }
            }
        }
    }

    open.store(false, Ordering::SeqCst);
    trace!(%id, "websocket task finished");
    events.closed();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ws_url_accepts_ws_and_wss() {
        assert!(parse_ws_url("ws://localhost:9000/feed").is_ok());
        assert!(parse_ws_url("wss://stream.example.com/v1").is_ok());
    }

    #[test]
    fn test_parse_ws_url_rejects_other_schemes() {
        let err = parse_ws_url("http://example.com").unwrap_err();
        assert!(matches!(err, SocketError::InvalidUrl { .. }));
        assert!(err.to_string().contains("unsupported scheme 'http'"));
    }

    #[test]
    fn test_parse_ws_url_rejects_garbage() {
        let err = parse_ws_url("not a url").unwrap_err();
        assert_eq!(err.kind(), "InvalidUrl");
    }
}
