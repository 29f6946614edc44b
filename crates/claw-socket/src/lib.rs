//! claw-socket - resilient client-side socket connections
//!
//! Keeps one logical connection to a message-oriented endpoint alive:
//! a lifecycle state machine, reconnects with capped exponential backoff,
//! and replay of remembered subscription requests after every resumed
//! connection.
//!
//! [`ConnectionManager`] is the synchronous core. Transport events and
//! reconnect timers are queued to it and applied one at a time; either pump
//! it yourself or hand it to [`SocketHandle::spawn`] and talk to it from any
//! task.
//!
//! ```no_run
//! use claw_socket::{ChannelHooks, ConnectionManager, SocketConfig, SocketHandle, WsTransport};
//!
//! # async fn example() -> claw_socket::Result<()> {
//! let config = SocketConfig::new("trades", "wss://feed.example.com/ws");
//! let (hooks, mut events) = ChannelHooks::new();
//! let manager = ConnectionManager::new(config, WsTransport::new()).with_hooks(hooks);
//! let (socket, _task) = SocketHandle::spawn(manager);
//!
//! socket.open().await?;
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod handle;
pub mod hooks;
pub mod manager;
pub mod notification;
pub mod reconnect;
pub mod state;
pub mod store;
pub mod transport;

pub use config::SocketConfig;
pub use dispatch::EventDispatcher;
pub use error::{Result, SocketError};
pub use events::{ChannelHooks, SocketEvent};
pub use handle::SocketHandle;
pub use hooks::{CallbackHooks, ConnectionHooks, NoopHooks};
pub use manager::{ConnectionManager, NOT_CONNECTED_MESSAGE};
pub use notification::{ConnectionInfo, ErrorDetail, Notification};
pub use reconnect::{ReconnectConfig, ReconnectScheduler};
pub use state::{ConnectionStateMachine, ConnectionStatus};
pub use store::{SubscriptionStore, DEFAULT_MAX_STORED_REQUESTS};
pub use transport::{
    Connection, ConnectionId, Inbound, MemoryRemote, MemoryTransport, Transport, TransportEvent,
    TransportEvents, WsTransport,
};
