//! Cloneable async handle over a [`ConnectionManager`] running in its own task.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{Result, SocketError};
use crate::manager::ConnectionManager;
use crate::notification::ConnectionInfo;
use crate::state::{AtomicConnectionStatus, ConnectionStatus};
use crate::transport::Transport;

const COMMAND_BUFFER: usize = 64;

enum Command {
    Open(oneshot::Sender<()>),
    Close(oneshot::Sender<()>),
    Break(oneshot::Sender<()>),
    Send(String, oneshot::Sender<bool>),
    Subscribe(String, oneshot::Sender<bool>),
    Unsubscribe(String, oneshot::Sender<bool>),
    RemoveStoreKey(String, oneshot::Sender<bool>),
    ClearStoredRequests(oneshot::Sender<()>),
    StoredRequests(oneshot::Sender<Vec<String>>),
    Info(oneshot::Sender<ConnectionInfo>),
    Dispose(oneshot::Sender<()>),
}

/// Handle to a manager owned by a driver task.
///
/// Every call is queued to the driver and applied in order, interleaved with
/// transport events and reconnect timers. Dropping the last handle disposes
/// the manager.
#[derive(Debug, Clone)]
pub struct SocketHandle {
    commands: mpsc::Sender<Command>,
    status: Arc<AtomicConnectionStatus>,
}

impl SocketHandle {
    /// Move `manager` into a new task and return a handle to it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<T>(manager: ConnectionManager<T>) -> (Self, JoinHandle<()>)
    where
        T: Transport + 'static,
    {
        let (commands, rx) = mpsc::channel(COMMAND_BUFFER);
        let status = manager.status_handle();
        let task = tokio::spawn(drive(manager, rx));
        (Self { commands, status }, task)
    }

    /// Last status published by the manager. Does not wait on the driver.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status.load()
    }

    /// Whether the driver task has stopped accepting commands.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    async fn request<R>(&self, make: impl FnOnce(oneshot::Sender<R>) -> Command) -> Result<R> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| SocketError::ManagerClosed)?;
        rx.await.map_err(|_| SocketError::ManagerClosed)
    }

    /// See [`ConnectionManager::open`].
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::ManagerClosed`] if the driver has exited.
    pub async fn open(&self) -> Result<()> {
        self.request(Command::Open).await
    }

    /// See [`ConnectionManager::close`].
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::ManagerClosed`] if the driver has exited.
    pub async fn close(&self) -> Result<()> {
        self.request(Command::Close).await
    }

    /// See [`ConnectionManager::break_connection`].
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::ManagerClosed`] if the driver has exited.
    pub async fn break_connection(&self) -> Result<()> {
        self.request(Command::Break).await
    }

    /// See [`ConnectionManager::send_message`].
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::ManagerClosed`] if the driver has exited.
    pub async fn send_message(&self, payload: impl Into<String>) -> Result<bool> {
        let payload = payload.into();
        self.request(|reply| Command::Send(payload, reply)).await
    }

    /// See [`ConnectionManager::subscribe`].
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::ManagerClosed`] if the driver has exited.
    pub async fn subscribe(&self, payload: impl Into<String>) -> Result<bool> {
        let payload = payload.into();
        self.request(|reply| Command::Subscribe(payload, reply)).await
    }

    /// See [`ConnectionManager::unsubscribe`].
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::ManagerClosed`] if the driver has exited.
    pub async fn unsubscribe(&self, payload: impl Into<String>) -> Result<bool> {
        let payload = payload.into();
        self.request(|reply| Command::Unsubscribe(payload, reply)).await
    }

    /// See [`ConnectionManager::remove_store_key`].
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::ManagerClosed`] if the driver has exited.
    pub async fn remove_store_key(&self, key: impl Into<String>) -> Result<bool> {
        let key = key.into();
        self.request(|reply| Command::RemoveStoreKey(key, reply)).await
    }

    /// See [`ConnectionManager::clear_stored_requests`].
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::ManagerClosed`] if the driver has exited.
    pub async fn clear_stored_requests(&self) -> Result<()> {
        self.request(Command::ClearStoredRequests).await
    }

    /// See [`ConnectionManager::stored_requests`].
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::ManagerClosed`] if the driver has exited.
    pub async fn stored_requests(&self) -> Result<Vec<String>> {
        self.request(Command::StoredRequests).await
    }

    /// See [`ConnectionManager::info`].
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::ManagerClosed`] if the driver has exited.
    pub async fn info(&self) -> Result<ConnectionInfo> {
        self.request(Command::Info).await
    }

    /// Dispose the manager and stop the driver task.
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::ManagerClosed`] if the driver had already
    /// exited.
    pub async fn dispose(&self) -> Result<()> {
        self.request(Command::Dispose).await
    }
}

async fn drive<T: Transport>(
    mut manager: ConnectionManager<T>,
    mut commands: mpsc::Receiver<Command>,
) {
    loop {
        tokio::select! {
            command = commands.recv() => {
                match command {
                    Some(Command::Dispose(reply)) => {
                        manager.dispose();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => apply(&mut manager, command),
                    None => {
                        debug!(
                            connection = %manager.config().connection_name,
                            "all socket handles dropped"
                        );
                        manager.dispose();
                        break;
                    }
                }
            }

            Some(inbound) = manager.next_inbound() => {
                manager.handle(inbound);
            }
        }
    }
}

fn apply<T: Transport>(manager: &mut ConnectionManager<T>, command: Command) {
    match command {
        Command::Open(reply) => {
            manager.open();
            let _ = reply.send(());
        }
        Command::Close(reply) => {
            manager.close();
            let _ = reply.send(());
        }
        Command::Break(reply) => {
            manager.break_connection();
            let _ = reply.send(());
        }
        Command::Send(payload, reply) => {
            let _ = reply.send(manager.send_message(&payload));
        }
        Command::Subscribe(payload, reply) => {
            let _ = reply.send(manager.subscribe(&payload));
        }
        Command::Unsubscribe(payload, reply) => {
            let _ = reply.send(manager.unsubscribe(&payload));
        }
        Command::RemoveStoreKey(key, reply) => {
            let _ = reply.send(manager.remove_store_key(&key));
        }
        Command::ClearStoredRequests(reply) => {
            manager.clear_stored_requests();
            let _ = reply.send(());
        }
        Command::StoredRequests(reply) => {
            let _ = reply.send(manager.stored_requests());
        }
        Command::Info(reply) => {
            let _ = reply.send(manager.info());
        }
        Command::Dispose(reply) => {
            manager.dispose();
            let _ = reply.send(());
        }
    }
}
