use crate::error::DeliveryError;
use crate::metrics;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    Mutex,
};
use uuid::Uuid;

pub mod lifecycle;
pub mod message_types;
pub mod pipeline;
pub mod presence;
pub mod session;

pub use lifecycle::{ConnectionLifecycle, FrameDisposition};
pub use pipeline::{DeliveryOutcome, MessagePipeline, PipelineWorker};
pub use presence::PresenceResolver;
pub use session::WsSession;

/// Identity of one physical connection, distinct from the user it serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Command for the actor that owns a connection.
#[derive(Debug, Clone, PartialEq, Eq, actix::Message)]
#[rtype(result = "()")]
pub enum Outbound {
    Text(String),
    Close,
}

/// Write side of a live connection.
///
/// Sending never blocks. A send fails once the owning actor has stopped and
/// dropped the receiving end.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sender: UnboundedSender<Outbound>,
}

impl ConnectionHandle {
    pub fn new() -> (Self, UnboundedReceiver<Outbound>) {
        let (sender, rx) = unbounded_channel();
        (
            Self {
                id: ConnectionId::new(),
                sender,
            },
            rx,
        )
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn send_text(&self, text: String) -> Result<(), DeliveryError> {
        self.sender
            .send(Outbound::Text(text))
            .map_err(|_| DeliveryError::ConnectionClosed(self.id.to_string()))
    }

    pub fn send_json<T: Serialize>(&self, value: &T) -> Result<(), DeliveryError> {
        let text = serde_json::to_string(value)?;
        self.send_text(text)
    }

    /// Asks the owning actor to send a Close frame and stop.
    pub fn close(&self) {
        let _ = self.sender.send(Outbound::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Registry of live connections, one per user.
///
/// A single lock guards the map and is never held across a socket write.
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    inner: Arc<Mutex<HashMap<String, ConnectionHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `user_id` to `handle`. A previous connection for the same user is
    /// replaced and returned, but not closed.
    pub async fn register(
        &self,
        user_id: &str,
        handle: ConnectionHandle,
    ) -> Option<ConnectionHandle> {
        let mut guard = self.inner.lock().await;
        let previous = guard.insert(user_id.to_string(), handle);
        metrics::set_live_connections(guard.len());

        tracing::debug!(
            user_id = %user_id,
            replaced = previous.is_some(),
            total = guard.len(),
            "registered connection"
        );
        previous
    }

    /// Removes the entry for `user_id` only if it still belongs to connection
    /// `conn`. Returns whether anything was removed.
    pub async fn unregister(&self, user_id: &str, conn: ConnectionId) -> bool {
        let mut guard = self.inner.lock().await;
        let owned = guard.get(user_id).map(|h| h.id == conn).unwrap_or(false);
        if owned {
            guard.remove(user_id);
            metrics::set_live_connections(guard.len());
            tracing::debug!(user_id = %user_id, remaining = guard.len(), "unregistered connection");
        } else {
            tracing::debug!(
                user_id = %user_id,
                connection = %conn,
                "skipped unregister for superseded connection"
            );
        }
        owned
    }

    /// Closes a connection that failed a write and drops it from the registry.
    pub async fn evict(&self, user_id: &str, handle: &ConnectionHandle) -> bool {
        handle.close();
        self.unregister(user_id, handle.id()).await
    }

    pub async fn lookup(&self, user_id: &str) -> Option<ConnectionHandle> {
        self.inner.lock().await.get(user_id).cloned()
    }

    pub async fn is_online(&self, user_id: &str) -> bool {
        self.inner.lock().await.contains_key(user_id)
    }

    pub async fn online_users(&self) -> HashSet<String> {
        self.inner.lock().await.keys().cloned().collect()
    }

    /// Copy of every entry, for iterating without holding the lock.
    pub async fn snapshot(&self) -> Vec<(String, ConnectionHandle)> {
        self.inner
            .lock()
            .await
            .iter()
            .map(|(user, handle)| (user.clone(), handle.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}
