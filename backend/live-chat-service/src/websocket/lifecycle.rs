use super::message_types::{ChatFrame, HandshakeFrame};
use super::pipeline::MessagePipeline;
use super::presence::PresenceResolver;
use super::{ConnectionHandle, ConnectionId, ConnectionRegistry};
use crate::error::{FrameError, HandshakeError};
use crate::metrics;
use crate::models::Message;
use crate::services::HandshakeVerifier;
use chrono::Utc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDisposition {
    Queued,
    /// Dropped with a warning; the connection stays open.
    Ignored,
}

/// Connection-level steps shared by every live connection: handshake,
/// inbound frames, disconnect.
#[derive(Clone)]
pub struct ConnectionLifecycle {
    registry: ConnectionRegistry,
    presence: PresenceResolver,
    pipeline: MessagePipeline,
    verifier: Option<HandshakeVerifier>,
}

impl ConnectionLifecycle {
    pub fn new(
        registry: ConnectionRegistry,
        presence: PresenceResolver,
        pipeline: MessagePipeline,
        verifier: Option<HandshakeVerifier>,
    ) -> Self {
        Self {
            registry,
            presence,
            pipeline,
            verifier,
        }
    }

    /// Reads the identity frame, registers `handle` under it and pushes
    /// presence to everyone. Nothing is registered on failure.
    pub async fn handshake(
        &self,
        text: &str,
        handle: ConnectionHandle,
    ) -> Result<String, HandshakeError> {
        let user_id = match self.identify(text) {
            Ok(user_id) => user_id,
            Err(e) => {
                Self::reject_handshake(&e);
                return Err(e);
            }
        };

        let connection = handle.id();
        if let Some(previous) = self.registry.register(&user_id, handle).await {
            tracing::info!(
                user_id = %user_id,
                replaced = %previous.id(),
                "user reconnected, previous connection replaced"
            );
        }
        metrics::record_handshake("accepted");
        tracing::info!(user_id = %user_id, connection = %connection, "user connected");

        self.presence.rebroadcast().await;
        Ok(user_id)
    }

    /// Records a refused handshake.
    pub fn reject_handshake(error: &HandshakeError) {
        metrics::record_handshake(error.label());
        tracing::warn!(error = %error, "handshake failed, closing connection");
    }

    fn identify(&self, text: &str) -> Result<String, HandshakeError> {
        let frame: HandshakeFrame = serde_json::from_str(text)?;
        if frame.from.is_empty() {
            return Err(HandshakeError::MissingIdentity);
        }
        if let Some(verifier) = &self.verifier {
            verifier.verify(frame.token.as_deref(), &frame.from)?;
        }
        Ok(frame.from)
    }

    /// Decodes one frame from `user_id`'s connection and queues it. Called in
    /// read order, so queueing order is per-connection FIFO.
    pub fn accept_frame(
        &self,
        user_id: &str,
        text: &str,
    ) -> Result<FrameDisposition, FrameError> {
        let mut frame: ChatFrame = serde_json::from_str(text)?;

        if frame.from.is_empty() {
            frame.from = user_id.to_string();
        } else if frame.from != user_id {
            return Err(FrameError::SenderMismatch {
                claimed: frame.from,
                owner: user_id.to_string(),
            });
        }

        if frame.to.is_empty() {
            tracing::warn!(user_id = %user_id, "frame without recipient ignored");
            return Ok(FrameDisposition::Ignored);
        }

        self.pipeline.submit(Message::from_frame(frame, Utc::now()))?;
        Ok(FrameDisposition::Queued)
    }

    /// Drops the registration owned by `connection` and pushes presence again.
    pub async fn disconnect(&self, user_id: &str, connection: ConnectionId) {
        let removed = self.registry.unregister(user_id, connection).await;
        tracing::info!(
            user_id = %user_id,
            connection = %connection,
            removed,
            "user disconnected"
        );
        self.presence.rebroadcast().await;
    }
}
