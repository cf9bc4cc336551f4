use crate::websocket::message_types::{ChatFrame, FrameKind};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A message accepted from a live connection. Immutable once built.
///
/// Chat messages and typing notices take the same path: both are persisted,
/// delivered and followed by a presence rebroadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Uuid,
    /// The `type` the sender wrote, if any. Echoed back unchanged.
    pub kind: Option<FrameKind>,
    pub from: String,
    pub to: String,
    pub content: String,
    pub timestamp: String,
    pub is_typing: bool,
}

impl Message {
    /// Builds a message from an inbound frame whose sender has already been
    /// checked against the connection identity.
    pub fn from_frame(frame: ChatFrame, received_at: DateTime<Utc>) -> Self {
        let timestamp = if frame.timestamp.is_empty() {
            received_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        } else {
            frame.timestamp
        };

        Self {
            id: Uuid::new_v4(),
            kind: frame.kind,
            from: frame.from,
            to: frame.to,
            content: frame.content,
            timestamp,
            is_typing: frame.is_typing,
        }
    }

    /// The frame written to the recipient's connection.
    pub fn to_frame(&self) -> ChatFrame {
        ChatFrame {
            kind: self.kind,
            from: self.from.clone(),
            to: self.to.clone(),
            content: self.content.clone(),
            timestamp: self.timestamp.clone(),
            is_typing: self.is_typing,
        }
    }

    pub fn is_typing_notice(&self) -> bool {
        self.kind == Some(FrameKind::Typing)
    }
}

/// One persisted message as returned by the conversation history endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationEntry {
    pub from: String,
    pub to: String,
    pub content: String,
    pub timestamp: String,
}
