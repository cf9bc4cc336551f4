use crate::models::ContactStatus;
use serde::{Deserialize, Deserializer, Serialize};

/// First frame on every connection. Only `from` establishes identity; `token`
/// is consulted when handshake verification is enabled. Other fields the
/// client sends (`to`, `content`, `timestamp`) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct HandshakeFrame {
    #[serde(default, deserialize_with = "null_as_default")]
    pub from: String,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    Message,
    Typing,
}

/// Chat frame, inbound from the sender and outbound to the recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatFrame {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FrameKind>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub from: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub to: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub content: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub timestamp: String,
    #[serde(
        rename = "isTyping",
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "is_false"
    )]
    pub is_typing: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Explicit `null` reads as the field's empty value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Unsolicited presence push: `{"type":"userlist","data":[...]}`.
#[derive(Debug, Clone, Serialize)]
pub struct PresenceFrame<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: &'a [ContactStatus],
}

impl<'a> PresenceFrame<'a> {
    pub const KIND: &'static str = "userlist";

    pub fn new(data: &'a [ContactStatus]) -> Self {
        Self {
            kind: Self::KIND,
            data,
        }
    }
}
