//! JSON wire protocol.
//!
//! Every frame is a JSON object discriminated by its `type` field.
//! Unknown fields are ignored on decode.
//!
//! | `type` | Fields | Direction |
//! |--------|--------|-----------|
//! | `register_nickname` | `nickname` | client → server |
//! | `user_list` | `users` | server → client |
//! | `notification` | `text` | server → client |
//! | `message` | `sender`, `text` | both (client omits `sender`) |
//! | `dm` | `sender`, `target`, `text` | both (client omits `sender`) |

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::FrameError;

// ─────────────────────────────────────────────────────────────────────────────
// ClientFrame (inbound)
// ─────────────────────────────────────────────────────────────────────────────

/// A frame sent by a client.
///
/// Fields are optional at this layer: absence is a routing decision made by
/// the hub (close, drop, or forward), not a decode failure. A field present
/// with the wrong JSON type is a decode failure.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    /// Claim a nickname. Only meaningful before registration.
    #[serde(rename = "register_nickname")]
    RegisterNickname {
        /// Requested nickname, untrimmed.
        #[serde(default)]
        nickname: Option<String>,
    },

    /// Public message for every open connection.
    #[serde(rename = "message")]
    Message {
        /// Message body, forwarded without validation.
        #[serde(default)]
        text: Option<Value>,
    },

    /// Direct message for one nickname.
    ///
    /// Both fields accept any JSON value. Only a string `target` can match
    /// a nickname.
    #[serde(rename = "dm")]
    DirectMessage {
        /// Recipient nickname.
        #[serde(default)]
        target: Option<Value>,
        /// Message body, forwarded without validation.
        #[serde(default)]
        text: Option<Value>,
    },

    /// Any other `type` value. Ignored by the router.
    #[serde(other)]
    Unknown,
}

impl ClientFrame {
    /// Decode a text frame.
    pub fn decode(raw: &str) -> Result<Self, FrameError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RegisterNickname { .. } => "register_nickname",
            Self::Message { .. } => "message",
            Self::DirectMessage { .. } => "dm",
            Self::Unknown => "unknown",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ServerFrame (outbound)
// ─────────────────────────────────────────────────────────────────────────────

/// A frame sent by the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    /// Nicknames of every registered session, oldest first.
    #[serde(rename = "user_list")]
    UserList {
        /// Registered nicknames.
        users: Vec<String>,
    },

    /// Informational text from the server.
    #[serde(rename = "notification")]
    Notification {
        /// Human-readable text.
        text: String,
    },

    /// Public message relayed from `sender`.
    #[serde(rename = "message")]
    Message {
        /// Nickname of the author.
        sender: String,
        /// Body exactly as the author sent it; omitted when the author omitted it.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<Value>,
    },

    /// Direct message relayed from `sender` to `target`.
    #[serde(rename = "dm")]
    DirectMessage {
        /// Nickname of the author.
        sender: String,
        /// Nickname of the recipient.
        target: String,
        /// Message body exactly as the author sent it.
        text: Value,
    },
}

impl ServerFrame {
    /// Wrap `text` in a notification frame.
    pub fn notification(text: impl Into<String>) -> Self {
        Self::Notification { text: text.into() }
    }

    /// Serialize to the JSON text sent over the wire.
    pub fn encode(&self) -> Result<String, FrameError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UserList { .. } => "user_list",
            Self::Notification { .. } => "notification",
            Self::Message { .. } => "message",
            Self::DirectMessage { .. } => "dm",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
