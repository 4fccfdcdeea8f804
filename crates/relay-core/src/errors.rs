//! Error types shared across the relay.
//!
//! Neither error is ever sent to a client as a structured object. The hub
//! turns them into a notification, a forced close, or a silent drop.

/// A text frame that could not be decoded into a [`ClientFrame`](crate::ClientFrame).
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Payload is not JSON, or not one of the known shapes.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Why a `register_nickname` request did not create a session.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    /// Another registered connection already holds this nickname.
    #[error("nickname already in use: {0}")]
    NameTaken(String),

    /// Nickname is empty after trimming.
    #[error("nickname is empty")]
    EmptyNickname,

    /// The connection already holds a session.
    #[error("connection already registered as {0}")]
    AlreadyRegistered(String),
}
