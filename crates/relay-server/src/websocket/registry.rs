//! Nickname registry: connection → session.
//!
//! Invariants:
//! - a connection appears at most once,
//! - nicknames are pairwise distinct (exact, case-sensitive match),
//! - iteration order is registration order.
//!
//! The registry holds no transport state. Side effects of registering
//! (welcome, user list, presence) belong to the hub.

use indexmap::IndexMap;
use relay_core::{ConnectionId, RegisterError};

/// Registration record bound to one connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    /// Trimmed, non-empty nickname.
    pub nickname: String,
    /// Connection that owns this nickname.
    pub connection: ConnectionId,
}

/// All registered sessions, keyed by connection.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: IndexMap<ConnectionId, Session>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `requested` (trimmed) for `connection`.
    ///
    /// The uniqueness check and the insert happen under one `&mut self`
    /// borrow, so no other claim can interleave.
    pub fn register(
        &mut self,
        connection: ConnectionId,
        requested: &str,
    ) -> Result<Session, RegisterError> {
        let nickname = requested.trim();
        if nickname.is_empty() {
            return Err(RegisterError::EmptyNickname);
        }
        if let Some(existing) = self.sessions.get(&connection) {
            return Err(RegisterError::AlreadyRegistered(existing.nickname.clone()));
        }
        if self.find_by_nickname(nickname).is_some() {
            return Err(RegisterError::NameTaken(nickname.to_owned()));
        }

        let session = Session {
            nickname: nickname.to_owned(),
            connection,
        };
        let _ = self.sessions.insert(connection, session.clone());
        Ok(session)
    }

    /// Remove the session bound to `connection`, if any.
    ///
    /// Returns `None` when the connection never registered or was already
    /// removed, so repeated calls are harmless.
    pub fn unregister(&mut self, connection: ConnectionId) -> Option<Session> {
        self.sessions.shift_remove(&connection)
    }

    /// Session bound to `connection`.
    pub fn get(&self, connection: ConnectionId) -> Option<&Session> {
        self.sessions.get(&connection)
    }

    /// Nickname bound to `connection`.
    pub fn nickname_of(&self, connection: ConnectionId) -> Option<&str> {
        self.get(connection).map(|s| s.nickname.as_str())
    }

    /// Connection holding `nickname`, first match in registration order.
    pub fn find_by_nickname(&self, nickname: &str) -> Option<ConnectionId> {
        self.sessions
            .values()
            .find(|s| s.nickname == nickname)
            .map(|s| s.connection)
    }

    /// Whether `connection` has a session.
    pub fn contains(&self, connection: ConnectionId) -> bool {
        self.sessions.contains_key(&connection)
    }

    /// Registered nicknames, oldest first.
    pub fn nicknames(&self) -> Vec<String> {
        self.sessions.values().map(|s| s.nickname.clone()).collect()
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
