//! Frame delivery to open connections.
//!
//! Holds every open connection, registered or not. A connection leaves the
//! set when its transport closes or when the hub force-closes it.

use std::sync::Arc;

use indexmap::IndexMap;
use metrics::counter;
use relay_core::{ConnectionId, ServerFrame};
use tracing::{debug, warn};

use super::connection::ClientConnection;
use crate::metrics::WS_SEND_DROPS_TOTAL;

/// Open connections in accept order.
#[derive(Debug, Default)]
pub struct Fanout {
    connections: IndexMap<ConnectionId, ClientConnection>,
}

impl Fanout {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. Replaces any handle with the same id.
    pub fn add(&mut self, connection: ClientConnection) {
        let _ = self.connections.insert(connection.id, connection);
    }

    /// Remove a connection, dropping its outbound queue.
    pub fn remove(&mut self, id: ConnectionId) -> Option<ClientConnection> {
        self.connections.shift_remove(&id)
    }

    /// Queue a Close for `id` and remove it from the set.
    ///
    /// Frames queued before the close are still flushed by the writer.
    pub fn close(&mut self, id: ConnectionId) -> bool {
        match self.remove(id) {
            Some(conn) => {
                if !conn.close() {
                    debug!(conn_id = %id, "close not queued, dropping handle");
                }
                true
            }
            None => false,
        }
    }

    /// Whether `id` is in the set and its writer is still running.
    pub fn is_open(&self, id: ConnectionId) -> bool {
        self.connections.get(&id).is_some_and(ClientConnection::is_open)
    }

    /// Whether `id` is in the set.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Number of connections in the set.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Deliver `frame` to every open connection. Returns the recipient count.
    pub fn broadcast(&self, frame: &ServerFrame) -> usize {
        self.deliver(|_| true, frame)
    }

    /// Deliver `frame` to every open connection except `skip`.
    pub fn broadcast_except(&self, skip: ConnectionId, frame: &ServerFrame) -> usize {
        self.deliver(|c| c.id != skip, frame)
    }

    /// Deliver `frame` to one connection. Returns `false` if it is gone,
    /// closed, or its queue is full.
    pub fn send_to(&self, id: ConnectionId, frame: &ServerFrame) -> bool {
        self.deliver(|c| c.id == id, frame) == 1
    }

    /// Wrap `text` in a notification and deliver it to one connection.
    pub fn notify(&self, id: ConnectionId, text: impl Into<String>) -> bool {
        self.send_to(id, &ServerFrame::notification(text))
    }

    /// Serialize once, queue on each matching open connection.
    fn deliver(&self, filter: impl Fn(&ClientConnection) -> bool, frame: &ServerFrame) -> usize {
        let json = match frame.encode() {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(frame = frame.kind(), error = %e, "failed to serialize frame");
                return 0;
            }
        };
        let mut delivered = 0;
        for conn in self.connections.values() {
            if !filter(conn) || !conn.is_open() {
                continue;
            }
            if conn.send(Arc::clone(&json)) {
                delivered += 1;
            } else {
                counter!(WS_SEND_DROPS_TOTAL).increment(1);
                warn!(
                    conn_id = %conn.id,
                    frame = frame.kind(),
                    total_drops = conn.drop_count(),
                    "failed to queue frame (channel full)"
                );
            }
        }
        delivered
    }
}
